use crate::dto::test_dto::ImageFile;
use crate::error::{Error, Result};
use crate::models::question::QuestionType;
use crate::services::test_builder::{ImageField, ImageSlot, TestBuilder};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Authoring input read from a JSON file, for publishing tests without a form.
///
/// Image paths are resolved against the manifest's directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestManifest {
    pub name: String,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    pub sections: Vec<ManifestSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSection {
    pub name: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub questions: Vec<ManifestQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestQuestion {
    #[serde(default)]
    pub question_image: Option<PathBuf>,
    #[serde(default)]
    pub solution_image: Option<PathBuf>,
    #[serde(default)]
    pub correct_option: Option<String>,
    #[serde(default)]
    pub correct_integer: Option<String>,
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

async fn read_image(path: &Path) -> Result<ImageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::InvalidInput(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(ImageFile {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string()),
        content_type: content_type(path).to_string(),
        bytes,
    })
}

impl TestManifest {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the manifest into the builder. Sections and questions are
    /// matched by position; existing ones are updated, missing ones added.
    /// Images left out of the manifest keep their current value.
    pub async fn apply(&self, builder: &mut TestBuilder, base_dir: &Path) -> Result<()> {
        builder.set_name(self.name.clone());
        builder.set_duration(self.hours, self.minutes)?;

        for (s, section) in self.sections.iter().enumerate() {
            if s >= builder.sections().len() {
                builder.add_section();
            }
            builder.rename_section(s, section.name.clone())?;
            builder.set_question_type(s, section.question_type)?;

            for (q, question) in section.questions.iter().enumerate() {
                if q >= builder.sections()[s].questions.len() {
                    builder.add_question(s)?;
                }
                if let Some(option) = &question.correct_option {
                    builder.set_correct_option(s, q, option)?;
                }
                if let Some(text) = &question.correct_integer {
                    builder.set_correct_integer(s, q, text)?;
                }
                for (field, image) in [
                    (ImageField::Question, &question.question_image),
                    (ImageField::Solution, &question.solution_image),
                ] {
                    if let Some(image) = image {
                        let file = read_image(&base_dir.join(image)).await?;
                        builder.set_image(ImageSlot::new(s, q, field), file)?;
                    }
                }
            }
            debug!(section = %section.name, questions = section.questions.len(), "manifest section applied");
        }
        Ok(())
    }
}

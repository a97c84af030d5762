use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Candidate identity persisted as a small JSON file.
#[derive(Debug, Clone)]
pub struct CandidateStore {
    path: PathBuf,
}

impl CandidateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when no candidate has been saved yet.
    pub async fn load(&self) -> Result<Option<Candidate>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored candidate");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, candidate: &Candidate) -> Result<()> {
        let name = candidate.candidate_name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("Please enter your name".to_string()));
        }
        let candidate = Candidate {
            candidate_name: name.to_string(),
            candidate_image: candidate
                .candidate_image
                .clone()
                .filter(|image| !image.trim().is_empty()),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&candidate)?;
        tokio::fs::write(&self.path, json).await?;
        info!(candidate = %candidate.candidate_name, "candidate saved");
        Ok(())
    }

    /// Stored candidate, or `InvalidInput` asking for a name first.
    pub async fn require(&self) -> Result<Candidate> {
        self.load().await?.ok_or_else(|| {
            Error::InvalidInput("No candidate name stored. Run `whoami --name <name>` first.".to_string())
        })
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

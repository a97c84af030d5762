use crate::error::{Error, Result};
use crate::models::answer::Answer;
use crate::models::question::Question;
use crate::models::test::Test;
use crate::models::test_attempt::TestAttempt;
use crate::services::api_client::AttemptApi;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const EMBEDDED_RANK_TABLE: &str = include_str!("../../data/jee_main_2024.json");

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStats {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub unattempted: usize,
    pub marks: i32,
    pub max_marks: i32,
    /// Seconds, from the server's per-answer totals.
    pub total_time: u64,
}

impl SectionStats {
    pub fn attempted(&self) -> usize {
        self.correct + self.wrong
    }

    pub fn accuracy(&self) -> f64 {
        percent(self.correct, self.attempted())
    }

    fn add(&mut self, other: &SectionStats) {
        self.total += other.total;
        self.correct += other.correct;
        self.wrong += other.wrong;
        self.unattempted += other.unattempted;
        self.marks += other.marks;
        self.max_marks += other.max_marks;
        self.total_time += other.total_time;
    }
}

fn answer_for<'a>(answers: &'a [Answer], question_id: &str) -> Option<&'a Answer> {
    answers.iter().find(|a| a.question_id == question_id)
}

/// Ungraded (`isCorrect` unset) and missing answers count as unattempted.
pub fn question_stats(questions: &[Question], answers: &[Answer]) -> SectionStats {
    let mut stats = SectionStats {
        total: questions.len(),
        ..SectionStats::default()
    };
    for question in questions {
        stats.max_marks += question.marks;
        let answer = answer_for(answers, &question.id);
        match answer.and_then(|a| a.is_correct) {
            Some(true) => stats.correct += 1,
            Some(false) => stats.wrong += 1,
            None => stats.unattempted += 1,
        }
        if let Some(answer) = answer {
            if answer.is_correct.is_some() {
                stats.marks += answer.marks_awarded.unwrap_or(0);
            }
            stats.total_time += answer.time_spent.unwrap_or(0);
        }
    }
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub questions: SectionStats,
    /// Score recorded on the attempt.
    pub total_marks: i32,
    /// Maximum score of the test.
    pub max_marks: i32,
    pub percentage: f64,
    pub accuracy: f64,
}

pub fn overall_stats(attempt: &TestAttempt, test: &Test) -> OverallStats {
    let mut questions = SectionStats::default();
    for section in &test.sections {
        questions.add(&question_stats(&section.questions, &attempt.answers));
    }
    let percentage = if test.total_marks == 0 {
        0.0
    } else {
        f64::from(attempt.total_marks) / f64::from(test.total_marks) * 100.0
    };
    OverallStats {
        accuracy: questions.accuracy(),
        questions,
        total_marks: attempt.total_marks,
        max_marks: test.total_marks,
        percentage,
    }
}

/// Maps a section name onto a PCM subject, else its first word.
pub fn subject_name(section_name: &str) -> String {
    let trimmed = section_name.trim();
    let lower = trimmed.to_lowercase();
    if lower.starts_with("physics") {
        "Physics".to_string()
    } else if lower.starts_with("chemistry") {
        "Chemistry".to_string()
    } else if lower.starts_with("mathematics") || lower.starts_with("maths") {
        "Mathematics".to_string()
    } else {
        trimmed
            .split_whitespace()
            .next()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub name: String,
    pub sections: Vec<String>,
    pub stats: SectionStats,
}

/// Subjects in order of first appearance.
pub fn subject_stats(test: &Test, answers: &[Answer]) -> Vec<SubjectStats> {
    let mut subjects: Vec<SubjectStats> = Vec::new();
    for section in &test.sections {
        let name = subject_name(&section.name);
        let stats = question_stats(&section.questions, answers);
        match subjects.iter_mut().find(|s| s.name == name) {
            Some(subject) => {
                subject.sections.push(section.name.clone());
                subject.stats.add(&stats);
            }
            None => subjects.push(SubjectStats {
                name,
                sections: vec![section.name.clone()],
                stats,
            }),
        }
    }
    subjects
}

pub fn has_multiple_subjects(test: &Test) -> bool {
    let mut names: Vec<String> = test.sections.iter().map(|s| subject_name(&s.name)).collect();
    names.sort();
    names.dedup();
    names.len() > 1
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPoint {
    pub question_number: usize,
    pub subject: String,
    pub marks: i32,
    pub time_spent: u64,
    pub is_correct: Option<bool>,
    pub max_marks: i32,
}

pub fn question_series(test: &Test, answers: &[Answer]) -> Vec<QuestionPoint> {
    let mut points = Vec::with_capacity(test.question_count());
    for section in &test.sections {
        let subject = subject_name(&section.name);
        for question in &section.questions {
            let answer = answer_for(answers, &question.id);
            points.push(QuestionPoint {
                question_number: points.len() + 1,
                subject: subject.clone(),
                marks: answer.and_then(|a| a.marks_awarded).unwrap_or(0),
                time_spent: answer.and_then(|a| a.time_spent).unwrap_or(0),
                is_correct: answer.and_then(|a| a.is_correct),
                max_marks: question.marks,
            });
        }
    }
    points
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEstimate {
    pub percentile_range: String,
    pub rank_range: String,
}

impl RankEstimate {
    fn new(percentile: &str, rank: &str) -> Self {
        Self {
            percentile_range: percentile.to_string(),
            rank_range: rank.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTable {
    name: String,
    #[serde(default)]
    max_score: Option<i32>,
    buckets: Vec<RawBucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBucket {
    score_range: String,
    percentile_range: String,
    #[serde(default)]
    rank_range: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankBucket {
    pub min_score: i32,
    pub max_score: i32,
    pub percentile_range: String,
    pub rank_range: Option<String>,
}

/// Score buckets mapping marks to a percentile and rank band.
#[derive(Debug, Clone)]
pub struct RankTable {
    name: String,
    max_score: i32,
    buckets: Vec<RankBucket>,
}

impl RankTable {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_RANK_TABLE)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let table = Self::from_json(&raw)?;
        info!(path = %path.display(), name = %table.name, "loaded rank table");
        Ok(table)
    }

    /// Embedded table unless a path is configured.
    pub async fn from_config(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => Self::embedded(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let table: RawTable = serde_json::from_str(raw)?;
        let buckets = table
            .buckets
            .into_iter()
            .map(|b| {
                let (a, c) = parse_score_range(&b.score_range)?;
                Ok(RankBucket {
                    min_score: a.min(c),
                    max_score: a.max(c),
                    percentile_range: b.percentile_range,
                    rank_range: b.rank_range.filter(|r| !r.trim().is_empty()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if buckets.is_empty() {
            return Err(Error::Config(format!("Rank table {} has no buckets", table.name)));
        }
        let max_score = table
            .max_score
            .or_else(|| buckets.iter().map(|b| b.max_score).max())
            .unwrap_or(0);
        Ok(Self {
            name: table.name,
            max_score,
            buckets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buckets(&self) -> &[RankBucket] {
        &self.buckets
    }

    /// First matching bucket wins.
    pub fn estimate(&self, marks: i32) -> RankEstimate {
        if marks < 0 {
            return RankEstimate::new("0", "Not Available");
        }
        if marks > self.max_score {
            return RankEstimate::new("100", "1");
        }
        self.buckets
            .iter()
            .find(|b| (b.min_score..=b.max_score).contains(&marks))
            .map(|b| RankEstimate {
                percentile_range: b.percentile_range.clone(),
                rank_range: b
                    .rank_range
                    .clone()
                    .unwrap_or_else(|| "Not Available".to_string()),
            })
            .unwrap_or_else(|| RankEstimate::new("Data Not Available", "Data Not Available"))
    }
}

fn parse_score_range(range: &str) -> Result<(i32, i32)> {
    let invalid = || Error::Config(format!("Invalid score range: {}", range));
    let (low, high) = range.split_once('-').ok_or_else(invalid)?;
    let low = low.trim().parse().map_err(|_| invalid())?;
    let high = high.trim().parse().map_err(|_| invalid())?;
    Ok((low, high))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnalysis {
    pub attempt_id: String,
    pub test_name: String,
    pub candidate_name: String,
    pub overall: OverallStats,
    pub sections: Vec<(String, SectionStats)>,
    pub subjects: Vec<SubjectStats>,
    pub multiple_subjects: bool,
    pub questions: Vec<QuestionPoint>,
    pub rank: RankEstimate,
}

#[derive(Clone)]
pub struct AnalyticsService {
    attempts: Arc<dyn AttemptApi>,
    table: Arc<RankTable>,
}

impl AnalyticsService {
    pub fn new(attempts: Arc<dyn AttemptApi>, table: RankTable) -> Self {
        Self {
            attempts,
            table: Arc::new(table),
        }
    }

    pub async fn analyse(&self, attempt_id: &str) -> Result<AttemptAnalysis> {
        let attempt = self.attempts.get_attempt(attempt_id).await?;
        self.analyse_attempt(&attempt)
    }

    pub fn analyse_attempt(&self, attempt: &TestAttempt) -> Result<AttemptAnalysis> {
        let test = attempt
            .test
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("Test for attempt {}", attempt.id)))?;
        let sections = test
            .sections
            .iter()
            .map(|s| (s.name.clone(), question_stats(&s.questions, &attempt.answers)))
            .collect();
        Ok(AttemptAnalysis {
            attempt_id: attempt.id.clone(),
            test_name: test.name.clone(),
            candidate_name: attempt.candidate_name.clone(),
            overall: overall_stats(attempt, test),
            sections,
            subjects: subject_stats(test, &attempt.answers),
            multiple_subjects: has_multiple_subjects(test),
            questions: question_series(test, &attempt.answers),
            rank: self.table.estimate(attempt.total_marks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::AnswerStatus;
    use crate::models::question::QuestionType;
    use crate::models::test::Section;
    use crate::services::api_client::MockAttemptApi;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            question_image: None,
            solution_image: None,
            correct_option: None,
            correct_integer: None,
            marks: 4,
        }
    }

    fn graded(id: &str, correct: Option<bool>, marks: i32, time: u64) -> Answer {
        Answer {
            question_id: id.to_string(),
            selected_option: Some("A".into()),
            integer_answer: None,
            status: AnswerStatus::Answered,
            is_correct: correct,
            marks_awarded: Some(marks),
            time_spent: Some(time),
        }
    }

    fn section(name: &str, ids: &[&str]) -> Section {
        Section {
            id: None,
            name: name.to_string(),
            question_type: QuestionType::Mcq,
            questions: ids.iter().map(|id| question(id)).collect(),
        }
    }

    fn scored_attempt() -> TestAttempt {
        TestAttempt {
            id: "att-9".into(),
            test_id: "t".into(),
            candidate_name: "Asha".into(),
            candidate_image: None,
            start_time: None,
            end_time: None,
            total_marks: 7,
            warning_count: 0,
            is_completed: true,
            answers: vec![
                graded("p1", Some(true), 4, 30),
                graded("p2", Some(false), -1, 45),
                graded("c1", Some(true), 4, 20),
                graded("m1", None, 0, 10),
            ],
            test: Some(Test {
                id: "t".into(),
                name: "Full Mock".into(),
                duration: 180,
                total_marks: 20,
                is_live: false,
                is_draft: false,
                sections: vec![
                    section("Physics Section A", &["p1"]),
                    section("Chemistry", &["c1"]),
                    section("physics section b", &["p2"]),
                    section("Maths", &["m1", "m2"]),
                ],
                attempts: None,
            }),
        }
    }

    #[test]
    fn subjects_follow_pcm_prefixes_then_first_word() {
        assert_eq!(subject_name("Physics - Section A"), "Physics");
        assert_eq!(subject_name("  chemistry"), "Chemistry");
        assert_eq!(subject_name("Mathematics II"), "Mathematics");
        assert_eq!(subject_name("Maths"), "Mathematics");
        assert_eq!(subject_name("Biology Part 1"), "Biology");
        assert_eq!(subject_name("   "), "Unknown");
    }

    #[test]
    fn section_stats_treat_ungraded_answers_as_unattempted() {
        let attempt = scored_attempt();
        let test = attempt.test.as_ref().unwrap();
        let maths = question_stats(&test.sections[3].questions, &attempt.answers);
        assert_eq!(maths.total, 2);
        assert_eq!(maths.unattempted, 2);
        assert_eq!(maths.marks, 0);
        assert_eq!(maths.accuracy(), 0.0);
        assert_eq!(maths.max_marks, 8);
    }

    #[test]
    fn overall_and_subject_stats() {
        let attempt = scored_attempt();
        let test = attempt.test.as_ref().unwrap();
        let overall = overall_stats(&attempt, test);
        assert_eq!(overall.questions.total, 5);
        assert_eq!(overall.questions.correct, 2);
        assert_eq!(overall.questions.wrong, 1);
        assert_eq!(overall.questions.unattempted, 2);
        assert!((overall.percentage - 35.0).abs() < 1e-9);
        assert!((overall.accuracy - 66.666).abs() < 0.01);

        let subjects = subject_stats(test, &attempt.answers);
        let names: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Physics", "Chemistry", "Mathematics"]);
        let physics = &subjects[0];
        assert_eq!(physics.sections.len(), 2);
        assert_eq!(physics.stats.marks, 3);
        assert_eq!(physics.stats.total_time, 75);
        assert!(has_multiple_subjects(test));
    }

    #[test]
    fn question_series_numbers_across_sections() {
        let attempt = scored_attempt();
        let series = question_series(attempt.test.as_ref().unwrap(), &attempt.answers);
        assert_eq!(series.len(), 5);
        assert_eq!(series[2].question_number, 3);
        assert_eq!(series[2].subject, "Physics");
        assert_eq!(series[2].marks, -1);
        assert_eq!(series[4].is_correct, None);
        assert_eq!(series[4].time_spent, 0);
    }

    #[test]
    fn zero_max_marks_gives_zero_percentage() {
        let mut attempt = scored_attempt();
        if let Some(test) = attempt.test.as_mut() {
            test.total_marks = 0;
        }
        let overall = overall_stats(&attempt, attempt.test.as_ref().unwrap());
        assert_eq!(overall.percentage, 0.0);
    }

    #[test]
    fn embedded_table_estimates_percentile_and_rank() {
        let table = RankTable::embedded().unwrap();
        assert_eq!(table.name(), "JEE Main 2024");

        let top = table.estimate(290);
        assert_eq!(top.percentile_range, "100 - 99.99889145");
        assert_eq!(top.rank_range, "Not Available");

        // 250 sits in two buckets; the first listed wins.
        assert_eq!(table.estimate(250).rank_range, "402–103");
        assert_eq!(
            table.estimate(250).percentile_range,
            "99.97720562 - 99.98881945"
        );
        assert_eq!(table.estimate(275).rank_range, "55–24");
        assert_eq!(table.estimate(0).percentile_range, "0.84351797 - 9.695406505");

        assert_eq!(table.estimate(-4), RankEstimate::new("0", "Not Available"));
        assert_eq!(table.estimate(301), RankEstimate::new("100", "1"));
    }

    #[test]
    fn gaps_in_the_table_are_reported() {
        let table = RankTable::from_json(
            r#"{"name":"Tiny","buckets":[
                {"scoreRange":"0 - 10","percentileRange":"1 - 5"},
                {"scoreRange":"30 - 20","percentileRange":"50 - 60","rankRange":"10-1"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(table.buckets()[1].min_score, 20);
        assert_eq!(table.estimate(25).rank_range, "10-1");
        assert_eq!(
            table.estimate(15),
            RankEstimate::new("Data Not Available", "Data Not Available")
        );
        assert_eq!(table.estimate(31), RankEstimate::new("100", "1"));

        assert!(matches!(
            RankTable::from_json(r#"{"name":"Bad","buckets":[{"scoreRange":"x","percentileRange":"1"}]}"#),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn analyse_fetches_the_attempt() {
        let mut api = MockAttemptApi::new();
        api.expect_get_attempt()
            .withf(|id| id == "att-9")
            .returning(|_| Ok(scored_attempt()));
        let service = AnalyticsService::new(Arc::new(api), RankTable::embedded().unwrap());

        let analysis = service.analyse("att-9").await.unwrap();
        assert_eq!(analysis.test_name, "Full Mock");
        assert_eq!(analysis.sections.len(), 4);
        assert_eq!(analysis.rank.percentile_range, "0.84351797 - 9.695406505");
        assert!(analysis.multiple_subjects);
    }
}

//! Analyzer: pluggable backend that turns skills text and/or a resume into recommendations.
//!
//! Default: `MockAnalyzer` (fixed delay, fixed roles, no parsing).
//! `AppState` holds an `Arc<dyn Analyzer>` so a real service can replace it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Roles returned by the mock analysis, in display order.
pub const MOCK_ROLES: [&str; 6] = [
    "Data Scientist",
    "Machine Learning Engineer",
    "Software Engineer",
    "Data Analyst",
    "Backend Developer",
    "AI Research Scientist",
];

/// Skills the mock pretends to have read from a resume.
pub const MOCK_RESUME_SKILLS: &str = "Python, Machine Learning, Data Analysis, SQL, Communication";

/// Handle to an uploaded file. Only the name is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub name: String,
}

/// Which inputs the user supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSources {
    Text,
    File,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    /// Numbered labels, e.g. "1. Data Scientist".
    pub recommendations: Vec<String>,
    pub summary: String,
    pub inputs: InputSources,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("provide skills text or a resume file")]
    EmptyInput,

    #[error("an analysis is already running")]
    Busy,

    #[error("analysis failed: {0}")]
    Processing(String),
}

/// Classifies the inputs, failing when neither is present.
pub fn validate_input(
    skills_text: &str,
    file: Option<&FileHandle>,
) -> Result<InputSources, AnalysisError> {
    let has_text = !skills_text.trim().is_empty();
    let has_file = file.is_some_and(|f| !f.name.trim().is_empty());
    match (has_text, has_file) {
        (true, true) => Ok(InputSources::Both),
        (true, false) => Ok(InputSources::Text),
        (false, true) => Ok(InputSources::File),
        (false, false) => Err(AnalysisError::EmptyInput),
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        skills_text: &str,
        file: Option<&FileHandle>,
    ) -> Result<RecommendationResult, AnalysisError>;
}

/// Waits `delay`, then returns `MOCK_ROLES`.
pub struct MockAnalyzer {
    delay: Duration,
}

impl MockAnalyzer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    async fn analyze(
        &self,
        skills_text: &str,
        file: Option<&FileHandle>,
    ) -> Result<RecommendationResult, AnalysisError> {
        let inputs = validate_input(skills_text, file)?;

        tokio::time::sleep(self.delay).await;

        Ok(RecommendationResult {
            recommendations: MOCK_ROLES
                .iter()
                .enumerate()
                .map(|(i, role)| format!("{}. {role}", i + 1))
                .collect(),
            summary: build_summary(skills_text.trim(), file, inputs),
            inputs,
        })
    }
}

fn build_summary(skills_text: &str, file: Option<&FileHandle>, inputs: InputSources) -> String {
    let combined = match inputs {
        InputSources::File => MOCK_RESUME_SKILLS.to_string(),
        InputSources::Text | InputSources::Both => format!("{skills_text}, {MOCK_RESUME_SKILLS}"),
    };
    let file_name = file.map(|f| f.name.as_str()).unwrap_or_default();
    let origin = match inputs {
        InputSources::Text => "your skills text".to_string(),
        InputSources::File => format!("your resume ({file_name})"),
        InputSources::Both => format!("your skills text and resume ({file_name})"),
    };
    format!("Combined skills: {combined}. Based on {origin}.")
}

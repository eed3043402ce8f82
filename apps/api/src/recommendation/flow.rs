//! Recommendation flow state: at most one analysis in flight per session.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, warn};

use crate::recommendation::analyzer::{
    validate_input, AnalysisError, Analyzer, FileHandle, RecommendationResult,
};

/// Shown to the user for any analyzer failure.
pub const ANALYSIS_FAILED: &str = "Analysis failed. Please try again.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationStatus {
    Idle,
    Analyzing,
    Ready { result: RecommendationResult },
    Failed { message: String },
}

pub struct RecommendationFlow {
    status: Mutex<RecommendationStatus>,
}

impl RecommendationFlow {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(RecommendationStatus::Idle),
        }
    }

    pub fn status(&self) -> RecommendationStatus {
        self.lock_status().clone()
    }

    fn lock_status(&self) -> MutexGuard<'_, RecommendationStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates synchronously, then runs `analyzer` with the flow marked `Analyzing`.
    ///
    /// Empty input and a concurrent call are rejected without touching the status.
    /// A processing failure leaves the flow in `Failed` with a generic message.
    pub async fn analyze(
        &self,
        analyzer: &dyn Analyzer,
        skills_text: &str,
        file: Option<&FileHandle>,
    ) -> Result<RecommendationResult, AnalysisError> {
        let inputs = validate_input(skills_text, file)?;

        let mut in_flight = {
            let mut status = self.lock_status();
            if *status == RecommendationStatus::Analyzing {
                return Err(AnalysisError::Busy);
            }
            *status = RecommendationStatus::Analyzing;
            InFlight {
                flow: self,
                settled: false,
            }
        };

        info!(?inputs, "Analysis started");
        let outcome = analyzer.analyze(skills_text, file).await;

        let next = match &outcome {
            Ok(result) => {
                info!(roles = result.recommendations.len(), "Analysis finished");
                RecommendationStatus::Ready {
                    result: result.clone(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Analysis failed");
                RecommendationStatus::Failed {
                    message: ANALYSIS_FAILED.to_string(),
                }
            }
        };
        in_flight.settle(next);

        outcome.map_err(|e| match e {
            AnalysisError::Processing(_) => e,
            other => AnalysisError::Processing(other.to_string()),
        })
    }
}

impl Default for RecommendationFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the flow to `Idle` if the analysis future is dropped mid-flight.
struct InFlight<'a> {
    flow: &'a RecommendationFlow,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(&mut self, next: RecommendationStatus) {
        *self.flow.lock_status() = next;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            *self.flow.lock_status() = RecommendationStatus::Idle;
        }
    }
}

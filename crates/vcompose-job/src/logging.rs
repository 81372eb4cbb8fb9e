//! Structured job logging utilities.
//!
//! Every line carries the job id and the current stage so a single run can
//! be followed through acquisition, composition and publication.

use tracing::{error, info, warn, Span};
use vcompose_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    stage: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, stage: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            stage: stage.to_string(),
        }
    }

    /// Same job, different stage.
    pub fn stage(&self, stage: &str) -> Self {
        Self {
            job_id: self.job_id.clone(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            "Stage progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            stage = %self.stage,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            stage = %self.stage,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            stage = %self.stage,
            "Stage completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage_name(&self) -> &str {
        &self.stage
    }

    /// Span wrapping the whole job, so library logs inherit the job id.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_stages() {
        let job_id = JobId::from_string("job-42");
        let logger = JobLogger::new(&job_id, "acquire");
        assert_eq!(logger.job_id(), "job-42");
        assert_eq!(logger.stage_name(), "acquire");

        let publish = logger.stage("publish");
        assert_eq!(publish.job_id(), "job-42");
        assert_eq!(publish.stage_name(), "publish");
    }
}

//! Stage timing.

use std::time::{Duration, Instant};

/// Measures one provisioning stage and logs its duration when finished.
#[derive(Debug)]
pub struct StageTimer {
    start: Instant,
    stage: String,
}

impl StageTimer {
    /// Starts timing `stage`.
    #[must_use]
    pub fn start(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        tracing::info!(stage = %stage, "Stage started");
        Self {
            start: Instant::now(),
            stage,
        }
    }

    /// Time since the stage started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Stage name.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Logs a successful completion and returns the duration in milliseconds.
    pub fn finish(self) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::info!(stage = %self.stage, duration_ms, "Stage completed");
        duration_ms
    }

    /// Logs a failure and returns the duration in milliseconds.
    pub fn fail(self, error: &dyn std::fmt::Display) -> f64 {
        let duration_ms = self.elapsed_ms();
        tracing::error!(stage = %self.stage, duration_ms, error = %error, "Stage failed");
        duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::start("InstallKubernetes");
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.stage(), "InstallKubernetes");
        assert!(timer.elapsed() >= Duration::from_millis(10));
        let duration = timer.finish();
        assert!(duration >= 10.0);
    }

    #[test]
    fn test_failed_stage_still_reports_duration() {
        let timer = StageTimer::start("JoinNodesToCluster");
        let duration = timer.fail(&"no master");
        assert!(duration >= 0.0);
    }
}

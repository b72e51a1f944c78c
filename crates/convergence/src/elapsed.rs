//! Scoped timing for workflow steps.

use std::time::Instant;

/// Logs how long it lived when dropped.
#[must_use = "the elapsed time is logged when the guard is dropped"]
#[derive(Debug)]
pub struct ElapsedLog {
    label: String,
    started: Instant,
}

/// Start timing `label`; the duration is logged at debug level on drop.
pub fn log_elapsed(label: impl Into<String>) -> ElapsedLog {
    ElapsedLog {
        label: label.into(),
        started: Instant::now(),
    }
}

impl ElapsedLog {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for ElapsedLog {
    fn drop(&mut self) {
        log::debug!("{} took {:?}", self.label, self.started.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_elapsed_label() {
        let timer = log_elapsed(format!("wait for {}", "ins-1"));
        assert_eq!(timer.label(), "wait for ins-1");
    }
}

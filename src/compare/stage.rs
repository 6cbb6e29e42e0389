use std::fmt;

use crate::types::StageDegradation;

/// What a stage failure does to the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Abort the whole comparison.
    Fatal,
    /// Substitute the stage's neutral result and continue.
    Degrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Capture,
    VisualDiff,
    Overlay,
}

impl Stage {
    pub const fn policy(self) -> StagePolicy {
        match self {
            Stage::Capture => StagePolicy::Fatal,
            Stage::VisualDiff | Stage::Overlay => StagePolicy::Degrade,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Stage::Capture => "capture",
            Stage::VisualDiff => "visual_diff",
            Stage::Overlay => "overlay",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a degradable stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    Degraded { fallback: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, .. } => fallback,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StageOutcome::Degraded { .. })
    }

    /// Unwraps the value, recording a degradation for `stage` if there was one.
    pub fn record(self, stage: Stage, log: &mut Vec<StageDegradation>) -> T {
        match self {
            StageOutcome::Completed(value) => value,
            StageOutcome::Degraded { fallback, reason } => {
                tracing::warn!(stage = %stage, %reason, "stage degraded");
                log.push(StageDegradation {
                    stage: stage.name().to_string(),
                    reason,
                });
                fallback
            }
        }
    }
}

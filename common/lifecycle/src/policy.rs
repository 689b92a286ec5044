//! Shutdown checkpoint schedule applied by the escalator.

use std::time::Duration;

use crate::error::PolicyError;

/// Severity of a shutdown checkpoint notice. Ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NoticeLevel {
    Info,
    Warn,
}

/// A point on the shutdown timeline, measured from the moment shutdown begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    pub after: Duration,
    pub level: NoticeLevel,
}

/// Escalating notices followed by a hard forced-stop deadline.
///
/// The default schedule gives the close operation a 2s head start, logs that it
/// is waiting at 2s, warns at 12s, and forces the stop at 30s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownPolicy {
    checkpoints: Vec<Checkpoint>,
    deadline: Duration,
}

impl ShutdownPolicy {
    pub const DEFAULT_NOTICE: Duration = Duration::from_secs(2);
    pub const DEFAULT_ESCALATE: Duration = Duration::from_secs(12);
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

    /// A policy with only a forced-stop deadline and no intermediate notices.
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            checkpoints: Vec::new(),
            deadline,
        }
    }

    /// Append a checkpoint. Call [`validate`](ShutdownPolicy::validate) once the
    /// schedule is complete.
    pub fn checkpoint<D>(mut self, after: D, level: NoticeLevel) -> Self
    where
        D: Into<Duration>,
    {
        self.checkpoints.push(Checkpoint {
            after: after.into(),
            level,
        });
        self
    }

    /// Standard notice/escalate/deadline schedule with custom timings.
    pub fn escalating(notice: Duration, escalate: Duration, deadline: Duration) -> Self {
        Self::with_deadline(deadline)
            .checkpoint(notice, NoticeLevel::Info)
            .checkpoint(escalate, NoticeLevel::Warn)
    }

    pub fn validate(self) -> Result<Self, PolicyError> {
        if self.deadline.is_zero() {
            return Err(PolicyError::ZeroDeadline);
        }
        let mut previous: Option<&Checkpoint> = None;
        for cp in &self.checkpoints {
            if let Some(prev) = previous {
                if cp.after <= prev.after {
                    return Err(PolicyError::NotIncreasing {
                        previous: prev.after,
                        after: cp.after,
                    });
                }
                if cp.level < prev.level {
                    return Err(PolicyError::SeverityDecreases { after: cp.after });
                }
            }
            if cp.after >= self.deadline {
                return Err(PolicyError::PastDeadline {
                    after: cp.after,
                    deadline: self.deadline,
                });
            }
            previous = Some(cp);
        }
        Ok(self)
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self::escalating(
            Self::DEFAULT_NOTICE,
            Self::DEFAULT_ESCALATE,
            Self::DEFAULT_DEADLINE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_valid() {
        let policy = ShutdownPolicy::default().validate().unwrap();
        assert_eq!(policy.deadline(), Duration::from_secs(30));
        assert_eq!(
            policy.checkpoints(),
            &[
                Checkpoint {
                    after: Duration::from_secs(2),
                    level: NoticeLevel::Info
                },
                Checkpoint {
                    after: Duration::from_secs(12),
                    level: NoticeLevel::Warn
                },
            ]
        );
    }

    #[test]
    fn short_legacy_schedule_is_valid() {
        let policy = ShutdownPolicy::with_deadline(Duration::from_secs(10)).validate();
        assert!(policy.is_ok());
    }

    #[test]
    fn rejects_zero_deadline() {
        assert_eq!(
            ShutdownPolicy::with_deadline(Duration::ZERO).validate(),
            Err(PolicyError::ZeroDeadline)
        );
    }

    #[test]
    fn rejects_checkpoint_at_or_past_deadline() {
        let policy = ShutdownPolicy::with_deadline(Duration::from_secs(5))
            .checkpoint(Duration::from_secs(5), NoticeLevel::Warn);
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::PastDeadline { .. })
        ));
    }

    #[test]
    fn rejects_unordered_checkpoints() {
        let policy = ShutdownPolicy::escalating(
            Duration::from_secs(12),
            Duration::from_secs(2),
            Duration::from_secs(30),
        );
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::NotIncreasing { .. })
        ));
    }

    #[test]
    fn rejects_decreasing_severity() {
        let policy = ShutdownPolicy::with_deadline(Duration::from_secs(30))
            .checkpoint(Duration::from_secs(2), NoticeLevel::Warn)
            .checkpoint(Duration::from_secs(12), NoticeLevel::Info);
        assert_eq!(
            policy.validate(),
            Err(PolicyError::SeverityDecreases {
                after: Duration::from_secs(12)
            })
        );
    }
}

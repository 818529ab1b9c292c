use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, Issuer};

/// Refresh state of one issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Error,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(RunStatus::Idle),
            "running" => Ok(RunStatus::Running),
            "error" => Ok(RunStatus::Error),
            other => Err(CoreError::InvalidRunStatus(other.to_string())),
        }
    }
}

/// Per-issuer status record describing the most recent refresh.
///
/// `total_count` and `last_scraped_at` only change on a successful run;
/// `error_message` is only set by a failed run and cleared when the next run
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub issuer: Issuer,
    pub status: RunStatus,
    pub total_count: i32,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Who triggered the most recent run.
    pub scraped_by_username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshStatus {
    /// The seeded state: idle, nothing scraped yet.
    #[must_use]
    pub fn seeded(issuer: Issuer) -> Self {
        Self {
            issuer,
            status: RunStatus::Idle,
            total_count: 0,
            last_scraped_at: None,
            error_message: None,
            scraped_by_username: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_parses_known_values() {
        assert_eq!("idle".parse::<RunStatus>().unwrap(), RunStatus::Idle);
        assert_eq!("running".parse::<RunStatus>().unwrap(), RunStatus::Running);
        assert_eq!("error".parse::<RunStatus>().unwrap(), RunStatus::Error);
    }

    #[test]
    fn run_status_rejects_unknown_value() {
        assert!(matches!(
            "queued".parse::<RunStatus>(),
            Err(CoreError::InvalidRunStatus(_))
        ));
    }

    #[test]
    fn seeded_status_is_idle_and_empty() {
        let status = RefreshStatus::seeded(Issuer::Ps1);
        assert_eq!(status.status, RunStatus::Idle);
        assert_eq!(status.total_count, 0);
        assert!(status.last_scraped_at.is_none());
        assert!(status.error_message.is_none());
    }
}

//! Derived container state

use chrono::{DateTime, Datelike, Utc};
use roletest_provider::StateInfo;

/// Container status derived from the daemon's state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    OomKilled,
    Dead,
    Paused,
    Running,
    Restarting,
    Stopped,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OomKilled => write!(f, "oom-killed"),
            Self::Dead => write!(f, "dead"),
            Self::Paused => write!(f, "paused"),
            Self::Running => write!(f, "running"),
            Self::Restarting => write!(f, "restarting"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl ContainerStatus {
    /// Resolve the daemon's independent flags to one status.
    ///
    /// Starts at `Stopped`; each set flag overrides the previous one in the
    /// order OOM-killed, running, paused, dead, restarting. The daemon keeps
    /// `Running` set while a container is paused or restarting, so those
    /// flags must win over it.
    pub fn from_flags(flags: &StateInfo) -> Self {
        let mut status = Self::Stopped;
        if flags.oom_killed {
            status = Self::OomKilled;
        }
        if flags.running {
            status = Self::Running;
        }
        if flags.paused {
            status = Self::Paused;
        }
        if flags.dead {
            status = Self::Dead;
        }
        if flags.restarting {
            status = Self::Restarting;
        }
        status
    }
}

/// Status plus process details of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub pid: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: i64,
    pub error: Option<String>,
}

impl From<&StateInfo> for ContainerState {
    fn from(info: &StateInfo) -> Self {
        Self {
            status: ContainerStatus::from_flags(info),
            pid: info.pid,
            started_at: parse_timestamp(info.started_at.as_deref()),
            finished_at: parse_timestamp(info.finished_at.as_deref()),
            exit_code: info.exit_code,
            error: info.error.clone(),
        }
    }
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

/// The daemon reports "never" as the zero time `0001-01-01T00:00:00Z`
fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| dt.year() > 1)
}

//! Target availability status and the status transition engine.
//!
//! Pure logic, no I/O. The scheduler feeds every probe outcome through
//! [`transition`] to decide the new persisted status and whether the
//! owner must be alerted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::probe::ProbeOutcome;

/// Status ID type matching SMALLINT in the `target_statuses` lookup table.
pub type StatusId = i16;

// ---------------------------------------------------------------------------
// TargetStatus
// ---------------------------------------------------------------------------

/// Availability status of a monitored target.
///
/// Discriminants match the seed order of the `target_statuses` table.
#[repr(i16)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Up = 1,
    Down = 2,
    #[default]
    Unknown = 3,
}

impl TargetStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Resolve a database status ID.
    pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Up),
            2 => Ok(Self::Down),
            3 => Ok(Self::Unknown),
            other => Err(CoreError::Validation(format!(
                "Unknown target status id {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "unknown" => Ok(Self::Unknown),
            other => Err(CoreError::Validation(format!(
                "Unknown target status '{other}'"
            ))),
        }
    }
}

impl From<TargetStatus> for StatusId {
    fn from(value: TargetStatus) -> Self {
        value as StatusId
    }
}

// ---------------------------------------------------------------------------
// Transition engine
// ---------------------------------------------------------------------------

/// Result of applying one probe outcome to a target's recorded status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub new_status: TargetStatus,
    pub alert_required: bool,
}

impl Transition {
    /// Whether the recorded status changes.
    pub fn is_change_from(&self, current: TargetStatus) -> bool {
        self.new_status != current
    }
}

/// Map the current status and a probe outcome to the new status.
///
/// The latest probe always wins; no smoothing is applied. An alert is
/// required only when entering `down` from any other status, so repeated
/// `down` results never re-alert and recoveries never alert.
pub fn transition(current: TargetStatus, outcome: &ProbeOutcome) -> Transition {
    let new_status = outcome.status;
    Transition {
        new_status,
        alert_required: new_status == TargetStatus::Down && current != TargetStatus::Down,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

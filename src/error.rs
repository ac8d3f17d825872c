//! Error types for the token allocation engine.
//!
//! `ModelError` covers construction-time validation of doctors and slots.
//! `EngineError` is the taxonomy callers of the engine branch on.

use chrono::{DateTime, Local, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("slot capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("slot end {end} must be after start {start}")]
    InvalidTimeRange {
        start: DateTime<Local>,
        end: DateTime<Local>,
    },

    #[error("slot '{0}' already exists for this doctor")]
    DuplicateSlot(String),

    #[error("slot '{slot_id}' overlaps with existing slot '{existing}'")]
    OverlappingSlot { slot_id: String, existing: String },

    #[error("slot '{slot_id}' belongs to doctor '{owner}', not '{doctor_id}'")]
    SlotOwnerMismatch {
        slot_id: String,
        owner: String,
        doctor_id: String,
    },

    #[error("hour {0} is out of range")]
    InvalidHour(u32),

    #[error("{0} does not exist in the local timezone")]
    InvalidLocalTime(NaiveDateTime),

    #[error("slot length must be positive, got {0} minutes")]
    InvalidSlotLength(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("doctor not found: {0}")]
    DoctorNotFound(String),

    #[error("slot not found: {slot_id} (doctor {doctor_id})")]
    SlotNotFound { doctor_id: String, slot_id: String },

    #[error("token not found: {0}")]
    TokenNotFound(String),

    /// Only produced when waitlisting is disabled.
    #[error("slot {slot_id} is full and no lower priority token found to preempt")]
    SlotFull { doctor_id: String, slot_id: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::DoctorNotFound(_)
                | EngineError::SlotNotFound { .. }
                | EngineError::TokenNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_kinds() {
        assert!(EngineError::DoctorNotFound("doc9".into()).is_not_found());
        assert!(EngineError::TokenNotFound("t".into()).is_not_found());
        assert!(!EngineError::SlotFull {
            doctor_id: "doc1".into(),
            slot_id: "doc1_slot1".into(),
        }
        .is_not_found());
        assert!(!EngineError::InvalidRequest("x".into()).is_not_found());
    }

    #[test]
    fn messages() {
        insta::assert_snapshot!(
            EngineError::DoctorNotFound("doc9".into()).to_string(),
            @"doctor not found: doc9"
        );
        insta::assert_snapshot!(
            EngineError::SlotNotFound {
                doctor_id: "doc1".into(),
                slot_id: "doc1_slot7".into(),
            }
            .to_string(),
            @"slot not found: doc1_slot7 (doctor doc1)"
        );
        insta::assert_snapshot!(
            EngineError::from(ModelError::InvalidCapacity(0)).to_string(),
            @"slot capacity must be positive, got 0"
        );
    }
}

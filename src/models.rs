//! Data models for the token allocation engine.
//!
//! This module defines the core data structures used throughout the system:
//! - PatientType: requester class and its priority policy
//! - Token: a request's admission record
//! - Slot: fixed-capacity time window holding admitted tokens
//! - Doctor: a doctor and their ordered slots

use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ModelError;

/// Requester class.
///
/// Higher priority values win admission. Tags that are not recognized are
/// kept verbatim and rank below every known class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatientType {
    Emergency,
    PaidPriority,
    FollowUp,
    OnlineBooking,
    Unrecognized(String),
}

impl PatientType {
    /// Parse a wire tag. Never fails; unknown tags become `Unrecognized`.
    pub fn from_tag(value: &str) -> Self {
        match value.trim().to_uppercase().as_str() {
            "EMERGENCY" => PatientType::Emergency,
            "PAID_PRIORITY" => PatientType::PaidPriority,
            "FOLLOW_UP" => PatientType::FollowUp,
            "ONLINE_BOOKING" => PatientType::OnlineBooking,
            _ => PatientType::Unrecognized(value.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PatientType::Emergency => "EMERGENCY",
            PatientType::PaidPriority => "PAID_PRIORITY",
            PatientType::FollowUp => "FOLLOW_UP",
            PatientType::OnlineBooking => "ONLINE_BOOKING",
            PatientType::Unrecognized(tag) => tag,
        }
    }

    /// Integer priority, higher is more important.
    pub fn priority(&self) -> u32 {
        match self {
            PatientType::Emergency => 100,
            PatientType::PaidPriority => 80,
            PatientType::FollowUp => 60,
            PatientType::OnlineBooking => 40,
            PatientType::Unrecognized(_) => 0,
        }
    }

    pub fn all() -> [PatientType; 4] {
        [
            PatientType::Emergency,
            PatientType::PaidPriority,
            PatientType::FollowUp,
            PatientType::OnlineBooking,
        ]
    }
}

impl From<String> for PatientType {
    fn from(value: String) -> Self {
        PatientType::from_tag(&value)
    }
}

impl From<PatientType> for String {
    fn from(value: PatientType) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for PatientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    Booked,
    Waiting,
    Cancelled,
}

impl TokenStatus {
    pub fn name(&self) -> &str {
        match self {
            TokenStatus::Booked => "BOOKED",
            TokenStatus::Waiting => "WAITING",
            TokenStatus::Cancelled => "CANCELLED",
        }
    }
}

/// A booking or waiting record for one patient in one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub patient_name: String,
    #[serde(rename = "type")]
    pub patient_type: PatientType,
    pub created_at: DateTime<Local>,
    /// Engine-wide arrival counter, breaks ties between equal timestamps.
    pub sequence: u64,
    pub slot_id: String,
    pub doctor_id: String,
    pub status: TokenStatus,
}

impl Token {
    pub(crate) fn new(
        id: String,
        patient_name: String,
        patient_type: PatientType,
        created_at: DateTime<Local>,
        sequence: u64,
        slot_id: String,
        doctor_id: String,
    ) -> Self {
        Token {
            id,
            patient_name,
            patient_type,
            created_at,
            sequence,
            slot_id,
            doctor_id,
            status: TokenStatus::Booked,
        }
    }

    pub fn priority(&self) -> u32 {
        self.patient_type.priority()
    }

    /// Arrival order key. Later arrivals compare greater.
    pub fn arrival(&self) -> (DateTime<Local>, u64) {
        (self.created_at, self.sequence)
    }

    pub fn is_booked(&self) -> bool {
        self.status == TokenStatus::Booked
    }
}

/// A time window of one doctor with a fixed number of admissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub id: String,
    doctor_id: String,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    capacity: usize,
    tokens: Vec<Token>,
}

impl Slot {
    /// Create a new slot with validation.
    pub fn new(
        id: impl Into<String>,
        doctor_id: impl Into<String>,
        start_time: DateTime<Local>,
        end_time: DateTime<Local>,
        capacity: usize,
    ) -> Result<Self, ModelError> {
        let id = id.into();
        let doctor_id = doctor_id.into();
        if id.is_empty() {
            return Err(ModelError::EmptyField("slot id"));
        }
        if doctor_id.is_empty() {
            return Err(ModelError::EmptyField("doctor id"));
        }
        if end_time <= start_time {
            return Err(ModelError::InvalidTimeRange {
                start: start_time,
                end: end_time,
            });
        }
        if capacity == 0 {
            return Err(ModelError::InvalidCapacity(capacity));
        }

        Ok(Slot {
            id,
            doctor_id,
            start_time,
            end_time,
            capacity,
            tokens: Vec::with_capacity(capacity),
        })
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently admitted tokens in admission order.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn booked_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_full(&self) -> bool {
        self.tokens.len() >= self.capacity
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn overlaps_with(&self, other: &Slot) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }

    pub fn contains_token(&self, token_id: &str) -> bool {
        self.tokens.iter().any(|t| t.id == token_id)
    }

    /// Admit a token, handing it back if the slot is already full.
    pub(crate) fn admit(&mut self, mut token: Token) -> Result<(), Token> {
        if self.is_full() {
            return Err(token);
        }
        token.status = TokenStatus::Booked;
        self.tokens.push(token);
        Ok(())
    }

    /// Keep only the admitted tokens matching `keep`, in admission order.
    pub(crate) fn retain_tokens(&mut self, keep: impl FnMut(&Token) -> bool) {
        self.tokens.retain(keep);
    }

    pub(crate) fn remove(&mut self, token_id: &str) -> Option<Token> {
        let index = self.tokens.iter().position(|t| t.id == token_id)?;
        Some(self.tokens.remove(index))
    }

    /// Admit `token` into a full slot by evicting the preemption candidate.
    ///
    /// Succeeds only when the slot is at capacity and the incoming priority is
    /// strictly greater than the candidate's. Returns the evicted token, or
    /// hands the incoming token back untouched.
    pub(crate) fn preempt(&mut self, mut token: Token) -> Result<Token, Token> {
        if !self.is_full() {
            return Err(token);
        }
        let victim_id = match self.preemption_candidate() {
            Some(candidate) if token.priority() > candidate.priority() => candidate.id.clone(),
            _ => return Err(token),
        };
        let Some(victim) = self.remove(&victim_id) else {
            return Err(token);
        };
        token.status = TokenStatus::Booked;
        self.tokens.push(token);
        Ok(victim)
    }

    /// The admitted token that would be bumped by a higher priority request:
    /// lowest priority, and among equals the most recent arrival.
    pub fn preemption_candidate(&self) -> Option<&Token> {
        self.tokens.iter().min_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| b.arrival().cmp(&a.arrival()))
        })
    }
}

/// A doctor and their slots, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doctor {
    id: String,
    pub name: String,
    slots: Vec<Slot>,
}

impl Doctor {
    /// Create a doctor with no slots.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        let name = name.into();
        if id.is_empty() {
            return Err(ModelError::EmptyField("doctor id"));
        }
        if name.is_empty() {
            return Err(ModelError::EmptyField("doctor name"));
        }

        Ok(Doctor {
            id,
            name,
            slots: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot] {
        &mut self.slots
    }

    pub fn slot(&self, slot_id: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == slot_id)
    }

    pub(crate) fn slot_mut(&mut self, slot_id: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id == slot_id)
    }

    /// Append a slot, rejecting duplicates, overlaps and foreign slots.
    pub fn add_slot(&mut self, slot: Slot) -> Result<(), ModelError> {
        if slot.doctor_id != self.id {
            return Err(ModelError::SlotOwnerMismatch {
                slot_id: slot.id,
                owner: slot.doctor_id,
                doctor_id: self.id.clone(),
            });
        }
        for existing in &self.slots {
            if existing.id == slot.id {
                return Err(ModelError::DuplicateSlot(slot.id));
            }
            if slot.overlaps_with(existing) {
                return Err(ModelError::OverlappingSlot {
                    slot_id: slot.id,
                    existing: existing.id.clone(),
                });
            }
        }
        self.slots.push(slot);
        Ok(())
    }

    pub fn with_slot(mut self, slot: Slot) -> Result<Self, ModelError> {
        self.add_slot(slot)?;
        Ok(self)
    }

    pub fn booked_count(&self) -> usize {
        self.slots.iter().map(Slot::booked_count).sum()
    }
}

impl fmt::Display for Doctor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Doctor({}, slots={}, booked={})",
            self.name,
            self.slots.len(),
            self.booked_count()
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn at(hour: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 2, hour, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    pub(crate) fn token(id: &str, patient_type: PatientType, sequence: u64) -> Token {
        Token::new(
            id.to_string(),
            format!("patient-{id}"),
            patient_type,
            at(8),
            sequence,
            "s1".to_string(),
            "d1".to_string(),
        )
    }

    #[test]
    fn priority_policy_is_ordered() {
        assert_eq!(PatientType::Emergency.priority(), 100);
        assert_eq!(PatientType::PaidPriority.priority(), 80);
        assert_eq!(PatientType::FollowUp.priority(), 60);
        assert_eq!(PatientType::OnlineBooking.priority(), 40);
        assert_eq!(PatientType::from_tag("WALK_IN").priority(), 0);
    }

    #[test]
    fn patient_type_tags() {
        assert_eq!(PatientType::from_tag("paid_priority"), PatientType::PaidPriority);
        assert_eq!(PatientType::from_tag(" FOLLOW_UP "), PatientType::FollowUp);
        assert_eq!(
            PatientType::from_tag("VIP"),
            PatientType::Unrecognized("VIP".to_string())
        );
        assert_eq!(PatientType::from_tag("VIP").name(), "VIP");
    }

    #[test]
    fn patient_type_serde() {
        let json = serde_json::to_string(&PatientType::OnlineBooking).unwrap();
        assert_eq!(json, r#""ONLINE_BOOKING""#);

        let parsed: PatientType = serde_json::from_str(r#""EMERGENCY""#).unwrap();
        assert_eq!(parsed, PatientType::Emergency);

        let unknown: PatientType = serde_json::from_str(r#""SOMETHING""#).unwrap();
        assert_eq!(unknown.priority(), 0);
    }

    #[test]
    fn token_serializes_class_as_type() {
        let json = serde_json::to_value(token("a", PatientType::FollowUp, 1)).unwrap();
        assert_eq!(json["type"], "FOLLOW_UP");
        assert!(json.get("patient_type").is_none());

        let back: Token = serde_json::from_value(json).unwrap();
        assert_eq!(back.patient_type, PatientType::FollowUp);
    }

    #[test]
    fn token_status_serializes_uppercase() {
        let json = serde_json::to_string(&TokenStatus::Waiting).unwrap();
        assert_eq!(json, r#""WAITING""#);
    }

    #[test]
    fn slot_validation() {
        assert_eq!(
            Slot::new("s1", "d1", at(9), at(10), 0),
            Err(ModelError::InvalidCapacity(0))
        );
        assert!(matches!(
            Slot::new("s1", "d1", at(10), at(9), 3),
            Err(ModelError::InvalidTimeRange { .. })
        ));
        assert_eq!(
            Slot::new("", "d1", at(9), at(10), 3),
            Err(ModelError::EmptyField("slot id"))
        );

        let slot = Slot::new("s1", "d1", at(9), at(10), 3).unwrap();
        assert_eq!(slot.duration_minutes(), 60);
        assert_eq!(slot.doctor_id(), "d1");
        assert!(!slot.is_full());
    }

    #[test]
    fn admit_respects_capacity() {
        let mut slot = Slot::new("s1", "d1", at(9), at(10), 2).unwrap();
        assert!(slot.admit(token("a", PatientType::OnlineBooking, 1)).is_ok());
        assert!(slot.admit(token("b", PatientType::OnlineBooking, 2)).is_ok());

        let rejected = slot
            .admit(token("c", PatientType::Emergency, 3))
            .unwrap_err();
        assert_eq!(rejected.id, "c");
        assert_eq!(slot.booked_count(), 2);
        assert!(slot.is_full());

        assert_eq!(slot.remove("a").map(|t| t.id), Some("a".to_string()));
        assert!(slot.remove("a").is_none());
        assert!(!slot.is_full());
    }

    #[test]
    fn preemption_candidate_prefers_lowest_then_latest() {
        let mut slot = Slot::new("s1", "d1", at(9), at(10), 4).unwrap();
        slot.admit(token("follow", PatientType::FollowUp, 1)).unwrap();
        slot.admit(token("online-early", PatientType::OnlineBooking, 2))
            .unwrap();
        slot.admit(token("online-late", PatientType::OnlineBooking, 3))
            .unwrap();
        slot.admit(token("emergency", PatientType::Emergency, 4))
            .unwrap();

        let candidate = slot.preemption_candidate().unwrap();
        assert_eq!(candidate.id, "online-late");
    }

    #[test]
    fn preempt_requires_full_slot_and_strictly_higher_priority() {
        let mut slot = Slot::new("s1", "d1", at(9), at(10), 2).unwrap();
        slot.admit(token("a", PatientType::OnlineBooking, 1)).unwrap();

        let back = slot.preempt(token("e", PatientType::Emergency, 2)).unwrap_err();
        assert_eq!(back.id, "e");

        slot.admit(token("b", PatientType::OnlineBooking, 3)).unwrap();
        let back = slot
            .preempt(token("c", PatientType::OnlineBooking, 4))
            .unwrap_err();
        assert_eq!(back.id, "c");

        let victim = slot.preempt(token("e", PatientType::Emergency, 5)).unwrap();
        assert_eq!(victim.id, "b");
        let ids: Vec<&str> = slot.tokens().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "e"]);
    }

    #[test]
    fn preemption_candidate_uses_timestamp_before_sequence() {
        let mut slot = Slot::new("s1", "d1", at(9), at(10), 2).unwrap();
        let mut later = token("later", PatientType::OnlineBooking, 1);
        later.created_at = at(9);
        slot.admit(later).unwrap();
        slot.admit(token("earlier", PatientType::OnlineBooking, 2))
            .unwrap();

        assert_eq!(slot.preemption_candidate().unwrap().id, "later");
    }

    #[test]
    fn doctor_rejects_bad_slots() {
        let mut doctor = Doctor::new("d1", "Dr. A").unwrap();
        doctor
            .add_slot(Slot::new("s1", "d1", at(9), at(10), 3).unwrap())
            .unwrap();

        assert_eq!(
            doctor.add_slot(Slot::new("s1", "d1", at(11), at(12), 3).unwrap()),
            Err(ModelError::DuplicateSlot("s1".to_string()))
        );
        assert!(matches!(
            doctor.add_slot(Slot::new("s2", "d1", at(9), at(11), 3).unwrap()),
            Err(ModelError::OverlappingSlot { .. })
        ));
        assert!(matches!(
            doctor.add_slot(Slot::new("s3", "d2", at(11), at(12), 3).unwrap()),
            Err(ModelError::SlotOwnerMismatch { .. })
        ));

        doctor
            .add_slot(Slot::new("s2", "d1", at(10), at(11), 3).unwrap())
            .unwrap();
        let ids: Vec<&str> = doctor.slots().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(doctor.id(), "d1");
        assert_eq!(doctor.to_string(), "Doctor(Dr. A, slots=2, booked=0)");
    }
}

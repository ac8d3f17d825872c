//! Allocation engine with priority preemption and waitlist promotion.
//!
//! All state lives behind one `RwLock`. Booking, cancellation and doctor
//! registration take it exclusively and run to completion, so no caller can
//! observe a half-applied preemption. Schedule reads share it.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{Doctor, PatientType, Slot, Token, TokenStatus};
use crate::waitlist::{SlotKey, WaitingPool};

/// Source of token creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Outcome of a successful cancellation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cancellation {
    pub token: Token,
    /// Waiting token moved into the freed capacity, if any.
    pub promoted: Option<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub doctors: usize,
    pub slots: usize,
    pub booked: usize,
    pub waiting: usize,
}

#[derive(Default)]
struct EngineState {
    doctors: HashMap<String, Doctor>,
    /// Booked token id -> owning slot. Mirrors the slots' own token lists.
    token_index: HashMap<String, SlotKey>,
    waitlist: WaitingPool,
    last_sequence: u64,
}

pub struct AllocationEngine {
    state: RwLock<EngineState>,
    clock: Box<dyn Clock>,
    config: EngineConfig,
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl AllocationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: EngineConfig, clock: impl Clock + 'static) -> Self {
        AllocationEngine {
            state: RwLock::new(EngineState::default()),
            clock: Box::new(clock),
            config,
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Insert or replace a doctor.
    ///
    /// Replacing a doctor drops the index and waitlist entries of the old
    /// record. Booked tokens carried by the new record's slots are indexed.
    /// A carried token is discarded when it names another doctor or slot,
    /// or when its id is already booked or waiting anywhere in the engine.
    pub fn add_doctor(&self, mut doctor: Doctor) {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let doctor_id = doctor.id().to_string();

        if state.doctors.remove(&doctor_id).is_some() {
            state.token_index.retain(|_, key| key.doctor_id != doctor_id);
            let dropped = state.waitlist.drop_doctor(&doctor_id);
            info!(doctor = %doctor_id, dropped_waiting = dropped, "Replacing doctor");
        }

        let token_index = &mut state.token_index;
        let waitlist = &state.waitlist;
        let last_sequence = &mut state.last_sequence;
        for slot in doctor.slots_mut() {
            let key = SlotKey::new(&doctor_id, &slot.id);
            slot.retain_tokens(|token| {
                let owned = token.doctor_id == key.doctor_id && token.slot_id == key.slot_id;
                if !owned || token_index.contains_key(&token.id) || waitlist.contains(&token.id) {
                    warn!(
                        token = %token.id,
                        doctor = %key.doctor_id,
                        slot = %key.slot_id,
                        "Discarding carried token that is foreign or already tracked"
                    );
                    return false;
                }
                token_index.insert(token.id.clone(), key.clone());
                *last_sequence = (*last_sequence).max(token.sequence);
                true
            });
        }

        info!(doctor = %doctor_id, name = %doctor.name, slots = doctor.slots().len(), "Doctor registered");
        state.doctors.insert(doctor_id, doctor);
    }

    /// Book a token for a patient.
    ///
    /// The returned token is `Booked` when admitted (directly or by
    /// preempting a lower priority occupant) and `Waiting` when queued.
    pub fn book_token(
        &self,
        doctor_id: &str,
        slot_id: &str,
        patient_name: &str,
        patient_type: PatientType,
    ) -> Result<Token> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let slot = resolve_slot_mut(&mut state.doctors, doctor_id, slot_id)?;

        state.last_sequence += 1;
        let token = Token::new(
            Uuid::new_v4().to_string(),
            patient_name.to_string(),
            patient_type,
            self.clock.now(),
            state.last_sequence,
            slot_id.to_string(),
            doctor_id.to_string(),
        );
        let key = SlotKey::new(doctor_id, slot_id);
        let receipt = token.clone();

        let token = match slot.admit(token) {
            Ok(()) => {
                state.token_index.insert(receipt.id.clone(), key);
                info!(
                    token = %receipt.id,
                    doctor = doctor_id,
                    slot = slot_id,
                    patient_type = %receipt.patient_type,
                    "Token booked"
                );
                return Ok(receipt);
            }
            Err(token) => token,
        };

        match slot.preempt(token) {
            Ok(mut victim) => {
                state.token_index.remove(&victim.id);
                state.token_index.insert(receipt.id.clone(), key);
                info!(
                    token = %receipt.id,
                    patient_type = %receipt.patient_type,
                    bumped = %victim.id,
                    bumped_type = %victim.patient_type,
                    slot = slot_id,
                    "Preempted lower priority token"
                );
                if self.config.waitlist_enabled {
                    state.waitlist.enqueue(victim);
                } else {
                    victim.status = TokenStatus::Cancelled;
                    info!(
                        token = %victim.id,
                        status = victim.status.name(),
                        "Bumped token dropped, waitlist disabled"
                    );
                }
                Ok(receipt)
            }
            Err(mut token) => {
                if !self.config.waitlist_enabled {
                    warn!(doctor = doctor_id, slot = slot_id, patient_type = %token.patient_type, "Slot full, booking rejected");
                    return Err(EngineError::SlotFull {
                        doctor_id: doctor_id.to_string(),
                        slot_id: slot_id.to_string(),
                    });
                }
                token.status = TokenStatus::Waiting;
                info!(
                    token = %token.id,
                    patient_type = %token.patient_type,
                    slot = slot_id,
                    "Slot full, token waitlisted"
                );
                let receipt = token.clone();
                state.waitlist.enqueue(token);
                Ok(receipt)
            }
        }
    }

    /// Cancel a booked or waiting token.
    ///
    /// Cancelling a booked token promotes the best waiting token of the same
    /// slot into the freed capacity.
    pub fn cancel_token(&self, token_id: &str) -> Result<Cancellation> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(key) = state.token_index.get(token_id).cloned() {
            let slot = state
                .doctors
                .get_mut(&key.doctor_id)
                .and_then(|d| d.slot_mut(&key.slot_id))
                .ok_or_else(|| EngineError::TokenNotFound(token_id.to_string()))?;
            let mut token = slot
                .remove(token_id)
                .ok_or_else(|| EngineError::TokenNotFound(token_id.to_string()))?;

            state.token_index.remove(token_id);
            token.status = TokenStatus::Cancelled;
            info!(token = token_id, slot = %key.slot_id, "Token cancelled");

            let promoted = promote(slot, &key, &mut state.waitlist, &mut state.token_index);
            return Ok(Cancellation { token, promoted });
        }

        if let Some(mut token) = state.waitlist.remove(token_id) {
            token.status = TokenStatus::Cancelled;
            info!(token = token_id, slot = %token.slot_id, "Waiting token cancelled");
            return Ok(Cancellation {
                token,
                promoted: None,
            });
        }

        warn!(token = token_id, "Cancel for unknown token");
        Err(EngineError::TokenNotFound(token_id.to_string()))
    }

    /// Point-in-time copy of a doctor's slots and admitted tokens.
    pub fn get_doctor_schedule(&self, doctor_id: &str) -> Result<Doctor> {
        let state = self.state.read();
        debug!(doctor = doctor_id, "Schedule requested");
        state
            .doctors
            .get(doctor_id)
            .cloned()
            .ok_or_else(|| EngineError::DoctorNotFound(doctor_id.to_string()))
    }

    /// Waiting tokens of a slot in promotion order.
    pub fn get_waitlist(&self, doctor_id: &str, slot_id: &str) -> Result<Vec<Token>> {
        let state = self.state.read();
        let doctor = state
            .doctors
            .get(doctor_id)
            .ok_or_else(|| EngineError::DoctorNotFound(doctor_id.to_string()))?;
        if doctor.slot(slot_id).is_none() {
            return Err(EngineError::SlotNotFound {
                doctor_id: doctor_id.to_string(),
                slot_id: slot_id.to_string(),
            });
        }
        Ok(state.waitlist.ranked(&SlotKey::new(doctor_id, slot_id)))
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.state.read();
        EngineStats {
            doctors: state.doctors.len(),
            slots: state.doctors.values().map(|d| d.slots().len()).sum(),
            booked: state.token_index.len(),
            waiting: state.waitlist.len(),
        }
    }
}

fn resolve_slot_mut<'a>(
    doctors: &'a mut HashMap<String, Doctor>,
    doctor_id: &str,
    slot_id: &str,
) -> Result<&'a mut Slot> {
    let doctor = doctors
        .get_mut(doctor_id)
        .ok_or_else(|| EngineError::DoctorNotFound(doctor_id.to_string()))?;
    doctor
        .slot_mut(slot_id)
        .ok_or_else(|| EngineError::SlotNotFound {
            doctor_id: doctor_id.to_string(),
            slot_id: slot_id.to_string(),
        })
}

/// Move the best waiting token of `key` into `slot` if it has room.
fn promote(
    slot: &mut Slot,
    key: &SlotKey,
    waitlist: &mut WaitingPool,
    token_index: &mut HashMap<String, SlotKey>,
) -> Option<Token> {
    if slot.is_full() {
        return None;
    }
    let mut winner = waitlist.take_next(key)?;
    winner.status = TokenStatus::Booked;
    let receipt = winner.clone();

    match slot.admit(winner) {
        Ok(()) => {
            token_index.insert(receipt.id.clone(), key.clone());
            info!(
                token = %receipt.id,
                patient_type = %receipt.patient_type,
                slot = %key.slot_id,
                "Promoted from waitlist"
            );
            Some(receipt)
        }
        Err(winner) => {
            waitlist.enqueue(winner);
            None
        }
    }
}

//! In-process load simulation.
//!
//! Drives the engine through a morning rush, a saturated slot, an emergency
//! arrival and a cancellation, collecting what happened along the way.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::engine::{AllocationEngine, Cancellation};
use crate::error::{EngineError, Result};
use crate::models::{Doctor, PatientType, Token};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub doctors: Vec<String>,
    /// Concurrent bookings fired in the first phase.
    pub burst_size: usize,
    pub filler_count: usize,
    pub target_doctor: String,
    pub target_slot: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            doctors: vec!["doc1".into(), "doc2".into(), "doc3".into()],
            burst_size: 20,
            filler_count: 4,
            target_doctor: "doc1".into(),
            target_slot: "doc1_slot1".into(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SimulationReport {
    pub booked: usize,
    pub waiting: usize,
    pub rejected: usize,
    pub emergency: Option<Token>,
    pub cancellation: Option<Cancellation>,
    pub schedule: Option<Doctor>,
}

impl SimulationReport {
    fn record(&mut self, outcome: &Result<Token>, captured: &mut Vec<Token>) {
        match outcome {
            Ok(token) if token.is_booked() => {
                self.booked += 1;
                captured.push(token.clone());
            }
            Ok(_) => self.waiting += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Slot each burst request targets: the first slot of its doctor.
fn burst_slot(doctor_id: &str) -> String {
    format!("{doctor_id}_slot1")
}

pub fn run(engine: &AllocationEngine, config: &SimulationConfig) -> Result<SimulationReport> {
    if config.doctors.is_empty() {
        return Err(EngineError::InvalidRequest(
            "simulation needs at least one doctor".to_string(),
        ));
    }

    let mut report = SimulationReport::default();
    let mut captured = Vec::new();

    info!(requests = config.burst_size, "Phase 1: morning rush");
    let outcomes = Mutex::new(Vec::with_capacity(config.burst_size));
    std::thread::scope(|scope| {
        for i in 0..config.burst_size {
            let outcomes = &outcomes;
            scope.spawn(move || {
                let doctor_id = &config.doctors[i % config.doctors.len()];
                let patient_type = PatientType::all()[(i / config.doctors.len()) % 4].clone();
                let outcome = engine.book_token(
                    doctor_id,
                    &burst_slot(doctor_id),
                    &format!("Patient-{i}"),
                    patient_type,
                );
                outcomes.lock().push(outcome);
            });
        }
    });
    for outcome in outcomes.into_inner() {
        report.record(&outcome, &mut captured);
    }

    info!(slot = %config.target_slot, fillers = config.filler_count, "Phase 2: filling slot");
    for i in 0..config.filler_count {
        let outcome = engine.book_token(
            &config.target_doctor,
            &config.target_slot,
            &format!("Filler-{i}"),
            PatientType::OnlineBooking,
        );
        report.record(&outcome, &mut captured);
    }

    info!("Phase 3: emergency arrives");
    let emergency = engine.book_token(
        &config.target_doctor,
        &config.target_slot,
        "Critical Patient",
        PatientType::Emergency,
    );
    report.record(&emergency, &mut captured);
    report.emergency = emergency.ok();

    info!("Phase 4: cancellation");
    let victim = captured
        .iter()
        .find(|t| t.slot_id == config.target_slot && t.doctor_id == config.target_doctor)
        .or_else(|| captured.first());
    match victim {
        Some(token) => match engine.cancel_token(&token.id) {
            Ok(cancellation) => report.cancellation = Some(cancellation),
            Err(e) => warn!(token = %token.id, error = %e, "Cancellation failed"),
        },
        None => warn!("No booked tokens captured to cancel"),
    }

    report.schedule = Some(engine.get_doctor_schedule(&config.target_doctor)?);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedConfig;
    use crate::models::TokenStatus;
    use crate::seed;
    use chrono::NaiveDate;

    fn seeded() -> AllocationEngine {
        let engine = AllocationEngine::default();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        seed::seed(&engine, &SeedConfig::default(), date).unwrap();
        engine
    }

    #[test]
    fn simulation_keeps_invariants() {
        let engine = seeded();
        let report = run(&engine, &SimulationConfig::default()).unwrap();

        assert_eq!(report.booked + report.waiting + report.rejected, 25);
        assert_eq!(report.rejected, 0);

        let emergency = report.emergency.unwrap();
        assert_eq!(emergency.status, TokenStatus::Booked);

        let cancellation = report.cancellation.unwrap();
        assert_eq!(cancellation.token.status, TokenStatus::Cancelled);

        let schedule = report.schedule.unwrap();
        for slot in schedule.slots() {
            assert!(slot.booked_count() <= slot.capacity());
            assert!(!slot.contains_token(&cancellation.token.id));
        }
        let waitlist = engine.get_waitlist("doc1", "doc1_slot1").unwrap();
        for token in &waitlist {
            assert!(schedule.slots().iter().all(|s| !s.contains_token(&token.id)));
        }
    }

    #[test]
    fn simulation_needs_doctors() {
        let engine = seeded();
        let config = SimulationConfig {
            doctors: Vec::new(),
            ..SimulationConfig::default()
        };
        assert!(matches!(
            run(&engine, &config),
            Err(EngineError::InvalidRequest(_))
        ));
    }
}

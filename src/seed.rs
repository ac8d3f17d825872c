//! Startup fixtures: doctors with generated daily slots.

use chrono::{DateTime, Duration, Local, NaiveDate};
use tracing::info;

use crate::config::SeedConfig;
use crate::engine::AllocationEngine;
use crate::error::{self, ModelError};
use crate::models::{Doctor, Slot};

fn local_at(date: NaiveDate, hour: u32) -> Result<DateTime<Local>, ModelError> {
    let naive = date
        .and_hms_opt(hour, 0, 0)
        .ok_or(ModelError::InvalidHour(hour))?;
    naive
        .and_local_timezone(Local)
        .earliest()
        .ok_or(ModelError::InvalidLocalTime(naive))
}

/// Generate consecutive slots for one doctor on one day.
///
/// Slots are numbered `<doctor>_slot1`, `<doctor>_slot2`, ... in time order.
/// Any slot touching the configured break window is skipped.
pub fn daily_slots(
    doctor_id: &str,
    date: NaiveDate,
    config: &SeedConfig,
) -> Result<Vec<Slot>, ModelError> {
    if config.slot_minutes <= 0 {
        return Err(ModelError::InvalidSlotLength(config.slot_minutes));
    }
    let step = Duration::minutes(config.slot_minutes);
    let mut current = local_at(date, config.day_start_hour)?;
    let end = local_at(date, config.day_end_hour)?;

    let mut slots = Vec::new();
    while current + step <= end {
        let slot_end = current + step;

        let in_break = match (config.break_start, config.break_end) {
            (Some(break_start), Some(break_end)) => {
                current.time() < break_end && slot_end.time() > break_start
            }
            _ => false,
        };

        if !in_break {
            let id = format!("{}_slot{}", doctor_id, slots.len() + 1);
            slots.push(Slot::new(
                id,
                doctor_id,
                current,
                slot_end,
                config.slot_capacity,
            )?);
        }

        current = slot_end;
    }

    Ok(slots)
}

pub fn build_doctors(config: &SeedConfig, date: NaiveDate) -> Result<Vec<Doctor>, ModelError> {
    config
        .doctors
        .iter()
        .map(|fixture| -> Result<Doctor, ModelError> {
            let mut doctor = Doctor::new(fixture.id.as_str(), fixture.name.as_str())?;
            for slot in daily_slots(&fixture.id, date, config)? {
                doctor.add_slot(slot)?;
            }
            Ok(doctor)
        })
        .collect()
}

/// Register the configured doctors for `date`. Returns the number of slots created.
pub fn seed(
    engine: &AllocationEngine,
    config: &SeedConfig,
    date: NaiveDate,
) -> error::Result<usize> {
    let doctors = build_doctors(config, date)?;
    let mut total_slots = 0;
    for doctor in doctors {
        total_slots += doctor.slots().len();
        engine.add_doctor(doctor);
    }
    info!(
        doctors = config.doctors.len(),
        slots = total_slots,
        date = %date,
        "Seeded fixtures"
    );
    Ok(total_slots)
}

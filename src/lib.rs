//! Priority-based OPD token allocation.
//!
//! Doctors expose fixed-capacity slots. Bookings are admitted while capacity
//! lasts, preempt strictly lower priority occupants when a slot is full, and
//! otherwise wait in the slot's waiting pool until a cancellation frees room.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod seed;
pub mod simulation;
pub mod waitlist;

pub use engine::{AllocationEngine, Cancellation, Clock, EngineStats, SystemClock};
pub use error::{EngineError, ModelError, Result};
pub use models::{Doctor, PatientType, Slot, Token, TokenStatus};

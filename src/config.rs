//! Runtime configuration and logging setup.

use chrono::NaiveTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// When false, a full slot that cannot be preempted rejects the booking
    /// with `SlotFull`, and preempted tokens are cancelled instead of queued.
    pub waitlist_enabled: bool,
}

impl EngineConfig {
    pub fn strict() -> Self {
        EngineConfig {
            waitlist_enabled: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            waitlist_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorFixture {
    pub id: String,
    pub name: String,
}

impl DoctorFixture {
    pub fn new(id: &str, name: &str) -> Self {
        DoctorFixture {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Doctors and slot layout created at startup.
#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub doctors: Vec<DoctorFixture>,
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub slot_minutes: i64,
    pub slot_capacity: usize,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            doctors: vec![
                DoctorFixture::new("doc1", "Dr. A (Cardiology)"),
                DoctorFixture::new("doc2", "Dr. B (Orthopedics)"),
                DoctorFixture::new("doc3", "Dr. C (General)"),
            ],
            day_start_hour: 9,
            day_end_hour: 11,
            slot_minutes: 60,
            slot_capacity: 3,
            break_start: None,
            break_end: None,
        }
    }
}

/// Initialize tracing with OPD_LOG and LOG_FORMAT support.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match std::env::var("OPD_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("opdtoken={level}"))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_fixture() {
        let seed = SeedConfig::default();
        let ids: Vec<&str> = seed.doctors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["doc1", "doc2", "doc3"]);
        assert_eq!(seed.slot_capacity, 3);

        assert!(EngineConfig::default().waitlist_enabled);
        assert!(!EngineConfig::strict().waitlist_enabled);
        assert_eq!(ServerConfig::default().addr(), "0.0.0.0:8080");
    }
}

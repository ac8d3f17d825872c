//! Command-line entry point for the OPD token engine.
//!
//! `serve` seeds the stock doctors and exposes the engine over HTTP.
//! `demo` runs the in-process simulation and prints the outcome.

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

use opdtoken::config::{self, EngineConfig, SeedConfig, ServerConfig};
use opdtoken::simulation::{self, SimulationConfig};
use opdtoken::{api, seed, AllocationEngine};

/// OPD token allocation engine
#[derive(Parser)]
#[command(name = "opdtoken", version)]
#[command(about = "Priority-based OPD token allocation with preemption and waitlists", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Queue non-preemptable bookings instead of rejecting them
    #[arg(long, global = true, env = "OPD_WAITLIST", default_value_t = true, action = ArgAction::Set)]
    waitlist: bool,

    /// Capacity of every seeded slot
    #[arg(long, global = true, env = "OPD_SLOT_CAPACITY", default_value_t = 3)]
    slot_capacity: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the engine over HTTP
    Serve {
        #[arg(long, env = "OPD_HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, env = "OPD_PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Run the in-process load simulation
    Demo {
        /// Concurrent bookings in the morning rush
        #[arg(long, default_value_t = 20)]
        burst: usize,
    },
}

fn build_engine(cli: &Cli) -> Result<Arc<AllocationEngine>> {
    let engine = Arc::new(AllocationEngine::new(EngineConfig {
        waitlist_enabled: cli.waitlist,
    }));
    let seed_config = SeedConfig {
        slot_capacity: cli.slot_capacity,
        ..SeedConfig::default()
    };
    seed::seed(&engine, &seed_config, Local::now().date_naive())?;
    Ok(engine)
}

fn print_report(report: &simulation::SimulationReport) -> Result<()> {
    println!("\n--- Simulation Results ---");
    println!("  Booked:   {}", report.booked);
    println!("  Waiting:  {}", report.waiting);
    println!("  Rejected: {}", report.rejected);

    if let Some(token) = &report.emergency {
        println!(
            "\nEmergency token {} -> {}",
            &token.id[..8],
            token.status.name()
        );
    }

    if let Some(cancellation) = &report.cancellation {
        println!(
            "Cancelled {} ({})",
            cancellation.token.patient_name, cancellation.token.patient_type
        );
        match &cancellation.promoted {
            Some(promoted) => println!(
                "Promoted {} ({}) from waitlist",
                promoted.patient_name, promoted.patient_type
            ),
            None => println!("Nobody waiting to promote"),
        }
    }

    if let Some(schedule) = &report.schedule {
        println!("\nFinal schedule for {}:", schedule.name);
        for slot in schedule.slots() {
            println!(
                "  {} {} - {} ({}/{})",
                slot.id,
                slot.start_time.format("%H:%M"),
                slot.end_time.format("%H:%M"),
                slot.booked_count(),
                slot.capacity()
            );
            for token in slot.tokens() {
                println!("    [{:14}] {}", token.patient_type.name(), token.patient_name);
            }
        }
        println!("\n{}", serde_json::to_string_pretty(schedule)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    config::init_tracing();

    let cli = Cli::parse();
    let engine = build_engine(&cli)?;

    match cli.command {
        Commands::Serve { host, port } => {
            info!(waitlist = cli.waitlist, "Engine ready");
            api::serve(ServerConfig { host, port }, engine).await?;
        }
        Commands::Demo { burst } => {
            let config = SimulationConfig {
                burst_size: burst,
                ..SimulationConfig::default()
            };
            let report =
                tokio::task::spawn_blocking(move || simulation::run(&engine, &config)).await??;
            print_report(&report)?;
        }
    }

    Ok(())
}

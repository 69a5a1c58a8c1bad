//! WT16 command line tool
//!
//! Usage: wt16 --host 192.168.1.50 <probe|poll|watch|write|set-temp>
//!
//! Logging is controlled through `RUST_LOG`, e.g. `RUST_LOG=wt16_modbus=debug`.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use wt16_modbus::{
    probe, registers, spawn_poller, ByteOrder, Coordinator, HeatPumpConfig, PollState, Setpoint,
    Snapshot,
};

/// Talk to a Weider WT16 heat pump over Modbus TCP
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Controller host name or IP address
    #[clap(long)]
    host: String,

    /// Modbus TCP port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Modbus unit id
    #[clap(long, default_value = "1")]
    unit_id: u8,

    /// Word order of the 32-bit run-time counters
    #[clap(long, default_value = "CDAB")]
    word_order: ByteOrder,

    /// Seconds between poll cycles (10-300)
    #[clap(long, default_value = "60")]
    scan_interval: u64,

    /// Seconds failures are hidden before surfacing (60-3600)
    #[clap(long, default_value = "300")]
    error_timeout: u64,

    /// Hex-dump every Modbus frame at trace level
    #[clap(long)]
    packet_logging: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the controller answers
    Probe,
    /// Run one poll cycle and print the snapshot
    Poll,
    /// Poll continuously until interrupted
    Watch,
    /// Write a raw holding register
    Write {
        #[clap(long)]
        address: u16,
        #[clap(long)]
        value: u16,
    },
    /// Change a temperature target
    SetTemp {
        /// hot-water or room
        #[clap(long)]
        target: Setpoint,
        #[clap(long)]
        celsius: f64,
    },
}

impl Args {
    fn config(&self) -> HeatPumpConfig {
        HeatPumpConfig::new(self.host.clone())
            .with_port(self.port)
            .with_unit_id(self.unit_id)
            .with_word_order(self.word_order)
            .with_scan_interval(Duration::from_secs(self.scan_interval))
            .with_error_timeout(Duration::from_secs(self.error_timeout))
    }

    fn coordinator(&self) -> Result<Coordinator, Box<dyn Error>> {
        let connector = wt16_modbus::TcpConnector {
            packet_logging: self.packet_logging,
        };
        Ok(Coordinator::with_connector(self.config(), connector)?)
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("Snapshot taken at {}", snapshot.taken_at().to_rfc3339());
    for spec in registers::REGISTER_MAP {
        let Some(value) = snapshot.get(spec.key) else {
            continue;
        };
        match spec.unit {
            Some(unit) => println!("  {:<40} {} {}", spec.label, value, unit),
            None => println!("  {:<40} {}", spec.label, value),
        }
    }
}

async fn watch(args: &Args) -> Result<ExitCode, Box<dyn Error>> {
    let coordinator = Arc::new(Mutex::new(args.coordinator()?));
    let handle = spawn_poller(coordinator);
    let mut states = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                match &*states.borrow_and_update() {
                    PollState::Pending => {}
                    PollState::Ready(snapshot) => print_snapshot(snapshot),
                    PollState::Failed { reason, failing_for } => {
                        eprintln!("Update failed ({}s): {}", failing_for.as_secs(), reason)
                    }
                }
            }
        }
    }

    handle.shutdown().await;
    Ok(ExitCode::SUCCESS)
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    match &args.command {
        Command::Probe => {
            let config = args.config();
            config.validate()?;
            let outcome = probe(&config).await;
            println!("{}: {}", config.peer(), outcome);
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Poll => {
            let coordinator = args.coordinator()?;
            let report = coordinator.poll_cycle().await?;
            print_snapshot(&report.snapshot);
            println!(
                "Read {}/{} registers ({:.1}%)",
                report.succeeded,
                report.total,
                report.success_rate()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch => watch(&args).await,
        Command::Write { address, value } => {
            let coordinator = args.coordinator()?;
            if coordinator.write_register(*address, *value).await {
                println!("Register {} = {}", address, value);
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("Write to register {} failed", address);
                Ok(ExitCode::FAILURE)
            }
        }
        Command::SetTemp { target, celsius } => {
            let mut coordinator = args.coordinator()?;
            if !coordinator.set_temperature(*target, *celsius).await? {
                eprintln!("{} was not accepted by the controller", target);
                return Ok(ExitCode::FAILURE);
            }
            let current = coordinator.snapshot().and_then(|s| target.current(s));
            match current {
                Some(current) => println!("{} set to {:.1} °C (currently {:.1} °C)", target, celsius, current),
                None => println!("{} set to {:.1} °C", target, celsius),
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

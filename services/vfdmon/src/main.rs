//! VFD Monitor
//!
//! Connects to a drive, polls telemetry until Ctrl+C/SIGTERM and optionally
//! sends one control command and/or a target frequency.

use anyhow::{bail, Context};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use vfd_modbus::DriveSimulator;
use vfdmon::cli::Args;
use vfdmon::registers::{self, ControlCommand};
use vfdmon::{event_channel, AppConfig, DriveSession, Monitor};

/// Step of the simulated frequency ramp per tick, Hz x100
const SIM_RAMP_STEP: u16 = 250;
const SIM_TICK: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    common::logging::init_logging(&args.log_level, args.no_color)
        .context("Failed to initialize logging")?;

    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;
    info!("vfdmon {} starting: {}", env!("CARGO_PKG_VERSION"), config.connection);

    let (events, receiver) = event_channel();
    let sim_stop = CancellationToken::new();

    let session = if args.simulate {
        let sim = seeded_simulator(config.connection.slave_id);
        tokio::spawn(run_drive_model(sim.clone(), sim_stop.clone()));
        info!("Using simulated drive");
        DriveSession::with_connector(events.clone(), Arc::new(sim.connector()))
    } else {
        DriveSession::new(events.clone())
    };

    let monitor = Monitor::new(config.history_len)
        .with_json(args.json)
        .spawn(receiver, config.drain_interval());

    if !session
        .connect(config.connection.clone(), config.poll_interval())
        .await?
    {
        sim_stop.cancel();
        monitor.shutdown().await.context("Monitor task failed")?;
        bail!("Could not open {}", config.connection.port);
    }

    if let Some(command) = args.command {
        session.send_control(command);
    }
    if let Some(value) = args.set_freq {
        session.set_target_frequency(value);
    }

    let signal = common::shutdown::wait_for_shutdown().await;
    debug!("Stopping on {:?}", signal);

    session.disconnect().await;
    sim_stop.cancel();
    let monitor = monitor.shutdown().await.context("Monitor task failed")?;

    info!(
        "Stopped: {} samples retained, {} faults",
        monitor.window().count(),
        monitor.faults().len()
    );
    Ok(())
}

fn seeded_simulator(slave_id: u8) -> DriveSimulator {
    let sim = DriveSimulator::new().with_slave_id(slave_id);
    sim.set_register(registers::FREQUENCY, 0);
    sim.set_registers(registers::TELEMETRY_BLOCK_START, &[540, 0, 0, 0]);
    sim.set_register(registers::CONTROL_WORD, ControlCommand::Stop.control_word());
    sim.set_register(registers::TARGET_FREQUENCY, 5000);
    sim
}

/// Move the simulated output toward the commanded state
async fn run_drive_model(sim: DriveSimulator, token: CancellationToken) {
    let mut ticker = tokio::time::interval(SIM_TICK);
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {},
        }

        let running = matches!(
            sim.register(registers::CONTROL_WORD),
            Some(word) if word == ControlCommand::Forward.control_word()
                || word == ControlCommand::Reverse.control_word()
        );
        let target = if running {
            sim.register(registers::TARGET_FREQUENCY).unwrap_or(0)
        } else {
            0
        };
        let current = sim.register(registers::FREQUENCY).unwrap_or(0);
        let next = if current < target {
            current.saturating_add(SIM_RAMP_STEP).min(target)
        } else {
            current.saturating_sub(SIM_RAMP_STEP).max(target)
        };

        // Output scales with frequency; 50 Hz -> 380 V, 42 A, 1450 rpm
        let ratio = f64::from(next) / 5000.0;
        sim.set_register(registers::FREQUENCY, next);
        sim.set_registers(
            registers::OUTPUT_VOLTAGE,
            &[
                (380.0 * ratio).round() as u16,
                (42.0 * ratio).round() as u16,
                (1450.0 * ratio).round() as u16,
            ],
        );
    }
}

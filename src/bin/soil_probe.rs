//! Soil Probe CLI
//!
//! Reads a 7-in-1 soil sensor in one of three modes and writes JSON records
//! to the output directory.
//!
//! Usage: soil-probe --port /dev/ttyUSB0 single
//! Example: soil-probe --simulate --output-dir /tmp/soil average --samples 3

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use soil_probe::worker::{self, SamplerCommand, SamplerEvent};
use soil_probe::{Mode, Sampler, SensorConfig, SensorResult, SensorTransport};
use soil_probe::{SimulatedSensor, Timing};

/// Modbus RTU soil sensor reader
#[derive(Parser, Debug)]
#[command(name = "soil-probe", version, about, long_about = None)]
struct Cli {
    /// Serial device (e.g. /dev/ttyUSB0, COM3)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Modbus slave address of the sensor
    #[arg(long)]
    slave: Option<u8>,

    /// JSON configuration file; command line options override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the JSON records
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Base file name for the records of the selected mode
    #[arg(long)]
    base: Option<String>,

    /// Interval between scheduled readings (milliseconds)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Reject responses with a bad CRC
    #[arg(long)]
    verify_crc: bool,

    /// Log every frame sent and received (debug level)
    #[arg(long)]
    packet_log: bool,

    /// Use the built-in simulated sensor instead of a serial port
    #[arg(long)]
    simulate: bool,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    #[command(subcommand)]
    mode: Option<ModeCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum ModeCommand {
    /// Take one reading and save it
    Single,
    /// Read every interval into one session file
    Continuous {
        /// Stop after this many readings (default: until Ctrl-C)
        #[arg(long)]
        count: Option<usize>,
    },
    /// Collect samples and save their average
    Average {
        /// Number of samples to average
        #[arg(long)]
        samples: Option<usize>,
    },
}

impl ModeCommand {
    fn command(self) -> SamplerCommand {
        match self {
            ModeCommand::Single => SamplerCommand::SingleShot,
            ModeCommand::Continuous { .. } => SamplerCommand::Continuous,
            ModeCommand::Average { .. } => SamplerCommand::Average,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if cli.list_ports {
        return list_ports().map_err(Into::into);
    }

    let Some(mode) = cli.mode else {
        return Err("no mode selected (single, continuous or average)".into());
    };

    let config = build_config(&cli, mode)?;
    info!("{}", soil_probe::info());

    if cli.simulate {
        info!("Using simulated sensor at slave {}", config.slave_address);
        run(SimulatedSensor::demo(config.slave_address), &config, mode).await?;
    } else {
        run(open_serial(&config)?, &config, mode).await?;
    }
    Ok(())
}

fn build_config(cli: &Cli, mode: ModeCommand) -> SensorResult<SensorConfig> {
    let mut config = match &cli.config {
        Some(path) => SensorConfig::from_file(path)?,
        None => SensorConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    if let Some(slave) = cli.slave {
        config.slave_address = slave;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    if let Some(interval) = cli.interval_ms {
        config.sampling.interval_ms = interval;
    }
    config.verify_crc |= cli.verify_crc;
    config.packet_logging |= cli.packet_log;

    match mode {
        ModeCommand::Continuous { .. } => {
            if let Some(base) = &cli.base {
                config.output.continuous_base = base.clone();
            }
        }
        ModeCommand::Single | ModeCommand::Average { .. } => {
            if let Some(base) = &cli.base {
                config.output.single_base = base.clone();
            }
        }
    }
    if let ModeCommand::Average {
        samples: Some(samples),
    } = mode
    {
        config.sampling.average_samples = samples;
    }

    if cli.simulate {
        config.timing = Timing::immediate();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(feature = "rtu")]
fn open_serial(config: &SensorConfig) -> SensorResult<soil_probe::SerialTransport> {
    soil_probe::SerialTransport::from_config(config)
}

#[cfg(not(feature = "rtu"))]
fn open_serial(_config: &SensorConfig) -> SensorResult<SimulatedSensor> {
    Err(soil_probe::SensorError::config(
        "serial support not compiled in; rebuild with --features rtu or pass --simulate",
    ))
}

#[cfg(feature = "rtu")]
fn list_ports() -> SensorResult<()> {
    let ports = soil_probe::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

#[cfg(not(feature = "rtu"))]
fn list_ports() -> SensorResult<()> {
    Err(soil_probe::SensorError::config(
        "serial support not compiled in; rebuild with --features rtu",
    ))
}

async fn run<T>(transport: T, config: &SensorConfig, mode: ModeCommand) -> SensorResult<()>
where
    T: SensorTransport + 'static,
{
    let sampler = Sampler::from_config(transport, config);
    let (handle, mut events) = worker::spawn(sampler, config.sampling.interval());
    handle.send(mode.command())?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if report(&event, mode) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    handle.shutdown().await
}

/// Print one worker event; returns `true` once the selected mode is done.
fn report(event: &SamplerEvent, mode: ModeCommand) -> bool {
    match event {
        // Scheduled modes fall back to idle when they end or fail to start
        SamplerEvent::ModeChanged { mode: Mode::Idle } => !matches!(mode, ModeCommand::Single),
        SamplerEvent::ModeChanged { .. } => false,
        SamplerEvent::SessionOpened { path } => {
            println!("📁 Session file: {}", path.display());
            false
        }
        SamplerEvent::ReadingSaved {
            reading,
            path,
            count,
        } => {
            println!("#{:<3} {}", count, reading);
            info!("Session {} now holds {} readings", path.display(), count);
            matches!(mode, ModeCommand::Continuous { count: Some(limit) } if *count >= limit)
        }
        SamplerEvent::SingleShotSaved { reading, path } => {
            println!("{}", reading);
            println!("✅ Reading saved: {}", path.display());
            true
        }
        SamplerEvent::AveragingProgress {
            reading,
            collected,
            target,
        } => {
            println!("[{}/{}] {}", collected, target, reading);
            false
        }
        SamplerEvent::AverageSaved { record, path } => {
            println!("📈 Average of {} samples: {}", record.samples.len(), record.mean);
            println!("✅ Average saved: {}", path.display());
            true
        }
        SamplerEvent::ReadingDiscarded => false,
        SamplerEvent::Failed { message } => {
            error!("{}", message);
            eprintln!("❌ {}", message);
            matches!(mode, ModeCommand::Single)
        }
        SamplerEvent::Shutdown => true,
    }
}

//! Command-line meter reader.
//!
//! Talks to a CC1101 wired to a Raspberry Pi (`--features raspberry-pi`);
//! without that feature every subcommand reports the missing backend.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use radian_rs::config::RadioConfig;
use radian_rs::logging;

#[derive(Parser)]
#[command(name = "radian", version, about = "EverBlu Cyble meter reader over CC1101")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "radian.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reset and identify the radio chip
    Probe,
    /// Interrogate the meter once and print the reading as JSON
    Read {
        /// Attempt the read even outside the schedule gate
        #[arg(long)]
        ignore_schedule: bool,
    },
    /// Sweep for the meter's actual carrier frequency
    Discover {
        /// Run only the fine sweep around the configured carrier
        #[arg(long)]
        fine: bool,
    },
    /// Print chip identity, state and tuning
    Status,
}

fn main() -> Result<()> {
    logging::init_logger();
    let cli = Cli::parse();
    let config = RadioConfig::from_file(&cli.config)?;
    run(cli.command, config)
}

#[cfg(feature = "raspberry-pi")]
fn run(command: Command, config: RadioConfig) -> Result<()> {
    use chrono::{Datelike, Local, Timelike};
    use radian_rs::radian::MeterReading;
    use radian_rs::radio::hal::raspberry_pi::{PiPins, RaspberryPiHal};
    use radian_rs::radio::{RadianDriver, ReadingSink, ScanPhase};

    struct StdoutSink;

    impl ReadingSink for StdoutSink {
        fn reading(&mut self, reading: &MeterReading, frequency_mhz: f64) {
            if let Ok(json) = serde_json::to_string_pretty(reading) {
                println!("{}", json);
            }
            println!("frequency: {:.5} MHz", frequency_mhz);
        }

        fn read_failed(&mut self) {
            eprintln!("read failed: no usable reply from the meter");
        }

        fn frequency_discovered(&mut self, frequency_mhz: f64) {
            println!("discovered carrier: {:.5} MHz", frequency_mhz);
        }
    }

    let hal = RaspberryPiHal::new(0, PiPins::default())?;
    let mut driver = RadianDriver::new(hal, config, StdoutSink);
    driver.probe()?;

    match command {
        Command::Probe => {
            println!("CC1101 detected");
        }
        Command::Read { ignore_schedule } => {
            let now = Local::now();
            if !ignore_schedule && !driver.reading_allowed(now.weekday(), now.hour() as u8) {
                anyhow::bail!(
                    "schedule gate refused the read (use --ignore-schedule to override)"
                );
            }
            driver.start_read(0)?;
            pump(&mut driver)?;
            if driver.last_read_ok() != Some(true) {
                anyhow::bail!("meter did not answer");
            }
        }
        Command::Discover { fine } => {
            let phase = if fine { ScanPhase::Fine } else { ScanPhase::Coarse };
            driver.start_discovery(0, phase)?;
            pump(&mut driver)?;
        }
        Command::Status => {
            let status = driver.status()?;
            println!("partnum:   0x{:02X}", status.partnum);
            println!("version:   0x{:02X}", status.version);
            println!("marcstate: 0x{:02X}", status.marcstate);
            println!("frequency: {:.5} MHz", status.frequency_mhz);
            println!("rssi:      {} dBm", status.rssi_dbm);
            println!("lqi:       0x{:02X}", status.lqi);
            println!("rx bytes:  {}", status.rx_bytes);
        }
    }
    Ok(())
}

/// Drive the state machines to completion against the wall clock.
#[cfg(feature = "raspberry-pi")]
fn pump<H, S>(driver: &mut radian_rs::radio::RadianDriver<H, S>) -> Result<()>
where
    H: radian_rs::radio::hal::Hal,
    S: radian_rs::radio::ReadingSink,
{
    use std::time::{Duration, Instant};

    let start = Instant::now();
    while driver.is_busy() || driver.is_scanning() {
        driver.tick(start.elapsed().as_millis() as u64)?;
        std::thread::sleep(Duration::from_millis(5));
    }
    Ok(())
}

#[cfg(not(feature = "raspberry-pi"))]
fn run(_command: Command, _config: RadioConfig) -> Result<()> {
    anyhow::bail!("no hardware backend in this build; rebuild with --features raspberry-pi")
}

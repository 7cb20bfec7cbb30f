// Danfoss ECL time setting tool
// Sequential workflow: connect -> read -> confirm -> write -> verify.

mod devices;
mod drivers;
mod types;

use std::thread;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDateTime};
use clap::Parser;

use devices::ecl::{self, EclDevice, SetTimeOutcome};

/// Sets the internal clock of a Danfoss ECL controller to the current system
/// time (or a given time) over Modbus RTU, and reads it back to verify.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Serial port of the RS485 adapter
    #[clap(long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Modbus id of the controller (5 is the Danfoss standard)
    #[clap(long, default_value_t = ecl::DEFAULT_SLAVE_ID)]
    slave: u8,

    /// Target time as "YYYY-MM-DD HH:MM" instead of the current system time
    #[clap(long)]
    time: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    let target = match &args.time {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .with_context(|| format!("invalid --time value {s:?}, expected \"YYYY-MM-DD HH:MM\""))?,
        None => Local::now().naive_local(),
    };

    println!("=== Danfoss ECL Time Setting Tool ===");
    println!(
        "Current system time: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    let mut device = EclDevice::new(&args.port, args.slave);
    println!("Connecting to Danfoss ECL on {}", args.port);
    println!(
        "Settings: baudrate={}, parity=even, modbus id={}",
        ecl::BAUD_RATE,
        args.slave
    );
    println!();

    if let Err(e) = device.connect() {
        println!("✗ Modbus connection failed");
        println!("Check serial port, wiring, and Danfoss ECL power");
        bail!(e);
    }
    println!("✓ Connection successful");
    println!();

    // Let the adapter settle after opening the line.
    thread::sleep(ecl::SETTLE_DELAY);

    println!("Reading current Danfoss ECL time...");
    match device.read_time() {
        Ok(current) => println!("Current Danfoss ECL time: {current}"),
        Err(e) => {
            device.close();
            bail!("unable to read current Danfoss ECL time: {e}");
        }
    }
    println!();

    let outcome = device.set_time(&target);
    println!();

    match outcome {
        SetTimeOutcome::Completed => {
            println!("✓ Time setting completed successfully");
            thread::sleep(ecl::SETTLE_DELAY);
            println!("Verifying time setting...");
            match device.read_time() {
                Ok(confirmed) => println!("✓ Danfoss ECL time is now: {confirmed}"),
                Err(e) => println!("⚠ Unable to verify time setting ({e})"),
            }
        }
        SetTimeOutcome::Cancelled => {}
        SetTimeOutcome::Failed => {
            println!("✗ Time setting failed - some registers could not be written");
        }
    }

    device.close();
    println!();
    println!("Serial port closed");
    Ok(())
}

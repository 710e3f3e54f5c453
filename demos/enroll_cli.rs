//! Minimal enroll-and-search demo driving a real sensor over serial.
//! Collaborator code, not part of the core library — CLI programs are
//! out of scope for the driver itself.
use std::io::{self, Write as _};

use fpm10::{DriverConfig, HumanActionListener, Sensor};

struct CliListener;

impl HumanActionListener for CliListener {
    fn put_finger(&mut self) {
        println!("Place your finger on the sensor...");
    }

    fn remove_finger(&mut self) {
        println!("Remove your finger.");
    }

    fn wait_while_data_transferring(&mut self) {
        println!("Hold still, transferring data...");
    }
}

fn main() -> anyhow::Result<()> {
    fpm10::init_tracing();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let sensor = Sensor::open(DriverConfig::new(port))?;

    print!("Enroll into slot: ");
    io::stdout().flush()?;
    let mut slot_input = String::new();
    io::stdin().read_line(&mut slot_input)?;
    let slot: u16 = slot_input.trim().parse()?;

    let mut listener = CliListener;
    sensor.enroll(slot, &mut listener)?;
    println!("Enrolled slot {slot}.");

    println!("Now place a finger to search the library...");
    match sensor.search(&mut listener)? {
        Some(result) => println!("Matched slot {} (score {}).", result.id, result.score),
        None => println!("No match found."),
    }

    Ok(())
}

// Danfoss ECL controller (tested on ECL110)
// Clock access over Modbus RTU: register map, read-back and confirmed writes.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::warn;
use tokio_serial::{DataBits, Parity, StopBits};

use crate::drivers::modbus::{ModbusClient, ModbusError, RegisterIo, SerialConfig};
use crate::types::EclTime;

// Standard ECL comm parameters
pub const BAUD_RATE: u32 = 19_200;
const DATA_BITS: DataBits = DataBits::Eight;
const PARITY: Parity = Parity::Even;
const STOP_BITS: StopBits = StopBits::One;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// 5 is the Danfoss standard Modbus id
pub const DEFAULT_SLAVE_ID: u8 = 5;

/// Pause between consecutive register writes
const INTER_WRITE_DELAY: Duration = Duration::from_millis(100);
/// Pause after opening the line and before the verification read-back
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Date/time holding registers of the ECL.
///
/// The year register only stores a two-digit year (e.g. 25 for 2025).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRegister {
    Hour,
    Minute,
    Day,
    Month,
    Year,
}

impl TimeRegister {
    /// Write order matches the documented register layout.
    pub const ALL: [TimeRegister; 5] = [
        Self::Hour,
        Self::Minute,
        Self::Day,
        Self::Month,
        Self::Year,
    ];

    /// Documented one-based register address (PNU).
    pub fn pnu(self) -> u16 {
        match self {
            Self::Hour => 64045,
            Self::Minute => 64046,
            Self::Day => 64047,
            Self::Month => 64048,
            Self::Year => 64049,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hour => "Hour",
            Self::Minute => "Minute",
            Self::Day => "Day",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }
}

/// Device documentation lists one-based addresses, the wire protocol is
/// zero-based.
const fn wire_address(pnu: u16) -> u16 {
    pnu - 1
}

/// Register values for a target date/time, in write order.
pub fn time_register_values(target: &NaiveDateTime) -> [(TimeRegister, u16); 5] {
    [
        (TimeRegister::Hour, target.hour() as u16),
        (TimeRegister::Minute, target.minute() as u16),
        (TimeRegister::Day, target.day() as u16),
        (TimeRegister::Month, target.month() as u16),
        (TimeRegister::Year, target.year().rem_euclid(100) as u16),
    ]
}

/// Only an explicit yes counts as confirmation.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "yes" | "y")
}

/// Result of a confirmed time-setting attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTimeOutcome {
    /// All five registers were written.
    Completed,
    /// The user declined the prompt; nothing was written.
    Cancelled,
    /// At least one register write failed.
    Failed,
}

/// Danfoss ECL device over a register-level transport.
pub struct EclDevice<C = ModbusClient> {
    client: C,
}

impl EclDevice {
    pub fn new(port_path: &str, slave_id: u8) -> Self {
        let config = SerialConfig {
            port_path: port_path.to_string(),
            baud_rate: BAUD_RATE,
            data_bits: DATA_BITS,
            parity: PARITY,
            stop_bits: STOP_BITS,
            timeout: RESPONSE_TIMEOUT,
        };
        Self {
            client: ModbusClient::new(config, slave_id),
        }
    }

    pub fn connect(&mut self) -> Result<(), ModbusError> {
        self.client.connect()
    }

    pub fn close(&mut self) {
        self.client.disconnect();
    }
}

impl<C: RegisterIo> EclDevice<C> {
    fn read_pnu(&mut self, register: TimeRegister) -> Result<u16, ModbusError> {
        let words = self
            .client
            .read_holding_registers(wire_address(register.pnu()), 1)?;
        words.first().copied().ok_or_else(|| {
            ModbusError::InvalidData(format!("empty response for register {}", register.pnu()))
        })
    }

    fn write_pnu(&mut self, register: TimeRegister, value: u16) -> Result<(), ModbusError> {
        self.client
            .write_single_register(wire_address(register.pnu()), value)
    }

    /// Reads the device clock. Any failed register read aborts the whole
    /// operation; no partial result is exposed.
    pub fn read_time(&mut self) -> Result<EclTime, ModbusError> {
        let mut raw = [0u16; 5];
        for (slot, register) in raw.iter_mut().zip(TimeRegister::ALL) {
            *slot = self.read_pnu(register)?;
        }
        Ok(EclTime::from_registers(raw))
    }

    /// Writes the given register values in order. A failed write is reported
    /// but never aborts the remaining writes. Returns true only if every
    /// register was written.
    pub fn write_time(&mut self, values: &[(TimeRegister, u16)]) -> bool {
        let mut all_ok = true;
        for &(register, value) in values {
            match self.write_pnu(register, value) {
                Ok(()) => match register {
                    TimeRegister::Year => println!(
                        "✓ {}: {} (20{:02}) -> register {}",
                        register.label(),
                        value,
                        value,
                        register.pnu()
                    ),
                    _ => println!(
                        "✓ {}: {} -> register {}",
                        register.label(),
                        value,
                        register.pnu()
                    ),
                },
                Err(e) => {
                    println!(
                        "✗ {}: failed to write {} -> register {} ({})",
                        register.label(),
                        value,
                        register.pnu(),
                        e
                    );
                    all_ok = false;
                }
            }
            // Give the controller time between writes.
            thread::sleep(INTER_WRITE_DELAY);
        }
        all_ok
    }

    /// Previews the register writes for `target`, asks for confirmation on
    /// stdin and, if confirmed, writes the device clock.
    pub fn set_time(&mut self, target: &NaiveDateTime) -> SetTimeOutcome {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.set_time_from(target, &mut input)
    }

    fn set_time_from<R: BufRead>(&mut self, target: &NaiveDateTime, input: &mut R) -> SetTimeOutcome {
        let values = time_register_values(target);

        println!(
            "Setting Danfoss ECL time to: {}",
            target.format("%Y-%m-%d %H:%M")
        );
        println!();
        println!("You are about to write to Modbus registers on the Danfoss ECL.");
        println!("This will modify the following registers with the values:");
        for &(register, value) in &values {
            match register {
                TimeRegister::Year => println!(
                    "  - register {} ({}): {} (20{:02})",
                    register.pnu(),
                    register.label(),
                    value,
                    value
                ),
                _ => println!(
                    "  - register {} ({}): {}",
                    register.pnu(),
                    register.label(),
                    value
                ),
            }
        }
        println!();

        print!("Do you want to proceed with writing to these registers? (yes/no): ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if let Err(e) = input.read_line(&mut answer) {
            warn!("failed to read confirmation: {}", e);
            answer.clear();
        }
        if !is_affirmative(&answer) {
            println!("Operation cancelled by user.");
            return SetTimeOutcome::Cancelled;
        }

        println!();
        println!("Proceeding with register writes...");
        println!();

        if self.write_time(&values) {
            SetTimeOutcome::Completed
        } else {
            SetTimeOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;

    use chrono::NaiveDate;

    /// In-memory register bank recording every write attempt.
    struct FakeBus {
        registers: HashMap<u16, u16>,
        writes: Vec<(u16, u16)>,
        fail_reads: HashSet<u16>,
        fail_writes: HashSet<u16>,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                registers: HashMap::new(),
                writes: Vec::new(),
                fail_reads: HashSet::new(),
                fail_writes: HashSet::new(),
            }
        }

        fn with_time(hour: u16, minute: u16, day: u16, month: u16, year: u16) -> Self {
            let mut bus = Self::new();
            let raw = [hour, minute, day, month, year];
            for (register, value) in TimeRegister::ALL.into_iter().zip(raw) {
                bus.registers.insert(wire_address(register.pnu()), value);
            }
            bus
        }
    }

    impl RegisterIo for FakeBus {
        fn read_holding_registers(
            &mut self,
            address: u16,
            count: u16,
        ) -> Result<Vec<u16>, ModbusError> {
            assert_eq!(count, 1);
            if self.fail_reads.contains(&address) {
                return Err(ModbusError::Transport("read timed out".into()));
            }
            Ok(vec![self.registers.get(&address).copied().unwrap_or(0)])
        }

        fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), ModbusError> {
            self.writes.push((address, value));
            if self.fail_writes.contains(&address) {
                return Err(ModbusError::Exception(
                    tokio_modbus::ExceptionCode::IllegalDataAddress,
                ));
            }
            self.registers.insert(address, value);
            Ok(())
        }
    }

    fn example_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    #[test]
    fn register_map_matches_documentation() {
        let pnus: Vec<u16> = TimeRegister::ALL.iter().map(|r| r.pnu()).collect();
        assert_eq!(pnus, vec![64045, 64046, 64047, 64048, 64049]);
        assert_eq!(wire_address(TimeRegister::Hour.pnu()), 64044);
    }

    #[test]
    fn register_values_for_example_time() {
        let values = time_register_values(&example_time());
        assert_eq!(
            values,
            [
                (TimeRegister::Hour, 14),
                (TimeRegister::Minute, 30),
                (TimeRegister::Day, 15),
                (TimeRegister::Month, 6),
                (TimeRegister::Year, 25),
            ]
        );
    }

    #[test]
    fn year_register_drops_the_century() {
        let century_boundary = [(2000, 0), (2025, 25), (2099, 99), (1999, 99)];
        for (year, expected) in century_boundary {
            let target = NaiveDate::from_ymd_opt(year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let (_, value) = time_register_values(&target)[4];
            assert_eq!(value, expected, "year {year}");
        }
    }

    #[test]
    fn affirmative_tokens() {
        for answer in ["yes", "y", "YES", " Yes ", "Y\n"] {
            assert!(is_affirmative(answer), "{answer:?}");
        }
        for answer in ["no", "n", "", "yess", "ja", "ok"] {
            assert!(!is_affirmative(answer), "{answer:?}");
        }
    }

    #[test]
    fn read_time_assembles_the_clock() {
        let mut device = EclDevice {
            client: FakeBus::with_time(14, 30, 15, 6, 25),
        };
        let time = device.read_time().unwrap();
        assert_eq!(time.to_string(), "2025-06-15 14:30");
    }

    #[test]
    fn read_time_yields_no_partial_result() {
        let mut bus = FakeBus::with_time(14, 30, 15, 6, 25);
        bus.fail_reads.insert(wire_address(TimeRegister::Day.pnu()));
        let mut device = EclDevice { client: bus };
        assert!(device.read_time().is_err());
    }

    #[test]
    fn write_failure_does_not_stop_remaining_writes() {
        let mut bus = FakeBus::new();
        bus.fail_writes
            .insert(wire_address(TimeRegister::Minute.pnu()));
        let mut device = EclDevice { client: bus };

        let all_ok = device.write_time(&time_register_values(&example_time()));
        assert!(!all_ok);
        // All five registers were still attempted, in write order.
        let attempted: Vec<u16> = device.client.writes.iter().map(|&(a, _)| a).collect();
        assert_eq!(attempted, vec![64044, 64045, 64046, 64047, 64048]);
    }

    #[test]
    fn declining_the_prompt_writes_nothing() {
        let mut device = EclDevice {
            client: FakeBus::new(),
        };
        let outcome = device.set_time_from(&example_time(), &mut Cursor::new("no\n"));
        assert_eq!(outcome, SetTimeOutcome::Cancelled);
        assert!(device.client.writes.is_empty());
    }

    #[test]
    fn confirmed_write_round_trips() {
        let mut device = EclDevice {
            client: FakeBus::new(),
        };
        let outcome = device.set_time_from(&example_time(), &mut Cursor::new("yes\n"));
        assert_eq!(outcome, SetTimeOutcome::Completed);
        assert_eq!(device.client.writes.len(), 5);
        assert_eq!(device.read_time().unwrap().to_string(), "2025-06-15 14:30");
    }
}

// Shared data types

use std::fmt;

/// A date/time read back from the controller, with the two-digit year
/// register already expanded to a four-digit year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EclTime {
    pub hour: u16,
    pub minute: u16,
    pub day: u16,
    pub month: u16,
    /// Four-digit year. Raw values below 100 are interpreted as 20xx;
    /// the device cannot represent years outside 2000-2099.
    pub year: u16,
}

impl EclTime {
    /// Builds a time from raw register values in map order
    /// (hour, minute, day, month, year).
    pub fn from_registers(raw: [u16; 5]) -> Self {
        let [hour, minute, day, month, year] = raw;
        let year = if year < 100 { 2000 + year } else { year };
        Self {
            hour,
            minute,
            day,
            month,
            year,
        }
    }
}

impl fmt::Display for EclTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

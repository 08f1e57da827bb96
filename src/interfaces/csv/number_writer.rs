use crate::domain::number::OwnedNumber;
use crate::error::Result;
use std::io::Write;

/// Writes owned numbers as CSV to any `Write` destination.
///
/// Columns follow the `OwnedNumber` fields, so an export can be read back
/// or fed to a spreadsheet: id, listing, phone, provider, service,
/// country, price, activation reference, timestamps and status.
pub struct NumberWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> NumberWriter<W> {
    /// Creates a new `NumberWriter` targeting `dest` (e.g., File, Stdout).
    pub fn new(dest: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(dest),
        }
    }

    /// Serializes all numbers and flushes the destination.
    pub fn write_numbers(&mut self, numbers: &[OwnedNumber]) -> Result<()> {
        for number in numbers {
            self.writer.serialize(number)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

use crate::domain::listing::Listing;
use crate::error::{EngineError, Result};
use std::io::Read;

/// Reads catalog listings from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<Listing>`. It handles whitespace trimming and flexible record
/// lengths automatically, so a hand-edited catalog file with a stray
/// column does not abort the whole refresh.
pub struct ListingReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ListingReader<R> {
    /// Creates a new `ListingReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes listings.
    pub fn listings(self) -> impl Iterator<Item = Result<Listing>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(EngineError::from))
    }
}

/// Reads a whole catalog file, dropping malformed rows with a warning.
///
/// One bad row costs that row only; the rest of the catalog still loads.
pub fn read_catalog<R: Read>(source: R) -> Vec<Listing> {
    let mut listings = Vec::new();
    for (row, result) in ListingReader::new(source).listings().enumerate() {
        match result {
            Ok(listing) => listings.push(listing),
            Err(err) => {
                tracing::warn!(row = row + 1, error = %err, "skipping malformed catalog row");
            }
        }
    }
    listings
}

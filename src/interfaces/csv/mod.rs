pub mod listing_reader;
pub mod number_writer;

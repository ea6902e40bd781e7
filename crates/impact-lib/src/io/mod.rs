//! Host-side readers and writers. The engine itself performs no I/O.

pub mod csv;

pub use self::csv::{parse_accel_text, read_accel_csv, write_processed_csv, write_processed_csv_file};

pub mod bar;
pub mod loader;
pub mod source;

pub use bar::{day_ranges, Bar, BarError};
pub use loader::{load_csv, parse_timestamp};
pub use source::{BarSource, CsvBarSource, MemoryBarSource};

pub mod fx_pair;

pub use fx_pair::{FxPair, SizingError};

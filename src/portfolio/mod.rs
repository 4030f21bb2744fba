pub mod account;
pub mod ledger;
pub mod trade;

pub use account::AccountState;
pub use ledger::Ledger;
pub use trade::{ClosedPosition, ExitReason, Trade};

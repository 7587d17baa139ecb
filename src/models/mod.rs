//! Domain models shared across the entire Stockpulse service.

pub mod symbol;
pub mod tick;

pub use symbol::SymbolSpec;
pub use tick::{round_cents, Origin, Tick};

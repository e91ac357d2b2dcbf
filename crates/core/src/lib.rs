//! Core data types for the price alert bot.

pub mod format;
pub mod price;
pub mod profile;
pub mod symbol;

pub use format::*;
pub use price::*;
pub use profile::*;
pub use symbol::*;

//! Alert and portfolio engine.
//!
//! Owns the durable user state ([`UserStore`]), the edge-triggered
//! [`AlertEngine`] and the [`PortfolioValuator`]. Outbound delivery goes
//! through the [`Notifier`] trait so transports can be swapped in tests.

pub mod error;
pub mod notifier;
pub mod snapshot;
pub mod store;
pub mod sweep;
pub mod valuator;

pub use error::*;
pub use notifier::*;
pub use snapshot::*;
pub use store::*;
pub use sweep::*;
pub use valuator::*;

//! Gateway HTTP handlers

pub mod escrow;
pub mod health;
pub mod sweep;

pub use escrow::*;
pub use health::*;
pub use sweep::*;

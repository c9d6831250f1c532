//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Readings carry UTC wall-clock timestamps (`chrono::DateTime<Utc>`)
//! - Each sensor stamps readings from its own clock; the two clocks drift
//!   relative to each other and are reconciled by a `DriftModel`
//! - Drift arithmetic is done in milliseconds (f64), surface sensor as reference

mod blueprint;
mod chunk;
mod error;
mod reading;
mod sync;

pub use blueprint::*;
pub use chunk::*;
pub use error::*;
pub use reading::*;
pub use sync::*;

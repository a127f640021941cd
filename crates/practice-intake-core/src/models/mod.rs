//! Domain models for the practice.

mod client;
mod session;
mod subtable;

pub use client::*;
pub use session::*;
pub use subtable::*;

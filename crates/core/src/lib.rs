//! Domain types for the dataset converter client.
//!
//! Everything in this crate is pure data and validation: lifecycle states
//! and the affordance they map to, feature parameter variants, the status
//! snapshot reported by the conversion service, and the form snapshot that
//! is validated before anything is sent over the wire.

pub mod error;
pub mod feature;
pub mod form;
pub mod lifecycle;
pub mod status;
pub mod ticket;
pub mod types;

//! CLI command implementations.

pub mod inspect;
pub mod sync;
pub mod uid;
pub mod verify;

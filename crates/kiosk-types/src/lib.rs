//! Shared domain types for the attendance kiosk.

pub mod config;
pub mod events;
pub mod frame;
pub mod ui;
pub mod wire;

mod errors;

pub use errors::{KioskError, Result};

//! lecho: Local-echo typeahead prediction for remote terminal sessions.
//!
//! This crate provides:
//! - Keystroke-to-prediction translation and speculative rendering
//! - Generation-ordered reconciliation of predictions against server output
//! - SGR style tracking so speculation blends with the surrounding text
//! - Rolling latency/accuracy stats and the adaptive display policy
//! - A vte-backed terminal grid and an async session driver

pub mod config;
pub mod constants;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod prediction;
#[cfg(test)]
mod proptest;
pub mod reader;
pub mod session;
pub mod stats;
pub mod style;
pub mod term;
pub mod timeline;

pub use config::{StyleConfig, TypeAheadConfig};
pub use controller::TypeAheadController;
pub use cursor::{Coordinate, Cursor};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat};
pub use session::{Session, SessionInput};
pub use stats::{PredictionStats, StatsReport};
pub use style::TypeAheadStyle;
pub use term::{Grid, VtGrid};
pub use timeline::{PredictionTimeline, Resolution};

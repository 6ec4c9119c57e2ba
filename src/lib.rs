//! Odds-drop (落飛) tracking for Hong Kong racing.
//!
//! Recovers horse records from messy race-card and odds pages, scores them,
//! and flags horses whose win odds shortened between snapshots.

pub mod analysis;
pub mod archive;
pub mod cli;
pub mod config;
pub mod extractor;
pub mod fetch;
pub mod merge;
pub mod retry;
pub mod roster;
pub mod routes;
pub mod scoring;
pub mod store;
pub mod types;

pub use extractor::{Extraction, Extractor, InputHint, Strategy};
pub use types::{HorseRecord, RaceKey, RaceSnapshot, WinOdds};

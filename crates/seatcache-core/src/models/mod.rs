//! Data models for seating data.
//!
//! This module contains the structures that flow through the cache:
//!
//! - `Table`, `Player`: the normalized seating model
//! - `Cell`, `RowRecord`: raw spreadsheet rows before and after ingestion
//! - `PlayerMatch`, `TableStats`: derived views served by the cache

pub mod row;
pub mod stats;
pub mod table;

pub use row::{Cell, RawRow, RowRecord, COLUMN_COUNT, MIN_COLUMNS};
pub use stats::{NationalityCount, PlayerMatch, TableStats};
pub use table::{Player, Table};

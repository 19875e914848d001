//! Conversion between raw spreadsheet rows and the table model.
//!
//! Reading is tolerant: header rows, short rows and rows missing identity
//! fields are dropped rather than failing the batch. Writing assumes the
//! tables already passed `validate`.

pub mod rows;
pub mod validate;

pub use rows::{from_rows, is_header_row, parse_chips, parse_key_player, parse_seat, to_rows};
pub use validate::{validate, ValidationReport, MAX_SEAT, MIN_SEAT};

//! Raw spreadsheet rows.
//!
//! Upstream rows arrive as loosely typed JSON arrays. They are kept as
//! `RawRow` only long enough to reject headers and short rows; after that
//! every row is converted into a fixed-width `RowRecord`.

use serde::{Deserialize, Serialize};

/// Number of positional columns in the backend sheet.
pub const COLUMN_COUNT: usize = 8;

/// Rows with fewer cells than this carry too little data to build a player.
pub const MIN_COLUMNS: usize = 6;

/// Column positions in the backend sheet.
pub mod col {
    pub const ROOM: usize = 0;
    pub const TABLE_LABEL: usize = 1;
    pub const TABLE_NUMBER: usize = 2;
    pub const SEAT: usize = 3;
    pub const NAME: usize = 4;
    pub const NATIONALITY: usize = 5;
    pub const CHIPS: usize = 6;
    pub const KEY_PLAYER: usize = 7;
}

/// A single spreadsheet cell as delivered by either transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

pub type RawRow = Vec<Cell>;

impl Cell {
    /// Text form of the cell. Integral numbers render without a fraction.
    pub fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Bool(b) => b.to_string(),
            Cell::Null => String::new(),
        }
    }

    /// Trimmed text form, used for identity fields.
    pub fn trimmed(&self) -> String {
        self.text().trim().to_string()
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Null => true,
            _ => false,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<i32> for Cell {
    fn from(n: i32) -> Self {
        Cell::Number(f64::from(n))
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

/// A raw row padded to the eight backend columns, with named accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub room: String,
    pub table_label: String,
    pub table_number: String,
    pub seat: Cell,
    pub name: String,
    pub nationality: String,
    pub chips: Cell,
    pub key_player: Cell,
}

impl RowRecord {
    /// Build a record from raw cells.
    ///
    /// Returns `None` for rows shorter than `MIN_COLUMNS`. Rows of six or
    /// seven cells get an empty chip count and a `false` key-player flag.
    pub fn from_cells(cells: &[Cell]) -> Option<Self> {
        if cells.len() < MIN_COLUMNS {
            return None;
        }

        let cell = |idx: usize, default: Cell| cells.get(idx).cloned().unwrap_or(default);

        Some(Self {
            room: cells[col::ROOM].trimmed(),
            table_label: cells[col::TABLE_LABEL].trimmed(),
            table_number: cells[col::TABLE_NUMBER].trimmed(),
            seat: cells[col::SEAT].clone(),
            name: cells[col::NAME].trimmed(),
            nationality: cells[col::NATIONALITY].trimmed(),
            chips: cell(col::CHIPS, Cell::Text(String::new())),
            key_player: cell(col::KEY_PLAYER, Cell::Bool(false)),
        })
    }

    pub fn table_key(&self) -> String {
        super::Table::compose_key(&self.room, &self.table_label, &self.table_number)
    }

    /// Room, table label and player name are all required.
    pub fn has_identity(&self) -> bool {
        !self.room.is_empty() && !self.table_label.is_empty() && !self.name.is_empty()
    }
}

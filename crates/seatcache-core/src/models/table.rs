//! Domain models for tables and seated players.
//!
//! Tables are rebuilt from scratch on every normalization pass and are never
//! mutated in place by the cache.

use serde::{Deserialize, Serialize};

/// A seated participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub seat: i32,
    pub name: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub chips: f64,
    #[serde(default)]
    pub key_player: bool,
}

impl Player {
    pub fn new(
        seat: i32,
        name: impl Into<String>,
        nationality: impl Into<String>,
        chips: f64,
    ) -> Self {
        Self {
            seat,
            name: name.into(),
            nationality: nationality.into(),
            chips,
            key_player: false,
        }
    }

    pub fn with_key_player(mut self, key_player: bool) -> Self {
        self.key_player = key_player;
        self
    }
}

/// One physical seating arrangement, identified by room + label + number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub room: String,
    pub table_label: String,
    #[serde(default)]
    pub table_number: String,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Table {
    pub fn new(
        room: impl Into<String>,
        table_label: impl Into<String>,
        table_number: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            table_label: table_label.into(),
            table_number: table_number.into(),
            players: Vec::new(),
        }
    }

    pub fn with_player(mut self, player: Player) -> Self {
        self.players.push(player);
        self
    }

    /// Composite key joining room, label and number with underscores.
    pub fn key(&self) -> String {
        Self::compose_key(&self.room, &self.table_label, &self.table_number)
    }

    pub fn compose_key(room: &str, table_label: &str, table_number: &str) -> String {
        format!("{}_{}_{}", room, table_label, table_number)
    }

    pub fn player_at(&self, seat: i32) -> Option<&Player> {
        self.players.iter().find(|p| p.seat == seat)
    }

    pub fn total_chips(&self) -> f64 {
        self.players.iter().map(|p| p.chips).sum()
    }

    /// Display name used in logs and CLI output, e.g. "RoomA / T1 #1".
    pub fn display_name(&self) -> String {
        if self.table_number.is_empty() {
            format!("{} / {}", self.room, self.table_label)
        } else {
            format!("{} / {} #{}", self.room, self.table_label, self.table_number)
        }
    }
}

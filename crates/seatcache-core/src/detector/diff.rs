use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Player, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub key: String,
    pub room: String,
    pub table_label: String,
    pub table_number: String,
}

impl From<&Table> for TableRef {
    fn from(table: &Table) -> Self {
        Self {
            key: table.key(),
            room: table.room.clone(),
            table_label: table.table_label.clone(),
            table_number: table.table_number.clone(),
        }
    }
}

/// A seat identified by (table key, seat number).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub table_key: String,
    pub room: String,
    pub table_label: String,
    pub seat: i32,
    pub name: String,
    pub nationality: String,
    pub chips: f64,
}

impl PlayerRef {
    fn new(table: &Table, player: &Player) -> Self {
        Self {
            table_key: table.key(),
            room: table.room.clone(),
            table_label: table.table_label.clone(),
            seat: player.seat,
            name: player.name.clone(),
            nationality: player.nationality.clone(),
            chips: player.chips,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipChange {
    pub table_key: String,
    pub room: String,
    pub table_label: String,
    pub table_number: String,
    pub seat: i32,
    pub player_name: String,
    pub old_chips: f64,
    pub new_chips: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub detected_at: DateTime<Utc>,
    pub added_tables: Vec<TableRef>,
    pub removed_tables: Vec<TableRef>,
    pub added_players: Vec<PlayerRef>,
    pub removed_players: Vec<PlayerRef>,
    pub chip_changes: Vec<ChipChange>,
    pub has_changes: bool,
}

impl ChangeSet {
    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "+{} -{} tables, +{} -{} players, {} chip changes",
            self.added_tables.len(),
            self.removed_tables.len(),
            self.added_players.len(),
            self.removed_players.len(),
            self.chip_changes.len()
        )
    }
}

type SeatIndex<'a> = HashMap<(String, i32), (&'a Table, &'a Player)>;

/// Ordered (table, player) pairs plus a lookup by seat identity.
fn index_seats(tables: &[Table]) -> (Vec<(String, i32)>, SeatIndex<'_>) {
    let mut order = Vec::new();
    let mut index = HashMap::new();
    for table in tables {
        let key = table.key();
        for player in &table.players {
            let id = (key.clone(), player.seat);
            if index.insert(id.clone(), (table, player)).is_none() {
                order.push(id);
            }
        }
    }
    (order, index)
}

/// Compare two snapshots.
///
/// Tables are matched by composite key and players by (table key, seat), so
/// a renamed player in the same seat only shows up if the chips moved too.
pub fn diff_snapshots(
    previous: &[Table],
    current: &[Table],
    detected_at: DateTime<Utc>,
) -> ChangeSet {
    let previous_keys: HashSet<String> = previous.iter().map(Table::key).collect();
    let current_keys: HashSet<String> = current.iter().map(Table::key).collect();

    let added_tables: Vec<TableRef> = current
        .iter()
        .filter(|t| !previous_keys.contains(&t.key()))
        .map(TableRef::from)
        .collect();
    let removed_tables: Vec<TableRef> = previous
        .iter()
        .filter(|t| !current_keys.contains(&t.key()))
        .map(TableRef::from)
        .collect();

    let (previous_order, previous_seats) = index_seats(previous);
    let (current_order, current_seats) = index_seats(current);

    let mut added_players = Vec::new();
    let mut chip_changes = Vec::new();
    for id in &current_order {
        let (table, player) = current_seats[id];
        match previous_seats.get(id) {
            None => added_players.push(PlayerRef::new(table, player)),
            Some((_, before)) => {
                let delta = player.chips - before.chips;
                if delta != 0.0 {
                    chip_changes.push(ChipChange {
                        table_key: id.0.clone(),
                        room: table.room.clone(),
                        table_label: table.table_label.clone(),
                        table_number: table.table_number.clone(),
                        seat: player.seat,
                        player_name: player.name.clone(),
                        old_chips: before.chips,
                        new_chips: player.chips,
                        delta,
                    });
                }
            }
        }
    }

    let removed_players: Vec<PlayerRef> = previous_order
        .iter()
        .filter(|id| !current_seats.contains_key(*id))
        .map(|id| {
            let (table, player) = previous_seats[id];
            PlayerRef::new(table, player)
        })
        .collect();

    let has_changes = !added_tables.is_empty()
        || !removed_tables.is_empty()
        || !added_players.is_empty()
        || !removed_players.is_empty()
        || !chip_changes.is_empty();

    ChangeSet {
        detected_at,
        added_tables,
        removed_tables,
        added_players,
        removed_players,
        chip_changes,
        has_changes,
    }
}

//! Derived views over a table set: search matches and aggregate stats.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Player, Table};

/// How many nationalities `TableStats` reports.
const TOP_NATIONALITIES: usize = 10;

const UNKNOWN_NATIONALITY: &str = "UNKNOWN";

/// A player found by search, with its parent table's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatch {
    pub room: String,
    pub table_label: String,
    pub table_number: String,
    pub table_key: String,
    pub player: Player,
}

impl PlayerMatch {
    pub fn new(table: &Table, player: &Player) -> Self {
        Self {
            room: table.room.clone(),
            table_label: table.table_label.clone(),
            table_number: table.table_number.clone(),
            table_key: table.key(),
            player: player.clone(),
        }
    }

    /// Case-insensitive substring search on player names.
    ///
    /// A blank needle matches nothing rather than everyone.
    pub fn search(tables: &[Table], needle: &str) -> Vec<PlayerMatch> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        tables
            .iter()
            .flat_map(|table| {
                table
                    .players
                    .iter()
                    .filter(|p| p.name.to_lowercase().contains(&needle))
                    .map(move |p| PlayerMatch::new(table, p))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalityCount {
    pub nationality: String,
    pub count: usize,
}

/// Aggregate counts over a table set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableStats {
    pub table_count: usize,
    pub player_count: usize,
    pub key_player_count: usize,
    /// Top nationalities by player count, largest first.
    pub nationalities: Vec<NationalityCount>,
    pub total_chips: f64,
    pub average_chips: f64,
    pub chip_leader: Option<PlayerMatch>,
}

impl TableStats {
    pub fn from_tables(tables: &[Table]) -> Self {
        let mut stats = TableStats {
            table_count: tables.len(),
            ..Default::default()
        };

        let mut by_nationality: HashMap<String, usize> = HashMap::new();
        let mut leader: Option<(&Table, &Player)> = None;

        for table in tables {
            for player in &table.players {
                stats.player_count += 1;
                stats.total_chips += player.chips;
                if player.key_player {
                    stats.key_player_count += 1;
                }

                let code = if player.nationality.is_empty() {
                    UNKNOWN_NATIONALITY.to_string()
                } else {
                    player.nationality.to_uppercase()
                };
                *by_nationality.entry(code).or_insert(0) += 1;

                // Ties keep the first player seen
                if leader.map(|(_, p)| player.chips > p.chips).unwrap_or(true) {
                    leader = Some((table, player));
                }
            }
        }

        if stats.player_count > 0 {
            stats.average_chips = stats.total_chips / stats.player_count as f64;
        }
        stats.chip_leader = leader.map(|(t, p)| PlayerMatch::new(t, p));

        let mut nationalities: Vec<NationalityCount> = by_nationality
            .into_iter()
            .map(|(nationality, count)| NationalityCount { nationality, count })
            .collect();
        nationalities.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.nationality.cmp(&b.nationality))
        });
        nationalities.truncate(TOP_NATIONALITIES);
        stats.nationalities = nationalities;

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Table> {
        vec![
            Table::new("RoomA", "T1", "1")
                .with_player(Player::new(1, "Alice Park", "KOR", 2000.0).with_key_player(true))
                .with_player(Player::new(2, "Bob", "usa", 1500.0)),
            Table::new("RoomB", "T2", "")
                .with_player(Player::new(4, "Carol", "KOR", 5000.0))
                .with_player(Player::new(5, "Dan Parker", "", 500.0)),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let matches = PlayerMatch::search(&sample(), "PARK");
        let names: Vec<_> = matches.iter().map(|m| m.player.name.as_str()).collect();
        assert_eq!(names, vec!["Alice Park", "Dan Parker"]);
        assert_eq!(matches[0].table_key, "RoomA_T1_1");
        assert_eq!(matches[1].room, "RoomB");
    }

    #[test]
    fn test_search_blank_needle() {
        assert!(PlayerMatch::search(&sample(), "   ").is_empty());
        assert!(PlayerMatch::search(&[], "alice").is_empty());
    }

    #[test]
    fn test_stats_from_tables() {
        let stats = TableStats::from_tables(&sample());

        assert_eq!(stats.table_count, 2);
        assert_eq!(stats.player_count, 4);
        assert_eq!(stats.key_player_count, 1);
        assert_eq!(stats.total_chips, 9000.0);
        assert_eq!(stats.average_chips, 2250.0);
        assert_eq!(stats.chip_leader.as_ref().map(|m| m.player.name.as_str()), Some("Carol"));
        assert_eq!(
            stats.nationalities,
            vec![
                NationalityCount { nationality: "KOR".to_string(), count: 2 },
                NationalityCount { nationality: "UNKNOWN".to_string(), count: 1 },
                NationalityCount { nationality: "USA".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_stats_empty() {
        let stats = TableStats::from_tables(&[]);
        assert_eq!(stats, TableStats::default());
    }
}

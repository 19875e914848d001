use std::collections::HashMap;

use tracing::{debug, trace};

use crate::models::row::col;
use crate::models::{Cell, Player, RawRow, RowRecord, Table, COLUMN_COUNT};

const ROOM_LABELS: &[&str] = &["room", "poker room", "room name"];
const TABLE_LABELS: &[&str] = &["table", "table name", "table label"];
const TABLE_NUMBER_LABELS: &[&str] =
    &["table no", "table no.", "table number", "table #", "no", "no."];
const SEAT_LABELS: &[&str] = &["seat", "seat no", "seat no.", "seat number", "seat #"];
const PLAYER_LABELS: &[&str] = &["player", "players", "player name", "name"];
const NATIONALITY_LABELS: &[&str] = &["nationality", "country", "nation"];
const CHIPS_LABELS: &[&str] = &["chips", "chip count", "chipcount", "stack"];

fn matches_label(cell: Option<&Cell>, labels: &[&str]) -> bool {
    cell.map(|c| {
        let text = c.trimmed().to_lowercase();
        labels.iter().any(|label| *label == text)
    })
    .unwrap_or(false)
}

/// Whether a row looks like a header row.
///
/// Headers occasionally reappear mid-sheet, so three independent signatures
/// are checked: room/table in the first two columns, player/nationality/chips
/// in columns 4-6 (chips only when present), and table number/seat in
/// columns 2-3.
pub fn is_header_row(row: &[Cell]) -> bool {
    let leading = matches_label(row.get(col::ROOM), ROOM_LABELS)
        && matches_label(row.get(col::TABLE_LABEL), TABLE_LABELS);

    let player_block = matches_label(row.get(col::NAME), PLAYER_LABELS)
        && matches_label(row.get(col::NATIONALITY), NATIONALITY_LABELS)
        && (row.len() <= col::CHIPS || matches_label(row.get(col::CHIPS), CHIPS_LABELS));

    let numbering = matches_label(row.get(col::TABLE_NUMBER), TABLE_NUMBER_LABELS)
        && matches_label(row.get(col::SEAT), SEAT_LABELS);

    leading || player_block || numbering
}

/// Parse a seat cell: strips one leading `#` and reads the leading integer.
/// Unparsable values become 0 so the row still yields a player.
pub fn parse_seat(cell: &Cell) -> i32 {
    if let Cell::Number(n) = cell {
        return if n.is_finite() { n.trunc() as i32 } else { 0 };
    }

    let text = cell.trimmed();
    let text = text.strip_prefix('#').unwrap_or(&text).trim_start();

    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        if ch.is_ascii_digit() || (idx == 0 && (ch == '-' || ch == '+')) {
            end = idx + ch.len_utf8();
        } else {
            break;
        }
    }

    text[..end].parse::<i32>().unwrap_or(0)
}

/// Parse a chip count: thousands separators are removed, failures become 0.
pub fn parse_chips(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) if n.is_finite() => *n,
        Cell::Text(s) => {
            let cleaned: String = s.chars().filter(|c| *c != ',').collect();
            cleaned
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Key-player flag: boolean `true`, or the text `true`/`1` in any case.
pub fn parse_key_player(cell: &Cell) -> bool {
    match cell {
        Cell::Bool(b) => *b,
        other => {
            let text = other.trimmed();
            text.eq_ignore_ascii_case("true") || text == "1"
        }
    }
}

/// Normalize raw rows into tables, in first-seen order.
///
/// Malformed rows are skipped; this never fails.
pub fn from_rows(rows: &[RawRow]) -> Vec<Table> {
    let mut tables: Vec<Table> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;

    for (row_idx, row) in rows.iter().enumerate() {
        if is_header_row(row) {
            trace!(row = row_idx, "Skipping header row");
            skipped += 1;
            continue;
        }

        let record = match RowRecord::from_cells(row) {
            Some(record) => record,
            None => {
                trace!(row = row_idx, cells = row.len(), "Skipping short row");
                skipped += 1;
                continue;
            }
        };

        if !record.has_identity() {
            trace!(row = row_idx, "Skipping row without room, table or player name");
            skipped += 1;
            continue;
        }

        let key_player = if row.len() >= COLUMN_COUNT {
            parse_key_player(&record.key_player)
        } else {
            false
        };

        let player = Player {
            seat: parse_seat(&record.seat),
            name: record.name.clone(),
            nationality: record.nationality.clone(),
            chips: parse_chips(&record.chips),
            key_player,
        };

        let key = record.table_key();
        let idx = *index_by_key.entry(key).or_insert_with(|| {
            tables.push(Table::new(
                record.room.clone(),
                record.table_label.clone(),
                record.table_number.clone(),
            ));
            tables.len() - 1
        });
        tables[idx].players.push(player);
    }

    if skipped > 0 {
        debug!(total = rows.len(), skipped, tables = tables.len(), "Normalized rows with skips");
    }

    tables
}

/// Flatten tables into backend rows, one per player.
pub fn to_rows(tables: &[Table]) -> Vec<RawRow> {
    tables
        .iter()
        .flat_map(|table| {
            table.players.iter().map(move |player| {
                vec![
                    Cell::Text(table.room.clone()),
                    Cell::Text(table.table_label.clone()),
                    Cell::Text(table.table_number.clone()),
                    Cell::from(player.seat),
                    Cell::Text(player.name.clone()),
                    Cell::Text(player.nationality.clone()),
                    Cell::Number(player.chips),
                    Cell::Bool(player.key_player),
                ]
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[Cell]) -> RawRow {
        cells.to_vec()
    }

    fn sample_rows() -> Vec<RawRow> {
        vec![
            row(&[
                "RoomA".into(),
                "T1".into(),
                "1".into(),
                1.into(),
                "Alice".into(),
                "USA".into(),
                2000.into(),
                true.into(),
            ]),
            row(&[
                "RoomA".into(),
                "T1".into(),
                "1".into(),
                2.into(),
                "Bob".into(),
                "KOR".into(),
                1500.into(),
                false.into(),
            ]),
        ]
    }

    #[test]
    fn test_from_rows_example() {
        let tables = from_rows(&sample_rows());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].key(), "RoomA_T1_1");
        assert_eq!(tables[0].players.len(), 2);
        assert_eq!(tables[0].players[0].name, "Alice");
        assert!(tables[0].players[0].key_player);
        assert_eq!(tables[0].players[1].chips, 1500.0);
        assert!(!tables[0].players[1].key_player);
    }

    #[test]
    fn test_round_trip() {
        let tables = vec![
            Table::new("RoomA", "T1", "1")
                .with_player(Player::new(1, "Alice", "USA", 2000.0).with_key_player(true))
                .with_player(Player::new(2, "Bob", "KOR", 1500.5)),
            Table::new("RoomB", "Final", "9").with_player(Player::new(9, "Chloe", "", 0.0)),
        ];
        let restored = from_rows(&to_rows(&tables));
        assert_eq!(restored, tables);
    }

    #[test]
    fn test_header_rows_are_ignored_anywhere() {
        let headers = [
            row(&[
                "Room".into(),
                "Table".into(),
                "".into(),
                "".into(),
                "".into(),
                "".into(),
                "".into(),
                "".into(),
            ]),
            row(&[
                "x".into(),
                "y".into(),
                "z".into(),
                "w".into(),
                "Player".into(),
                "Nationality".into(),
                "Chips".into(),
                "".into(),
            ]),
            row(&[
                "x".into(),
                "y".into(),
                "Table No".into(),
                "Seat".into(),
                "p".into(),
                "q".into(),
            ]),
            row(&[
                " ROOM ".into(),
                "table".into(),
                "No".into(),
                "Seat".into(),
                "Name".into(),
                "Country".into(),
                "Stack".into(),
                "Key".into(),
            ]),
        ];
        let expected = from_rows(&sample_rows());

        for header in headers {
            for position in 0..=2 {
                let mut rows = sample_rows();
                rows.insert(position, header.clone());
                assert_eq!(from_rows(&rows), expected, "header {:?} at {}", header, position);
            }
        }
    }

    #[test]
    fn test_short_rows_are_ignored() {
        let mut rows = sample_rows();
        rows.insert(1, row(&["RoomA".into(), "T1".into(), "1".into(), 3.into(), "Carl".into()]));
        rows.push(Vec::new());
        assert_eq!(from_rows(&rows), from_rows(&sample_rows()));
    }

    #[test]
    fn test_six_and_seven_column_rows_are_padded() {
        let rows = vec![
            row(&["RoomA".into(), "T1".into(), "1".into(), 1.into(), "Alice".into(), "USA".into()]),
            row(&[
                "RoomA".into(),
                "T1".into(),
                "1".into(),
                2.into(),
                "Bob".into(),
                "KOR".into(),
                "1,500".into(),
            ]),
        ];
        let tables = from_rows(&rows);
        assert_eq!(tables[0].players[0].chips, 0.0);
        assert!(!tables[0].players[0].key_player);
        assert_eq!(tables[0].players[1].chips, 1500.0);
        assert!(!tables[0].players[1].key_player);
    }

    #[test]
    fn test_rows_missing_identity_are_dropped() {
        let rows = vec![
            row(&["".into(), "T1".into(), "1".into(), 1.into(), "Alice".into(), "USA".into()]),
            row(&["RoomA".into(), " ".into(), "1".into(), 1.into(), "Alice".into(), "USA".into()]),
            row(&["RoomA".into(), "T1".into(), "1".into(), 1.into(), Cell::Null, "USA".into()]),
            row(&["RoomA".into(), "T1".into(), "".into(), 1.into(), "Dana".into(), "".into()]),
        ];
        let tables = from_rows(&rows);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].key(), "RoomA_T1_");
        assert_eq!(tables[0].players[0].name, "Dana");
    }

    #[test]
    fn test_tables_keep_first_seen_order() {
        let rows = vec![
            row(&["RoomB".into(), "T2".into(), "2".into(), 1.into(), "Eve".into(), "FRA".into()]),
            row(&["RoomA".into(), "T1".into(), "1".into(), 4.into(), "Zed".into(), "USA".into()]),
            row(&["RoomB".into(), "T2".into(), "2".into(), 3.into(), "Abe".into(), "JPN".into()]),
        ];
        let tables = from_rows(&rows);
        assert_eq!(
            tables.iter().map(|t| t.key()).collect::<Vec<_>>(),
            vec!["RoomB_T2_2", "RoomA_T1_1"]
        );
        let seats: Vec<i32> = tables[0].players.iter().map(|p| p.seat).collect();
        assert_eq!(seats, vec![1, 3]);
    }

    #[test]
    fn test_parse_seat() {
        assert_eq!(parse_seat(&Cell::from("#3")), 3);
        assert_eq!(parse_seat(&Cell::from(" 7 ")), 7);
        assert_eq!(parse_seat(&Cell::from("# 5")), 5);
        assert_eq!(parse_seat(&Cell::from("4b")), 4);
        assert_eq!(parse_seat(&Cell::Number(2.0)), 2);
        assert_eq!(parse_seat(&Cell::from("seat")), 0);
        assert_eq!(parse_seat(&Cell::from("")), 0);
        assert_eq!(parse_seat(&Cell::Null), 0);
    }

    #[test]
    fn test_parse_chips() {
        assert_eq!(parse_chips(&Cell::from("12,500")), 12500.0);
        assert_eq!(parse_chips(&Cell::from("1,234.5")), 1234.5);
        assert_eq!(parse_chips(&Cell::Number(800.0)), 800.0);
        assert_eq!(parse_chips(&Cell::from("")), 0.0);
        assert_eq!(parse_chips(&Cell::from("lots")), 0.0);
        assert_eq!(parse_chips(&Cell::Bool(true)), 0.0);
    }

    #[test]
    fn test_parse_key_player() {
        assert!(parse_key_player(&Cell::Bool(true)));
        assert!(parse_key_player(&Cell::from("TRUE")));
        assert!(parse_key_player(&Cell::from("true")));
        assert!(parse_key_player(&Cell::from("1")));

        assert!(!parse_key_player(&Cell::Bool(false)));
        assert!(!parse_key_player(&Cell::from("FALSE")));
        assert!(!parse_key_player(&Cell::from("")));
        assert!(!parse_key_player(&Cell::from("yes")));
        assert!(!parse_key_player(&Cell::Null));
    }

    #[test]
    fn test_key_player_absent_column_is_false() {
        let rows = vec![row(&[
            "RoomA".into(),
            "T1".into(),
            "1".into(),
            1.into(),
            "Alice".into(),
            "USA".into(),
            10.into(),
        ])];
        assert!(!from_rows(&rows)[0].players[0].key_player);
    }
}

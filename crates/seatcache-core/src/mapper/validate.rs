use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::Table;

pub const MIN_SEAT: i32 = 1;
pub const MAX_SEAT: i32 = 9;

/// Outcome of pre-write validation. Warnings never affect `valid`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.errors.is_empty() {
            write!(f, "valid")
        } else {
            write!(f, "{}", self.errors.join("; "))
        }
    }
}

/// Check tables before they are written upstream.
pub fn validate(tables: &[Table]) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (idx, table) in tables.iter().enumerate() {
        let label = if table.table_label.trim().is_empty() {
            format!("table #{}", idx + 1)
        } else {
            format!("table {}", table.table_label)
        };

        if table.room.trim().is_empty() {
            errors.push(format!("{}: room is required", label));
        }
        if table.table_label.trim().is_empty() {
            errors.push(format!("{}: table label is required", label));
        }
        if table.table_number.trim().is_empty() {
            warnings.push(format!("{}: table number is missing", label));
        }

        let mut seats = HashSet::new();
        for player in &table.players {
            if player.name.trim().is_empty() {
                warnings.push(format!("{}: player at seat {} has no name", label, player.seat));
            }
            if !(MIN_SEAT..=MAX_SEAT).contains(&player.seat) {
                errors.push(format!(
                    "{}: invalid seat number {} (expected {}-{})",
                    label, player.seat, MIN_SEAT, MAX_SEAT
                ));
            }
            if player.chips < 0.0 {
                errors.push(format!(
                    "{}: player {} has negative chip count {}",
                    label, player.name, player.chips
                ));
            }
            if !seats.insert(player.seat) {
                errors.push(format!("{}: seat {} is occupied twice", label, player.seat));
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

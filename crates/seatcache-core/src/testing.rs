//! In-memory `TableSource` for cache and detector tests.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{Player, Table};
use crate::source::{ConnectionReport, SourceError, TableSource, Transport, WriteOutcome};

#[derive(Debug, Default)]
pub struct FakeSource {
    tables: Mutex<Vec<Table>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
    delay_ms: AtomicU64,
    writes: Mutex<Vec<Vec<Table>>>,
}

impl FakeSource {
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables: Mutex::new(tables),
            ..Default::default()
        }
    }

    pub fn set_tables(&self, tables: Vec<Table>) {
        *self.tables.lock().expect("fake source lock") = tables;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every fetch take this long.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<Table>> {
        self.writes.lock().expect("fake source lock").clone()
    }
}

#[async_trait]
impl TableSource for FakeSource {
    fn identity(&self) -> String {
        "fake-sheet".to_string()
    }

    async fn fetch_tables(&self, _range: &str) -> Result<Vec<Table>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Timeout);
        }
        Ok(self.tables.lock().expect("fake source lock").clone())
    }

    async fn write_tables(&self, tables: &[Table]) -> Result<WriteOutcome, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Timeout);
        }
        self.writes.lock().expect("fake source lock").push(tables.to_vec());
        Ok(WriteOutcome {
            transport: Transport::Direct,
            rows: tables.iter().map(|t| t.players.len()).sum(),
        })
    }

    async fn check_connection(&self) -> ConnectionReport {
        ConnectionReport {
            success: !self.failing.load(Ordering::SeqCst),
            proxy: None,
            direct: None,
            error: None,
        }
    }
}

/// RoomA / T1 #1 with Alice in seat 1 and Bob in seat 2.
pub fn sample_table() -> Table {
    Table::new("RoomA", "T1", "1")
        .with_player(Player::new(1, "Alice", "USA", 2000.0).with_key_player(true))
        .with_player(Player::new(2, "Bob", "KOR", 1500.0))
}

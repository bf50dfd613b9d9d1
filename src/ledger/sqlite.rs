//! SQLite-backed income ledger

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::income::IncomeRecord;
use crate::ledger::IncomeLedger;

/// Table names are interpolated into SQL, so only plain identifiers pass
pub fn validate_table_name(table: &str) -> Result<()> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = IDENT.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid regex"));
    if ident.is_match(table) {
        Ok(())
    } else {
        Err(Error::Config(format!("'{}' is not a valid table name", table)))
    }
}

/// Row as stored, before JSON columns are decoded
struct RawRow {
    chain_id: String,
    granter: String,
    old_balance: String,
    income: String,
    new_balance: String,
    date: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chain_id: row.get(0)?,
            granter: row.get(1)?,
            old_balance: row.get(2)?,
            income: row.get(3)?,
            new_balance: row.get(4)?,
            date: row.get(5)?,
        })
    }

    fn decode(self) -> Result<IncomeRecord> {
        Ok(IncomeRecord {
            chain_id: self.chain_id,
            granter: self.granter,
            old_balance: serde_json::from_str(&self.old_balance)?,
            income: serde_json::from_str(&self.income)?,
            new_balance: serde_json::from_str(&self.new_balance)?,
            date: parse_date(&self.date)?,
        })
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts RFC 3339 and SQLite's `CURRENT_TIMESTAMP` layout
fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Persistence(format!("Invalid stored date '{}': {}", raw, e)))
}

/// Ledger stored in a single SQLite table
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteLedger {
    /// Open (creating if needed) the database file and table
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::Persistence(format!("Failed to open {}: {}", path.display(), e)))?;
        let ledger = Self::from_connection(conn, table)?;
        info!("Income ledger ready at {} (table '{}')", path.display(), table);
        Ok(ledger)
    }

    /// Ledger backed by a private in-memory database
    pub fn open_in_memory(table: &str) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, table)
    }

    fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let ledger = Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        };
        ledger.ensure_schema()?;
        Ok(ledger)
    }

    fn ensure_schema(&self) -> Result<()> {
        let table = &self.table;
        self.with_connection(|conn| {
            conn.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    chain_id TEXT NOT NULL,
                    granter TEXT NOT NULL,
                    old_balance TEXT NOT NULL,
                    income TEXT NOT NULL,
                    new_balance TEXT NOT NULL,
                    date TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_date ON {table}(date);
                CREATE INDEX IF NOT EXISTS idx_{table}_chain ON {table}(chain_id, date);
                "#
            ))
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Persistence("Ledger connection lock poisoned".to_string()))?;
        f(&conn).map_err(Error::from)
    }

    fn insert_sync(&self, record: &IncomeRecord) -> Result<()> {
        let old_balance = serde_json::to_string(&record.old_balance)?;
        let income = serde_json::to_string(&record.income)?;
        let new_balance = serde_json::to_string(&record.new_balance)?;
        let date = format_date(&record.date);
        let sql = format!(
            "INSERT INTO {} (chain_id, granter, old_balance, income, new_balance, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            self.table
        );

        self.with_connection(|conn| {
            conn.execute(
                &sql,
                params![
                    record.chain_id,
                    record.granter,
                    old_balance,
                    income,
                    new_balance,
                    date
                ],
            )
        })?;

        debug!("Stored income record for {} at {}", record.chain_id, date);
        Ok(())
    }

    fn select_sync(&self, chain_id: Option<&str>) -> Result<Vec<IncomeRecord>> {
        let filter = if chain_id.is_some() { "WHERE chain_id = ?1" } else { "" };
        let sql = format!(
            "SELECT chain_id, granter, old_balance, income, new_balance, date FROM {} {} \
             ORDER BY date ASC, id ASC",
            self.table, filter
        );

        let rows = self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = match chain_id {
                Some(id) => stmt
                    .query_map(params![id], RawRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
                None => stmt
                    .query_map([], RawRow::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
            };
            Ok(rows)
        })?;

        rows.into_iter().map(RawRow::decode).collect()
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(SqliteLedger) -> Result<T> + Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(ledger))
            .await
            .map_err(|e| Error::Persistence(format!("Ledger task failed: {}", e)))?
    }
}

#[async_trait]
impl IncomeLedger for SqliteLedger {
    async fn append(&self, record: &IncomeRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |ledger| ledger.insert_sync(&record)).await
    }

    async fn list_all(&self) -> Result<Vec<IncomeRecord>> {
        self.blocking(|ledger| ledger.select_sync(None)).await
    }

    async fn list_by_chain(&self, chain_id: &str) -> Result<Vec<IncomeRecord>> {
        let chain_id = chain_id.to_string();
        self.blocking(move |ledger| ledger.select_sync(Some(&chain_id))).await
    }
}

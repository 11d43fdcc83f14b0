use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};

const DATE_FMT: &str = "%Y-%m-%d";

/// One monthly-poll entry. Plain data; persistence lives on SqliteStore.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub token_name: String,
    pub symbol: String,
    pub description: String,
    pub date_submitted: NaiveDate,
}

impl fmt::Display for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.token_name, self.symbol)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    path: String,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            anyhow::bail!("SQLITE_PATH is empty");
        }
        if path != ":memory:" && !path.starts_with("file:") {
            if let Some(parent) = Path::new(path).parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create sqlite parent dir for {path}"))?;
            }
        }

        // rusqlite::Connection is not Send/Sync. We keep only a path here
        // and open short-lived connections per operation; WAL keeps this
        // fast enough for a low-frequency poll table.
        Ok(Self {
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn open_conn(&self) -> Result<Connection> {
        let conn =
            Connection::open(&self.path).with_context(|| format!("open sqlite {}", self.path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    pub fn init_db(&self) -> Result<()> {
        let conn = self.open_conn()?;
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS monthly_submissions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  token_name TEXT NOT NULL,
  symbol TEXT NOT NULL,
  description TEXT NOT NULL,
  date_submitted TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_date ON monthly_submissions(date_submitted);
"#,
        )?;
        Ok(())
    }

    pub fn insert_submission(
        &self,
        token_name: &str,
        symbol: &str,
        description: &str,
        date_submitted: NaiveDate,
    ) -> Result<Submission> {
        let conn = self.open_conn()?;
        conn.execute(
            r#"
INSERT INTO monthly_submissions(token_name, symbol, description, date_submitted)
VALUES(?,?,?,?)
"#,
            params![
                token_name,
                symbol,
                description,
                date_submitted.format(DATE_FMT).to_string()
            ],
        )?;
        Ok(Submission {
            id: conn.last_insert_rowid(),
            token_name: token_name.to_string(),
            symbol: symbol.to_string(),
            description: description.to_string(),
            date_submitted,
        })
    }

    /// Whether a case-insensitive (token_name, symbol) pair was already
    /// submitted on or after the given date.
    pub fn submission_exists_since(
        &self,
        token_name: &str,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<bool> {
        let conn = self.open_conn()?;
        let count: i64 = conn.query_row(
            r#"
SELECT COUNT(*) FROM monthly_submissions
WHERE lower(token_name) = lower(?)
  AND lower(symbol) = lower(?)
  AND date_submitted >= ?
"#,
            params![token_name, symbol, since.format(DATE_FMT).to_string()],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// All submissions with date in the inclusive range, insertion order.
    pub fn find_submissions_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Submission>> {
        let conn = self.open_conn()?;
        let mut stmt = conn.prepare(
            r#"
SELECT id, token_name, symbol, description, date_submitted
FROM monthly_submissions
WHERE date_submitted >= ? AND date_submitted <= ?
ORDER BY id ASC
"#,
        )?;
        let mut rows = stmt.query(params![
            from.format(DATE_FMT).to_string(),
            to.format(DATE_FMT).to_string()
        ])?;

        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let raw_date: String = r.get(4)?;
            let date_submitted = NaiveDate::parse_from_str(&raw_date, DATE_FMT)
                .with_context(|| format!("bad date_submitted row value {raw_date}"))?;
            out.push(Submission {
                id: r.get(0)?,
                token_name: r.get(1)?,
                symbol: r.get(2)?,
                description: r.get(3)?,
                date_submitted,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    static STORE_SEQ: AtomicU64 = AtomicU64::new(0);

    /// Fresh store backed by a unique temp file; short-lived connections
    /// rule out `:memory:` here.
    pub(crate) fn temp_store() -> SqliteStore {
        let n = STORE_SEQ.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "marketbot-test-{}-{n}.sqlite",
            std::process::id()
        ));
        let store = SqliteStore::new(path.to_str().unwrap()).unwrap();
        store.init_db().unwrap();
        store
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn insert_and_find_in_inclusive_range() {
        let store = temp_store();
        store
            .insert_submission("Bitcoin", "BTC", "digital gold", date("2026-08-01"))
            .unwrap();
        store
            .insert_submission("Pepe", "PEPE", "memes", date("2026-08-06"))
            .unwrap();
        store
            .insert_submission("Old Coin", "OLD", "last month", date("2026-07-31"))
            .unwrap();

        let rows = store
            .find_submissions_in_range(date("2026-08-01"), date("2026-08-06"))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].token_name, "Bitcoin");
        assert_eq!(rows[1].to_string(), "Pepe (PEPE)");
    }

    #[test]
    fn exists_since_is_case_insensitive() {
        let store = temp_store();
        store
            .insert_submission("Bitcoin", "BTC", "x", date("2026-08-03"))
            .unwrap();

        assert!(store
            .submission_exists_since("bitcoin", "btc", date("2026-08-01"))
            .unwrap());
        assert!(!store
            .submission_exists_since("bitcoin", "btc", date("2026-08-04"))
            .unwrap());
        assert!(!store
            .submission_exists_since("Ethereum", "ETH", date("2026-08-01"))
            .unwrap());
    }
}

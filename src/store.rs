use crate::error::{Error, Result};
use crate::risk::RiskAssessment;
use crate::stats::{FeedbackSink, Outcome, StatsDelta, StatsSink, SystemStats};
use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

const INVOICES_ANALYZED: &str = "invoices_analyzed";
const RISKY_SHIPMENTS: &str = "risky_shipments";
const HOLDS_PREDICTED: &str = "holds_predicted";

/// SQLite-backed aggregate counters and outcome log.
///
/// The connection sits behind a mutex, so concurrent reporters are
/// serialized here and each delta lands in one transaction.
pub struct StatsStore {
    conn: Mutex<Connection>,
}

impl StatsStore {
    /// Open (or create) the store at `db_path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self::init(Connection::open(db_path)?)?;
        info!(path = %db_path.display(), "Stats store initialized");
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS system_stats (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS assessments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                invoice_id TEXT NOT NULL,
                risk_score INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                shipment_decision TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS outcome_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                invoice_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                recorded_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_assessments_invoice_id ON assessments(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_outcome_feedback_invoice_id ON outcome_feedback(invoice_id);",
        )?;

        for name in [INVOICES_ANALYZED, RISKY_SHIPMENTS, HOLDS_PREDICTED] {
            conn.execute(
                "INSERT OR IGNORE INTO system_stats (name, value) VALUES (?1, 0)",
                params![name],
            )?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Poisoned)
    }
}

fn increment(conn: &Connection, name: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE system_stats SET value = value + 1 WHERE name = ?1",
        params![name],
    )
}

impl StatsSink for StatsStore {
    fn record_analyzed(&self) -> Result<()> {
        let conn = self.conn()?;
        increment(&conn, INVOICES_ANALYZED)?;
        Ok(())
    }

    fn record_delta(&self, delta: StatsDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if delta.risky_shipment {
            increment(&tx, RISKY_SHIPMENTS)?;
        }
        if delta.hold_predicted {
            increment(&tx, HOLDS_PREDICTED)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn record_assessment(&self, invoice_id: &str, assessment: &RiskAssessment) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO assessments (invoice_id, risk_score, risk_level, shipment_decision)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                invoice_id,
                assessment.risk_score,
                assessment.risk_level.as_str(),
                assessment.shipment_decision.as_str(),
            ],
        )?;
        Ok(())
    }

    fn last_score(&self, invoice_id: &str) -> Result<Option<u32>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT risk_score FROM assessments WHERE invoice_id = ?1 ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![invoice_id])?;
        let score = match rows.next()? {
            Some(row) => Some(row.get::<_, u32>(0)?),
            None => None,
        };
        Ok(score)
    }

    fn snapshot(&self) -> Result<SystemStats> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name, value FROM system_stats")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = SystemStats::default();
        for row in rows {
            let (name, value) = row?;
            let value = u64::try_from(value).unwrap_or(0);
            match name.as_str() {
                INVOICES_ANALYZED => stats.invoices_analyzed = value,
                RISKY_SHIPMENTS => stats.risky_shipments = value,
                HOLDS_PREDICTED => stats.holds_predicted = value,
                other => warn!(name = %other, "Ignoring unknown counter"),
            }
        }
        Ok(stats)
    }
}

impl FeedbackSink for StatsStore {
    fn record_outcome(&self, invoice_id: &str, outcome: Outcome) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO outcome_feedback (invoice_id, outcome) VALUES (?1, ?2)",
            params![invoice_id, outcome.as_str()],
        )?;
        info!(invoice_id = %invoice_id, outcome = %outcome, "Outcome recorded");
        Ok(())
    }

    fn outcomes(&self, invoice_id: &str) -> Result<Vec<Outcome>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT outcome FROM outcome_feedback WHERE invoice_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![invoice_id], |row| row.get::<_, String>(0))?;

        let mut outcomes = Vec::new();
        for row in rows {
            let raw = row?;
            match raw.parse::<Outcome>() {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "Skipping unreadable outcome row"),
            }
        }
        Ok(outcomes)
    }
}

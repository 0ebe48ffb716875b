use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

// ── Schema ──

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS data (
            retrieved_at TEXT,
            url          TEXT,
            sign_uri     TEXT,
            reference_id TEXT,
            title        TEXT,
            principal    TEXT,
            closed_at    TEXT NULL,
            body         TEXT,
            signatures   TEXT,
            UNIQUE (reference_id, signatures)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS reference_id_signatures
            ON data (reference_id, signatures);
        ",
    )?;
    Ok(())
}

// ── Rows ──

/// A stored petition snapshot. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetitionRecord {
    pub retrieved_at: String,
    pub url: String,
    pub sign_uri: String,
    pub reference_id: String,
    pub title: String,
    pub principal: String,
    pub closed_at: String,
    pub body: String,
    pub signatures: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Skipped,
}

pub struct StoreStats {
    pub rows: usize,
    pub petitions: usize,
    pub last_retrieved: Option<String>,
}

// ── Store ──

/// Append-only petition table. (reference_id, signatures) is the version key.
pub struct DedupStore {
    conn: Connection,
}

impl DedupStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn exists(&self, reference_id: &str, signatures: &str) -> Result<bool> {
        let count: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM data WHERE reference_id = ?1 AND signatures = ?2",
            params![reference_id, signatures],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fails on a duplicate (reference_id, signatures); check `exists` first.
    pub fn insert(&self, r: &PetitionRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO data
                 (url, sign_uri, title, reference_id, principal, body, signatures, retrieved_at, closed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    r.url, r.sign_uri, r.title, r.reference_id, r.principal, r.body, r.signatures,
                    r.retrieved_at, r.closed_at,
                ],
            )
            .with_context(|| format!("Failed to insert petition {} ({})", r.reference_id, r.signatures))?;
        Ok(())
    }

    /// Check and insert in one transaction, committed before returning.
    pub fn record_if_new(&self, r: &PetitionRecord) -> Result<Outcome> {
        let tx = self.conn.unchecked_transaction()?;
        let outcome = if self.exists(&r.reference_id, &r.signatures)? {
            Outcome::Skipped
        } else {
            self.insert(r)?;
            Outcome::Inserted
        };
        tx.commit()?;
        Ok(outcome)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.conn.query_row("SELECT COUNT(*) FROM data", [], |r| r.get(0))?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let rows = self.count()?;
        let petitions: usize =
            self.conn
                .query_row("SELECT COUNT(DISTINCT reference_id) FROM data", [], |r| r.get(0))?;
        let last_retrieved: Option<String> =
            self.conn.query_row("SELECT MAX(retrieved_at) FROM data", [], |r| r.get(0))?;
        Ok(StoreStats {
            rows,
            petitions,
            last_retrieved,
        })
    }

    /// Every stored snapshot of one petition, oldest first.
    pub fn history(&self, reference_id: &str) -> Result<Vec<PetitionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT retrieved_at, url, sign_uri, reference_id, title, principal, closed_at, body, signatures
             FROM data WHERE reference_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([reference_id], |row| {
                Ok(PetitionRecord {
                    retrieved_at: row.get(0)?,
                    url: row.get(1)?,
                    sign_uri: row.get(2)?,
                    reference_id: row.get(3)?,
                    title: row.get(4)?,
                    principal: row.get(5)?,
                    closed_at: row.get(6)?,
                    body: row.get(7)?,
                    signatures: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ── Tests ──

#[cfg(test)]
pub(crate) fn sample_record(reference_id: &str, signatures: &str) -> PetitionRecord {
    PetitionRecord {
        retrieved_at: "2024-02-03T09:30:00+10:00".into(),
        url: format!("https://epetitions.brisbane.qld.gov.au/petition/view/pid/{}", reference_id),
        sign_uri: format!("https://www.epetitions.brisbane.qld.gov.au/petition/sign/pid/{}", reference_id),
        reference_id: reference_id.into(),
        title: "Fix the footpath".into(),
        principal: "Jane Citizen".into(),
        closed_at: "2024-01-01T00:00:00+10:00".into(),
        body: "Please fix it.".into(),
        signatures: signatures.into(),
    }
}

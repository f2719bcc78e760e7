pub mod aware;
pub mod domains;
pub mod instrument_groups;
pub mod instrument_notes;
pub mod instrument_status;
pub mod instruments;
pub mod measurements;
pub mod plot_configurations;
pub mod profiles;
pub mod projects;
pub mod timeseries;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Creator/updater stamps carried by every mutable entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditInfo {
    pub creator: Uuid,
    pub create_date: DateTime<Utc>,
    pub updater: Option<Uuid>,
    pub update_date: Option<DateTime<Utc>>,
}

impl AuditInfo {
    pub fn created_by(profile_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            creator: profile_id,
            create_date: at,
            updater: None,
            update_date: None,
        }
    }

    pub fn stamp_update(&mut self, profile_id: Uuid, at: DateTime<Utc>) {
        self.updater = Some(profile_id);
        self.update_date = Some(at);
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            creator: row.get("creator")?,
            create_date: row.get("create_date")?,
            updater: row.get("updater")?,
            update_date: row.get("update_date")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdAndSlug {
    pub id: Uuid,
    pub slug: String,
}

/// Open interval `(after, before)`; both bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

fn list_ids(conn: &Connection, sql: &str, owner: &Uuid) -> rusqlite::Result<Vec<Uuid>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt.query_map(params![owner], |row| row.get(0))?;
    ids.collect()
}

fn list_strings(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let values = stmt.query_map([], |row| row.get(0))?;
    values.collect()
}

/// Fails with `QueryReturnedNoRows` when a write matched nothing.
fn expect_affected(changed: usize) -> rusqlite::Result<()> {
    if changed == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}

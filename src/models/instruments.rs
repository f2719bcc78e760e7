use super::{expect_affected, list_strings, AuditInfo, IdAndSlug};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instrument {
    pub id: Uuid,
    #[serde(skip)]
    pub deleted: bool,
    pub slug: String,
    pub name: String,
    pub type_id: Uuid,
    #[serde(rename = "type", skip_deserializing)]
    pub type_name: String,
    pub project_id: Option<Uuid>,
    pub station: Option<i64>,
    #[serde(rename = "offset")]
    pub station_offset: Option<i64>,
    pub status_id: Option<Uuid>,
    #[serde(skip_deserializing)]
    pub status: Option<String>,
    pub status_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub audit: AuditInfo,
}

pub(crate) const INSTRUMENT_SQL: &str = "SELECT id, deleted, slug, name, type_id, type, project_id, station,
        station_offset, status_id, status, status_time, creator, create_date, updater, update_date
    FROM v_instrument";

pub(crate) fn instrument_from_row(row: &Row<'_>) -> rusqlite::Result<Instrument> {
    Ok(Instrument {
        id: row.get("id")?,
        deleted: row.get("deleted")?,
        slug: row.get("slug")?,
        name: row.get("name")?,
        type_id: row.get("type_id")?,
        type_name: row.get("type")?,
        project_id: row.get("project_id")?,
        station: row.get("station")?,
        station_offset: row.get("station_offset")?,
        status_id: row.get("status_id")?,
        status: row.get("status")?,
        status_time: row.get("status_time")?,
        audit: AuditInfo::from_row(row)?,
    })
}

pub(crate) fn query_instruments(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Instrument>> {
    let mut stmt = conn.prepare(sql)?;
    let ii = stmt.query_map(args, instrument_from_row)?;
    ii.collect()
}

pub fn list_instruments(conn: &Connection) -> rusqlite::Result<Vec<Instrument>> {
    query_instruments(conn, &format!("{} WHERE NOT deleted ORDER BY name", INSTRUMENT_SQL), [])
}

pub fn list_project_instruments(conn: &Connection, project_id: &Uuid) -> rusqlite::Result<Vec<Instrument>> {
    query_instruments(
        conn,
        &format!("{} WHERE project_id = ?1 AND NOT deleted ORDER BY name", INSTRUMENT_SQL),
        params![project_id],
    )
}

pub fn get_instrument(conn: &Connection, id: &Uuid) -> rusqlite::Result<Instrument> {
    conn.query_row(
        &format!("{} WHERE id = ?1", INSTRUMENT_SQL),
        params![id],
        instrument_from_row,
    )
}

pub fn instrument_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(id) FROM instrument WHERE NOT deleted", [], |row| row.get(0))
}

pub fn list_instrument_slugs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    list_strings(conn, "SELECT slug FROM instrument")
}

/// Upper-cased names of all instruments already in a project.
pub fn project_instrument_names(conn: &Connection, project_id: &Uuid) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM instrument WHERE project_id = ?1 AND NOT deleted")?;
    let names = stmt.query_map(params![project_id], |row| row.get::<_, String>(0))?;
    names.map(|n| n.map(|n| n.to_uppercase())).collect()
}

/// Inserts all instruments in one transaction. An instrument carrying a
/// `status_id` also gets its initial status row.
pub fn create_instruments(conn: &mut Connection, instruments: &[Instrument]) -> rusqlite::Result<Vec<IdAndSlug>> {
    let tx = conn.transaction()?;
    let mut created = Vec::with_capacity(instruments.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO instrument (id, slug, name, type_id, project_id, station, station_offset, creator, create_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        let mut insert_status = tx.prepare(
            "INSERT INTO instrument_status (id, instrument_id, status_id, time) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for i in instruments {
            let id = Uuid::new_v4();
            insert.execute(params![
                id,
                i.slug,
                i.name,
                i.type_id,
                i.project_id,
                i.station,
                i.station_offset,
                i.audit.creator,
                i.audit.create_date
            ])?;
            if let Some(status_id) = i.status_id {
                let time = i.status_time.unwrap_or(i.audit.create_date);
                insert_status.execute(params![Uuid::new_v4(), id, status_id, time])?;
            }
            created.push(IdAndSlug {
                id,
                slug: i.slug.clone(),
            });
        }
    }
    tx.commit()?;
    Ok(created)
}

pub fn update_instrument(conn: &Connection, i: &Instrument) -> rusqlite::Result<Instrument> {
    let changed = conn.execute(
        "UPDATE instrument
         SET name = ?2, type_id = ?3, project_id = ?4, station = ?5, station_offset = ?6,
             updater = ?7, update_date = ?8
         WHERE id = ?1 AND NOT deleted",
        params![
            i.id,
            i.name,
            i.type_id,
            i.project_id,
            i.station,
            i.station_offset,
            i.audit.updater,
            i.audit.update_date
        ],
    )?;
    expect_affected(changed)?;
    get_instrument(conn, &i.id)
}

pub fn delete_flag_instrument(conn: &Connection, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute("UPDATE instrument SET deleted = 1 WHERE id = ?1", params![id])?;
    expect_affected(changed)
}

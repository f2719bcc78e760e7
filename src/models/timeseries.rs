use super::{expect_affected, list_strings};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeseries {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub instrument_id: Uuid,
    #[serde(skip_deserializing)]
    pub instrument: String,
    pub parameter_id: Uuid,
    #[serde(skip_deserializing)]
    pub parameter: String,
    pub unit_id: Uuid,
    #[serde(skip_deserializing)]
    pub unit: String,
}

const TIMESERIES_SQL: &str = "SELECT T.id, T.slug, T.name, T.instrument_id, T.instrument,
        T.parameter_id, T.parameter, T.unit_id, T.unit
    FROM v_timeseries T";

fn timeseries_from_row(row: &Row<'_>) -> rusqlite::Result<Timeseries> {
    Ok(Timeseries {
        id: row.get("id")?,
        slug: row.get("slug")?,
        name: row.get("name")?,
        instrument_id: row.get("instrument_id")?,
        instrument: row.get("instrument")?,
        parameter_id: row.get("parameter_id")?,
        parameter: row.get("parameter")?,
        unit_id: row.get("unit_id")?,
        unit: row.get("unit")?,
    })
}

fn query_timeseries(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> rusqlite::Result<Vec<Timeseries>> {
    let mut stmt = conn.prepare(sql)?;
    let tt = stmt.query_map(args, timeseries_from_row)?;
    tt.collect()
}

pub fn list_timeseries(conn: &Connection) -> rusqlite::Result<Vec<Timeseries>> {
    query_timeseries(conn, &format!("{} ORDER BY T.name", TIMESERIES_SQL), [])
}

pub fn list_instrument_timeseries(conn: &Connection, instrument_id: &Uuid) -> rusqlite::Result<Vec<Timeseries>> {
    query_timeseries(
        conn,
        &format!("{} WHERE T.instrument_id = ?1 ORDER BY T.name", TIMESERIES_SQL),
        params![instrument_id],
    )
}

/// Timeseries promoted to the project level.
pub fn list_project_timeseries(conn: &Connection, project_id: &Uuid) -> rusqlite::Result<Vec<Timeseries>> {
    query_timeseries(
        conn,
        &format!(
            "{} INNER JOIN project_timeseries PT ON PT.timeseries_id = T.id
             WHERE PT.project_id = ?1 ORDER BY T.name",
            TIMESERIES_SQL
        ),
        params![project_id],
    )
}

pub fn get_timeseries(conn: &Connection, id: &Uuid) -> rusqlite::Result<Timeseries> {
    conn.query_row(
        &format!("{} WHERE T.id = ?1", TIMESERIES_SQL),
        params![id],
        timeseries_from_row,
    )
}

pub fn list_timeseries_slugs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    list_strings(conn, "SELECT slug FROM timeseries")
}

pub fn create_timeseries(conn: &mut Connection, items: &[Timeseries]) -> rusqlite::Result<Vec<Timeseries>> {
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(items.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO timeseries (id, slug, name, instrument_id, parameter_id, unit_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for t in items {
            let id = Uuid::new_v4();
            insert.execute(params![id, t.slug, t.name, t.instrument_id, t.parameter_id, t.unit_id])?;
            ids.push(id);
        }
    }
    let created = ids
        .iter()
        .map(|id| get_timeseries(&tx, id))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    tx.commit()?;
    Ok(created)
}

pub fn update_timeseries(conn: &Connection, t: &Timeseries) -> rusqlite::Result<Timeseries> {
    let changed = conn.execute(
        "UPDATE timeseries SET name = ?2, instrument_id = ?3, parameter_id = ?4, unit_id = ?5 WHERE id = ?1",
        params![t.id, t.name, t.instrument_id, t.parameter_id, t.unit_id],
    )?;
    expect_affected(changed)?;
    get_timeseries(conn, &t.id)
}

/// Deletes a timeseries along with its measurements and associations.
pub fn delete_timeseries(conn: &Connection, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute("DELETE FROM timeseries WHERE id = ?1", params![id])?;
    expect_affected(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::fixtures;

    #[test]
    fn created_timeseries_resolves_names() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let i = fixtures::instrument(&mut conn, creator, None, "Staff Gage 4");
        let id = fixtures::timeseries(&mut conn, i, "Staff Gage 4 Stage");

        let t = get_timeseries(&conn, &id).unwrap();
        assert_eq!(t.instrument, "Staff Gage 4");
        assert_eq!(t.parameter, "stage");
        assert_eq!(t.unit, "Feet");
        assert_eq!(list_instrument_timeseries(&conn, &i).unwrap(), vec![t]);
    }

    #[test]
    fn update_switches_unit() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let i = fixtures::instrument(&mut conn, creator, None, "Unit Switch");
        let id = fixtures::timeseries(&mut conn, i, "Unit Switch Stage");

        let mut t = get_timeseries(&conn, &id).unwrap();
        t.unit_id = db::UNIT_METERS;
        assert_eq!(update_timeseries(&conn, &t).unwrap().unit, "Meters");
    }

    #[test]
    fn delete_cascades_to_project_level() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let p = fixtures::project(&mut conn, creator, "Cascade");
        let i = fixtures::instrument(&mut conn, creator, Some(p), "Cascade Gage");
        let id = fixtures::timeseries(&mut conn, i, "Cascade Stage");
        crate::models::projects::create_project_timeseries(&conn, &p, &id).unwrap();
        assert_eq!(list_project_timeseries(&conn, &p).unwrap().len(), 1);

        delete_timeseries(&conn, &id).unwrap();
        assert!(list_project_timeseries(&conn, &p).unwrap().is_empty());
        assert!(list_timeseries(&conn).unwrap().is_empty());
    }

    #[test]
    fn deleting_unknown_timeseries_is_not_found() {
        let conn = fixtures::conn();
        assert!(matches!(
            delete_timeseries(&conn, &Uuid::new_v4()),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }
}

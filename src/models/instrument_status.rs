use super::expect_affected;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A status an instrument held starting at `time`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentStatus {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub status_id: Uuid,
    #[serde(skip_deserializing)]
    pub status: String,
}

const INSTRUMENT_STATUS_SQL: &str = "SELECT S.id, S.time, S.status_id, D.name AS status
    FROM instrument_status S
    INNER JOIN status D ON D.id = S.status_id";

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<InstrumentStatus> {
    Ok(InstrumentStatus {
        id: row.get("id")?,
        time: row.get("time")?,
        status_id: row.get("status_id")?,
        status: row.get("status")?,
    })
}

pub fn list_instrument_status(conn: &Connection, instrument_id: &Uuid) -> rusqlite::Result<Vec<InstrumentStatus>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE S.instrument_id = ?1 ORDER BY S.time DESC",
        INSTRUMENT_STATUS_SQL
    ))?;
    let ss = stmt.query_map(params![instrument_id], status_from_row)?;
    ss.collect()
}

/// A status row, provided it belongs to `instrument_id`.
pub fn get_instrument_status(conn: &Connection, instrument_id: &Uuid, id: &Uuid) -> rusqlite::Result<InstrumentStatus> {
    conn.query_row(
        &format!("{} WHERE S.id = ?1 AND S.instrument_id = ?2", INSTRUMENT_STATUS_SQL),
        params![id, instrument_id],
        status_from_row,
    )
}

/// Writes every status in one transaction. A status at a time the
/// instrument already has a row for replaces that row's status.
pub fn create_or_update_instrument_status(
    conn: &mut Connection,
    instrument_id: &Uuid,
    statuses: &[InstrumentStatus],
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare(
            "INSERT INTO instrument_status (id, instrument_id, status_id, time) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (instrument_id, time) DO UPDATE SET status_id = excluded.status_id",
        )?;
        for s in statuses {
            upsert.execute(params![s.id, instrument_id, s.status_id, s.time])?;
        }
    }
    tx.commit()
}

pub fn delete_instrument_status(conn: &Connection, instrument_id: &Uuid, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute(
        "DELETE FROM instrument_status WHERE id = ?1 AND instrument_id = ?2",
        params![id, instrument_id],
    )?;
    expect_affected(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::fixtures;
    use chrono::TimeZone;

    fn status(status_id: Uuid, day: u32) -> InstrumentStatus {
        InstrumentStatus {
            id: Uuid::new_v4(),
            time: Utc.with_ymd_and_hms(2022, 6, day, 0, 0, 0).unwrap(),
            status_id,
            status: String::new(),
        }
    }

    #[test]
    fn same_time_replaces_status() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let i = fixtures::instrument(&mut conn, creator, None, "Status Subject");

        create_or_update_instrument_status(
            &mut conn,
            &i,
            &[status(db::STATUS_ACTIVE, 1), status(db::STATUS_INACTIVE, 5)],
        )
        .unwrap();
        create_or_update_instrument_status(&mut conn, &i, &[status(db::STATUS_DESTROYED, 5)]).unwrap();

        let ss = list_instrument_status(&conn, &i).unwrap();
        let names: Vec<&str> = ss.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(names, ["destroyed", "active"]);
    }

    #[test]
    fn delete_removes_single_row() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let i = fixtures::instrument(&mut conn, creator, None, "Status Delete");
        let s = status(db::STATUS_ACTIVE, 2);
        create_or_update_instrument_status(&mut conn, &i, &[s.clone()]).unwrap();

        assert_eq!(get_instrument_status(&conn, &i, &s.id).unwrap().status, "active");
        delete_instrument_status(&conn, &i, &s.id).unwrap();
        assert!(list_instrument_status(&conn, &i).unwrap().is_empty());
        assert!(matches!(
            delete_instrument_status(&conn, &i, &s.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }

    #[test]
    fn rows_are_scoped_to_their_instrument() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let owner = fixtures::instrument(&mut conn, creator, None, "Status Owner");
        let other = fixtures::instrument(&mut conn, creator, None, "Status Other");
        let s = status(db::STATUS_ACTIVE, 3);
        create_or_update_instrument_status(&mut conn, &owner, &[s.clone()]).unwrap();

        assert!(matches!(
            get_instrument_status(&conn, &other, &s.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
        assert!(matches!(
            delete_instrument_status(&conn, &other, &s.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
        assert_eq!(list_instrument_status(&conn, &owner).unwrap().len(), 1);
    }

    #[test]
    fn unknown_status_rolls_back_batch() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let i = fixtures::instrument(&mut conn, creator, None, "Status Rollback");

        let result = create_or_update_instrument_status(
            &mut conn,
            &i,
            &[status(db::STATUS_ACTIVE, 1), status(Uuid::new_v4(), 2)],
        );
        assert!(result.is_err());
        assert!(list_instrument_status(&conn, &i).unwrap().is_empty());
    }
}

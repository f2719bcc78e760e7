use super::{expect_affected, AuditInfo};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentNote {
    pub id: Uuid,
    pub instrument_id: Uuid,
    pub title: String,
    pub body: String,
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub audit: AuditInfo,
}

const INSTRUMENT_NOTE_SQL: &str = "SELECT N.id, N.instrument_id, N.title, N.body, N.time,
        N.creator, N.create_date, N.updater, N.update_date
    FROM instrument_note N";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<InstrumentNote> {
    Ok(InstrumentNote {
        id: row.get("id")?,
        instrument_id: row.get("instrument_id")?,
        title: row.get("title")?,
        body: row.get("body")?,
        time: row.get("time")?,
        audit: AuditInfo::from_row(row)?,
    })
}

pub fn list_instrument_notes(conn: &Connection) -> rusqlite::Result<Vec<InstrumentNote>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY N.time DESC", INSTRUMENT_NOTE_SQL))?;
    let nn = stmt.query_map([], note_from_row)?;
    nn.collect()
}

pub fn list_instrument_instrument_notes(
    conn: &Connection,
    instrument_id: &Uuid,
) -> rusqlite::Result<Vec<InstrumentNote>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE N.instrument_id = ?1 ORDER BY N.time DESC",
        INSTRUMENT_NOTE_SQL
    ))?;
    let nn = stmt.query_map(params![instrument_id], note_from_row)?;
    nn.collect()
}

pub fn get_instrument_note(conn: &Connection, id: &Uuid) -> rusqlite::Result<InstrumentNote> {
    conn.query_row(
        &format!("{} WHERE N.id = ?1", INSTRUMENT_NOTE_SQL),
        params![id],
        note_from_row,
    )
}

/// Inserts every note in one transaction and returns them with fresh ids.
pub fn create_instrument_notes(
    conn: &mut Connection,
    notes: &[InstrumentNote],
) -> rusqlite::Result<Vec<InstrumentNote>> {
    let tx = conn.transaction()?;
    let mut created = Vec::with_capacity(notes.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO instrument_note (id, instrument_id, title, body, time, creator, create_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for n in notes {
            let note = InstrumentNote {
                id: Uuid::new_v4(),
                ..n.clone()
            };
            insert.execute(params![
                note.id,
                note.instrument_id,
                note.title,
                note.body,
                note.time,
                note.audit.creator,
                note.audit.create_date
            ])?;
            created.push(note);
        }
    }
    tx.commit()?;
    Ok(created)
}

pub fn update_instrument_note(conn: &Connection, n: &InstrumentNote) -> rusqlite::Result<InstrumentNote> {
    let changed = conn.execute(
        "UPDATE instrument_note
         SET title = ?2, body = ?3, time = ?4, updater = ?5, update_date = ?6
         WHERE id = ?1",
        params![n.id, n.title, n.body, n.time, n.audit.updater, n.audit.update_date],
    )?;
    expect_affected(changed)?;
    get_instrument_note(conn, &n.id)
}

pub fn delete_instrument_note(conn: &Connection, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute("DELETE FROM instrument_note WHERE id = ?1", params![id])?;
    expect_affected(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::TimeZone;

    fn note(instrument_id: Uuid, creator: Uuid, title: &str, hour: u32) -> InstrumentNote {
        InstrumentNote {
            instrument_id,
            title: title.into(),
            body: format!("{} body", title),
            time: Utc.with_ymd_and_hms(2023, 3, 1, hour, 0, 0).unwrap(),
            audit: AuditInfo::created_by(creator, Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn notes_are_listed_newest_first() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let a = fixtures::instrument(&mut conn, creator, None, "Noted A");
        let b = fixtures::instrument(&mut conn, creator, None, "Noted B");

        create_instrument_notes(
            &mut conn,
            &[note(a, creator, "first", 8), note(a, creator, "second", 9), note(b, creator, "other", 10)],
        )
        .unwrap();

        let titles: Vec<String> = list_instrument_instrument_notes(&conn, &a)
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(titles, ["second", "first"]);
        assert_eq!(list_instrument_notes(&conn).unwrap().len(), 3);
    }

    #[test]
    fn update_and_delete() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let a = fixtures::instrument(&mut conn, creator, None, "Edited");
        let mut n = create_instrument_notes(&mut conn, &[note(a, creator, "draft", 8)])
            .unwrap()
            .remove(0);

        n.title = "final".into();
        n.audit.stamp_update(creator, Utc::now());
        let updated = update_instrument_note(&conn, &n).unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.audit.creator, creator);

        delete_instrument_note(&conn, &n.id).unwrap();
        assert!(matches!(
            get_instrument_note(&conn, &n.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
        assert!(matches!(
            delete_instrument_note(&conn, &n.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }

    #[test]
    fn note_for_missing_instrument_aborts_batch() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let a = fixtures::instrument(&mut conn, creator, None, "Real");

        let result = create_instrument_notes(
            &mut conn,
            &[note(a, creator, "ok", 8), note(Uuid::new_v4(), creator, "orphan", 9)],
        );
        assert!(result.is_err());
        assert!(list_instrument_notes(&conn).unwrap().is_empty());
    }
}

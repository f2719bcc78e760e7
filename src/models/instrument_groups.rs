use super::instruments::{query_instruments, Instrument};
use super::{expect_affected, list_strings, AuditInfo};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentGroup {
    pub id: Uuid,
    #[serde(skip)]
    pub deleted: bool,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub project_id: Option<Uuid>,
    pub instrument_count: i64,
    pub timeseries_count: i64,
    #[serde(flatten)]
    pub audit: AuditInfo,
}

const INSTRUMENT_GROUP_SQL: &str = "SELECT id, deleted, slug, name, description, project_id, creator, create_date,
        updater, update_date, instrument_count, timeseries_count
    FROM v_instrument_group";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<InstrumentGroup> {
    Ok(InstrumentGroup {
        id: row.get("id")?,
        deleted: row.get("deleted")?,
        slug: row.get("slug")?,
        name: row.get("name")?,
        description: row.get("description")?,
        project_id: row.get("project_id")?,
        instrument_count: row.get("instrument_count")?,
        timeseries_count: row.get("timeseries_count")?,
        audit: AuditInfo::from_row(row)?,
    })
}

fn query_groups(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> rusqlite::Result<Vec<InstrumentGroup>> {
    let mut stmt = conn.prepare(sql)?;
    let gg = stmt.query_map(args, group_from_row)?;
    gg.collect()
}

pub fn list_instrument_groups(conn: &Connection) -> rusqlite::Result<Vec<InstrumentGroup>> {
    query_groups(conn, &format!("{} WHERE NOT deleted ORDER BY name", INSTRUMENT_GROUP_SQL), [])
}

pub fn list_project_instrument_groups(conn: &Connection, project_id: &Uuid) -> rusqlite::Result<Vec<InstrumentGroup>> {
    query_groups(
        conn,
        &format!("{} WHERE project_id = ?1 AND NOT deleted ORDER BY name", INSTRUMENT_GROUP_SQL),
        params![project_id],
    )
}

pub fn get_instrument_group(conn: &Connection, id: &Uuid) -> rusqlite::Result<InstrumentGroup> {
    conn.query_row(
        &format!("{} WHERE id = ?1", INSTRUMENT_GROUP_SQL),
        params![id],
        group_from_row,
    )
}

pub fn list_instrument_group_slugs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    list_strings(conn, "SELECT slug FROM instrument_group")
}

pub fn create_instrument_groups(
    conn: &mut Connection,
    groups: &[InstrumentGroup],
) -> rusqlite::Result<Vec<InstrumentGroup>> {
    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(groups.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO instrument_group (id, slug, name, description, project_id, creator, create_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for g in groups {
            let id = Uuid::new_v4();
            insert.execute(params![
                id,
                g.slug,
                g.name,
                g.description,
                g.project_id,
                g.audit.creator,
                g.audit.create_date
            ])?;
            ids.push(id);
        }
    }
    let created = ids
        .iter()
        .map(|id| get_instrument_group(&tx, id))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    tx.commit()?;
    Ok(created)
}

pub fn update_instrument_group(conn: &Connection, g: &InstrumentGroup) -> rusqlite::Result<InstrumentGroup> {
    let changed = conn.execute(
        "UPDATE instrument_group
         SET name = ?2, description = ?3, updater = ?4, update_date = ?5, project_id = ?6
         WHERE id = ?1 AND NOT deleted",
        params![
            g.id,
            g.name,
            g.description,
            g.audit.updater,
            g.audit.update_date,
            g.project_id
        ],
    )?;
    expect_affected(changed)?;
    get_instrument_group(conn, &g.id)
}

pub fn delete_flag_instrument_group(conn: &Connection, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute("UPDATE instrument_group SET deleted = 1 WHERE id = ?1", params![id])?;
    expect_affected(changed)
}

/// Non-deleted instruments that belong to the group.
pub fn list_instrument_group_instruments(conn: &Connection, group_id: &Uuid) -> rusqlite::Result<Vec<Instrument>> {
    query_instruments(
        conn,
        "SELECT B.id, B.deleted, B.slug, B.name, B.type_id, B.type, B.project_id, B.station,
                B.station_offset, B.status_id, B.status, B.status_time, B.creator, B.create_date,
                B.updater, B.update_date
         FROM instrument_group_instruments A
         INNER JOIN v_instrument B ON A.instrument_id = B.id
         WHERE A.instrument_group_id = ?1 AND NOT B.deleted
         ORDER BY B.name",
        params![group_id],
    )
}

/// Adds an instrument to a group; adding it twice is a no-op.
pub fn create_instrument_group_instrument(
    conn: &Connection,
    group_id: &Uuid,
    instrument_id: &Uuid,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO instrument_group_instruments (instrument_group_id, instrument_id) VALUES (?1, ?2)
         ON CONFLICT (instrument_group_id, instrument_id) DO NOTHING",
        params![group_id, instrument_id],
    )?;
    Ok(())
}

pub fn delete_instrument_group_instrument(
    conn: &Connection,
    group_id: &Uuid,
    instrument_id: &Uuid,
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM instrument_group_instruments WHERE instrument_group_id = ?1 AND instrument_id = ?2",
        params![group_id, instrument_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::Utc;

    fn group(conn: &mut Connection, creator: Uuid, project_id: Option<Uuid>, name: &str) -> InstrumentGroup {
        create_instrument_groups(
            conn,
            &[InstrumentGroup {
                slug: crate::utils::slugify(name),
                name: name.into(),
                description: format!("{} instruments", name),
                project_id,
                audit: AuditInfo::created_by(creator, Utc::now()),
                ..Default::default()
            }],
        )
        .unwrap()
        .remove(0)
    }

    #[test]
    fn membership_drives_counts() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let project_id = fixtures::project(&mut conn, creator, "Group Project");
        let g = group(&mut conn, creator, Some(project_id), "Left Bank");
        let a = fixtures::instrument(&mut conn, creator, Some(project_id), "LB-1");
        let b = fixtures::instrument(&mut conn, creator, Some(project_id), "LB-2");
        fixtures::timeseries(&mut conn, a, "LB-1 Stage");

        create_instrument_group_instrument(&conn, &g.id, &a).unwrap();
        create_instrument_group_instrument(&conn, &g.id, &a).unwrap();
        create_instrument_group_instrument(&conn, &g.id, &b).unwrap();

        let g = get_instrument_group(&conn, &g.id).unwrap();
        assert_eq!(g.instrument_count, 2);
        assert_eq!(g.timeseries_count, 1);
        assert_eq!(list_instrument_group_instruments(&conn, &g.id).unwrap().len(), 2);

        delete_instrument_group_instrument(&conn, &g.id, &b).unwrap();
        let members = list_instrument_group_instruments(&conn, &g.id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id, a);
    }

    #[test]
    fn project_groups_exclude_deleted() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let project_id = fixtures::project(&mut conn, creator, "Group Listing");
        let keep = group(&mut conn, creator, Some(project_id), "Keep");
        let dropped = group(&mut conn, creator, Some(project_id), "Drop");

        delete_flag_instrument_group(&conn, &dropped.id).unwrap();
        let gg = list_project_instrument_groups(&conn, &project_id).unwrap();
        assert_eq!(gg.len(), 1);
        assert_eq!(gg[0].id, keep.id);
        assert_eq!(list_instrument_groups(&conn).unwrap().len(), 1);
    }

    #[test]
    fn update_rewrites_description() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let mut g = group(&mut conn, creator, None, "Crest");

        g.description = "Crest monuments".into();
        g.audit.stamp_update(creator, Utc::now());
        let updated = update_instrument_group(&conn, &g).unwrap();
        assert_eq!(updated.description, "Crest monuments");
        assert_eq!(updated.audit.updater, Some(creator));
    }

    #[test]
    fn update_does_not_restore_deleted_group() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let mut g = group(&mut conn, creator, None, "Toe Drain");
        delete_flag_instrument_group(&conn, &g.id).unwrap();

        g.name = "Toe Drain Revived".into();
        g.audit.stamp_update(creator, Utc::now());
        assert!(matches!(
            update_instrument_group(&conn, &g),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));

        let stored = get_instrument_group(&conn, &g.id).unwrap();
        assert!(stored.deleted);
        assert_eq!(stored.name, "Toe Drain");
        assert!(list_instrument_groups(&conn).unwrap().is_empty());
    }
}

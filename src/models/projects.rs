use super::{expect_affected, list_ids, list_strings, AuditInfo, IdAndSlug};
use crate::db::ROLE_ADMIN;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: Uuid,
    pub federal_id: Option<String>,
    pub office_id: Option<Uuid>,
    pub image: Option<String>,
    #[serde(skip)]
    pub deleted: bool,
    pub slug: String,
    pub name: String,
    pub timeseries: Vec<Uuid>,
    pub instrument_count: i64,
    pub instrument_group_count: i64,
    #[serde(flatten)]
    pub audit: AuditInfo,
}

const PROJECT_SQL: &str = "SELECT id, federal_id, image, office_id, deleted, slug, name, creator, create_date,
        updater, update_date, instrument_count, instrument_group_count
    FROM v_project";

const PROJECT_TIMESERIES_SQL: &str =
    "SELECT timeseries_id FROM project_timeseries WHERE project_id = ?1";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        federal_id: row.get("federal_id")?,
        office_id: row.get("office_id")?,
        image: row.get("image")?,
        deleted: row.get("deleted")?,
        slug: row.get("slug")?,
        name: row.get("name")?,
        timeseries: Vec::new(),
        instrument_count: row.get("instrument_count")?,
        instrument_group_count: row.get("instrument_group_count")?,
        audit: AuditInfo::from_row(row)?,
    })
}

fn query_projects(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Project>> {
    let mut stmt = conn.prepare(sql)?;
    let mut pp = stmt
        .query_map(args, project_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for p in pp.iter_mut() {
        p.timeseries = list_ids(conn, PROJECT_TIMESERIES_SQL, &p.id)?;
    }
    Ok(pp)
}

pub fn list_projects(conn: &Connection) -> rusqlite::Result<Vec<Project>> {
    query_projects(conn, &format!("{} WHERE NOT deleted ORDER BY name", PROJECT_SQL), [])
}

/// Projects on which `profile_id` holds any role.
pub fn list_my_projects(conn: &Connection, profile_id: &Uuid) -> rusqlite::Result<Vec<Project>> {
    query_projects(
        conn,
        &format!(
            "{} WHERE NOT deleted AND id IN (
                SELECT project_id FROM profile_project_roles WHERE profile_id = ?1
             ) ORDER BY name",
            PROJECT_SQL
        ),
        params![profile_id],
    )
}

pub fn get_project(conn: &Connection, id: &Uuid) -> rusqlite::Result<Project> {
    query_projects(conn, &format!("{} WHERE id = ?1", PROJECT_SQL), params![id])?
        .into_iter()
        .next()
        .ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn project_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(id) FROM project WHERE NOT deleted", [], |row| row.get(0))
}

pub fn list_project_slugs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    list_strings(conn, "SELECT slug FROM project")
}

/// Inserts all projects in one transaction and grants each creator the
/// admin role on the project they created.
pub fn create_projects(conn: &mut Connection, projects: &[Project]) -> rusqlite::Result<Vec<IdAndSlug>> {
    let tx = conn.transaction()?;
    let mut created = Vec::with_capacity(projects.len());
    {
        let mut insert = tx.prepare(
            "INSERT INTO project (id, federal_id, image, office_id, slug, name, creator, create_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut grant = tx.prepare(
            "INSERT INTO profile_project_roles (profile_id, project_id, role_id, granted_by, granted_date)
             VALUES (?1, ?2, ?3, ?1, ?4)
             ON CONFLICT DO NOTHING",
        )?;
        for p in projects {
            let id = Uuid::new_v4();
            insert.execute(params![
                id,
                p.federal_id,
                p.image,
                p.office_id,
                p.slug,
                p.name,
                p.audit.creator,
                p.audit.create_date
            ])?;
            grant.execute(params![p.audit.creator, id, ROLE_ADMIN, p.audit.create_date])?;
            created.push(IdAndSlug {
                id,
                slug: p.slug.clone(),
            });
        }
    }
    tx.commit()?;
    Ok(created)
}

pub fn update_project(conn: &Connection, p: &Project) -> rusqlite::Result<Project> {
    let changed = conn.execute(
        "UPDATE project
         SET name = ?2, updater = ?3, update_date = ?4, office_id = ?5, federal_id = ?6, image = ?7
         WHERE id = ?1 AND NOT deleted",
        params![
            p.id,
            p.name,
            p.audit.updater,
            p.audit.update_date,
            p.office_id,
            p.federal_id,
            p.image
        ],
    )?;
    expect_affected(changed)?;
    get_project(conn, &p.id)
}

pub fn delete_flag_project(conn: &Connection, id: &Uuid) -> rusqlite::Result<()> {
    let changed = conn.execute("UPDATE project SET deleted = 1 WHERE id = ?1", params![id])?;
    expect_affected(changed)
}

/// Promotes a timeseries to the project level; promoting twice is a no-op.
pub fn create_project_timeseries(
    conn: &Connection,
    project_id: &Uuid,
    timeseries_id: &Uuid,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO project_timeseries (project_id, timeseries_id) VALUES (?1, ?2)
         ON CONFLICT (project_id, timeseries_id) DO NOTHING",
        params![project_id, timeseries_id],
    )?;
    Ok(())
}

/// Removes a timeseries from the project level. The timeseries itself stays.
pub fn delete_project_timeseries(
    conn: &Connection,
    project_id: &Uuid,
    timeseries_id: &Uuid,
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM project_timeseries WHERE project_id = ?1 AND timeseries_id = ?2",
        params![project_id, timeseries_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::Utc;

    #[test]
    fn created_projects_are_listed_by_name() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        fixtures::project(&mut conn, creator, "Zeta Dam");
        fixtures::project(&mut conn, creator, "Alpha Levee");

        let names: Vec<String> = list_projects(&conn).unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["Alpha Levee", "Zeta Dam"]);
        assert_eq!(project_count(&conn).unwrap(), 2);
        assert_eq!(list_project_slugs(&conn).unwrap().len(), 2);
    }

    #[test]
    fn creator_sees_project_in_my_projects() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let id = fixtures::project(&mut conn, creator, "Blue River");

        let mine = list_my_projects(&conn, &creator).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);
        assert!(list_my_projects(&conn, &Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn deleted_projects_are_hidden() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let id = fixtures::project(&mut conn, creator, "Old Site");

        delete_flag_project(&conn, &id).unwrap();
        assert!(list_projects(&conn).unwrap().is_empty());
        assert_eq!(project_count(&conn).unwrap(), 0);
        assert!(get_project(&conn, &id).unwrap().deleted);
    }

    #[test]
    fn update_changes_name_and_stamps_updater() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let id = fixtures::project(&mut conn, creator, "Before");

        let mut p = get_project(&conn, &id).unwrap();
        p.name = "After".into();
        p.audit.stamp_update(creator, Utc::now());
        let updated = update_project(&conn, &p).unwrap();

        assert_eq!(updated.name, "After");
        assert_eq!(updated.slug, "before");
        assert_eq!(updated.audit.updater, Some(creator));
    }

    #[test]
    fn update_of_unknown_project_is_not_found() {
        let conn = fixtures::conn();
        let p = Project {
            id: Uuid::new_v4(),
            name: "Ghost".into(),
            ..Default::default()
        };
        assert!(matches!(
            update_project(&conn, &p),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }

    #[test]
    fn project_timeseries_promotion_is_idempotent() {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let project_id = fixtures::project(&mut conn, creator, "Gauges");
        let instrument_id = fixtures::instrument(&mut conn, creator, Some(project_id), "Gauge 1");
        let ts = fixtures::timeseries(&mut conn, instrument_id, "Gauge 1 Stage");

        create_project_timeseries(&conn, &project_id, &ts).unwrap();
        create_project_timeseries(&conn, &project_id, &ts).unwrap();
        let p = get_project(&conn, &project_id).unwrap();
        assert_eq!(p.timeseries, vec![ts]);
        assert_eq!(p.instrument_count, 1);

        delete_project_timeseries(&conn, &project_id, &ts).unwrap();
        assert!(get_project(&conn, &project_id).unwrap().timeseries.is_empty());
    }
}

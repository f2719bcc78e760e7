use super::{expect_affected, list_ids, list_strings, AuditInfo};
use rusqlite::{params, Connection, Row, ToSql, Transaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfiguration {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub project_id: Uuid,
    pub timeseries_id: Vec<Uuid>,
    #[serde(flatten)]
    pub audit: AuditInfo,
}

/// Row counts touched by one reconciliation of a plot's timeseries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub deleted: usize,
    pub inserted: usize,
}

const PLOT_CONFIGURATION_SQL: &str = "SELECT id, slug, name, project_id, creator, create_date, updater, update_date
    FROM plot_configuration";

const PLOT_TIMESERIES_SQL: &str = "SELECT timeseries_id FROM plot_configuration_timeseries
    WHERE plot_configuration_id = ?1
    ORDER BY rowid";

fn plot_configuration_from_row(row: &Row<'_>) -> rusqlite::Result<PlotConfiguration> {
    Ok(PlotConfiguration {
        id: row.get("id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        project_id: row.get("project_id")?,
        timeseries_id: Vec::new(),
        audit: AuditInfo::from_row(row)?,
    })
}

fn query_plot_configurations(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> rusqlite::Result<Vec<PlotConfiguration>> {
    let mut stmt = conn.prepare(sql)?;
    let mut pp = stmt
        .query_map(args, plot_configuration_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for p in pp.iter_mut() {
        p.timeseries_id = list_ids(conn, PLOT_TIMESERIES_SQL, &p.id)?;
    }
    Ok(pp)
}

pub fn list_plot_configuration_slugs(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    list_strings(conn, "SELECT slug FROM plot_configuration")
}

pub fn list_plot_configurations(conn: &Connection, project_id: &Uuid) -> rusqlite::Result<Vec<PlotConfiguration>> {
    query_plot_configurations(
        conn,
        &format!("{} WHERE project_id = ?1 ORDER BY name", PLOT_CONFIGURATION_SQL),
        params![project_id],
    )
}

pub fn get_plot_configuration(
    conn: &Connection,
    project_id: &Uuid,
    plot_configuration_id: &Uuid,
) -> rusqlite::Result<PlotConfiguration> {
    query_plot_configurations(
        conn,
        &format!("{} WHERE project_id = ?1 AND id = ?2", PLOT_CONFIGURATION_SQL),
        params![project_id, plot_configuration_id],
    )?
    .into_iter()
    .next()
    .ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn create_plot_configuration(conn: &mut Connection, pc: &PlotConfiguration) -> rusqlite::Result<PlotConfiguration> {
    let id = Uuid::new_v4();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO plot_configuration (id, slug, name, project_id, creator, create_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, pc.slug, pc.name, pc.project_id, pc.audit.creator, pc.audit.create_date],
    )?;
    reconcile_timeseries(&tx, &id, &pc.timeseries_id)?;
    tx.commit()?;
    get_plot_configuration(conn, &pc.project_id, &id)
}

/// Brings the timeseries attached to a plot in line with `desired`:
/// rows absent from `desired` are deleted, missing ones inserted, and
/// rows already present are left untouched.
pub fn reconcile_timeseries(
    tx: &Transaction<'_>,
    plot_configuration_id: &Uuid,
    desired: &[Uuid],
) -> rusqlite::Result<ReconcileSummary> {
    let deleted = if desired.is_empty() {
        tx.execute(
            "DELETE FROM plot_configuration_timeseries WHERE plot_configuration_id = ?1",
            params![plot_configuration_id],
        )?
    } else {
        let placeholders = (2..desired.len() + 2)
            .map(|n| format!("?{}", n))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "DELETE FROM plot_configuration_timeseries
             WHERE plot_configuration_id = ?1 AND timeseries_id NOT IN ({})",
            placeholders
        );
        let mut args: Vec<&dyn ToSql> = Vec::with_capacity(desired.len() + 1);
        args.push(plot_configuration_id);
        args.extend(desired.iter().map(|id| id as &dyn ToSql));
        tx.execute(&sql, args.as_slice())?
    };

    let mut inserted = 0;
    let mut insert = tx.prepare_cached(
        "INSERT INTO plot_configuration_timeseries (plot_configuration_id, timeseries_id) VALUES (?1, ?2)
         ON CONFLICT (plot_configuration_id, timeseries_id) DO NOTHING",
    )?;
    for timeseries_id in desired {
        inserted += insert.execute(params![plot_configuration_id, timeseries_id])?;
    }

    Ok(ReconcileSummary { deleted, inserted })
}

/// Renames the plot and reconciles its timeseries in one transaction.
pub fn update_plot_configuration(conn: &mut Connection, pc: &PlotConfiguration) -> rusqlite::Result<PlotConfiguration> {
    let tx = conn.transaction()?;
    let changed = tx.execute(
        "UPDATE plot_configuration SET name = ?3, updater = ?4, update_date = ?5
         WHERE project_id = ?1 AND id = ?2",
        params![pc.project_id, pc.id, pc.name, pc.audit.updater, pc.audit.update_date],
    )?;
    expect_affected(changed)?;
    reconcile_timeseries(&tx, &pc.id, &pc.timeseries_id)?;
    tx.commit()?;
    get_plot_configuration(conn, &pc.project_id, &pc.id)
}

pub fn delete_plot_configuration(
    conn: &Connection,
    project_id: &Uuid,
    plot_configuration_id: &Uuid,
) -> rusqlite::Result<()> {
    let changed = conn.execute(
        "DELETE FROM plot_configuration WHERE project_id = ?1 AND id = ?2",
        params![project_id, plot_configuration_id],
    )?;
    expect_affected(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use chrono::Utc;

    struct Setup {
        conn: Connection,
        creator: Uuid,
        project_id: Uuid,
        ts: Vec<Uuid>,
    }

    fn setup() -> Setup {
        let mut conn = fixtures::conn();
        let creator = fixtures::profile(&conn);
        let project_id = fixtures::project(&mut conn, creator, "Plots");
        let i = fixtures::instrument(&mut conn, creator, Some(project_id), "Plot Gage");
        let ts = (0..3)
            .map(|n| fixtures::timeseries(&mut conn, i, &format!("Plot Series {}", n)))
            .collect();
        Setup { conn, creator, project_id, ts }
    }

    fn plot(s: &mut Setup, timeseries_id: Vec<Uuid>) -> PlotConfiguration {
        create_plot_configuration(
            &mut s.conn,
            &PlotConfiguration {
                name: "Upstream Stage".into(),
                slug: "upstream-stage".into(),
                project_id: s.project_id,
                timeseries_id,
                audit: AuditInfo::created_by(s.creator, Utc::now()),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn reconcile(s: &mut Setup, id: Uuid, desired: &[Uuid]) -> ReconcileSummary {
        let tx = s.conn.transaction().unwrap();
        let summary = reconcile_timeseries(&tx, &id, desired).unwrap();
        tx.commit().unwrap();
        summary
    }

    #[test]
    fn create_attaches_timeseries() {
        let mut s = setup();
        let ts = s.ts.clone();
        let pc = plot(&mut s, vec![ts[0], ts[1]]);

        assert_eq!(pc.timeseries_id, vec![ts[0], ts[1]]);
        assert_eq!(list_plot_configurations(&s.conn, &s.project_id).unwrap(), vec![pc]);
        assert_eq!(list_plot_configuration_slugs(&s.conn).unwrap(), ["upstream-stage"]);
    }

    #[test]
    fn update_replaces_association_set() {
        let mut s = setup();
        let ts = s.ts.clone();
        let mut pc = plot(&mut s, vec![ts[0], ts[1]]);

        pc.name = "Renamed".into();
        pc.timeseries_id = vec![ts[1], ts[2], ts[2]];
        pc.audit.stamp_update(s.creator, Utc::now());
        let updated = update_plot_configuration(&mut s.conn, &pc).unwrap();

        assert_eq!(updated.name, "Renamed");
        let mut got = updated.timeseries_id.clone();
        got.sort();
        let mut want = vec![ts[1], ts[2]];
        want.sort();
        assert_eq!(got, want);
    }

    #[test]
    fn reconcile_to_empty_removes_everything() {
        let mut s = setup();
        let ts = s.ts.clone();
        let pc = plot(&mut s, ts.clone());

        let summary = reconcile(&mut s, pc.id, &[]);
        assert_eq!(summary, ReconcileSummary { deleted: 3, inserted: 0 });
        assert!(get_plot_configuration(&s.conn, &s.project_id, &pc.id)
            .unwrap()
            .timeseries_id
            .is_empty());
    }

    #[test]
    fn reconcile_same_set_twice_is_idempotent() {
        let mut s = setup();
        let ts = s.ts.clone();
        let pc = plot(&mut s, vec![ts[0]]);

        let first = reconcile(&mut s, pc.id, &[ts[1], ts[2]]);
        assert_eq!(first, ReconcileSummary { deleted: 1, inserted: 2 });
        let second = reconcile(&mut s, pc.id, &[ts[1], ts[2]]);
        assert_eq!(second, ReconcileSummary { deleted: 0, inserted: 0 });
    }

    #[test]
    fn failed_update_keeps_previous_state() {
        let mut s = setup();
        let ts = s.ts.clone();
        let mut pc = plot(&mut s, vec![ts[0], ts[1]]);

        pc.name = "Broken".into();
        pc.timeseries_id = vec![ts[2], Uuid::new_v4()];
        assert!(update_plot_configuration(&mut s.conn, &pc).is_err());

        let kept = get_plot_configuration(&s.conn, &s.project_id, &pc.id).unwrap();
        assert_eq!(kept.name, "Upstream Stage");
        assert_eq!(kept.timeseries_id, vec![ts[0], ts[1]]);
    }

    #[test]
    fn update_in_wrong_project_is_not_found() {
        let mut s = setup();
        let ts = s.ts.clone();
        let mut pc = plot(&mut s, vec![ts[0]]);
        pc.project_id = Uuid::new_v4();

        assert!(matches!(
            update_plot_configuration(&mut s.conn, &pc),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }

    #[test]
    fn delete_removes_plot_and_associations() {
        let mut s = setup();
        let ts = s.ts.clone();
        let pc = plot(&mut s, ts);

        delete_plot_configuration(&s.conn, &s.project_id, &pc.id).unwrap();
        assert!(list_plot_configurations(&s.conn, &s.project_id).unwrap().is_empty());
        let rows: i64 = s
            .conn
            .query_row("SELECT COUNT(*) FROM plot_configuration_timeseries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);

        assert!(matches!(
            delete_plot_configuration(&s.conn, &s.project_id, &pc.id),
            Err(rusqlite::Error::QueryReturnedNoRows)
        ));
    }
}

use crate::config::Config;
use crate::error::AppError;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const INSTRUMENT_TYPE_INSTRUMENT: Uuid = Uuid::from_u128(0x98a61f29_18a8_430a_9d02_0f53486e0984);
pub const INSTRUMENT_TYPE_PIEZOMETER: Uuid = Uuid::from_u128(0x0fd1b6e4_5d3c_4b1e_8d0a_7c2e2f9d3a11);
pub const INSTRUMENT_TYPE_INCLINOMETER: Uuid = Uuid::from_u128(0x3c3dfc23_ed2a_4a4a_9ce0_683c7c1d4d20);
pub const INSTRUMENT_TYPE_STAFF_GAGE: Uuid = Uuid::from_u128(0x4f5d2b0c_9e77_4f45_8d2c_61b1e9a7c3b5);

pub const PARAMETER_STAGE: Uuid = Uuid::from_u128(0xb49f214e_f69f_43da_9ce3_ad96042268d0);
pub const PARAMETER_PRECIPITATION: Uuid = Uuid::from_u128(0x0ce77a5a_8283_47cd_9126_c7c7d8a0a5c2);
pub const PARAMETER_ELEVATION: Uuid = Uuid::from_u128(0x83b5a1f7_948b_4373_a47c_d73ff622aafd);
pub const PARAMETER_VOLTAGE: Uuid = Uuid::from_u128(0x430e5edb_e2b5_4f86_b19f_cda26a27e151);

pub const UNIT_FEET: Uuid = Uuid::from_u128(0xf777f2e2_5e32_424e_a1ca_19d16cd8abce);
pub const UNIT_INCHES: Uuid = Uuid::from_u128(0x4a999277_4cf5_4282_93ce_23b33c65e2c8);
pub const UNIT_METERS: Uuid = Uuid::from_u128(0xae06a7db_1e18_4994_be41_9d5a408d6cad);
pub const UNIT_VOLTS: Uuid = Uuid::from_u128(0x217cf2f0_e4ef_47b2_9e4d_ce6d12a6b1c8);

pub const STATUS_ACTIVE: Uuid = Uuid::from_u128(0xe26ba2ef_9b52_4c71_97df_9e4b6cf4174d);
pub const STATUS_INACTIVE: Uuid = Uuid::from_u128(0x94578354_ffdf_4119_9663_6bd4323e58f5);
pub const STATUS_ABANDONED: Uuid = Uuid::from_u128(0xb2d4ba4f_59f1_4fb2_9a0d_1e3f7c7b4e02);
pub const STATUS_DESTROYED: Uuid = Uuid::from_u128(0x1a2b3c4d_5e6f_4a7b_8c9d_0e1f2a3b4c5d);

pub const ROLE_ADMIN: Uuid = Uuid::from_u128(0x37f14863_8f3b_44ca_8deb_4b74ce8a8a69);
pub const ROLE_MEMBER: Uuid = Uuid::from_u128(0x2962bdde_7007_4ba0_943f_cb8e72e90704);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS profile (
    id BLOB PRIMARY KEY,
    edipi INTEGER UNIQUE,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS instrument_type (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS parameter (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS unit (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS status (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS role (
    id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS project (
    id BLOB PRIMARY KEY,
    federal_id TEXT,
    image TEXT,
    office_id BLOB,
    deleted INTEGER NOT NULL DEFAULT 0,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    creator BLOB NOT NULL,
    create_date TEXT NOT NULL,
    updater BLOB,
    update_date TEXT
);

CREATE TABLE IF NOT EXISTS profile_project_roles (
    profile_id BLOB NOT NULL REFERENCES profile(id) ON DELETE CASCADE,
    project_id BLOB NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    role_id BLOB NOT NULL REFERENCES role(id),
    granted_by BLOB,
    granted_date TEXT NOT NULL,
    CONSTRAINT unique_profile_project_role UNIQUE (profile_id, project_id, role_id)
);

CREATE TABLE IF NOT EXISTS instrument (
    id BLOB PRIMARY KEY,
    deleted INTEGER NOT NULL DEFAULT 0,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    type_id BLOB NOT NULL REFERENCES instrument_type(id),
    project_id BLOB REFERENCES project(id),
    station INTEGER,
    station_offset INTEGER,
    creator BLOB NOT NULL,
    create_date TEXT NOT NULL,
    updater BLOB,
    update_date TEXT
);
CREATE INDEX IF NOT EXISTS idx_instrument_project ON instrument(project_id);

CREATE TABLE IF NOT EXISTS instrument_status (
    id BLOB PRIMARY KEY,
    instrument_id BLOB NOT NULL REFERENCES instrument(id) ON DELETE CASCADE,
    status_id BLOB NOT NULL REFERENCES status(id),
    time TEXT NOT NULL,
    CONSTRAINT instrument_unique_status_in_time UNIQUE (instrument_id, time)
);

CREATE TABLE IF NOT EXISTS instrument_note (
    id BLOB PRIMARY KEY,
    instrument_id BLOB NOT NULL REFERENCES instrument(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    time TEXT NOT NULL,
    creator BLOB NOT NULL,
    create_date TEXT NOT NULL,
    updater BLOB,
    update_date TEXT
);
CREATE INDEX IF NOT EXISTS idx_instrument_note_instrument ON instrument_note(instrument_id);

CREATE TABLE IF NOT EXISTS instrument_group (
    id BLOB PRIMARY KEY,
    deleted INTEGER NOT NULL DEFAULT 0,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    project_id BLOB REFERENCES project(id),
    creator BLOB NOT NULL,
    create_date TEXT NOT NULL,
    updater BLOB,
    update_date TEXT
);

CREATE TABLE IF NOT EXISTS instrument_group_instruments (
    instrument_group_id BLOB NOT NULL REFERENCES instrument_group(id) ON DELETE CASCADE,
    instrument_id BLOB NOT NULL REFERENCES instrument(id) ON DELETE CASCADE,
    CONSTRAINT instrument_group_unique_instrument UNIQUE (instrument_group_id, instrument_id)
);

CREATE TABLE IF NOT EXISTS timeseries (
    id BLOB PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    instrument_id BLOB NOT NULL REFERENCES instrument(id) ON DELETE CASCADE,
    parameter_id BLOB NOT NULL REFERENCES parameter(id),
    unit_id BLOB NOT NULL REFERENCES unit(id)
);
CREATE INDEX IF NOT EXISTS idx_timeseries_instrument ON timeseries(instrument_id);

CREATE TABLE IF NOT EXISTS timeseries_measurement (
    timeseries_id BLOB NOT NULL REFERENCES timeseries(id) ON DELETE CASCADE,
    time TEXT NOT NULL,
    value REAL NOT NULL,
    CONSTRAINT timeseries_unique_time UNIQUE (timeseries_id, time)
);

CREATE TABLE IF NOT EXISTS project_timeseries (
    project_id BLOB NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    timeseries_id BLOB NOT NULL REFERENCES timeseries(id) ON DELETE CASCADE,
    CONSTRAINT project_unique_timeseries UNIQUE (project_id, timeseries_id)
);

CREATE TABLE IF NOT EXISTS plot_configuration (
    id BLOB PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    project_id BLOB NOT NULL REFERENCES project(id) ON DELETE CASCADE,
    creator BLOB NOT NULL,
    create_date TEXT NOT NULL,
    updater BLOB,
    update_date TEXT
);

CREATE TABLE IF NOT EXISTS plot_configuration_timeseries (
    plot_configuration_id BLOB NOT NULL REFERENCES plot_configuration(id) ON DELETE CASCADE,
    timeseries_id BLOB NOT NULL REFERENCES timeseries(id) ON DELETE CASCADE,
    CONSTRAINT plot_configuration_unique_timeseries UNIQUE (plot_configuration_id, timeseries_id)
);

CREATE TABLE IF NOT EXISTS aware_parameter (
    id BLOB PRIMARY KEY,
    key TEXT NOT NULL UNIQUE,
    parameter_id BLOB NOT NULL REFERENCES parameter(id),
    unit_id BLOB NOT NULL REFERENCES unit(id)
);

CREATE TABLE IF NOT EXISTS aware_platform (
    id BLOB PRIMARY KEY,
    aware_id BLOB NOT NULL UNIQUE,
    instrument_id BLOB REFERENCES instrument(id) ON DELETE SET NULL
);

CREATE VIEW IF NOT EXISTS v_project AS
SELECT P.id,
       P.federal_id,
       P.image,
       P.office_id,
       P.deleted,
       P.slug,
       P.name,
       P.creator,
       P.create_date,
       P.updater,
       P.update_date,
       (SELECT COUNT(*) FROM instrument I WHERE I.project_id = P.id AND NOT I.deleted) AS instrument_count,
       (SELECT COUNT(*) FROM instrument_group G WHERE G.project_id = P.id AND NOT G.deleted) AS instrument_group_count
FROM project P;

CREATE VIEW IF NOT EXISTS v_instrument AS
SELECT I.id,
       I.deleted,
       I.slug,
       I.name,
       I.type_id,
       T.name AS type,
       I.project_id,
       I.station,
       I.station_offset,
       S.status_id,
       ST.name AS status,
       S.time AS status_time,
       I.creator,
       I.create_date,
       I.updater,
       I.update_date
FROM instrument I
INNER JOIN instrument_type T ON T.id = I.type_id
LEFT JOIN (
    SELECT instrument_id, status_id, MAX(time) AS time
    FROM instrument_status
    GROUP BY instrument_id
) S ON S.instrument_id = I.id
LEFT JOIN status ST ON ST.id = S.status_id;

CREATE VIEW IF NOT EXISTS v_instrument_group AS
SELECT G.id,
       G.deleted,
       G.slug,
       G.name,
       G.description,
       G.project_id,
       G.creator,
       G.create_date,
       G.updater,
       G.update_date,
       (SELECT COUNT(*)
        FROM instrument_group_instruments GI
        INNER JOIN instrument I ON I.id = GI.instrument_id
        WHERE GI.instrument_group_id = G.id AND NOT I.deleted) AS instrument_count,
       (SELECT COUNT(*)
        FROM instrument_group_instruments GI
        INNER JOIN timeseries TS ON TS.instrument_id = GI.instrument_id
        WHERE GI.instrument_group_id = G.id) AS timeseries_count
FROM instrument_group G;

CREATE VIEW IF NOT EXISTS v_timeseries AS
SELECT TS.id,
       TS.slug,
       TS.name,
       TS.instrument_id,
       I.name AS instrument,
       TS.parameter_id,
       P.name AS parameter,
       TS.unit_id,
       U.name AS unit
FROM timeseries TS
INNER JOIN instrument I ON I.id = TS.instrument_id
INNER JOIN parameter P ON P.id = TS.parameter_id
INNER JOIN unit U ON U.id = TS.unit_id;
";

/// Shared handle to the single SQLite connection.
///
/// Every call runs on the blocking pool while holding the connection lock,
/// so statements from different requests never interleave.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<AppError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Internal("database connection lock poisoned".to_string()))?;
            f(&mut *guard).map_err(Into::into)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
    }
}

/// Creates tables and views when missing and seeds the domain tables.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    seed_domains(conn)
}

fn seed_domains(conn: &Connection) -> rusqlite::Result<()> {
    let instrument_types = [
        (INSTRUMENT_TYPE_INSTRUMENT, "Instrument"),
        (INSTRUMENT_TYPE_PIEZOMETER, "Piezometer"),
        (INSTRUMENT_TYPE_INCLINOMETER, "Inclinometer"),
        (INSTRUMENT_TYPE_STAFF_GAGE, "Staff Gage"),
    ];
    for (id, name) in instrument_types {
        conn.execute(
            "INSERT OR IGNORE INTO instrument_type (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }

    let parameters = [
        (PARAMETER_STAGE, "stage"),
        (PARAMETER_PRECIPITATION, "precipitation"),
        (PARAMETER_ELEVATION, "elevation"),
        (PARAMETER_VOLTAGE, "voltage"),
    ];
    for (id, name) in parameters {
        conn.execute(
            "INSERT OR IGNORE INTO parameter (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }

    let units = [
        (UNIT_FEET, "Feet"),
        (UNIT_INCHES, "Inches"),
        (UNIT_METERS, "Meters"),
        (UNIT_VOLTS, "Volts"),
    ];
    for (id, name) in units {
        conn.execute(
            "INSERT OR IGNORE INTO unit (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }

    let statuses = [
        (STATUS_ACTIVE, "active", "Instrument is in service and reporting"),
        (STATUS_INACTIVE, "inactive", "Instrument is installed but not reporting"),
        (STATUS_ABANDONED, "abandoned", "Instrument was abandoned in place"),
        (STATUS_DESTROYED, "destroyed", "Instrument was destroyed"),
    ];
    for (id, name, description) in statuses {
        conn.execute(
            "INSERT OR IGNORE INTO status (id, name, description) VALUES (?1, ?2, ?3)",
            params![id, name, description],
        )?;
    }

    for (id, name) in [(ROLE_ADMIN, "ADMIN"), (ROLE_MEMBER, "MEMBER")] {
        conn.execute(
            "INSERT OR IGNORE INTO role (id, name) VALUES (?1, ?2)",
            params![id, name],
        )?;
    }

    let aware_parameters = [
        (Uuid::from_u128(0x2b7f96e1_820f_4f61_ba8f_861640af6232), "h20", PARAMETER_STAGE, UNIT_FEET),
        (Uuid::from_u128(0x1fd3a3c4_3a44_4a2a_9b91_9c7b6f9d7e10), "precip", PARAMETER_PRECIPITATION, UNIT_INCHES),
        (Uuid::from_u128(0x6a1c5f0b_4bd3_4f2d_a6c5_2c8e4f4e8b21), "batt", PARAMETER_VOLTAGE, UNIT_VOLTS),
    ];
    for (id, key, parameter_id, unit_id) in aware_parameters {
        conn.execute(
            "INSERT OR IGNORE INTO aware_parameter (id, key, parameter_id, unit_id) VALUES (?1, ?2, ?3, ?4)",
            params![id, key, parameter_id, unit_id],
        )?;
    }

    Ok(())
}

/// Request-independent state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        seed_domains(&conn).unwrap();
        seed_domains(&conn).unwrap();

        let statuses: i64 = conn
            .query_row("SELECT COUNT(*) FROM status", [], |row| row.get(0))
            .unwrap();
        assert_eq!(statuses, 4);
    }

    #[tokio::test]
    async fn call_maps_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        let result = db
            .call(|conn| {
                conn.query_row("SELECT name FROM role WHERE name = 'nobody'", [], |row| {
                    row.get::<_, String>(0)
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

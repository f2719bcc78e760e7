use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maps an AWARE telemetry key onto a parameter/unit pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwareParameter {
    pub id: Uuid,
    pub key: String,
    pub parameter_id: Uuid,
    pub unit_id: Uuid,
}

/// Where incoming AWARE data for one platform should be written, keyed
/// by parameter key. Keys without a matching timeseries map to `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwarePlatformParameterConfig {
    pub instrument_id: Uuid,
    pub aware_id: Uuid,
    pub aware_parameters: BTreeMap<String, Option<Uuid>>,
}

pub fn list_aware_parameters(conn: &Connection) -> rusqlite::Result<Vec<AwareParameter>> {
    let mut stmt = conn.prepare("SELECT id, key, parameter_id, unit_id FROM aware_parameter ORDER BY key")?;
    let pp = stmt.query_map([], |row| {
        Ok(AwareParameter {
            id: row.get(0)?,
            key: row.get(1)?,
            parameter_id: row.get(2)?,
            unit_id: row.get(3)?,
        })
    })?;
    pp.collect()
}

pub fn list_aware_platform_parameter_config(
    conn: &Connection,
) -> rusqlite::Result<Vec<AwarePlatformParameterConfig>> {
    let mut platforms = conn.prepare(
        "SELECT A.aware_id, A.instrument_id
         FROM aware_platform A
         INNER JOIN instrument I ON I.id = A.instrument_id
         WHERE NOT I.deleted
         ORDER BY I.name",
    )?;
    let platforms = platforms
        .query_map([], |row| Ok((row.get::<_, Uuid>(0)?, row.get::<_, Uuid>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut matches = conn.prepare(
        "SELECT P.key, T.id
         FROM aware_parameter P
         LEFT JOIN timeseries T
                ON T.parameter_id = P.parameter_id
               AND T.unit_id = P.unit_id
               AND T.instrument_id = ?1",
    )?;

    let mut out = Vec::with_capacity(platforms.len());
    for (aware_id, instrument_id) in platforms {
        let mut aware_parameters = BTreeMap::new();
        let rows = matches.query_map(params![instrument_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<Uuid>>(1)?))
        })?;
        for row in rows {
            let (key, timeseries_id) = row?;
            let slot = aware_parameters.entry(key).or_insert(None);
            if slot.is_none() {
                *slot = timeseries_id;
            }
        }
        out.push(AwarePlatformParameterConfig {
            instrument_id,
            aware_id,
            aware_parameters,
        });
    }
    Ok(out)
}

pub fn create_aware_platform(conn: &Connection, aware_id: &Uuid, instrument_id: &Uuid) -> rusqlite::Result<Uuid> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO aware_platform (id, aware_id, instrument_id) VALUES (?1, ?2, ?3)",
        params![id, aware_id, instrument_id],
    )?;
    Ok(id)
}

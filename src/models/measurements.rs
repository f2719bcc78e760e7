use super::TimeWindow;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Points belonging to a single timeseries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementCollection {
    pub timeseries_id: Uuid,
    #[serde(default)]
    pub items: Vec<Measurement>,
}

/// Collections for any number of timeseries; serialized as a bare array.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MeasurementCollectionCollection {
    pub items: Vec<MeasurementCollection>,
}

impl MeasurementCollectionCollection {
    pub fn timeseries_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|c| c.timeseries_id).collect()
    }

    pub fn point_count(&self) -> usize {
        self.items.iter().map(|c| c.items.len()).sum()
    }
}

impl From<Vec<MeasurementCollection>> for MeasurementCollectionCollection {
    fn from(items: Vec<MeasurementCollection>) -> Self {
        Self { items }
    }
}

/// Points of one timeseries strictly inside the window, newest first.
pub fn list_timeseries_measurements(
    conn: &Connection,
    timeseries_id: &Uuid,
    window: &TimeWindow,
) -> rusqlite::Result<MeasurementCollection> {
    let mut stmt = conn.prepare_cached(
        "SELECT M.time, M.value
         FROM timeseries_measurement M
         INNER JOIN timeseries T ON T.id = M.timeseries_id
         WHERE T.id = ?1 AND M.time > ?2 AND M.time < ?3
         ORDER BY M.time DESC",
    )?;
    let items = stmt
        .query_map(params![timeseries_id, window.after, window.before], |row| {
            Ok(Measurement {
                time: row.get(0)?,
                value: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(MeasurementCollection {
        timeseries_id: *timeseries_id,
        items,
    })
}

/// Writes every point of every collection in a single transaction,
/// overwriting the value of any point already stored at the same time.
/// Nothing is committed if any point fails.
pub fn create_or_update_timeseries_measurements(
    conn: &mut Connection,
    mc: MeasurementCollectionCollection,
) -> rusqlite::Result<MeasurementCollectionCollection> {
    if mc.items.is_empty() {
        return Ok(mc);
    }
    let tx = conn.transaction()?;
    {
        let mut upsert = tx.prepare(
            "INSERT INTO timeseries_measurement (timeseries_id, time, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (timeseries_id, time) DO UPDATE SET value = excluded.value",
        )?;
        for c in &mc.items {
            for m in &c.items {
                upsert.execute(params![c.timeseries_id, m.time, m.value])?;
            }
        }
    }
    tx.commit()?;
    Ok(mc)
}

/// Averages every timeseries of the given instruments over fixed buckets
/// of `interval`, starting at `window.after`.
pub fn computed_timeseries(
    conn: &Connection,
    instrument_ids: &[Uuid],
    window: &TimeWindow,
    interval: Duration,
) -> rusqlite::Result<Vec<MeasurementCollection>> {
    let mut series = conn.prepare_cached("SELECT id FROM timeseries WHERE instrument_id = ?1 ORDER BY name")?;
    let mut points = conn.prepare_cached(
        "SELECT time, value FROM timeseries_measurement
         WHERE timeseries_id = ?1 AND time > ?2 AND time < ?3
         ORDER BY time",
    )?;

    let mut out = Vec::new();
    for instrument_id in instrument_ids {
        let ids = series
            .query_map(params![instrument_id], |row| row.get::<_, Uuid>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for timeseries_id in ids {
            let raw = points
                .query_map(params![timeseries_id, window.after, window.before], |row| {
                    Ok(Measurement {
                        time: row.get(0)?,
                        value: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(MeasurementCollection {
                timeseries_id,
                items: resample(&raw, window.after, interval),
            });
        }
    }
    Ok(out)
}

/// Mean of the points falling in each `interval`-wide bucket, stamped at
/// the bucket start. Empty buckets are skipped.
pub fn resample(points: &[Measurement], start: DateTime<Utc>, interval: Duration) -> Vec<Measurement> {
    let step = interval.num_milliseconds();
    if step <= 0 {
        return Vec::new();
    }

    let mut buckets: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for p in points {
        let idx = (p.time - start).num_milliseconds().div_euclid(step);
        let bucket = buckets.entry(idx).or_insert((0.0, 0));
        bucket.0 += p.value;
        bucket.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(idx, (sum, count))| Measurement {
            time: start + Duration::milliseconds(idx * step),
            value: sum / f64::from(count),
        })
        .collect()
}

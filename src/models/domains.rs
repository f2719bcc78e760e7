use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

/// One value from any of the lookup tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Domain {
    pub id: Uuid,
    pub group: String,
    pub value: String,
    pub description: Option<String>,
}

const DOMAINS_SQL: &str = r#"
SELECT id, 'instrument_type' AS "group", name AS value, NULL AS description FROM instrument_type
UNION
SELECT id, 'parameter' AS "group", name AS value, NULL AS description FROM parameter
UNION
SELECT id, 'unit' AS "group", name AS value, NULL AS description FROM unit
UNION
SELECT id, 'status' AS "group", name AS value, description FROM status
UNION
SELECT id, 'role' AS "group", name AS value, NULL AS description FROM role
ORDER BY "group", value
"#;

pub fn list_domains(conn: &Connection) -> rusqlite::Result<Vec<Domain>> {
    let mut stmt = conn.prepare(DOMAINS_SQL)?;
    let rows = stmt.query_map([], |row| {
        Ok(Domain {
            id: row.get(0)?,
            group: row.get(1)?,
            value: row.get(2)?,
            description: row.get(3)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::fixtures;

    #[test]
    fn domains_are_grouped_and_sorted() {
        let conn = fixtures::conn();
        let dd = list_domains(&conn).unwrap();

        let groups: Vec<&str> = dd.iter().map(|d| d.group.as_str()).collect();
        let mut sorted = groups.clone();
        sorted.sort();
        assert_eq!(groups, sorted);

        let active = dd.iter().find(|d| d.id == db::STATUS_ACTIVE).unwrap();
        assert_eq!(active.group, "status");
        assert!(active.description.is_some());

        let feet = dd.iter().find(|d| d.id == db::UNIT_FEET).unwrap();
        assert_eq!(feet.value, "Feet");
        assert_eq!(feet.description, None);
    }
}

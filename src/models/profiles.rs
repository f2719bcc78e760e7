use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub edipi: Option<i64>,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    #[serde(default)]
    pub edipi: Option<i64>,
    pub username: String,
    pub email: String,
}

const PROFILE_SQL: &str = "SELECT id, edipi, username, email, is_admin FROM profile";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get("id")?,
        edipi: row.get("edipi")?,
        username: row.get("username")?,
        email: row.get("email")?,
        is_admin: row.get("is_admin")?,
    })
}

pub fn create_profile(conn: &Connection, p: &NewProfile) -> rusqlite::Result<Profile> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO profile (id, edipi, username, email) VALUES (?1, ?2, ?3, ?4)",
        params![id, p.edipi, p.username, p.email],
    )?;
    get_profile(conn, &id)
}

pub fn get_profile(conn: &Connection, id: &Uuid) -> rusqlite::Result<Profile> {
    conn.query_row(&format!("{} WHERE id = ?1", PROFILE_SQL), params![id], profile_from_row)
}

pub fn find_profile(conn: &Connection, id: &Uuid) -> rusqlite::Result<Option<Profile>> {
    get_profile(conn, id).optional()
}

/// Makes sure the profile used when authentication is disabled exists.
pub fn ensure_mock_profile(conn: &Connection, id: &Uuid) -> rusqlite::Result<Profile> {
    conn.execute(
        "INSERT OR IGNORE INTO profile (id, username, email, is_admin) VALUES (?1, 'mock', 'mock@localhost', 1)",
        params![id],
    )?;
    get_profile(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;

    #[test]
    fn created_profile_is_found() {
        let conn = fixtures::conn();
        let id = fixtures::profile(&conn);

        let p = find_profile(&conn, &id).unwrap().unwrap();
        assert_eq!(p.username, "tester");
        assert!(!p.is_admin);
        assert!(find_profile(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn mock_profile_is_idempotent() {
        let conn = fixtures::conn();
        let id = Uuid::new_v4();
        ensure_mock_profile(&conn, &id).unwrap();
        let p = ensure_mock_profile(&conn, &id).unwrap();
        assert!(p.is_admin);
        assert_eq!(p.username, "mock");
    }
}

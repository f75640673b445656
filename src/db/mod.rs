use crate::errors::{AppError, AppResult};
use crate::models::Contact;
use crate::preferences::SettingsBackend;
use crate::store::ContactRepository;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Storage(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

impl ContactRepository for Database {
    fn insert_contact(&self, contact: &Contact) -> AppResult<i64> {
        let conn = self.conn()?;
        if contact.is_persisted() {
            conn.execute(
                "INSERT OR REPLACE INTO contacts (id, name, phone_number, email) VALUES (?1, ?2, ?3, ?4)",
                params![contact.id, contact.name, contact.phone_number, contact.email],
            )?;
            return Ok(contact.id);
        }

        conn.execute(
            "INSERT INTO contacts (name, phone_number, email) VALUES (?1, ?2, ?3)",
            params![contact.name, contact.phone_number, contact.email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_contact(&self, contact: &Contact) -> AppResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE contacts SET name = ?1, phone_number = ?2, email = ?3 WHERE id = ?4",
            params![contact.name, contact.phone_number, contact.email, contact.id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("No contact with id {}", contact.id)));
        }
        Ok(())
    }

    fn delete_contact(&self, id: i64) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM contacts WHERE id = ?1", [id])?;
        Ok(())
    }

    fn list_contacts(&self) -> AppResult<Vec<Contact>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, phone_number, email FROM contacts ORDER BY name ASC")?;
        let rows = stmt.query_map([], parse_contact_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

impl SettingsBackend for Database {
    fn read_setting(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.conn()?;
        let raw = conn
            .query_row("SELECT value_json FROM settings WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(raw)
    }

    fn write_setting(&self, key: &str, value_json: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![key, value_json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn parse_contact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        email: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::Database;
    use crate::errors::AppError;
    use crate::models::Contact;
    use crate::preferences::SettingsBackend;
    use crate::store::ContactRepository;

    #[test]
    fn database_can_insert_update_and_list_contacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("nested").join("test.db")).expect("db");

        let bob = db
            .insert_contact(&Contact::new("bob", "555", None))
            .expect("insert bob");
        let ann = db
            .insert_contact(&Contact::new("Ann", "123", Some("ann@example.com".to_string())))
            .expect("insert ann");
        assert_ne!(bob, ann);

        db.update_contact(&Contact {
            id: bob,
            name: "Bob".to_string(),
            phone_number: "556".to_string(),
            email: None,
        })
        .expect("update bob");

        let contacts = db.list_contacts().expect("list");
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].name, "Ann");
        assert_eq!(contacts[0].email.as_deref(), Some("ann@example.com"));
        assert_eq!(contacts[1].phone_number, "556");
    }

    #[test]
    fn update_of_missing_contact_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let mut ghost = Contact::new("Ghost", "0", None);
        ghost.id = 7;
        let err = db.update_contact(&ghost).expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let id = db
            .insert_contact(&Contact::new("Ann", "1", None))
            .expect("insert");
        db.delete_contact(id).expect("first delete");
        db.delete_contact(id).expect("second delete");
        assert!(db.list_contacts().expect("list").is_empty());
    }

    #[test]
    fn insert_with_existing_id_replaces_the_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("test.db")).expect("db");
        let id = db
            .insert_contact(&Contact::new("Ann", "1", None))
            .expect("insert");
        let mut replacement = Contact::new("Anne", "2", None);
        replacement.id = id;
        assert_eq!(db.insert_contact(&replacement).expect("replace"), id);
        let contacts = db.list_contacts().expect("list");
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].name, "Anne");
    }

    #[test]
    fn settings_upsert_and_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("test.db");
        {
            let db = Database::new(&db_path).expect("db");
            assert_eq!(db.read_setting("is_grid_view").expect("read"), None);
            db.write_setting("is_grid_view", "false").expect("write");
            db.write_setting("is_grid_view", "true").expect("overwrite");
        }
        let reopened = Database::new(&db_path).expect("reopen");
        assert_eq!(
            reopened.read_setting("is_grid_view").expect("read").as_deref(),
            Some("true")
        );
    }
}

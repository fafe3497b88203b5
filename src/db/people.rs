use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{now, Database};

/// A candidate whose photos are moderated
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl Database {
    pub fn create_person(&self, name: &str) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO people (name, created_at) VALUES (?, ?)",
            params![name, now()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_person(&self, person_id: i64) -> rusqlite::Result<Option<Person>> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM people WHERE id = ?",
                [person_id],
                |row| {
                    Ok(Person {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn get_all_people(&self) -> rusqlite::Result<Vec<Person>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM people ORDER BY name, id")?;
        let people = stmt
            .query_map([], |row| {
                Ok(Person {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(people)
    }
}

//! Public image records attached to people. Rows are only ever added.

use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{now, CopyrightOption, Database};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublicImage {
    pub id: i64,
    pub person_id: i64,
    pub queued_image_id: Option<i64>,
    pub path: String,
    pub source: String,
    pub is_primary: bool,
    /// Digest of the published (cropped) file.
    pub md5sum: String,
    pub sha256: String,
    pub uploading_user: Option<String>,
    pub moderator: Option<String>,
    pub user_notes: String,
    pub copyright: String,
    pub user_copyright: String,
    /// Provenance, including the `md5sum:` marker of the uploaded file.
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPublicImage {
    pub person_id: i64,
    pub queued_image_id: Option<i64>,
    pub path: String,
    pub source: String,
    pub is_primary: bool,
    pub md5sum: String,
    pub sha256: String,
    pub uploading_user: Option<String>,
    pub moderator: Option<String>,
    pub user_notes: String,
    pub copyright: CopyrightOption,
    pub user_copyright: CopyrightOption,
    pub notes: Option<String>,
}

/// Public images on one person sharing a digest
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub person_id: i64,
    pub md5sum: String,
    pub images: Vec<PublicImage>,
}

const IMAGE_COLUMNS: &str = r#"
    id, person_id, queued_image_id, path, source, is_primary, md5sum, sha256,
    uploading_user, moderator, user_notes, copyright, user_copyright, notes, created_at
"#;

fn public_image_from_row(row: &Row<'_>) -> rusqlite::Result<PublicImage> {
    Ok(PublicImage {
        id: row.get(0)?,
        person_id: row.get(1)?,
        queued_image_id: row.get(2)?,
        path: row.get(3)?,
        source: row.get(4)?,
        is_primary: row.get(5)?,
        md5sum: row.get(6)?,
        sha256: row.get(7)?,
        uploading_user: row.get(8)?,
        moderator: row.get(9)?,
        user_notes: row.get(10)?,
        copyright: row.get(11)?,
        user_copyright: row.get(12)?,
        notes: row.get(13)?,
        created_at: row.get(14)?,
    })
}

pub(crate) fn insert_public_image(conn: &Connection, image: &NewPublicImage) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO person_images (
            person_id, queued_image_id, path, source, is_primary, md5sum, sha256,
            uploading_user, moderator, user_notes, copyright, user_copyright, notes, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            image.person_id,
            image.queued_image_id,
            image.path,
            image.source,
            image.is_primary,
            image.md5sum,
            image.sha256,
            image.uploading_user,
            image.moderator,
            image.user_notes,
            image.copyright,
            image.user_copyright,
            image.notes,
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Demote every image of a person, ahead of adding a new primary one.
pub(crate) fn clear_primary(conn: &Connection, person_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE person_images SET is_primary = 0 WHERE person_id = ? AND is_primary = 1",
        [person_id],
    )
}

impl Database {
    /// Images on a person's public record, oldest first.
    pub fn images_for_person(&self, person_id: i64) -> rusqlite::Result<Vec<PublicImage>> {
        let sql = format!(
            "SELECT {} FROM person_images WHERE person_id = ? ORDER BY id",
            IMAGE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map([person_id], public_image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    pub fn primary_image(&self, person_id: i64) -> rusqlite::Result<Option<PublicImage>> {
        Ok(self
            .images_for_person(person_id)?
            .into_iter()
            .rev()
            .find(|image| image.is_primary))
    }

    /// Images imported without going through the queue (e.g. scraped from a
    /// party page) still need a record; the digest marker goes in `notes`.
    pub fn add_public_image(&self, image: &NewPublicImage) -> rusqlite::Result<i64> {
        let tx = self.transaction()?;
        if image.is_primary {
            clear_primary(&tx, image.person_id)?;
        }
        let id = insert_public_image(&tx, image)?;
        tx.commit()?;
        Ok(id)
    }

    /// Groups of public images on the same person with the same published
    /// digest. Reported, never deleted automatically.
    pub fn find_duplicate_images(&self) -> rusqlite::Result<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT person_id, md5sum, COUNT(*) as cnt
            FROM person_images
            WHERE md5sum != ''
            GROUP BY person_id, md5sum
            HAVING cnt > 1
            ORDER BY person_id, md5sum
            "#,
        )?;
        let keys: Vec<(i64, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut groups = Vec::new();
        for (person_id, md5sum) in keys {
            let images = self
                .images_for_person(person_id)?
                .into_iter()
                .filter(|image| image.md5sum == md5sum)
                .collect();
            groups.push(DuplicateGroup {
                person_id,
                md5sum,
                images,
            });
        }
        Ok(groups)
    }
}

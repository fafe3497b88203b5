//! Queued image storage: uploads waiting for a moderator.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{now, CopyrightOption, Database, Decision};

/// Crop rectangle in image pixels, half-open: `[min_x, max_x) x [min_y, max_y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropBounds {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl CropBounds {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// The whole of a `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn contains(&self, other: &CropBounds) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// Check the bounds describe a non-empty region inside the image.
    pub fn check_within(&self, width: u32, height: u32) -> Result<(), String> {
        if self.area() == 0 {
            return Err(format!("crop bounds {} have zero area", self));
        }
        if self.max_x > width || self.max_y > height {
            return Err(format!(
                "crop bounds {} fall outside the {}x{} image",
                self, width, height
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for CropBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl std::str::FromStr for CropBounds {
    type Err = String;

    /// Parses `x_min,y_min,x_max,y_max`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|e| format!("invalid crop bounds {:?}: {}", s, e))?;
        match parts.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Self::new(*min_x, *min_y, *max_x, *max_y)),
            _ => Err(format!("crop bounds need four numbers, got {:?}", s)),
        }
    }
}

/// A submitted candidate image and its moderation state
#[derive(Debug, Clone, Serialize)]
pub struct QueuedImage {
    pub id: i64,
    pub person_id: i64,
    /// `None` when the image was queued by a script.
    pub uploaded_by: Option<String>,
    pub why_allowed: CopyrightOption,
    pub justification_for_use: String,
    pub decision: Decision,
    pub image_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub md5sum: String,
    pub crop: Option<CropBounds>,
    pub face_detection_tried: bool,
    pub moderator: Option<String>,
    pub moderator_notes: Option<String>,
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl QueuedImage {
    pub fn has_crop_bounds(&self) -> bool {
        self.crop.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewQueuedImage {
    pub person_id: i64,
    pub uploaded_by: Option<String>,
    pub why_allowed: CopyrightOption,
    pub justification_for_use: String,
    pub image_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub md5sum: String,
}

const QUEUED_COLUMNS: &str = r#"
    id, person_id, uploaded_by, why_allowed, justification_for_use, decision,
    image_path, image_width, image_height, md5sum,
    crop_min_x, crop_min_y, crop_max_x, crop_max_y,
    face_detection_tried, moderator, moderator_notes, revision,
    created_at, updated_at
"#;

fn queued_image_from_row(row: &Row<'_>) -> rusqlite::Result<QueuedImage> {
    let crop_fields: [Option<u32>; 4] = [row.get(10)?, row.get(11)?, row.get(12)?, row.get(13)?];
    let crop = match crop_fields {
        [Some(min_x), Some(min_y), Some(max_x), Some(max_y)] => {
            Some(CropBounds::new(min_x, min_y, max_x, max_y))
        }
        _ => None,
    };

    Ok(QueuedImage {
        id: row.get(0)?,
        person_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        why_allowed: row.get(3)?,
        justification_for_use: row.get(4)?,
        decision: row.get(5)?,
        image_path: row.get(6)?,
        image_width: row.get(7)?,
        image_height: row.get(8)?,
        md5sum: row.get(9)?,
        crop,
        face_detection_tried: row.get(14)?,
        moderator: row.get(15)?,
        moderator_notes: row.get(16)?,
        revision: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

/// Compare-and-set a decision. Returns false when `expected_revision` is
/// stale, in which case nothing was written.
pub(crate) fn update_decision(
    conn: &Connection,
    id: i64,
    expected_revision: i64,
    decision: Decision,
    crop: Option<CropBounds>,
    moderator: &str,
    moderator_notes: Option<&str>,
) -> rusqlite::Result<bool> {
    let crop = crop.map(|c| [c.min_x, c.min_y, c.max_x, c.max_y]);
    let changed = conn.execute(
        r#"
        UPDATE queued_images
        SET decision = ?,
            crop_min_x = COALESCE(?, crop_min_x),
            crop_min_y = COALESCE(?, crop_min_y),
            crop_max_x = COALESCE(?, crop_max_x),
            crop_max_y = COALESCE(?, crop_max_y),
            moderator = ?,
            moderator_notes = COALESCE(?, moderator_notes),
            revision = revision + 1,
            updated_at = ?
        WHERE id = ? AND revision = ?
        "#,
        params![
            decision,
            crop.map(|c| c[0]),
            crop.map(|c| c[1]),
            crop.map(|c| c[2]),
            crop.map(|c| c[3]),
            moderator,
            moderator_notes,
            now(),
            id,
            expected_revision,
        ],
    )?;
    Ok(changed == 1)
}

impl Database {
    pub fn insert_queued_image(&self, image: &NewQueuedImage) -> rusqlite::Result<i64> {
        insert_queued_image(&self.conn, image)
    }

    pub fn get_queued_image(&self, id: i64) -> rusqlite::Result<Option<QueuedImage>> {
        let sql = format!("SELECT {} FROM queued_images WHERE id = ?", QUEUED_COLUMNS);
        self.conn
            .query_row(&sql, [id], queued_image_from_row)
            .optional()
    }

    /// The moderation queue: undecided entries, oldest first.
    pub fn undecided_queue(&self) -> rusqlite::Result<Vec<QueuedImage>> {
        self.query_queue(
            "WHERE decision = 'undecided' ORDER BY created_at, id",
            [],
        )
    }

    /// Undecided entries for one person, shown next to the upload form.
    pub fn undecided_for_person(&self, person_id: i64) -> rusqlite::Result<Vec<QueuedImage>> {
        self.query_queue(
            "WHERE decision = 'undecided' AND person_id = ? ORDER BY created_at, id",
            [person_id],
        )
    }

    /// Every entry for a person regardless of decision.
    pub fn queued_images_for_person(&self, person_id: i64) -> rusqlite::Result<Vec<QueuedImage>> {
        self.query_queue("WHERE person_id = ? ORDER BY created_at, id", [person_id])
    }

    /// Undecided entries nobody has run face detection on yet.
    pub fn needing_face_detection(&self, limit: usize) -> rusqlite::Result<Vec<QueuedImage>> {
        self.query_queue(
            "WHERE decision = 'undecided' AND face_detection_tried = 0 ORDER BY created_at, id LIMIT ?",
            [limit as i64],
        )
    }

    /// Mark detection as attempted, storing suggested bounds when there are
    /// some. Existing bounds are kept when `crop` is `None`.
    ///
    /// Only applies while the entry is still undecided at
    /// `expected_revision`; returns false when a moderator got there first.
    pub fn record_face_detection(
        &self,
        id: i64,
        expected_revision: i64,
        crop: Option<CropBounds>,
    ) -> rusqlite::Result<bool> {
        let crop = crop.map(|c| [c.min_x, c.min_y, c.max_x, c.max_y]);
        let changed = self.conn.execute(
            r#"
            UPDATE queued_images
            SET face_detection_tried = 1,
                crop_min_x = COALESCE(?, crop_min_x),
                crop_min_y = COALESCE(?, crop_min_y),
                crop_max_x = COALESCE(?, crop_max_x),
                crop_max_y = COALESCE(?, crop_max_y),
                updated_at = ?
            WHERE id = ? AND revision = ? AND decision = 'undecided'
            "#,
            params![
                crop.map(|c| c[0]),
                crop.map(|c| c[1]),
                crop.map(|c| c[2]),
                crop.map(|c| c[3]),
                now(),
                id,
                expected_revision,
            ],
        )?;
        Ok(changed == 1)
    }

    fn query_queue<P: rusqlite::Params>(&self, clause: &str, params: P) -> rusqlite::Result<Vec<QueuedImage>> {
        let sql = format!("SELECT {} FROM queued_images {}", QUEUED_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map(params, queued_image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }
}

pub(crate) fn insert_queued_image(conn: &Connection, image: &NewQueuedImage) -> rusqlite::Result<i64> {
    let timestamp = now();
    conn.execute(
        r#"
        INSERT INTO queued_images (
            person_id, uploaded_by, why_allowed, justification_for_use, decision,
            image_path, image_width, image_height, md5sum, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 'undecided', ?, ?, ?, ?, ?, ?)
        "#,
        params![
            image.person_id,
            image.uploaded_by,
            image.why_allowed,
            image.justification_for_use,
            image.image_path,
            image.image_width,
            image.image_height,
            image.md5sum,
            timestamp,
            timestamp,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_db;

    fn new_entry(person_id: i64, path: &str) -> NewQueuedImage {
        NewQueuedImage {
            person_id,
            uploaded_by: Some("john".to_string()),
            why_allowed: CopyrightOption::PublicDomain,
            justification_for_use: "It's their Twitter avatar".to_string(),
            image_path: path.to_string(),
            image_width: 200,
            image_height: 300,
            md5sum: "abc123".to_string(),
        }
    }

    #[test]
    fn test_crop_bounds_checks() {
        assert!(CropBounds::new(0, 0, 10, 10).check_within(10, 10).is_ok());
        assert!(CropBounds::new(5, 0, 5, 10).check_within(10, 10).is_err());
        assert!(CropBounds::new(6, 0, 5, 10).check_within(10, 10).is_err());
        assert!(CropBounds::new(0, 0, 11, 10).check_within(10, 10).is_err());
        assert_eq!("1, 2,30,40".parse::<CropBounds>(), Ok(CropBounds::new(1, 2, 30, 40)));
        assert!("1,2,3".parse::<CropBounds>().is_err());
        assert!("a,b,c,d".parse::<CropBounds>().is_err());
    }

    #[test]
    fn test_new_entries_start_undecided() {
        let db = memory_db();
        let person = db.create_person("Tessa Jowell").unwrap();
        let id = db.insert_queued_image(&new_entry(person, "queued-images/a.jpg")).unwrap();

        let entry = db.get_queued_image(id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Undecided);
        assert_eq!(entry.revision, 0);
        assert!(!entry.face_detection_tried);
        assert!(!entry.has_crop_bounds());
        assert_eq!(entry.why_allowed, CopyrightOption::PublicDomain);
    }

    #[test]
    fn test_queue_excludes_decided_entries() {
        let db = memory_db();
        let person = db.create_person("Tessa Jowell").unwrap();
        let first = db.insert_queued_image(&new_entry(person, "a.jpg")).unwrap();
        let second = db.insert_queued_image(&new_entry(person, "b.jpg")).unwrap();

        assert!(update_decision(&db.conn, first, 0, Decision::Ignore, None, "jane", None).unwrap());

        let queue: Vec<i64> = db.undecided_queue().unwrap().iter().map(|q| q.id).collect();
        assert_eq!(queue, vec![second]);
        assert_eq!(db.undecided_for_person(person).unwrap().len(), 1);
        assert_eq!(db.queued_images_for_person(person).unwrap().len(), 2);
    }

    #[test]
    fn test_stale_revision_writes_nothing() {
        let db = memory_db();
        let person = db.create_person("Tessa Jowell").unwrap();
        let id = db.insert_queued_image(&new_entry(person, "a.jpg")).unwrap();

        assert!(update_decision(&db.conn, id, 0, Decision::Rejected, None, "jane", Some("blurry")).unwrap());
        assert!(!update_decision(&db.conn, id, 0, Decision::Approved, None, "bob", None).unwrap());

        let entry = db.get_queued_image(id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Rejected);
        assert_eq!(entry.moderator.as_deref(), Some("jane"));
        assert_eq!(entry.moderator_notes.as_deref(), Some("blurry"));
        assert_eq!(entry.revision, 1);
    }

    #[test]
    fn test_face_detection_flag_set_without_bounds() {
        let db = memory_db();
        let person = db.create_person("Tessa Jowell").unwrap();
        let id = db.insert_queued_image(&new_entry(person, "a.jpg")).unwrap();
        assert_eq!(db.needing_face_detection(10).unwrap().len(), 1);

        assert!(db.record_face_detection(id, 0, None).unwrap());
        let entry = db.get_queued_image(id).unwrap().unwrap();
        assert!(entry.face_detection_tried);
        assert!(entry.crop.is_none());
        assert!(db.needing_face_detection(10).unwrap().is_empty());

        assert!(db.record_face_detection(id, 0, Some(CropBounds::new(10, 20, 110, 120))).unwrap());
        let entry = db.get_queued_image(id).unwrap().unwrap();
        assert_eq!(entry.crop, Some(CropBounds::new(10, 20, 110, 120)));
    }

    #[test]
    fn test_face_detection_never_touches_decided_entries() {
        let db = memory_db();
        let person = db.create_person("Tessa Jowell").unwrap();
        let id = db.insert_queued_image(&new_entry(person, "a.jpg")).unwrap();
        let approved = CropBounds::new(0, 0, 50, 50);
        assert!(update_decision(&db.conn, id, 0, Decision::Approved, Some(approved), "jane", None).unwrap());

        // Stale revision, then the current one: both refused once decided
        assert!(!db.record_face_detection(id, 0, Some(CropBounds::new(70, 20, 110, 60))).unwrap());
        assert!(!db.record_face_detection(id, 1, Some(CropBounds::new(70, 20, 110, 60))).unwrap());

        let entry = db.get_queued_image(id).unwrap().unwrap();
        assert_eq!(entry.crop, Some(approved));
        assert!(!entry.face_detection_tried);
        assert_eq!(entry.revision, 1);
    }
}

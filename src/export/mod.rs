use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::{Database, QueuedImage};
use crate::faces::review_defaults;

/// Queue entry as handed to moderator tooling
#[derive(Debug, Serialize)]
pub struct ExportedEntry {
    pub id: i64,
    pub person_id: i64,
    pub person_name: Option<String>,
    pub uploaded_by: Option<String>,
    pub why_allowed: String,
    pub justification_for_use: String,
    pub image_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub md5sum: String,
    pub face_detection_tried: bool,
    /// `[min_x, min_y, max_x, max_y]` to pre-fill the crop with.
    pub crop: [u32; 4],
    pub revision: i64,
    pub created_at: String,
}

fn exported_entry(db: &Database, entry: QueuedImage) -> Result<ExportedEntry> {
    let person_name = db.get_person(entry.person_id)?.map(|p| p.name);
    let crop = review_defaults(&entry);

    Ok(ExportedEntry {
        id: entry.id,
        person_id: entry.person_id,
        person_name,
        uploaded_by: entry.uploaded_by,
        why_allowed: entry.why_allowed.to_string(),
        justification_for_use: entry.justification_for_use,
        image_path: entry.image_path,
        image_width: entry.image_width,
        image_height: entry.image_height,
        md5sum: entry.md5sum,
        face_detection_tried: entry.face_detection_tried,
        crop: [crop.min_x, crop.min_y, crop.max_x, crop.max_y],
        revision: entry.revision,
        created_at: entry.created_at,
    })
}

/// Undecided entries, oldest first
pub fn queue_entries(db: &Database) -> Result<Vec<ExportedEntry>> {
    db.undecided_queue()?
        .into_iter()
        .map(|entry| exported_entry(db, entry))
        .collect()
}

/// Pretty-printed JSON listing of the undecided queue
pub fn queue_json(db: &Database) -> Result<String> {
    Ok(serde_json::to_string_pretty(&queue_entries(db)?)?)
}

/// Write the undecided queue as JSON. Returns the number of entries.
pub fn export_queue_json(db: &Database, output_path: &Path) -> Result<usize> {
    let entries = queue_entries(db)?;
    let json = serde_json::to_string_pretty(&entries)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(entries.len())
}

/// Write the action log as CSV to any writer. Returns the number of rows.
pub fn write_actions_csv<W: Write>(db: &Database, out: W) -> Result<usize> {
    let actions = db.logged_actions()?;
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record([
        "id",
        "created_at",
        "user",
        "action_type",
        "person_id",
        "queued_image_id",
        "source",
    ])?;

    for action in &actions {
        wtr.write_record([
            &action.id.to_string(),
            &action.created_at,
            action.user.as_deref().unwrap_or(""),
            &action.action_type,
            &action.person_id.map(|v| v.to_string()).unwrap_or_default(),
            &action.queued_image_id.map(|v| v.to_string()).unwrap_or_default(),
            &action.source,
        ])?;
    }

    wtr.flush()?;
    Ok(actions.len())
}

/// Export the action log to a CSV file
pub fn export_actions_csv(db: &Database, output_path: &Path) -> Result<usize> {
    let file = File::create(output_path)?;
    write_actions_csv(db, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageConfig, UploadConfig};
    use crate::db::test_support::memory_db;
    use crate::db::CopyrightOption;
    use crate::intake::{Intake, Upload};
    use crate::media::{test_images, MediaStore};
    use crate::moderation::Moderator;
    use tempfile::tempdir;

    fn populated(dir: &Path) -> (Database, MediaStore) {
        let db = memory_db();
        let media = MediaStore::new(dir, ImageConfig::default());
        let config = UploadConfig::default();
        let person = db.create_person("Diane Abbott").unwrap();

        for (user, size) in [(Some("john"), 40), (None, 50)] {
            let png = test_images::png(size, size);
            Intake::new(&db, &media, &config)
                .submit(&Upload {
                    person_id: person,
                    bytes: &png,
                    uploaded_by: user,
                    why_allowed: CopyrightOption::Other,
                    justification_for_use: "Campaign leaflet, with permission",
                })
                .unwrap();
        }
        (db, media)
    }

    #[test]
    fn test_actions_csv() {
        let dir = tempdir().unwrap();
        let (db, media) = populated(dir.path());
        let entry = db.undecided_queue().unwrap().remove(1);
        Moderator::new(&db, &media).ignore(&entry, "jane").unwrap();

        let output = dir.path().join("actions.csv");
        assert_eq!(export_actions_csv(&db, &output).unwrap(), 3);

        let mut rdr = csv::Reader::from_path(&output).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[3], "action_type");

        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][3], "photo-upload");
        assert_eq!(&rows[1][2], "");
        assert_eq!(&rows[2][2], "jane");
        assert_eq!(&rows[2][3], "photo-ignore");
        assert!(rows[2][6].contains("a script"));
    }

    #[test]
    fn test_queue_json_lists_undecided_only() {
        let dir = tempdir().unwrap();
        let (db, media) = populated(dir.path());
        let first = db.undecided_queue().unwrap().remove(0);
        Moderator::new(&db, &media).reject(&first, "jane", "blurry").unwrap();

        let output = dir.path().join("queue.json");
        assert_eq!(export_queue_json(&db, &output).unwrap(), 1);

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let entries = value.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["person_name"], "Diane Abbott");
        assert_eq!(entries[0]["why_allowed"], "other");
        assert!(entries[0]["uploaded_by"].is_null());
        assert_eq!(entries[0]["crop"], serde_json::json!([0, 0, 50, 50]));
    }
}

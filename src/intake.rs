//! Accepting uploads into the moderation queue.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{CropConfig, FaceConfig, UploadConfig};
use crate::db::actions::insert_action;
use crate::db::queue::insert_queued_image;
use crate::db::{ActionType, CopyrightOption, CropBounds, Database, NewAction, NewQueuedImage, QueuedImage};
use crate::error::{ModerationError, ModerationResult};
use crate::faces::{detect_with_timeout, suggest_crop, DetectionOutcome, FaceDetector, UltraFaceDetector};
use crate::hashing::{is_duplicate_digest, ContentDigest};
use crate::media::{self, MediaStore};

/// An upload as delivered by the web form or an import script.
#[derive(Debug, Clone)]
pub struct Upload<'a> {
    pub person_id: i64,
    pub bytes: &'a [u8],
    /// `None` for script imports.
    pub uploaded_by: Option<&'a str>,
    pub why_allowed: CopyrightOption,
    pub justification_for_use: &'a str,
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub entry_id: i64,
    pub digest: ContentDigest,
    /// The same bytes are already on the person's public record. Advisory.
    pub duplicate: bool,
}

pub struct Intake<'a> {
    db: &'a Database,
    media: &'a MediaStore,
    config: &'a UploadConfig,
}

impl<'a> Intake<'a> {
    pub fn new(db: &'a Database, media: &'a MediaStore, config: &'a UploadConfig) -> Self {
        Self { db, media, config }
    }

    /// Whether `bytes` match an image already published for the person.
    pub fn check_duplicate(&self, person_id: i64, bytes: &[u8]) -> ModerationResult<bool> {
        let existing = self.db.images_for_person(person_id)?;
        Ok(is_duplicate_digest(&existing, &ContentDigest::of(bytes)))
    }

    /// Validate and queue an upload as `undecided`.
    pub fn submit(&self, upload: &Upload<'_>) -> ModerationResult<UploadReceipt> {
        if self.db.get_person(upload.person_id)?.is_none() {
            return Err(ModerationError::NotFound {
                kind: "person",
                id: upload.person_id,
            });
        }

        let justification = upload.justification_for_use.trim();
        if upload.why_allowed == CopyrightOption::Other && justification.is_empty() {
            return Err(ModerationError::validation(
                "If you checked 'Other' then you must provide a justification for why we can use it.",
            ));
        }
        if upload.bytes.len() as u64 > self.config.max_bytes {
            return Err(ModerationError::validation(format!(
                "upload is {} bytes, the limit is {}",
                upload.bytes.len(),
                self.config.max_bytes
            )));
        }

        let info = media::inspect(upload.bytes)
            .map_err(|e| ModerationError::validation(format!("not a recognised image: {}", e)))?;

        let digest = ContentDigest::of(upload.bytes);
        let duplicate = self.check_duplicate(upload.person_id, upload.bytes)?;
        if duplicate {
            tracing::info!(person = upload.person_id, digest = %digest, "Upload duplicates a published image");
            if self.config.block_duplicates {
                return Err(ModerationError::Duplicate {
                    digest: digest.to_string(),
                });
            }
        }

        let image_path = self.media.store_upload(upload.bytes, info.extension())?;
        let entry = NewQueuedImage {
            person_id: upload.person_id,
            uploaded_by: upload.uploaded_by.map(str::to_string),
            why_allowed: upload.why_allowed,
            justification_for_use: justification.to_string(),
            image_path: image_path.clone(),
            image_width: info.width,
            image_height: info.height,
            md5sum: digest.to_string(),
        };

        let entry_id = match self.queue_entry(&entry) {
            Ok(id) => id,
            Err(e) => {
                if let Err(rm) = self.media.remove(&image_path) {
                    tracing::warn!(path = %image_path, error = %rm, "Failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };

        tracing::info!(
            entry = entry_id,
            person = upload.person_id,
            user = upload.uploaded_by.unwrap_or("-"),
            width = info.width,
            height = info.height,
            "Queued photo upload"
        );

        Ok(UploadReceipt {
            entry_id,
            digest,
            duplicate,
        })
    }

    fn queue_entry(&self, entry: &NewQueuedImage) -> rusqlite::Result<i64> {
        let tx = self.db.transaction()?;
        let entry_id = insert_queued_image(&tx, entry)?;
        insert_action(
            &tx,
            &NewAction {
                user: entry.uploaded_by.as_deref(),
                action_type: ActionType::PhotoUpload,
                person_id: entry.person_id,
                queued_image_id: entry_id,
                source: &entry.justification_for_use,
            },
        )?;
        tx.commit()?;
        Ok(entry_id)
    }
}

/// What a seeding pass did to a queued image.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedOutcome {
    Faces { count: usize, crop: CropBounds },
    NoFaces { crop: CropBounds },
    DetectionUnavailable { reason: String },
    /// The stored file is missing or does not decode.
    Unreadable { reason: String },
    /// A moderator decided the entry while detection ran; nothing stored.
    Superseded,
}

/// Fills in suggested crop bounds from a best-effort face detection pass.
pub struct CropSeeder {
    detector: Arc<dyn FaceDetector>,
    timeout: Duration,
    crop: CropConfig,
}

impl CropSeeder {
    pub fn new(detector: Arc<dyn FaceDetector>, timeout: Duration, crop: CropConfig) -> Self {
        Self {
            detector,
            timeout,
            crop,
        }
    }

    /// Seeder backed by the UltraFace model. Fetches the model on first use.
    pub fn from_config(faces: &FaceConfig, crop: &CropConfig) -> anyhow::Result<Self> {
        let detector = UltraFaceDetector::load(&faces.models_dir, faces.confidence_threshold)?;
        Ok(Self::new(Arc::new(detector), faces.timeout(), crop.clone()))
    }

    /// Run detection on `entry` and store suggested bounds when it worked.
    ///
    /// `face_detection_tried` is set whatever happens, so images known to
    /// be bad are not retried. Only database failures are errors.
    pub async fn seed_crop_bounds(&self, db: &Database, media: &MediaStore, entry: &QueuedImage) -> ModerationResult<SeedOutcome> {
        let outcome = match media.read(&entry.image_path) {
            Err(e) => SeedOutcome::Unreadable {
                reason: e.to_string(),
            },
            Ok(bytes) => match media::decode(&bytes) {
                Err(e) => SeedOutcome::Unreadable {
                    reason: e.to_string(),
                },
                Ok(img) => self.detect(img).await,
            },
        };

        let crop = match &outcome {
            SeedOutcome::Faces { crop, .. } | SeedOutcome::NoFaces { crop } => Some(*crop),
            _ => None,
        };
        if !db.record_face_detection(entry.id, entry.revision, crop)? {
            tracing::info!(
                entry = entry.id,
                revision = entry.revision,
                "Entry decided during face detection, keeping its crop"
            );
            return Ok(SeedOutcome::Superseded);
        }

        match &outcome {
            SeedOutcome::Faces { count, crop } => {
                tracing::info!(entry = entry.id, faces = count, crop = %crop, "Set crop bounds from faces")
            }
            SeedOutcome::NoFaces { crop } => {
                tracing::info!(entry = entry.id, crop = %crop, "Couldn't find a face, using default crop")
            }
            SeedOutcome::DetectionUnavailable { reason } => {
                tracing::warn!(entry = entry.id, reason = %reason, "Face detection unavailable")
            }
            SeedOutcome::Unreadable { reason } => {
                tracing::warn!(entry = entry.id, path = %entry.image_path, reason = %reason, "Skipping unreadable queued image")
            }
            SeedOutcome::Superseded => {}
        }
        Ok(outcome)
    }

    async fn detect(&self, img: image::DynamicImage) -> SeedOutcome {
        let (width, height) = (img.width(), img.height());
        let outcome = detect_with_timeout(self.detector.clone(), Arc::new(img), self.timeout).await;

        match outcome {
            DetectionOutcome::Faces(faces) if !faces.is_empty() => SeedOutcome::Faces {
                count: faces.len(),
                crop: suggest_crop(&faces, width, height, &self.crop),
            },
            DetectionOutcome::Faces(_) => SeedOutcome::NoFaces {
                crop: suggest_crop(&[], width, height, &self.crop),
            },
            DetectionOutcome::Unavailable { reason } => SeedOutcome::DetectionUnavailable { reason },
        }
    }
}

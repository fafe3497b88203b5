//! Moderator decisions on queued images.
//!
//! Every transition runs in one SQLite transaction together with its side
//! effects (public image record, primary flag, audit entry), so the queue
//! and the public record never disagree. Concurrent moderators are handled
//! optimistically: a decision is applied against the revision the moderator
//! saw, and a stale revision fails with [`ModerationError::Conflict`].
//!
//! Approvals and rejections of uploads from a named user also queue a
//! notice for that user in the same transaction. Script uploads and ignored
//! entries get none.

use image::GenericImageView;

use crate::config::NotifyConfig;
use crate::db::actions::insert_action;
use crate::db::images::{clear_primary, insert_public_image};
use crate::db::notifications::insert_notification;
use crate::db::queue::update_decision;
use crate::db::{
    ActionType, CopyrightOption, CropBounds, Database, Decision, NewAction, NewNotification, NewPublicImage,
    NotificationKind, QueuedImage,
};
use crate::error::{ModerationError, ModerationResult};
use crate::hashing::{calculate_hashes, ContentDigest};
use crate::media::{self, MediaStore};

const APPROVED_NOTE: &str = "Approved from photo moderation queue";

#[derive(Debug, Clone)]
pub struct ApproveRequest {
    pub crop: CropBounds,
    pub moderator_why_allowed: CopyrightOption,
    pub make_primary: bool,
}

#[derive(Debug, Clone)]
pub enum ReviewDecision {
    Approve(ApproveRequest),
    Reject { reason: String },
    Ignore,
    /// Leave the entry in the queue untouched.
    Undecided,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved { public_image_id: i64 },
    Rejected,
    Ignored,
    LeftInQueue,
}

pub struct Moderator<'a> {
    db: &'a Database,
    media: &'a MediaStore,
    notify: NotifyConfig,
}

fn uploader_name(entry: &QueuedImage) -> &str {
    entry.uploaded_by.as_deref().unwrap_or("a script")
}

fn check_moderator(moderator: &str) -> ModerationResult<()> {
    if moderator.trim().is_empty() {
        return Err(ModerationError::validation("a moderator name is required"));
    }
    Ok(())
}

fn site_link(notify: &NotifyConfig, path: &str) -> String {
    format!("{}/{}", notify.site_url.trim_end_matches('/'), path)
}

fn approval_notice(notify: &NotifyConfig, recipient: &str, entry: &QueuedImage) -> NewNotification {
    let site = &notify.site_name;
    NewNotification {
        kind: NotificationKind::PhotoApproved,
        recipient: recipient.to_string(),
        copy_support: false,
        person_id: entry.person_id,
        queued_image_id: entry.id,
        subject: format!("{} image upload approved", site),
        body: format!(
            "Thank-you for submitting a photo to {site}; that's been uploaded now \
             for the candidate page here:\n\n  {link}\n\nMany thanks from the {site} volunteers\n",
            site = site,
            link = site_link(notify, &format!("person/{}", entry.person_id)),
        ),
        reason: None,
    }
}

fn rejection_notice(
    notify: &NotifyConfig,
    recipient: &str,
    entry: &QueuedImage,
    candidate: &str,
    reason: &str,
) -> NewNotification {
    let site = &notify.site_name;
    NewNotification {
        kind: NotificationKind::PhotoRejected,
        recipient: recipient.to_string(),
        copy_support: true,
        person_id: entry.person_id,
        queued_image_id: entry.id,
        subject: format!("{} image moderation results", site),
        body: format!(
            "Thank-you for uploading a photo of {candidate} to {site}, but \
             unfortunately we can't use that image because:\n\n  {reason}\n\n\
             You can just reply to this email if you want to discuss that \
             further, or you can try uploading a photo with a different reason \
             or justification for its use using this link:\n\n  {link}\n\n\
             Many thanks from the {site} volunteers\n",
            candidate = candidate,
            site = site,
            reason = reason,
            link = site_link(notify, &format!("moderation/photo/upload/{}", entry.person_id)),
        ),
        reason: Some(reason.to_string()),
    }
}

impl<'a> Moderator<'a> {
    pub fn new(db: &'a Database, media: &'a MediaStore) -> Self {
        Self {
            db,
            media,
            notify: NotifyConfig::default(),
        }
    }

    /// Site details used in the notices sent to uploaders.
    pub fn with_notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    /// Fetch an entry, failing with `NotFound` when it does not exist.
    pub fn load(&self, id: i64) -> ModerationResult<QueuedImage> {
        self.db
            .get_queued_image(id)?
            .ok_or(ModerationError::NotFound {
                kind: "queued image",
                id,
            })
    }

    pub fn review(
        &self,
        entry: &QueuedImage,
        moderator: &str,
        decision: ReviewDecision,
    ) -> ModerationResult<ReviewOutcome> {
        match decision {
            ReviewDecision::Approve(request) => {
                let public_image_id = self.approve(entry, moderator, &request)?;
                Ok(ReviewOutcome::Approved { public_image_id })
            }
            ReviewDecision::Reject { reason } => {
                self.reject(entry, moderator, &reason)?;
                Ok(ReviewOutcome::Rejected)
            }
            ReviewDecision::Ignore => {
                self.ignore(entry, moderator)?;
                Ok(ReviewOutcome::Ignored)
            }
            ReviewDecision::Undecided => {
                tracing::info!(entry = entry.id, moderator, "Left photo upload in the queue");
                Ok(ReviewOutcome::LeftInQueue)
            }
        }
    }

    /// Publish the cropped image on the person's record and mark the entry
    /// approved. Returns the new public image id.
    ///
    /// Approving an already decided entry is an explicit override; it adds
    /// another public image and never removes the earlier one.
    pub fn approve(&self, entry: &QueuedImage, moderator: &str, request: &ApproveRequest) -> ModerationResult<i64> {
        check_moderator(moderator)?;
        request
            .crop
            .check_within(entry.image_width, entry.image_height)
            .map_err(ModerationError::Validation)?;

        let original = media::decode(&self.media.read(&entry.image_path)?)?;
        let (width, height) = original.dimensions();
        request
            .crop
            .check_within(width, height)
            .map_err(ModerationError::Validation)?;

        let png = media::crop_to_png(&original, &request.crop)?;
        let hashes = calculate_hashes(&png);
        let path = self.media.store_published(entry.person_id, &png)?;

        match self.commit_approval(entry, moderator, request, &path, &hashes.md5, &hashes.sha256) {
            Ok(public_image_id) => {
                if entry.decision.is_terminal() {
                    tracing::info!(entry = entry.id, previous = %entry.decision, "Overrode earlier decision");
                }
                tracing::info!(
                    entry = entry.id,
                    person = entry.person_id,
                    moderator,
                    crop = %request.crop,
                    public_image = public_image_id,
                    "Approved photo upload"
                );
                Ok(public_image_id)
            }
            Err(e) => {
                if let Err(rm) = self.media.remove(&path) {
                    tracing::warn!(path = %path, error = %rm, "Failed to remove unpublished crop");
                }
                Err(e)
            }
        }
    }

    fn commit_approval(
        &self,
        entry: &QueuedImage,
        moderator: &str,
        request: &ApproveRequest,
        path: &str,
        published_md5: &ContentDigest,
        published_sha256: &str,
    ) -> ModerationResult<i64> {
        let uploaded_by = uploader_name(entry);
        let upload_digest = ContentDigest::from_hex(&entry.md5sum).unwrap_or_else(|| published_md5.clone());

        let tx = self.db.transaction()?;
        if request.make_primary {
            clear_primary(&tx, entry.person_id)?;
        }
        let public_image_id = insert_public_image(
            &tx,
            &NewPublicImage {
                person_id: entry.person_id,
                queued_image_id: Some(entry.id),
                path: path.to_string(),
                source: format!("Uploaded by {}: {}", uploaded_by, APPROVED_NOTE),
                is_primary: request.make_primary,
                md5sum: published_md5.to_string(),
                sha256: published_sha256.to_string(),
                uploading_user: entry.uploaded_by.clone(),
                moderator: Some(moderator.to_string()),
                user_notes: entry.justification_for_use.clone(),
                copyright: request.moderator_why_allowed,
                user_copyright: entry.why_allowed,
                notes: Some(format!(
                    "{}\nUploaded by {}\nModerated by {}\n{}",
                    APPROVED_NOTE,
                    uploaded_by,
                    moderator,
                    upload_digest.marker()
                )),
            },
        )?;

        self.transition(&tx, entry, Decision::Approved, Some(request.crop), moderator, None)?;

        let message = format!(
            "Approved a photo upload from {} who provided the message: \"{}\"",
            uploaded_by, entry.justification_for_use
        );
        insert_action(
            &tx,
            &NewAction {
                user: Some(moderator),
                action_type: ActionType::PhotoApprove,
                person_id: entry.person_id,
                queued_image_id: entry.id,
                source: &message,
            },
        )?;

        if let Some(recipient) = entry.uploaded_by.as_deref() {
            insert_notification(&tx, &approval_notice(&self.notify, recipient, entry))?;
        }

        tx.commit()?;
        Ok(public_image_id)
    }

    /// Mark the entry rejected, keeping `reason` for the moderators.
    pub fn reject(&self, entry: &QueuedImage, moderator: &str, reason: &str) -> ModerationResult<()> {
        check_moderator(moderator)?;
        let reason = reason.trim();
        let message = format!("Rejected a photo upload from {}", uploader_name(entry));
        let notice = match entry.uploaded_by.as_deref() {
            Some(recipient) => {
                let candidate = self
                    .db
                    .get_person(entry.person_id)?
                    .ok_or(ModerationError::NotFound {
                        kind: "person",
                        id: entry.person_id,
                    })?;
                Some(rejection_notice(&self.notify, recipient, entry, &candidate.name, reason))
            }
            None => None,
        };

        let tx = self.db.transaction()?;
        self.transition(&tx, entry, Decision::Rejected, None, moderator, Some(reason))?;
        insert_action(
            &tx,
            &NewAction {
                user: Some(moderator),
                action_type: ActionType::PhotoReject,
                person_id: entry.person_id,
                queued_image_id: entry.id,
                source: &message,
            },
        )?;
        if let Some(notice) = &notice {
            insert_notification(&tx, notice)?;
        }
        tx.commit()?;

        tracing::info!(entry = entry.id, person = entry.person_id, moderator, "Rejected photo upload");
        Ok(())
    }

    /// Mark the entry ignored (spam, duplicates). It stays for audit but
    /// drops out of the queue.
    pub fn ignore(&self, entry: &QueuedImage, moderator: &str) -> ModerationResult<()> {
        check_moderator(moderator)?;
        let message = format!(
            "Ignored a photo upload from {} (This usually means it was a duplicate)",
            uploader_name(entry)
        );

        let tx = self.db.transaction()?;
        self.transition(&tx, entry, Decision::Ignore, None, moderator, None)?;
        insert_action(
            &tx,
            &NewAction {
                user: Some(moderator),
                action_type: ActionType::PhotoIgnore,
                person_id: entry.person_id,
                queued_image_id: entry.id,
                source: &message,
            },
        )?;
        tx.commit()?;

        tracing::info!(entry = entry.id, person = entry.person_id, moderator, "Ignored photo upload");
        Ok(())
    }

    fn transition(
        &self,
        tx: &rusqlite::Transaction<'_>,
        entry: &QueuedImage,
        decision: Decision,
        crop: Option<CropBounds>,
        moderator: &str,
        notes: Option<&str>,
    ) -> ModerationResult<()> {
        if !update_decision(tx, entry.id, entry.revision, decision, crop, moderator, notes)? {
            tracing::warn!(entry = entry.id, revision = entry.revision, "Stale decision rejected");
            return Err(ModerationError::Conflict {
                id: entry.id,
                expected: entry.revision,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImageConfig, UploadConfig};
    use crate::db::test_support::memory_db;
    use crate::hashing::is_duplicate;
    use crate::intake::{Intake, Upload};
    use crate::media::test_images;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        db: Database,
        media: MediaStore,
        person: i64,
        bytes: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let db = memory_db();
            let media = MediaStore::new(dir.path(), ImageConfig::default());
            let person = db.create_person("Tessa Jowell").unwrap();
            Self {
                _dir: dir,
                db,
                media,
                person,
                bytes: test_images::png(120, 90),
            }
        }

        fn queue(&self, person: i64, uploaded_by: Option<&str>) -> QueuedImage {
            let config = UploadConfig::default();
            let receipt = Intake::new(&self.db, &self.media, &config)
                .submit(&Upload {
                    person_id: person,
                    bytes: &self.bytes,
                    uploaded_by,
                    why_allowed: CopyrightOption::CopyrightAssigned,
                    justification_for_use: "I took this last week",
                })
                .unwrap();
            self.db.get_queued_image(receipt.entry_id).unwrap().unwrap()
        }

        fn moderator(&self) -> Moderator<'_> {
            Moderator::new(&self.db, &self.media)
        }

        fn published_files(&self) -> usize {
            let dir = self.media.root().join("images");
            if !Path::new(&dir).exists() {
                return 0;
            }
            std::fs::read_dir(dir).unwrap().count()
        }
    }

    fn approve_request(crop: CropBounds) -> ApproveRequest {
        ApproveRequest {
            crop,
            moderator_why_allowed: CopyrightOption::ProfilePhoto,
            make_primary: true,
        }
    }

    #[test]
    fn test_approve_publishes_exactly_one_image() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        let id = fx
            .moderator()
            .approve(&entry, "jane", &approve_request(CropBounds::new(10, 10, 60, 70)))
            .unwrap();

        let images = fx.db.images_for_person(fx.person).unwrap();
        assert_eq!(images.len(), 1);
        let image = &images[0];
        assert_eq!(image.id, id);
        assert!(image.is_primary);
        assert_eq!(image.source, "Uploaded by john: Approved from photo moderation queue");
        assert_eq!(image.uploading_user.as_deref(), Some("john"));
        assert_eq!(image.moderator.as_deref(), Some("jane"));
        assert_eq!(image.user_notes, "I took this last week");
        assert_eq!(image.copyright, "profile-photo");
        assert_eq!(image.user_copyright, "copyright-assigned");
        let notes = image.notes.as_deref().unwrap();
        assert!(notes.contains("Uploaded by john\nModerated by jane"));
        assert!(notes.contains(&format!("md5sum:{}", entry.md5sum)));

        let published = media::inspect(&fx.media.read(&image.path).unwrap()).unwrap();
        assert_eq!((published.width, published.height), (50, 60));
        assert_eq!(ContentDigest::of(&fx.media.read(&image.path).unwrap()).as_str(), image.md5sum);

        let entry = fx.db.get_queued_image(entry.id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Approved);
        assert_eq!(entry.crop, Some(CropBounds::new(10, 10, 60, 70)));
        assert_eq!(entry.moderator.as_deref(), Some("jane"));
        assert_eq!(entry.revision, 1);

        let actions = fx.db.logged_actions().unwrap();
        let last = actions.last().unwrap();
        assert_eq!(last.action_type, "photo-approve");
        assert_eq!(last.user.as_deref(), Some("jane"));
        assert!(last.source.contains("\"I took this last week\""));
    }

    #[test]
    fn test_approved_bytes_are_detected_as_duplicate() {
        let fx = Fixture::new();
        let other = fx.db.create_person("Someone Else").unwrap();
        let entry = fx.queue(fx.person, Some("john"));
        fx.moderator()
            .approve(&entry, "jane", &approve_request(CropBounds::new(0, 0, 50, 50)))
            .unwrap();

        assert!(is_duplicate(&fx.db.images_for_person(fx.person).unwrap(), &fx.bytes));
        assert!(!is_duplicate(&fx.db.images_for_person(other).unwrap(), &fx.bytes));
    }

    #[test]
    fn test_zero_area_crop_is_rejected() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        let result = fx
            .moderator()
            .approve(&entry, "jane", &approve_request(CropBounds::new(30, 10, 30, 70)));
        assert!(matches!(result, Err(ModerationError::Validation(_))));

        let entry = fx.db.get_queued_image(entry.id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Undecided);
        assert_eq!(entry.revision, 0);
        assert!(fx.db.images_for_person(fx.person).unwrap().is_empty());
        assert_eq!(fx.published_files(), 0);
    }

    #[test]
    fn test_out_of_bounds_crop_is_rejected() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        let result = fx
            .moderator()
            .approve(&entry, "jane", &approve_request(CropBounds::new(0, 0, 121, 90)));
        assert!(matches!(result, Err(ModerationError::Validation(_))));
        assert_eq!(fx.db.get_queued_image(entry.id).unwrap().unwrap().decision, Decision::Undecided);
    }

    #[test]
    fn test_reapproval_appends_public_history() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));
        let moderator = fx.moderator();

        let first = moderator
            .approve(&entry, "jane", &approve_request(CropBounds::new(0, 0, 40, 40)))
            .unwrap();
        let entry = moderator.load(entry.id).unwrap();
        let second = moderator
            .approve(&entry, "bob", &approve_request(CropBounds::new(20, 20, 100, 80)))
            .unwrap();

        let images = fx.db.images_for_person(fx.person).unwrap();
        assert_eq!(images.iter().map(|i| i.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(fx.db.primary_image(fx.person).unwrap().unwrap().id, second);
        assert_eq!(fx.published_files(), 2);

        let entry = moderator.load(entry.id).unwrap();
        assert_eq!(entry.decision, Decision::Approved);
        assert_eq!(entry.crop, Some(CropBounds::new(20, 20, 100, 80)));
        assert_eq!(entry.revision, 2);
    }

    #[test]
    fn test_stale_entry_conflicts_without_side_effects() {
        let fx = Fixture::new();
        let stale = fx.queue(fx.person, Some("john"));
        let moderator = fx.moderator();

        moderator.reject(&stale, "jane", "Not the candidate").unwrap();
        let result = moderator.approve(&stale, "bob", &approve_request(CropBounds::new(0, 0, 40, 40)));

        assert!(matches!(result, Err(ModerationError::Conflict { expected: 0, .. })));
        assert!(fx.db.images_for_person(fx.person).unwrap().is_empty());
        assert_eq!(fx.published_files(), 0);
        assert_eq!(moderator.load(stale.id).unwrap().decision, Decision::Rejected);

        let notices = fx.db.notifications_for(stale.id).unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NotificationKind::PhotoRejected);
    }

    #[test]
    fn test_storage_failure_rolls_back_everything() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));
        fx.db.conn.execute("DROP TABLE logged_actions", []).unwrap();

        let result = fx
            .moderator()
            .approve(&entry, "jane", &approve_request(CropBounds::new(0, 0, 40, 40)));

        assert!(matches!(result, Err(ModerationError::Persistence(_))));
        assert!(!result.unwrap_err().is_user_error());
        assert!(fx.db.images_for_person(fx.person).unwrap().is_empty());
        assert_eq!(fx.published_files(), 0);
        assert!(fx.db.pending_notifications().unwrap().is_empty());
        let entry = fx.db.get_queued_image(entry.id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Undecided);
        assert_eq!(entry.revision, 0);
    }

    #[test]
    fn test_reject_keeps_reason_and_publishes_nothing() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, None);

        fx.moderator().reject(&entry, "jane", "  Not the candidate ").unwrap();

        let entry = fx.db.get_queued_image(entry.id).unwrap().unwrap();
        assert_eq!(entry.decision, Decision::Rejected);
        assert_eq!(entry.moderator_notes.as_deref(), Some("Not the candidate"));
        assert!(fx.db.images_for_person(fx.person).unwrap().is_empty());
        assert!(fx.db.undecided_queue().unwrap().is_empty());

        let last = fx.db.logged_actions().unwrap().pop().unwrap();
        assert_eq!(last.action_type, "photo-reject");
        assert_eq!(last.source, "Rejected a photo upload from a script");
    }

    #[test]
    fn test_ignore_drops_out_of_queue_but_stays_for_audit() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        let outcome = fx.moderator().review(&entry, "jane", ReviewDecision::Ignore).unwrap();
        assert_eq!(outcome, ReviewOutcome::Ignored);

        assert!(fx.db.undecided_queue().unwrap().is_empty());
        let all = fx.db.queued_images_for_person(fx.person).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].decision, Decision::Ignore);
        assert!(fx.db.images_for_person(fx.person).unwrap().is_empty());
    }

    #[test]
    fn test_leaving_undecided_changes_nothing() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        let outcome = fx.moderator().review(&entry, "jane", ReviewDecision::Undecided).unwrap();
        assert_eq!(outcome, ReviewOutcome::LeftInQueue);

        let reloaded = fx.db.get_queued_image(entry.id).unwrap().unwrap();
        assert_eq!(reloaded.decision, Decision::Undecided);
        assert_eq!(reloaded.revision, 0);
        assert_eq!(fx.db.logged_actions().unwrap().len(), 1);
    }

    #[test]
    fn test_moderator_name_required() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));
        assert!(matches!(fx.moderator().ignore(&entry, " "), Err(ModerationError::Validation(_))));
        assert!(matches!(
            fx.moderator().load(entry.id + 10),
            Err(ModerationError::NotFound { .. })
        ));
    }

    fn site() -> NotifyConfig {
        NotifyConfig {
            site_name: "YourNextMP".to_string(),
            site_url: "https://candidates.example.org/".to_string(),
            support_email: Some("support@example.org".to_string()),
        }
    }

    #[test]
    fn test_approval_notifies_uploader() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        fx.moderator()
            .with_notify(site())
            .approve(&entry, "jane", &approve_request(CropBounds::new(0, 0, 50, 50)))
            .unwrap();

        let pending = fx.db.pending_notifications().unwrap();
        assert_eq!(pending.len(), 1);
        let notice = &pending[0];
        assert_eq!(notice.kind, NotificationKind::PhotoApproved);
        assert_eq!(notice.recipient, "john");
        assert_eq!(notice.person_id, fx.person);
        assert_eq!(notice.queued_image_id, entry.id);
        assert!(!notice.copy_support);
        assert!(notice.reason.is_none());
        assert_eq!(notice.subject, "YourNextMP image upload approved");
        assert!(notice
            .body
            .contains(&format!("https://candidates.example.org/person/{}", fx.person)));
    }

    #[test]
    fn test_rejection_notice_carries_reason_and_retry_link() {
        let fx = Fixture::new();
        let entry = fx.queue(fx.person, Some("john"));

        fx.moderator()
            .with_notify(site())
            .reject(&entry, "jane", " Not the candidate ")
            .unwrap();

        let notices = fx.db.notifications_for(entry.id).unwrap();
        assert_eq!(notices.len(), 1);
        let notice = &notices[0];
        assert_eq!(notice.kind, NotificationKind::PhotoRejected);
        assert_eq!(notice.recipient, "john");
        assert!(notice.copy_support);
        assert_eq!(notice.reason.as_deref(), Some("Not the candidate"));
        assert_eq!(notice.subject, "YourNextMP image moderation results");
        assert!(notice.body.contains("a photo of Tessa Jowell to YourNextMP"));
        assert!(notice.body.contains("because:\n\n  Not the candidate\n"));
        assert!(notice.body.contains(&format!(
            "https://candidates.example.org/moderation/photo/upload/{}",
            fx.person
        )));
    }

    #[test]
    fn test_script_uploads_and_ignores_notify_nobody() {
        let fx = Fixture::new();
        let moderator = fx.moderator();

        let approved = fx.queue(fx.person, None);
        moderator
            .approve(&approved, "jane", &approve_request(CropBounds::new(0, 0, 50, 50)))
            .unwrap();
        let rejected = fx.queue(fx.person, None);
        moderator.reject(&rejected, "jane", "Blurry").unwrap();
        let ignored = fx.queue(fx.person, Some("john"));
        moderator.ignore(&ignored, "jane").unwrap();

        assert!(fx.db.pending_notifications().unwrap().is_empty());
    }
}

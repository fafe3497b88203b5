pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Candidates whose photos are moderated
CREATE TABLE IF NOT EXISTS people (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Uploaded photos waiting for (or past) a moderator decision
CREATE TABLE IF NOT EXISTS queued_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL,
    uploaded_by TEXT,                  -- NULL when added by a script
    why_allowed TEXT NOT NULL DEFAULT 'other',
    justification_for_use TEXT NOT NULL DEFAULT '',
    decision TEXT NOT NULL DEFAULT 'undecided',
    image_path TEXT NOT NULL,          -- relative to media_root
    image_width INTEGER NOT NULL,
    image_height INTEGER NOT NULL,
    md5sum TEXT NOT NULL,              -- digest of the uploaded bytes

    -- Crop bounds, half-open pixel ranges [min, max)
    crop_min_x INTEGER,
    crop_min_y INTEGER,
    crop_max_x INTEGER,
    crop_max_y INTEGER,

    face_detection_tried INTEGER NOT NULL DEFAULT 0,

    -- Moderator bookkeeping
    moderator TEXT,
    moderator_notes TEXT,
    revision INTEGER NOT NULL DEFAULT 0,

    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_queued_images_person ON queued_images(person_id);

-- Images published on a person's public record (append-only)
CREATE TABLE IF NOT EXISTS person_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL,
    queued_image_id INTEGER,
    path TEXT NOT NULL,                -- relative to media_root
    source TEXT NOT NULL DEFAULT '',
    is_primary INTEGER NOT NULL DEFAULT 0,
    md5sum TEXT NOT NULL DEFAULT '',   -- digest of the published file
    sha256 TEXT NOT NULL DEFAULT '',
    uploading_user TEXT,
    moderator TEXT,
    user_notes TEXT NOT NULL DEFAULT '',
    copyright TEXT NOT NULL DEFAULT 'other',
    user_copyright TEXT NOT NULL DEFAULT '',
    notes TEXT,                        -- provenance, carries the md5sum: marker
    created_at TEXT NOT NULL,
    FOREIGN KEY (person_id) REFERENCES people(id) ON DELETE CASCADE,
    FOREIGN KEY (queued_image_id) REFERENCES queued_images(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_person_images_person ON person_images(person_id);

-- Audit trail of uploads and moderator decisions
CREATE TABLE IF NOT EXISTS logged_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user TEXT,
    action_type TEXT NOT NULL,
    person_id INTEGER,
    queued_image_id INTEGER,
    source TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

-- Messages to uploaders about moderator decisions, drained by a mailer
CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,                -- photo-approved | photo-rejected
    recipient TEXT NOT NULL,           -- uploading user
    copy_support INTEGER NOT NULL DEFAULT 0,
    person_id INTEGER NOT NULL,
    queued_image_id INTEGER NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    reason TEXT,
    created_at TEXT NOT NULL,
    sent_at TEXT,
    FOREIGN KEY (queued_image_id) REFERENCES queued_images(id) ON DELETE CASCADE
);
"#;

/// Applied after `SCHEMA`; failures (already applied) are ignored.
pub const MIGRATIONS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_queued_images_decision ON queued_images(decision, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_person_images_md5 ON person_images(person_id, md5sum)",
    "CREATE INDEX IF NOT EXISTS idx_logged_actions_created ON logged_actions(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_pending ON notifications(sent_at, id)",
];

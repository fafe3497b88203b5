//! Outbox of messages to uploaders. Rows are written in the same
//! transaction as the decision that caused them and drained by whatever
//! delivers mail.

use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::{now, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    PhotoApproved,
    PhotoRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PhotoApproved => "photo-approved",
            NotificationKind::PhotoRejected => "photo-rejected",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo-approved" => Ok(NotificationKind::PhotoApproved),
            "photo-rejected" => Ok(NotificationKind::PhotoRejected),
            other => Err(format!("unknown notification kind {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub recipient: String,
    /// Send a copy to the support address as well.
    pub copy_support: bool,
    pub person_id: i64,
    pub queued_image_id: i64,
    pub subject: String,
    pub body: String,
    /// Moderator's reason, for rejections.
    pub reason: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub copy_support: bool,
    pub person_id: i64,
    pub queued_image_id: i64,
    pub subject: String,
    pub body: String,
    pub reason: Option<String>,
}

const NOTIFICATION_COLUMNS: &str = r#"
    id, kind, recipient, copy_support, person_id, queued_image_id,
    subject, body, reason, created_at, sent_at
"#;

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        kind: row.get(1)?,
        recipient: row.get(2)?,
        copy_support: row.get(3)?,
        person_id: row.get(4)?,
        queued_image_id: row.get(5)?,
        subject: row.get(6)?,
        body: row.get(7)?,
        reason: row.get(8)?,
        created_at: row.get(9)?,
        sent_at: row.get(10)?,
    })
}

pub(crate) fn insert_notification(conn: &Connection, notification: &NewNotification) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO notifications (
            kind, recipient, copy_support, person_id, queued_image_id,
            subject, body, reason, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            notification.kind,
            notification.recipient,
            notification.copy_support,
            notification.person_id,
            notification.queued_image_id,
            notification.subject,
            notification.body,
            notification.reason,
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Unsent notifications, oldest first.
    pub fn pending_notifications(&self) -> rusqlite::Result<Vec<Notification>> {
        self.query_notifications("WHERE sent_at IS NULL ORDER BY id", [])
    }

    /// Everything queued about one upload, sent or not.
    pub fn notifications_for(&self, queued_image_id: i64) -> rusqlite::Result<Vec<Notification>> {
        self.query_notifications("WHERE queued_image_id = ? ORDER BY id", [queued_image_id])
    }

    /// Returns false if it was already sent (or does not exist).
    pub fn mark_notification_sent(&self, id: i64) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications SET sent_at = ? WHERE id = ? AND sent_at IS NULL",
            params![now(), id],
        )?;
        Ok(changed == 1)
    }

    fn query_notifications<P: rusqlite::Params>(&self, clause: &str, params: P) -> rusqlite::Result<Vec<Notification>> {
        let sql = format!("SELECT {} FROM notifications {}", NOTIFICATION_COLUMNS, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(params, notification_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notifications)
    }
}

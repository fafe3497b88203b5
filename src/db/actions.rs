use rusqlite::{params, Connection};
use serde::Serialize;

use super::{now, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionType {
    #[serde(rename = "photo-upload")]
    PhotoUpload,
    #[serde(rename = "photo-approve")]
    PhotoApprove,
    #[serde(rename = "photo-reject")]
    PhotoReject,
    #[serde(rename = "photo-ignore")]
    PhotoIgnore,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PhotoUpload => "photo-upload",
            ActionType::PhotoApprove => "photo-approve",
            ActionType::PhotoReject => "photo-reject",
            ActionType::PhotoIgnore => "photo-ignore",
        }
    }
}

/// One audit trail entry
#[derive(Debug, Clone, Serialize)]
pub struct LoggedAction {
    pub id: i64,
    pub user: Option<String>,
    pub action_type: String,
    pub person_id: Option<i64>,
    pub queued_image_id: Option<i64>,
    pub source: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAction<'a> {
    pub user: Option<&'a str>,
    pub action_type: ActionType,
    pub person_id: i64,
    pub queued_image_id: i64,
    pub source: &'a str,
}

pub(crate) fn insert_action(conn: &Connection, action: &NewAction<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO logged_actions (user, action_type, person_id, queued_image_id, source, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            action.user,
            action.action_type.as_str(),
            action.person_id,
            action.queued_image_id,
            action.source,
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// The audit trail, oldest first.
    pub fn logged_actions(&self) -> rusqlite::Result<Vec<LoggedAction>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user, action_type, person_id, queued_image_id, source, created_at
            FROM logged_actions
            ORDER BY id
            "#,
        )?;
        let actions = stmt
            .query_map([], |row| {
                Ok(LoggedAction {
                    id: row.get(0)?,
                    user: row.get(1)?,
                    action_type: row.get(2)?,
                    person_id: row.get(3)?,
                    queued_image_id: row.get(4)?,
                    source: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }
}

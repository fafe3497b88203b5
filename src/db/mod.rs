mod schema;
pub mod actions;
pub mod images;
pub mod notifications;
pub mod people;
pub mod queue;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Transaction};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub use schema::{MIGRATIONS, SCHEMA};
pub use actions::{ActionType, LoggedAction, NewAction};
pub use images::{DuplicateGroup, NewPublicImage, PublicImage};
pub use notifications::{NewNotification, Notification, NotificationKind};
pub use people::Person;
pub use queue::{CropBounds, NewQueuedImage, QueuedImage};

/// Current time as stored in TEXT timestamp columns.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// A moderator's verdict on a queued image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
    #[default]
    Undecided,
    Ignore,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Rejected => "rejected",
            Decision::Undecided => "undecided",
            Decision::Ignore => "ignore",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Decision::Undecided)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Decision::Approved),
            "rejected" => Ok(Decision::Rejected),
            "undecided" => Ok(Decision::Undecided),
            "ignore" => Ok(Decision::Ignore),
            other => Err(format!("unknown decision {:?}", other)),
        }
    }
}

/// Why the uploader (or moderator) believes the photo may be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CopyrightOption {
    PublicDomain,
    CopyrightAssigned,
    ProfilePhoto,
    #[default]
    Other,
}

impl CopyrightOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopyrightOption::PublicDomain => "public-domain",
            CopyrightOption::CopyrightAssigned => "copyright-assigned",
            CopyrightOption::ProfilePhoto => "profile-photo",
            CopyrightOption::Other => "other",
        }
    }
}

impl fmt::Display for CopyrightOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CopyrightOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public-domain" => Ok(CopyrightOption::PublicDomain),
            "copyright-assigned" => Ok(CopyrightOption::CopyrightAssigned),
            "profile-photo" => Ok(CopyrightOption::ProfilePhoto),
            "other" => Ok(CopyrightOption::Other),
            other => Err(format!("unknown copyright option {:?}", other)),
        }
    }
}

macro_rules! text_column {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

text_column!(Decision);
text_column!(CopyrightOption);
text_column!(NotificationKind);

pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            // A failure here resurfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations();
        Ok(())
    }

    fn run_migrations(&self) {
        for migration in MIGRATIONS {
            if let Err(e) = self.conn.execute(migration, []) {
                tracing::debug!(error = %e, migration, "Skipping migration");
            }
        }
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub(crate) fn transaction(&self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.unchecked_transaction()
    }
}

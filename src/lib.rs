//! Moderation queue for crowd-sourced candidate photos.
//!
//! Uploads land in a queue as `undecided` entries. A best-effort face
//! detection pass seeds crop bounds, and a moderator then approves (publishing
//! a cropped image on the person's public record), rejects, or ignores each
//! entry.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod faces;
pub mod hashing;
pub mod intake;
pub mod logging;
pub mod media;
pub mod moderation;

pub use config::Config;
pub use db::Database;
pub use error::{ModerationError, ModerationResult};

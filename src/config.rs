use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding queued uploads and published crops.
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub faces: FaceConfig,

    #[serde(default)]
    pub crop: CropConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Serve public image URLs over https even when `base_url` says http.
    #[serde(default)]
    pub force_https_images: bool,

    /// Prefix for public image URLs, e.g. "https://example.org/media/".
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "/media/".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            force_https_images: false,
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run detection straight after an upload instead of leaving it to
    /// `photoqueue-detector`.
    #[serde(default = "default_true")]
    pub detect_on_upload: bool,

    /// Upper bound on a single detection pass.
    #[serde(default = "default_detection_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
}

fn default_true() -> bool {
    true
}

fn default_detection_timeout_secs() -> u64 {
    20
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoqueue")
        .join("models")
}

fn default_confidence_threshold() -> f32 {
    0.7
}

impl FaceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detect_on_upload: true,
            timeout_secs: default_detection_timeout_secs(),
            models_dir: default_models_dir(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropConfig {
    /// Padding added on every side of the face union, as a fraction of the
    /// union's longer side.
    #[serde(default = "default_face_margin")]
    pub face_margin: f64,

    /// Width / height of the fallback crop used when no face was found.
    #[serde(default = "default_aspect")]
    pub default_aspect: f64,

    /// Fraction of the shorter image side covered by the fallback crop.
    #[serde(default = "default_fraction")]
    pub default_fraction: f64,
}

fn default_face_margin() -> f64 {
    0.3
}

fn default_aspect() -> f64 {
    3.0 / 4.0
}

fn default_fraction() -> f64 {
    0.8
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            face_margin: default_face_margin(),
            default_aspect: default_aspect(),
            default_fraction: default_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Refuse uploads that are byte-identical to an image already on the
    /// person's record. When false the duplicate is only reported.
    #[serde(default)]
    pub block_duplicates: bool,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,
}

fn default_max_bytes() -> u64 {
    20 * 1024 * 1024 // 20MB
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            block_duplicates: false,
            max_bytes: default_max_bytes(),
        }
    }
}

/// Uploader notifications queued by moderator decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Public site root, used for candidate page and retry-upload links.
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Copied on rejection notices when set.
    #[serde(default)]
    pub support_email: Option<String>,
}

fn default_site_name() -> String {
    "photoqueue".to_string()
}

fn default_site_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            site_url: default_site_url(),
            support_email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Where the rolling log file goes when journald is not available.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Filter used when `PHOTOQUEUE_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default = "default_true")]
    pub journald: bool,
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoqueue")
        .join("logs")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: default_log_filter(),
            journald: true,
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoqueue")
        .join("photoqueue.db")
}

fn default_media_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("photoqueue")
        .join("media")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            media_root: default_media_root(),
            images: ImageConfig::default(),
            faces: FaceConfig::default(),
            crop: CropConfig::default(),
            upload: UploadConfig::default(),
            notify: NotifyConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load from `PHOTOQUEUE_CONFIG` or the default location, writing a
    /// default file if none exists yet.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os("PHOTOQUEUE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {:?}", config_path))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photoqueue")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            media_root = "/srv/media"

            [images]
            force_https_images = true

            [upload]
            block_duplicates = true
            "#,
        )
        .unwrap();

        assert_eq!(config.media_root, PathBuf::from("/srv/media"));
        assert!(config.images.force_https_images);
        assert_eq!(config.images.base_url, "/media/");
        assert!(config.upload.block_duplicates);
        assert_eq!(config.upload.max_bytes, 20 * 1024 * 1024);
        assert!((config.crop.default_aspect - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.faces.timeout(), Duration::from_secs(20));
        assert_eq!(config.notify.site_name, "photoqueue");
        assert!(config.notify.support_email.is_none());
        assert_eq!(config.logging.filter, "info");
        assert!(config.logging.journald);
    }

    #[test]
    fn test_notify_and_logging_sections() {
        let config: Config = toml::from_str(
            r#"
            [notify]
            site_name = "YourNextMP"
            site_url = "https://candidates.example.org/"
            support_email = "support@example.org"

            [logging]
            dir = "/var/log/photoqueue"
            filter = "photoqueue=debug"
            journald = false
            "#,
        )
        .unwrap();

        assert_eq!(config.notify.site_url, "https://candidates.example.org/");
        assert_eq!(config.notify.support_email.as_deref(), Some("support@example.org"));
        assert_eq!(config.logging.dir, PathBuf::from("/var/log/photoqueue"));
        assert_eq!(config.logging.filter, "photoqueue=debug");
        assert!(!config.logging.journald);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(!config.upload.block_duplicates);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.db_path, config.db_path);
    }
}

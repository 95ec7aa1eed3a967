//! Configuration management for vidacquire using the prefer crate.
//!
//! Precedence, lowest first: built-in defaults, discovered config file,
//! environment (`VIDACQUIRE_*`, optionally from `.env`), CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AcquireError;

/// Default desktop identity presented to the target site.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36";

/// Media responses smaller than this are ads, bumpers or thumbnails.
///
/// Empirical, not a protocol guarantee. Tune via `detection.min_candidate_bytes`
/// when a target starts serving smaller primary streams.
pub const DEFAULT_MIN_CANDIDATE_BYTES: u64 = 1024 * 1024;

/// Longest filename stem derived from a page title, in characters.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Top-level configuration, as read from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory finished videos are written to.
    pub save_dir: String,
    pub browser: BrowserSettings,
    pub detection: DetectionSettings,
    pub download: DownloadSettings,
    /// Path the config was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: "videos".to_string(),
            browser: BrowserSettings::default(),
            detection: DetectionSettings::default(),
            download: DownloadSettings::default(),
            source_path: None,
        }
    }
}

/// Browser launch and identity settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window.
    pub headless: bool,
    /// User agent for both the page session and the media request.
    pub user_agent: String,
    /// Referer for both requests. Defaults to the page's origin root.
    pub referer: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Extra anti-detection script injected before any page script runs.
    pub stealth_script: Option<PathBuf>,
    /// Refuse to launch when `stealth_script` is configured but unreadable.
    pub stealth_required: bool,
    /// Explicit Chrome/Chromium executable; skips discovery.
    pub chrome_path: Option<PathBuf>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: None,
            viewport_width: 1920,
            viewport_height: 1080,
            stealth_script: None,
            stealth_required: false,
            chrome_path: None,
            chrome_args: Vec::new(),
            proxy: None,
        }
    }
}

/// Heuristics for telling the real stream apart from decoys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub min_candidate_bytes: u64,
    /// Content-type fragments that mark a response as video.
    pub media_content_types: Vec<String>,
    /// URL path suffixes that mark a response as video.
    pub media_extensions: Vec<String>,
    pub navigation_timeout_secs: u64,
    pub media_wait_timeout_secs: u64,
    /// Pause after the media element appears, for ad-then-content sequencing.
    pub settle_delay_ms: u64,
    /// Synthesize a little pointer movement to wake lazy players.
    pub nudge_pointer: bool,
    /// Selector for the primary media element.
    pub media_selector: String,
    /// Elements tried, in order, when the document title is unusable.
    pub title_selectors: Vec<String>,
    /// Titles that only name the site, not the video.
    pub brand_placeholders: Vec<String>,
    /// Prefix of the timestamped fallback filename.
    pub synthetic_prefix: String,
    pub title_max_chars: usize,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_candidate_bytes: DEFAULT_MIN_CANDIDATE_BYTES,
            media_content_types: vec!["video/mp4".to_string()],
            media_extensions: vec![".mp4".to_string()],
            navigation_timeout_secs: 60,
            media_wait_timeout_secs: 15,
            settle_delay_ms: 2000,
            nudge_pointer: true,
            media_selector: "video".to_string(),
            title_selectors: vec!["h1".to_string(), ".desc".to_string()],
            brand_placeholders: vec!["抖音".to_string(), "Douyin".to_string()],
            synthetic_prefix: "video".to_string(),
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

impl DetectionSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn media_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.media_wait_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Streaming transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Write buffer size in bytes.
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            connect_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers vidacquire config files in standard locations.
    pub async fn load() -> Self {
        let config = match prefer::load("vidacquire").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Ignoring config at {}: {}", path.display(), e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, AcquireError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AcquireError::Config(format!("Failed to read config file: {}", e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, AcquireError> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| AcquireError::Config(format!("Failed to parse TOML config: {}", e))),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| AcquireError::Config(format!("Failed to parse YAML config: {}", e))),
            _ => serde_json::from_str(contents)
                .map_err(|e| AcquireError::Config(format!("Failed to parse JSON config: {}", e))),
        }
    }

    /// Apply `VIDACQUIRE_*` environment variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = get("VIDACQUIRE_SAVE_DIR") {
            self.save_dir = resolve_from_cwd(&dir);
        }
        if let Some(ua) = get("VIDACQUIRE_USER_AGENT") {
            self.browser.user_agent = ua;
        }
        if let Some(headless) = get("VIDACQUIRE_HEADLESS") {
            self.browser.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }
        if let Some(chrome) = get("VIDACQUIRE_CHROME") {
            self.browser.chrome_path = Some(PathBuf::from(chrome));
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve the save directory.
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against the config file's directory when
    ///   one was loaded, else left relative to the working directory
    pub fn save_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.save_dir);
        let path = Path::new(expanded.as_ref());

        match self.base_dir() {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Expand `~` and anchor a relative directory at the working directory.
///
/// Used for directories given outside the config file (flags, environment),
/// which must not be resolved against the config file's location.
pub fn resolve_from_cwd(dir: &str) -> String {
    let expanded = shellexpand::tilde(dir);
    let path = Path::new(expanded.as_ref());
    if path.is_relative() {
        if let Ok(cwd) = std::env::current_dir() {
            return cwd.join(path).to_string_lossy().into_owned();
        }
    }
    expanded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_documented_heuristics() {
        let config = Config::default();
        assert_eq!(config.save_dir, "videos");
        assert_eq!(config.detection.min_candidate_bytes, 1_048_576);
        assert_eq!(config.detection.title_max_chars, 50);
        assert_eq!(config.download.chunk_size, 8192);
        assert!(config.browser.headless);
        assert_eq!(config.browser.viewport_width, 1920);
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let toml = r#"
            save_dir = "/tmp/clips"

            [detection]
            min_candidate_bytes = 2048
            brand_placeholders = ["ExampleTube"]
        "#;
        let config = Config::parse(toml, "toml").unwrap();
        assert_eq!(config.save_dir, "/tmp/clips");
        assert_eq!(config.detection.min_candidate_bytes, 2048);
        assert_eq!(config.detection.brand_placeholders, vec!["ExampleTube"]);
        assert_eq!(config.detection.title_max_chars, 50);
        assert_eq!(config.browser.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "browser:\n  headless: false\n  viewport_width: 1280\n";
        let config = Config::parse(yaml, "yml").unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.viewport_width, 1280);

        let json = r#"{"download": {"chunk_size": 65536}}"#;
        let config = Config::parse(json, "json").unwrap();
        assert_eq!(config.download.chunk_size, 65536);
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = Config::parse("save_dir = [", "toml").unwrap_err();
        assert!(matches!(err, AcquireError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VIDACQUIRE_SAVE_DIR", "/data/v"),
            ("VIDACQUIRE_HEADLESS", "false"),
            ("VIDACQUIRE_USER_AGENT", ""),
        ]
        .into_iter()
        .collect();
        let config =
            Config::default().with_overrides_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.save_dir, "/data/v");
        assert!(!config.browser.headless);
        // Empty values are ignored
        assert_eq!(config.browser.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_save_dir_relative_to_config_file() {
        let mut config = Config::default();
        assert_eq!(config.save_dir(), PathBuf::from("videos"));

        config.source_path = Some(PathBuf::from("/etc/vidacquire/vidacquire.toml"));
        assert_eq!(config.save_dir(), PathBuf::from("/etc/vidacquire/videos"));

        config.save_dir = "/abs/out".to_string();
        assert_eq!(config.save_dir(), PathBuf::from("/abs/out"));
    }

    #[test]
    fn test_env_save_dir_relative_to_cwd() {
        let mut config = Config::default();
        config.source_path = Some(PathBuf::from("/etc/vidacquire/vidacquire.toml"));

        let config = config.with_overrides_from(|k| {
            (k == "VIDACQUIRE_SAVE_DIR").then(|| "clips".to_string())
        });
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.save_dir(), cwd.join("clips"));
        assert!(config.source_path.is_some());
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidacquire.toml");
        std::fs::write(&path, "[detection]\nsettle_delay_ms = 10\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.detection.settle_delay(), Duration::from_millis(10));
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }
}

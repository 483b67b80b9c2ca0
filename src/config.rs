use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::TriggerFieldSet;
use crate::render::theme::CardTheme;

pub const TOKEN_ENV: &str = "CARDPRESS_JIRA_TOKEN";

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_USER_TTL_SECS: u64 = 3600;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub jira: Option<JiraConfig>,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub card: CardConfig,
}

#[derive(Debug, Deserialize)]
pub struct JiraConfig {
    pub domain: String,
    pub email: String,
    #[serde(default)]
    pub api_token: String,
    pub filter_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub trigger_fields: Vec<String>,
    /// 0 keeps resolved users for the whole run.
    pub user_ttl_secs: u64,
    pub prune_after_days: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            trigger_fields: TriggerFieldSet::default()
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
            user_ttl_secs: DEFAULT_USER_TTL_SECS,
            prune_after_days: None,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn user_ttl(&self) -> Option<Duration> {
        (self.user_ttl_secs > 0).then(|| Duration::from_secs(self.user_ttl_secs))
    }

    pub fn trigger_fields(&self) -> Result<TriggerFieldSet> {
        TriggerFieldSet::from_names(&self.trigger_fields).context("Invalid [poll] trigger_fields")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("issues.json"))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
}

impl OutputConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| data_dir().join("cards"))
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PrinterConfig {
    pub enabled: bool,
    pub queue: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    pub icon_dir: Option<PathBuf>,
    pub border: bool,
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            icon_dir: None,
            border: true,
        }
    }
}

impl CardConfig {
    pub fn theme(&self) -> CardTheme {
        CardTheme::default()
            .with_icon_dir(self.icon_dir.clone())
            .with_border(self.border)
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cardpress")
}

pub fn load_config() -> Result<AppConfig> {
    let mut config = load_config_from(&config_path())?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        apply_token_override(&mut config, token);
    }
    Ok(config)
}

fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

fn apply_token_override(config: &mut AppConfig, token: String) {
    if token.trim().is_empty() {
        return;
    }
    if let Some(jira) = config.jira.as_mut() {
        jira.api_token = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::issue::Field;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.toml")).unwrap();

        assert!(config.jira.is_none());
        assert_eq!(config.poll.interval(), Duration::from_secs(60));
        assert_eq!(config.poll.user_ttl(), Some(Duration::from_secs(3600)));
        assert!(!config.printer.enabled);
        assert!(config.card.border);
        let fields = config.poll.trigger_fields().unwrap();
        assert!(fields.contains(Field::Priority));
        assert!(!fields.contains(Field::Reporter));
    }

    #[test]
    fn full_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[jira]
domain = "acme"
email = "ops@acme.test"
api_token = "secret"
filter_id = "10042"

[poll]
interval_secs = 30
trigger_fields = ["summary", "priority"]
user_ttl_secs = 0
prune_after_days = 90

[store]
path = "/var/lib/cardpress/issues.json"

[output]
dir = "/var/spool/cards"

[printer]
enabled = true
queue = "Zebra"

[card]
icon_dir = "/usr/share/cardpress/icons"
border = false
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();

        let jira = config.jira.as_ref().unwrap();
        assert_eq!(jira.filter_id, "10042");
        assert_eq!(config.poll.interval(), Duration::from_secs(30));
        assert_eq!(config.poll.user_ttl(), None);
        assert_eq!(config.poll.prune_after_days, Some(90));
        let fields = config.poll.trigger_fields().unwrap();
        assert!(fields.contains(Field::Summary));
        assert!(!fields.contains(Field::Detail));
        assert_eq!(config.store.path(), PathBuf::from("/var/lib/cardpress/issues.json"));
        assert_eq!(config.output.dir(), PathBuf::from("/var/spool/cards"));
        assert_eq!(config.printer.queue.as_deref(), Some("Zebra"));

        let theme = config.card.theme();
        assert!(!theme.border);
        assert_eq!(theme.icon_dir, Some(PathBuf::from("/usr/share/cardpress/icons")));
    }

    #[test]
    fn bad_trigger_field_is_rejected() {
        let config: AppConfig = toml::from_str("[poll]\ntrigger_fields = [\"colour\"]\n").unwrap();
        assert!(config.poll.trigger_fields().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[poll\ninterval_secs = ").unwrap();
        assert!(load_config_from(&path).is_err());
    }

    #[test]
    fn token_override_replaces_configured_token() {
        let mut config: AppConfig = toml::from_str(
            "[jira]\ndomain = \"acme\"\nemail = \"e\"\nfilter_id = \"1\"\n",
        )
        .unwrap();
        assert_eq!(config.jira.as_ref().unwrap().api_token, "");

        apply_token_override(&mut config, "from-env".into());
        assert_eq!(config.jira.as_ref().unwrap().api_token, "from-env");

        apply_token_override(&mut config, "   ".into());
        assert_eq!(config.jira.as_ref().unwrap().api_token, "from-env");
    }
}

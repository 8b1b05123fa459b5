//! Per-wiki configuration consumed by the talkpage engine.
//!
//! Everything here is plain data: locale message tables, the timestamp format,
//! signature patterns and indentation policy. The engine compiles it into an
//! immutable context once and never looks anything up ambiently.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// How the indentation of a new reply is derived from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndentationMode {
    /// Repeat the parent's last list character.
    #[default]
    Mimic,
    /// Always use the default indentation character, flattening the message's own lists.
    Unify,
}

/// A start/end template pair wrapping a closed discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedDiscussionTemplates {
    pub start: String,
    pub end: String,
}

/// Unit names used by the relative timestamp style, singular and plural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitNames {
    pub minute: (String, String),
    pub hour: (String, String),
    pub day: (String, String),
    pub month: (String, String),
    pub year: (String, String),
}

impl Default for UnitNames {
    fn default() -> Self {
        let pair = |one: &str, many: &str| (one.to_string(), many.to_string());
        Self {
            minute: pair("minute", "minutes"),
            hour: pair("hour", "hours"),
            day: pair("day", "days"),
            month: pair("month", "months"),
            year: pair("year", "years"),
        }
    }
}

/// Locale message table: month and weekday names plus the strings the
/// timestamp formatter needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleMessages {
    /// Full month names, nominative form.
    pub months: Vec<String>,
    /// Full month names, genitive form (`xg`).
    pub months_genitive: Vec<String>,
    pub months_short: Vec<String>,
    /// Full weekday names starting from Monday.
    pub weekdays: Vec<String>,
    pub weekdays_short: Vec<String>,
    pub just_now: String,
    /// Wraps a relative duration, `{duration}` is substituted.
    pub relative_ago: String,
    pub units: UnitNames,
    /// `{timestamp}` is substituted.
    pub posted_at: String,
    pub improved_today: String,
    pub improved_yesterday: String,
    pub improved_this_year: String,
    pub improved_older: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for LocaleMessages {
    fn default() -> Self {
        let months = strings(&[
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ]);
        Self {
            months_genitive: months.clone(),
            months,
            months_short: strings(&[
                "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
            ]),
            weekdays: strings(&[
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday",
            ]),
            weekdays_short: strings(&["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]),
            just_now: "just now".to_string(),
            relative_ago: "{duration} ago".to_string(),
            units: UnitNames::default(),
            posted_at: "Posted at {timestamp}".to_string(),
            improved_today: "\"Today\", H:i".to_string(),
            improved_yesterday: "\"Yesterday\", H:i".to_string(),
            improved_this_year: "j F, H:i".to_string(),
            improved_older: "j F Y, H:i".to_string(),
        }
    }
}

/// Site-specific settings for one wiki.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// `UTC`, an IANA zone name, or a signed minute offset such as `+120`.
    pub timezone: String,
    /// Date format in MediaWiki token syntax.
    pub date_format: String,
    /// Text shown in parentheses after a timestamp. Derived from the zone when unset.
    pub timezone_label: Option<String>,
    /// Ten locale digit characters, `0` through `9`.
    pub digits: Option<String>,
    pub messages: LocaleMessages,
    /// Namespace names and aliases whose links identify a signing user.
    pub user_namespaces: Vec<String>,
    /// Special page whose subpage links identify a signing user.
    pub contributions_page: String,
    /// Matches the text before an author link that still belongs to the signature.
    pub signature_prefix_pattern: String,
    /// Matches the text after a timestamp that still belongs to the signature.
    pub signature_ending_pattern: String,
    /// Inserted between a message and `~~~~`.
    pub signature_prefix: String,
    pub indentation_char: char,
    pub indentation_mode: IndentationMode,
    pub paragraph_template: Option<String>,
    pub no_signature_markers: Vec<String>,
    pub closed_discussion_templates: Vec<ClosedDiscussionTemplates>,
    pub unsigned_templates: Vec<String>,
    pub verbatim_tags: Vec<String>,
    pub new_topic_on_top: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            date_format: "H:i, j F Y".to_string(),
            timezone_label: None,
            digits: None,
            messages: LocaleMessages::default(),
            user_namespaces: strings(&["User", "User talk"]),
            contributions_page: "Special:Contributions".to_string(),
            signature_prefix_pattern: r"(?:[-–—]+\s*|&[mn]dash;\s*)?$".to_string(),
            signature_ending_pattern: r"^(?:\s*</(?:small|span|sup|sub)>)*".to_string(),
            signature_prefix: " ".to_string(),
            indentation_char: ':',
            indentation_mode: IndentationMode::Mimic,
            paragraph_template: Some("pb".to_string()),
            no_signature_markers: strings(&["{{nosig}}", "class=\"nosig\""]),
            closed_discussion_templates: vec![
                ClosedDiscussionTemplates {
                    start: "atop".to_string(),
                    end: "abot".to_string(),
                },
                ClosedDiscussionTemplates {
                    start: "closed".to_string(),
                    end: "closed end".to_string(),
                },
            ],
            unsigned_templates: strings(&["unsigned", "unsigned2"]),
            verbatim_tags: strings(&["nowiki", "pre", "source", "syntaxhighlight"]),
            new_topic_on_top: false,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory page wikitext is read from and written to.
    #[serde(default)]
    pub pages_path: Option<PathBuf>,
    #[serde(default)]
    pub site: SiteConfig,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the pages directory
        config.pages_path = config
            .pages_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/talkpage");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/talkpage/config.toml"));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.pages_path, None);
        assert_eq!(config.site, SiteConfig::default());
        assert_eq!(config.site.messages.months.len(), 12);
        assert_eq!(config.site.messages.weekdays.len(), 7);
    }

    #[test]
    fn test_partial_site_table_keeps_other_defaults() {
        let content = r#"
[site]
timezone = "Europe/Berlin"
indentation_mode = "unify"

[site.messages]
just_now = "gerade eben"
"#;

        let config: Config = toml::from_str(content).unwrap();

        assert_eq!(config.site.timezone, "Europe/Berlin");
        assert_eq!(config.site.indentation_mode, IndentationMode::Unify);
        assert_eq!(config.site.indentation_char, ':');
        assert_eq!(config.site.messages.just_now, "gerade eben");
        assert_eq!(config.site.messages.months[4], "May");
    }

    #[test]
    fn test_closed_discussion_tables() {
        let content = r#"
[site]
closed_discussion_templates = [{ start = "archive top", end = "archive bottom" }]
"#;

        let config: Config = toml::from_str(content).unwrap();

        assert_eq!(
            config.site.closed_discussion_templates,
            vec![ClosedDiscussionTemplates {
                start: "archive top".to_string(),
                end: "archive bottom".to_string(),
            }]
        );
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_invalid_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "[site\ntimezone = ").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let mut test_config = Config {
            pages_path: Some(PathBuf::from("/tmp/test-pages")),
            site: SiteConfig::default(),
        };
        test_config.site.timezone = "+120".to_string();

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config.pages_path, test_config.pages_path);
        assert_eq!(loaded_config.site, test_config.site);
    }

    #[test]
    fn test_pages_path_env_var_is_expanded() {
        unsafe {
            env::set_var("TALKPAGE_TEST_ROOT", "/custom/pages");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "pages_path = \"$TALKPAGE_TEST_ROOT/wiki\"\n").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.pages_path, Some(PathBuf::from("/custom/pages/wiki")));

        unsafe {
            env::remove_var("TALKPAGE_TEST_ROOT");
        }
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/absolute/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }
}

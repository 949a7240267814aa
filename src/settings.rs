use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::parser::sections::UnlabeledAnswerPolicy;
use crate::parser::PageErrorPolicy;

pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_API_BASE: &str = "https://api.notion.com/v1";

/// Runtime settings: `soal.toml` (optional), then `SOAL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub notion_token: Option<String>,
    pub database_id: Option<String>,
    pub notion_version: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub bind_addr: String,
    pub on_page_error: PageErrorPolicy,
    pub unlabeled_answer: UnlabeledAnswerPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            notion_token: None,
            database_id: None,
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            bind_addr: "0.0.0.0:3000".to_string(),
            on_page_error: PageErrorPolicy::default(),
            unlabeled_answer: UnlabeledAnswerPolicy::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("soal").required(false))
            .add_source(Environment::with_prefix("SOAL").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(s: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let s = from_toml("");
        assert!(s.notion_token.is_none());
        assert!(s.database_id.is_none());
        assert_eq!(s.notion_version, DEFAULT_NOTION_VERSION);
        assert_eq!(s.api_base, DEFAULT_API_BASE);
        assert_eq!(s.max_retries, 3);
        assert_eq!(s.on_page_error, PageErrorPolicy::Abort);
        assert_eq!(s.unlabeled_answer, UnlabeledAnswerPolicy::Buffer);
    }

    #[test]
    fn overrides() {
        let s = from_toml(
            r#"
            notion_token = "secret_abc"
            database_id = "db1"
            timeout_secs = 5
            on_page_error = "isolate"
            unlabeled_answer = "drop"
            "#,
        );
        assert_eq!(s.notion_token.as_deref(), Some("secret_abc"));
        assert_eq!(s.database_id.as_deref(), Some("db1"));
        assert_eq!(s.timeout_secs, 5);
        assert_eq!(s.on_page_error, PageErrorPolicy::Isolate);
        assert_eq!(s.unlabeled_answer, UnlabeledAnswerPolicy::Drop);
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn unknown_policy_rejected() {
        let err = Config::builder()
            .add_source(File::from_str(r#"on_page_error = "retry""#, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize::<Settings>();
        assert!(err.is_err());
    }
}

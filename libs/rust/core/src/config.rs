//! Layered service configuration: built-in defaults, then an optional file named by
//! `NEWSGUARD_CONFIG_FILE`, then `NEWSGUARD__*` environment variables. `NEWSGUARD_JSON_LOG`
//! switches JSON logging on or off regardless of the other layers.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_ENV: &str = "NEWSGUARD_CONFIG_FILE";
pub const ENV_PREFIX: &str = "NEWSGUARD";
pub const JSON_LOG_ENV: &str = "NEWSGUARD_JSON_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    /// Directory scanned once at startup for the vectorizer and model artifacts.
    pub artifact_dir: PathBuf,
    pub vectorizer_file: String,
    pub model_suffix: String,
    pub log_level: String,
    pub json_log: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "fake-news-api".into(),
            host: "0.0.0.0".into(),
            port: 8000,
            artifact_dir: PathBuf::from("artifacts"),
            vectorizer_file: "tfidf_vectorizer.json".into(),
            model_suffix: ".json".into(),
            log_level: "info".into(),
            json_log: false,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_suffix.is_empty() { return Err(ConfigError::Invalid("model_suffix must not be empty".into())); }
        if self.vectorizer_file.trim().is_empty() { return Err(ConfigError::Invalid("vectorizer_file must not be empty".into())); }
        if self.vectorizer_file.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!("vectorizer_file must be a bare file name, got {:?}", self.vectorizer_file)));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("bad listen address {}:{}: {e}", self.host, self.port)))
    }

    pub fn vectorizer_path(&self) -> PathBuf { self.artifact_dir.join(&self.vectorizer_file) }
}

/// Loads the config for `service`, honouring `NEWSGUARD_CONFIG_FILE` when set.
pub fn load_config(service: &str) -> Result<ServiceConfig, ConfigError> {
    let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
    load_config_from(service, file.as_deref())
}

pub fn load_config_from(service: &str, file: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    load_layered(service, file, None)
}

/// `env` replaces the process environment when given.
fn load_layered(service: &str, file: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<ServiceConfig, ConfigError> {
    let json_log = match &env {
        Some(vars) => vars.get(JSON_LOG_ENV).cloned(),
        None => std::env::var(JSON_LOG_ENV).ok(),
    };
    let d = ServiceConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("host", d.host.as_str())?
        .set_default("port", i64::from(d.port))?
        .set_default("artifact_dir", d.artifact_dir.to_string_lossy().into_owned())?
        .set_default("vectorizer_file", d.vectorizer_file.as_str())?
        .set_default("model_suffix", d.model_suffix.as_str())?
        .set_default("log_level", d.log_level.as_str())?
        .set_default("json_log", d.json_log)?;
    if let Some(path) = file {
        builder = builder.add_source(config::File::from(path).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true).source(env));
    if let Some(v) = json_log {
        builder = builder.set_override("json_log", parse_flag(&v))?;
    }
    let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_flag(v: &str) -> bool { v == "1" || v.eq_ignore_ascii_case("true") }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = ServiceConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.bind_addr().unwrap().port(), 8000);
        assert_eq!(cfg.vectorizer_path(), PathBuf::from("artifacts/tfidf_vectorizer.json"));
    }

    #[test]
    fn file_overrides_defaults() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "port: 9100\nartifact_dir: /srv/models\nmodel_suffix: .model.json").unwrap();
        let cfg = load_config_from("svc", Some(f.path())).unwrap();
        assert_eq!(cfg.service_name, "svc");
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.artifact_dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.model_suffix, ".model.json");
        assert_eq!(cfg.vectorizer_file, "tfidf_vectorizer.json");
    }

    fn env(pairs: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    #[test]
    fn double_underscore_env_overrides() {
        let cfg = load_layered("svc", None, env(&[("NEWSGUARD__PORT", "9001"), ("NEWSGUARD__JSON_LOG", "true")])).unwrap();
        assert_eq!(cfg.port, 9001);
        assert!(cfg.json_log);
    }

    #[test]
    fn json_log_switch_is_honoured() {
        assert!(load_layered("svc", None, env(&[("NEWSGUARD_JSON_LOG", "true")])).unwrap().json_log);
        assert!(load_layered("svc", None, env(&[("NEWSGUARD_JSON_LOG", "1")])).unwrap().json_log);
        let off = load_layered("svc", None, env(&[("NEWSGUARD__JSON_LOG", "true"), ("NEWSGUARD_JSON_LOG", "0")])).unwrap();
        assert!(!off.json_log);
        assert!(!load_layered("svc", None, env(&[])).unwrap().json_log);
    }

    #[test]
    fn env_overrides_file() {
        let mut f = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(f, "port: 9100\njson_log: true").unwrap();
        let cfg = load_layered("svc", Some(f.path()), env(&[("NEWSGUARD__PORT", "9200"), ("NEWSGUARD_JSON_LOG", "false")])).unwrap();
        assert_eq!(cfg.port, 9200);
        assert!(!cfg.json_log);
    }

    #[test]
    fn empty_suffix_rejected() {
        let cfg = ServiceConfig { model_suffix: String::new(), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn nested_vectorizer_path_rejected() {
        let cfg = ServiceConfig { vectorizer_file: "sub/vec.json".into(), ..Default::default() };
        assert!(cfg.validate().is_err());
    }
}

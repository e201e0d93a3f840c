use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tallyscan_ocr::{PipelineConfig, RecognizerConfig};

pub const CONFIG_PATH_VAR: &str = "TALLYSCAN_CONFIG";

/// What the `rawText` field of a successful response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTextMode {
    /// The text exactly as the OCR engine produced it.
    #[default]
    Ocr,
    /// `details amount` per extracted record, joined by newlines.
    Summary,
}

impl FromStr for RawTextMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ocr" => Ok(RawTextMode::Ocr),
            "summary" => Ok(RawTextMode::Summary),
            other => Err(format!("Unknown raw text mode: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub max_concurrent_scans: usize,
    pub recognize_timeout_secs: u64,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    /// Directory holding `*.traineddata`; `None` uses the engine default.
    pub tessdata: Option<String>,
    pub raw_text: RawTextMode,
    pub recognizer: RecognizerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_body_bytes: 10 * 1024 * 1024,
            max_concurrent_scans: 4,
            recognize_timeout_secs: 60,
            cors_origins: Vec::new(),
            tessdata: None,
            raw_text: RawTextMode::default(),
            recognizer: RecognizerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the file named by `TALLYSCAN_CONFIG` (if set), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let file = match env.get(CONFIG_PATH_VAR) {
            Some(path) => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {path}"))?,
            ),
            None => None,
        };
        Self::from_sources(file.as_deref(), &env)
    }

    /// Build from optional TOML text plus an environment map.
    pub fn from_sources(toml_text: Option<&str>, env: &HashMap<String, String>) -> Result<Self> {
        let mut config: ServerConfig = match toml_text {
            Some(text) => toml::from_str(text).context("parsing config file")?,
            None => ServerConfig::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<()> {
        if let Some(v) = env.get("TALLYSCAN_HOST") {
            self.host = v.clone();
        }
        if let Some(v) = env.get("TALLYSCAN_PORT") {
            self.port = parse_var("TALLYSCAN_PORT", v)?;
        }
        if let Some(v) = env.get("TALLYSCAN_MAX_BODY_BYTES") {
            self.max_body_bytes = parse_var("TALLYSCAN_MAX_BODY_BYTES", v)?;
        }
        if let Some(v) = env.get("TALLYSCAN_MAX_CONCURRENT_SCANS") {
            self.max_concurrent_scans = parse_var("TALLYSCAN_MAX_CONCURRENT_SCANS", v)?;
        }
        if let Some(v) = env.get("TALLYSCAN_RECOGNIZE_TIMEOUT_SECS") {
            self.recognize_timeout_secs = parse_var("TALLYSCAN_RECOGNIZE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = env.get("TALLYSCAN_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = env.get("TALLYSCAN_TESSDATA") {
            self.tessdata = Some(v.clone()).filter(|s| !s.is_empty());
        }
        if let Some(v) = env.get("TALLYSCAN_RAW_TEXT") {
            self.raw_text = v
                .parse()
                .map_err(|e: String| anyhow::anyhow!("TALLYSCAN_RAW_TEXT: {e}"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            bail!("max_body_bytes must be greater than zero");
        }
        if self.max_concurrent_scans == 0 {
            bail!("max_concurrent_scans must be greater than zero");
        }
        if self.recognize_timeout_secs == 0 {
            bail!("recognize_timeout_secs must be greater than zero");
        }
        if self.recognizer.language.trim().is_empty() {
            bail!("recognizer.language must not be empty");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            recognize_timeout: Duration::from_secs(self.recognize_timeout_secs),
            max_concurrent: self.max_concurrent_scans,
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{name} has invalid value '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_without_sources() {
        let c = ServerConfig::from_sources(None, &HashMap::new()).unwrap();
        assert_eq!(c, ServerConfig::default());
        assert_eq!(c.port, 3001);
        assert_eq!(c.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(c.raw_text, RawTextMode::Ocr);
        assert_eq!(c.recognizer.language, "eng");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let text = r#"
            port = 8080
            cors_origins = ["http://localhost:5173"]
            raw_text = "summary"

            [recognizer]
            preserve_interword_spaces = false
        "#;
        let c = ServerConfig::from_sources(Some(text), &HashMap::new()).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(c.raw_text, RawTextMode::Summary);
        assert!(!c.recognizer.preserve_interword_spaces);
        // Untouched recognizer fields keep their defaults.
        assert_eq!(c.recognizer.language, "eng");
    }

    #[test]
    fn env_overrides_file() {
        let c = ServerConfig::from_sources(
            Some("port = 8080"),
            &env(&[
                ("TALLYSCAN_PORT", "9000"),
                ("TALLYSCAN_CORS_ORIGINS", "http://a.test, http://b.test,"),
                ("TALLYSCAN_RECOGNIZE_TIMEOUT_SECS", "5"),
                ("TALLYSCAN_TESSDATA", "/usr/share/tessdata"),
            ]),
        )
        .unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(c.pipeline_config().recognize_timeout, Duration::from_secs(5));
        assert_eq!(c.tessdata.as_deref(), Some("/usr/share/tessdata"));
    }

    #[test]
    fn bad_env_value_is_error() {
        let err = ServerConfig::from_sources(None, &env(&[("TALLYSCAN_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("TALLYSCAN_PORT"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        assert!(ServerConfig::from_sources(
            None,
            &env(&[("TALLYSCAN_MAX_CONCURRENT_SCANS", "0")])
        )
        .is_err());
    }

    #[test]
    fn socket_addr_from_host_and_port() {
        let c = ServerConfig { host: "127.0.0.1".into(), port: 4000, ..Default::default() };
        assert_eq!(c.socket_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());
    }

    #[test]
    fn raw_text_mode_parse() {
        assert_eq!("OCR".parse::<RawTextMode>().unwrap(), RawTextMode::Ocr);
        assert_eq!("summary".parse::<RawTextMode>().unwrap(), RawTextMode::Summary);
        assert!("lossy".parse::<RawTextMode>().is_err());
    }
}

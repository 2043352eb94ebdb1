use std::path::{Path, PathBuf};

use bedrock_chat_common::{Error, Result};
use tracing::{debug, warn};

use crate::model::AppConfig;

/// Config file names checked in the working directory when no path is given.
const CONFIG_FILENAMES: &[&str] = &["bedrock-chat.toml", "bedrock-chat.yaml", "bedrock-chat.yml"];

/// Resolves [`AppConfig`] from defaults, an optional file and the environment.
///
/// Precedence, lowest first: built-in defaults, the config file, then
/// environment variables (a `.env` file is loaded into the environment first).
pub struct ConfigLoader {
    path: Option<PathBuf>,
    load_dotenv: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            load_dotenv: true,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    pub fn load(&self) -> Result<AppConfig> {
        if self.load_dotenv {
            match dotenvy::dotenv() {
                Ok(path) => debug!(path = %path.display(), "loaded .env"),
                Err(e) if e.not_found() => {}
                Err(e) => warn!("failed to load .env: {e}"),
            }
        }
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as [`ConfigLoader::load`] but reads variables through `lookup`.
    pub fn load_with_env<F>(&self, lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.path.clone().or_else(find_config_file) {
            Some(path) => {
                debug!(path = %path.display(), "loading config");
                load_file(&path)?
            }
            None => {
                debug!("no config file found, using defaults");
                AppConfig::default()
            }
        };
        apply_env_overrides(&mut config, lookup)?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_file(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&raw, path)
}

fn parse_config(raw: &str, path: &Path) -> Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw)
            .map_err(|e| Error::Config(format!("invalid TOML in {}: {e}", path.display()))),
        "yaml" | "yml" => serde_yaml::from_str(raw)
            .map_err(|e| Error::Config(format!("invalid YAML in {}: {e}", path.display()))),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::Config(format!("unsupported config format: .{ext}"))),
    }
}

fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(region) = get("BEDROCK_REGION").or_else(|| get("AWS_REGION")) {
        config.bedrock.region = region;
    }
    if let Some(mode) = get("BEDROCK_CHAT_MODE") {
        config.bedrock.mode = mode.parse()?;
    }
    if let Some(model_id) = get("LLAMA_MODEL_ID").or_else(|| get("MODEL_ID")) {
        config.bedrock.model_id = Some(model_id);
    }
    if let Some(kb_id) = get("KB_ID") {
        config.bedrock.knowledge_base_id = Some(kb_id);
    }
    if let Some(agent_id) = get("AGENT_ID") {
        config.bedrock.agent_id = Some(agent_id);
    }
    if let Some(alias_id) = get("AGENT_ALIAS_ID") {
        config.bedrock.agent_alias_id = Some(alias_id);
    }
    if let Some(endpoint) = get("BEDROCK_RUNTIME_ENDPOINT") {
        config.bedrock.runtime_endpoint = Some(endpoint);
    }
    if let Some(endpoint) = get("BEDROCK_AGENT_RUNTIME_ENDPOINT") {
        config.bedrock.agent_runtime_endpoint = Some(endpoint);
    }
    if let Some(secs) = get("BEDROCK_REQUEST_TIMEOUT_SECS") {
        config.bedrock.request_timeout_secs = secs
            .parse()
            .map_err(|_| Error::Config(format!("invalid BEDROCK_REQUEST_TIMEOUT_SECS: {secs}")))?;
    }
    if let Some(host) = get("BEDROCK_CHAT_HOST") {
        config.gateway.host = host;
    }
    if let Some(port) = get("BEDROCK_CHAT_PORT").or_else(|| get("PORT")) {
        config.gateway.port = port
            .parse()
            .map_err(|_| Error::Config(format!("invalid port: {port}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;
    use crate::model::{DEFAULT_REGION, InvocationMode};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::new()
            .with_path("/nonexistent/bedrock-chat.toml")
            .load_with_env(env(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn environment_only_config() {
        let file = write_config(".toml", "");
        let cfg = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[
                ("AGENT_ID", "VAHLL7GA4L"),
                ("AGENT_ALIAS_ID", "HZ8OLFGZ25"),
            ]))
            .unwrap();
        assert_eq!(cfg.bedrock.region, DEFAULT_REGION);
        assert_eq!(cfg.bedrock.mode, InvocationMode::AgentSession);
        assert_eq!(cfg.bedrock.agent_id.as_deref(), Some("VAHLL7GA4L"));
        assert!(cfg.bedrock.validate().is_ok());
    }

    #[test]
    fn bedrock_region_wins_over_aws_region() {
        let file = write_config(".toml", "");
        let cfg = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[
                ("AWS_REGION", "us-west-2"),
                ("BEDROCK_REGION", "eu-central-1"),
            ]))
            .unwrap();
        assert_eq!(cfg.bedrock.region, "eu-central-1");

        let cfg = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[("AWS_REGION", "us-west-2")]))
            .unwrap();
        assert_eq!(cfg.bedrock.region, "us-west-2");
    }

    #[test]
    fn yaml_file_then_env_override() {
        let file = write_config(
            ".yaml",
            "gateway:\n  port: 8080\nbedrock:\n  mode: knowledge_base_rag\n  knowledge_base_id: KB1\n  model_id: from-file\n",
        );
        let cfg = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[("LLAMA_MODEL_ID", "from-env")]))
            .unwrap();
        assert_eq!(cfg.gateway.port, 8080);
        assert_eq!(cfg.gateway.host, "127.0.0.1");
        assert_eq!(cfg.bedrock.mode, InvocationMode::KnowledgeBaseRag);
        assert_eq!(cfg.bedrock.knowledge_base_id.as_deref(), Some("KB1"));
        assert_eq!(cfg.bedrock.model_id.as_deref(), Some("from-env"));
    }

    #[test]
    fn toml_file_is_parsed() {
        let file = write_config(
            ".toml",
            "[bedrock]\nmode = \"direct_converse\"\nmodel_id = \"meta.llama3-8b-instruct-v1:0\"\nrequest_timeout_secs = 30\n",
        );
        let cfg = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[]))
            .unwrap();
        assert_eq!(cfg.bedrock.mode, InvocationMode::DirectConverse);
        assert_eq!(cfg.bedrock.request_timeout_secs, 30);
    }

    #[test]
    fn invalid_mode_in_env_is_an_error() {
        let file = write_config(".toml", "");
        let err = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[("BEDROCK_CHAT_MODE", "telepathy")]))
            .unwrap_err();
        assert!(err.to_string().contains("unknown invocation mode"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = write_config(".ini", "x=1");
        let err = ConfigLoader::new()
            .with_path(file.path())
            .load_with_env(env(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}

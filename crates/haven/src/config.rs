use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub generation_timeout_ms: u64,
    pub tool_timeout_ms: u64,
    pub recent_window: usize,
    pub knowledge_dir: PathBuf,
    pub database_path: PathBuf,
    pub trace_dir: PathBuf,
    pub tracing_enabled: bool,
    pub persist_every: u32,
    pub api_host: String,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_url: "http://127.0.0.1:8081".to_string(),
            llm_model: "local-llm".to_string(),
            llm_api_key: None,
            generation_timeout_ms: 30_000,
            tool_timeout_ms: 10_000,
            recent_window: 8,
            knowledge_dir: PathBuf::from("./data/knowledge"),
            database_path: PathBuf::from("./data/sessions.db"),
            trace_dir: PathBuf::from("./data/traces"),
            tracing_enabled: true,
            persist_every: 1,
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let defaults = Self::default();

        let llm_url = env::var("HAVEN_LLM_URL")
            .unwrap_or(defaults.llm_url)
            .trim_end_matches('/')
            .to_string();
        if !(llm_url.starts_with("http://") || llm_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "HAVEN_LLM_URL must be an http(s) URL, got: {}",
                llm_url
            ));
        }

        let llm_api_key = env::var("HAVEN_LLM_API_KEY").ok().filter(|k| !k.trim().is_empty());

        let recent_window: usize = env::var("HAVEN_RECENT_WINDOW")
            .unwrap_or_else(|_| "8".into())
            .parse()
            .context("HAVEN_RECENT_WINDOW must be a positive integer")?;
        if recent_window == 0 {
            return Err(anyhow::anyhow!("HAVEN_RECENT_WINDOW must be at least 1"));
        }

        let persist_every: u32 = env::var("HAVEN_PERSIST_EVERY")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .context("HAVEN_PERSIST_EVERY must be a positive integer")?;

        Ok(Self {
            llm_url,
            llm_model: env::var("HAVEN_LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_api_key,
            generation_timeout_ms: env::var("HAVEN_GENERATION_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".into())
                .parse()?,
            tool_timeout_ms: env::var("HAVEN_TOOL_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".into())
                .parse()?,
            recent_window,
            knowledge_dir: env::var("HAVEN_KNOWLEDGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.knowledge_dir),
            database_path: env::var("HAVEN_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            trace_dir: env::var("HAVEN_TRACE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.trace_dir),
            tracing_enabled: env::var("HAVEN_TRACING_ENABLED")
                .unwrap_or_else(|_| "true".into())
                .parse()?,
            persist_every: persist_every.max(1),
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env::var("API_PORT").unwrap_or_else(|_| "8000".into()).parse()?,
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- LLM URL: {}", self.llm_url);
        info!("- LLM Model: {}", self.llm_model);
        info!("- LLM API Key: {}", if self.llm_api_key.is_some() { "set" } else { "not set" });
        info!("- Generation Timeout: {}ms", self.generation_timeout_ms);
        info!("- Tool Timeout: {}ms", self.tool_timeout_ms);
        info!("- Recent Window: {} messages", self.recent_window);
        info!("- Knowledge Dir: {}", self.knowledge_dir.display());
        info!("- Database: {}", self.database_path.display());
        info!("- Trace Dir: {} (enabled: {})", self.trace_dir.display(), self.tracing_enabled);
        info!("- Persist Every: {} turns", self.persist_every);
        info!("- API: {}:{}", self.api_host, self.api_port);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            llm_url: "http://127.0.0.1:8081".to_string(),
            llm_model: "test-model".to_string(),
            llm_api_key: None,
            generation_timeout_ms: 2_000,
            tool_timeout_ms: 500,
            recent_window: 6,
            knowledge_dir: PathBuf::from("/tmp/knowledge"),
            database_path: PathBuf::from("/tmp/sessions.db"),
            trace_dir: PathBuf::from("/tmp/traces"),
            tracing_enabled: false,
            persist_every: 1,
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
        }
    }

    // ===== API Address Tests =====

    #[test]
    fn test_api_addr_parsing() {
        let config = create_test_config();
        let addr = config.api_addr().unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_api_addr_with_zero_address() {
        let mut config = create_test_config();
        config.api_host = "0.0.0.0".to_string();
        config.api_port = 9100;
        let addr = config.api_addr().unwrap();
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 9100);
    }

    #[test]
    fn test_api_addr_rejects_garbage_host() {
        let mut config = create_test_config();
        config.api_host = "not a host".to_string();
        assert!(config.api_addr().is_err());
    }

    // ===== Timeout Tests =====

    #[test]
    fn test_timeouts_convert_to_durations() {
        let config = create_test_config();
        assert_eq!(config.generation_timeout(), Duration::from_secs(2));
        assert_eq!(config.tool_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_tool_timeout_shorter_than_generation_timeout() {
        let config = Config::default();
        assert!(config.tool_timeout() < config.generation_timeout());
    }

    // ===== Defaults Tests =====

    #[test]
    fn test_default_config_is_usable() {
        let config = Config::default();
        assert!(config.llm_url.starts_with("http://"));
        assert!(config.recent_window > 0);
        assert!(config.persist_every > 0);
        assert!(config.api_addr().is_ok());
    }

    #[test]
    fn test_config_clone() {
        let config = create_test_config();
        let cloned = config.clone();
        assert_eq!(config.llm_model, cloned.llm_model);
        assert_eq!(config.database_path, cloned.database_path);
    }
}

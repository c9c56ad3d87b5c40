use std::env;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

impl SessionBackend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" | "" => Some(Self::Memory),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Market data store
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    // Trading backend
    pub account_api_url: String,
    pub account_api_timeout_secs: u64,

    // Language understanding
    pub nlu_api_url: Option<String>,

    // Generative model
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub openai_model: String,
    pub llm_timeout_secs: u64,

    // Conversation sessions
    pub session_store: String,
    pub redis_url: String,
    pub session_max_entries: usize,
    pub session_idle_ttl_secs: u64,

    // CORS
    pub cors_allowed_origins: String,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            run_migrations: env_flag("RUN_MIGRATIONS"),

            account_api_url: env::var("ACCOUNT_API_URL")?,
            account_api_timeout_secs: env::var("ACCOUNT_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            nlu_api_url: non_empty_var("NLU_API_URL"),

            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            openai_api_url: env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_timeout_secs: env::var("LLM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,

            session_store: env::var("SESSION_STORE").unwrap_or_else(|_| "memory".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            session_max_entries: env::var("SESSION_MAX_ENTRIES")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
            session_idle_ttl_secs: env::var("SESSION_IDLE_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL is empty");
        }
        if Url::parse(self.account_api_url.trim()).is_err() {
            anyhow::bail!("ACCOUNT_API_URL is not a valid URL: {}", self.account_api_url);
        }
        if let Some(nlu) = &self.nlu_api_url {
            if Url::parse(nlu).is_err() {
                anyhow::bail!("NLU_API_URL is not a valid URL: {}", nlu);
            }
        }
        if SessionBackend::parse(&self.session_store).is_none() {
            anyhow::bail!(
                "SESSION_STORE must be `memory` or `redis`, got `{}`",
                self.session_store
            );
        }
        if self.session_max_entries == 0 {
            anyhow::bail!("SESSION_MAX_ENTRIES must be > 0");
        }

        if self.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; free-form questions will fail");
        }
        if self.nlu_api_url.is_none() {
            tracing::info!("NLU_API_URL not set; using built-in keyword extractor");
        }
        if self.session_idle_ttl_secs == 0 {
            tracing::warn!("SESSION_IDLE_TTL_SECS is 0; sessions never expire");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn session_backend(&self) -> SessionBackend {
        SessionBackend::parse(&self.session_store).unwrap_or(SessionBackend::Memory)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        database_url: "postgres://localhost/coinchat_test".to_string(),
        database_max_connections: 1,
        run_migrations: false,
        account_api_url: "http://localhost:8080/api".to_string(),
        account_api_timeout_secs: 1,
        nlu_api_url: None,
        openai_api_key: None,
        openai_api_url: "http://localhost:9999/v1".to_string(),
        openai_model: "test-model".to_string(),
        llm_timeout_secs: 1,
        session_store: "memory".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        session_max_entries: 100,
        session_idle_ttl_secs: 3600,
        cors_allowed_origins: "*".to_string(),
    }
}

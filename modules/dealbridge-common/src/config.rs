use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI provider
    pub anthropic_api_key: String,
    pub claude_model: String,

    // Scraping
    pub firecrawl_api_key: String,

    // Contact intelligence
    pub apollo_api_key: String,

    // Enrichment tuning
    pub item_delay_secs: u64,
}

const DEFAULT_CLAUDE_MODEL: &str = "claude-haiku-4-5-20251001";

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            anthropic_api_key: required_env("ANTHROPIC_API_KEY"),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| DEFAULT_CLAUDE_MODEL.to_string()),
            firecrawl_api_key: required_env("FIRECRAWL_API_KEY"),
            apollo_api_key: required_env("APOLLO_API_KEY"),
            item_delay_secs: env::var("ENRICH_ITEM_DELAY_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("ENRICH_ITEM_DELAY_SECS must be a number"),
        }
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            database = %redact_url(&self.database_url),
            claude_model = %self.claude_model,
            item_delay_secs = self.item_delay_secs,
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

/// Strip userinfo from a connection URL for logging.
fn redact_url(url: &str) -> String {
    match url.find('@') {
        Some(at) => {
            let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
            format!("{}***@{}", &url[..scheme_end], &url[at + 1..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_credentials() {
        assert_eq!(
            redact_url("postgres://user:pw@db.internal:5432/crm"),
            "postgres://***@db.internal:5432/crm"
        );
        assert_eq!(redact_url("postgres://localhost/crm"), "postgres://localhost/crm");
    }
}

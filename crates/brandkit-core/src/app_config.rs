use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub runs_url: String,
    pub runs_api_key: Option<String>,
    pub app_id: String,
    pub service_name: String,
    pub scraper_url: String,
    pub scraper_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub http_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub http_max_retries: u32,
    pub http_retry_backoff_ms: u64,
    pub extraction_max_pages: usize,
    pub scrape_concurrency: usize,
    pub cache_ttl_days: i64,
    pub job_retention_secs: u64,
    pub job_sweep_interval_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[redacted]");
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("runs_url", &self.runs_url)
            .field("runs_api_key", &redact(&self.runs_api_key))
            .field("app_id", &self.app_id)
            .field("service_name", &self.service_name)
            .field("scraper_url", &self.scraper_url)
            .field("scraper_api_key", &redact(&self.scraper_api_key))
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("http_max_retries", &self.http_max_retries)
            .field("http_retry_backoff_ms", &self.http_retry_backoff_ms)
            .field("extraction_max_pages", &self.extraction_max_pages)
            .field("scrape_concurrency", &self.scrape_concurrency)
            .field("cache_ttl_days", &self.cache_ttl_days)
            .field("job_retention_secs", &self.job_retention_secs)
            .field("job_sweep_interval_secs", &self.job_sweep_interval_secs)
            .finish()
    }
}

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bind_addr: SocketAddr,
    pub interpreter: String,
    pub interpreter_search_path: String,
    pub scratch_root: PathBuf,
    pub sandbox_timeout_ms: u64,
    pub max_output_bytes: usize,
    pub badge_audit_path: Option<PathBuf>,
    pub log_level: String,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_parse("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080))),
            interpreter: env::var("PYTHON_BIN").unwrap_or_else(|_| "python3".to_string()),
            interpreter_search_path: env::var("SANDBOX_PATH_ENV")
                .unwrap_or_else(|_| "/usr/bin:/usr/local/bin".to_string()),
            scratch_root: env::var("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("gradebox")),
            sandbox_timeout_ms: env_parse("SANDBOX_TIMEOUT_MS", 5000u64),
            max_output_bytes: env_parse("SANDBOX_MAX_OUTPUT_BYTES", 64 * 1024),
            badge_audit_path: env::var("BADGE_AUDIT_PATH").ok().map(PathBuf::from),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_millis(self.sandbox_timeout_ms.clamp(50, 120_000))
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

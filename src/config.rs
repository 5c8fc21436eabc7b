use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

pub const WORKSPACE_VAR: &str = "LMSD_WORKSPACE";
pub const LOG_VAR: &str = "LMSD_LOG";
const DEFAULT_LOG: &str = "info";

/// Process-level settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workspace opened before the first request, if set.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(env::var(WORKSPACE_VAR).ok(), env::var(LOG_VAR).ok())
    }

    fn from_vars(workspace: Option<String>, log: Option<String>) -> Self {
        Self {
            workspace: workspace
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            log_filter: log
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG.to_string()),
        }
    }
}

/// Logs go to stderr; stdout carries the protocol.
pub fn init_tracing(cfg: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&cfg.log_filter)
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_vars_fall_back_to_defaults() {
        let cfg = Config::from_vars(Some("  ".into()), Some(String::new()));
        assert_eq!(cfg.workspace, None);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn vars_are_taken_verbatim() {
        let cfg = Config::from_vars(Some("/tmp/ws".into()), Some("lmsd=debug".into()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cfg.log_filter, "lmsd=debug");
    }
}

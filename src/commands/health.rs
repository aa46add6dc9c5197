//! Health report commands

use crate::config::Config;
use crate::error::{Error, Result};
use crate::health::{assemble_dashboard, assemble_processing, DashboardReport, ProcessingReport};
use std::path::{Path, PathBuf};
use tracing::info;

fn fragments_dir(config: &Config, dir: Option<&Path>) -> Result<PathBuf> {
    dir.map(Path::to_path_buf)
        .or_else(|| config.health.fragments_dir.clone())
        .ok_or_else(|| Error::Config("fragment directory required (--dir or TMPD)".to_string()))
}

/// Assemble the processing-node report
pub fn cmd_health_processing(config: &Config, dir: Option<&Path>) -> Result<ProcessingReport> {
    let dir = fragments_dir(config, dir)?;
    info!("Assembling processing report from {:?}", dir);
    Ok(assemble_processing(&dir))
}

/// Assemble the dashboard-node report
pub fn cmd_health_dashboard(config: &Config, dir: Option<&Path>) -> Result<DashboardReport> {
    let dir = fragments_dir(config, dir)?;
    info!("Assembling dashboard report from {:?}", dir);
    Ok(assemble_dashboard(&dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dir_argument_overrides_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pg_active.txt"), "3").unwrap();

        let mut config = Config::default();
        config.health.fragments_dir = Some(PathBuf::from("/nonexistent"));
        let report = cmd_health_dashboard(&config, Some(tmp.path())).unwrap();
        assert_eq!(report.postgresql.active_connections, 3);
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let mut config = Config::default();
        config.health.fragments_dir = None;
        assert!(matches!(
            cmd_health_processing(&config, None),
            Err(Error::Config(_))
        ));
    }
}

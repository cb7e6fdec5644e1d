use std::env;
use std::path::{Path, PathBuf};

use crate::db;
use crate::error::AppError;

pub const HOME_ENV: &str = "HABITFLOW_HOME";
const DEFAULT_DIR_NAME: &str = ".habitflow";

/// Where this invocation keeps its data.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// `--data-dir`, then `$HABITFLOW_HOME`, then `$HOME/.habitflow`.
    pub fn resolve(data_dir: Option<PathBuf>) -> Result<Self, AppError> {
        if let Some(dir) = data_dir {
            return Ok(Self { data_dir: dir });
        }
        if let Some(dir) = non_empty_env(HOME_ENV) {
            return Ok(Self {
                data_dir: PathBuf::from(dir),
            });
        }
        let home = non_empty_env("HOME").ok_or_else(|| {
            AppError::InvalidInput(format!(
                "cannot locate a data directory: set {HOME_ENV} or pass --data-dir"
            ))
        })?;
        Ok(Self {
            data_dir: Path::new(&home).join(DEFAULT_DIR_NAME),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        db::resolve_db_path(&self.data_dir)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let config = AppConfig::resolve(Some(PathBuf::from("/tmp/hf"))).expect("config");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/hf"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/hf/habitflow.db"));
    }
}

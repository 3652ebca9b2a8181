use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "bookmarked")]
#[command(about = "Runs the bookmarked list service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bookmarked")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

/// Which entity store backs the service.
#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
    File,
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_storage_file")]
    storage_file: String,
    #[serde(default)]
    pub turso_url: Option<String>,
    #[serde(default)]
    pub turso_auth_token: Option<String>,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_seconds: u64,
}

fn default_port() -> u16 {
    8787
}

fn default_database() -> String {
    "bookmarked.db".to_string()
}

fn default_storage_file() -> String {
    "bookmarked.json".to_string()
}

fn default_sync_interval() -> u64 {
    60
}

impl Default for App {
    fn default() -> Self {
        App {
            port: default_port(),
            backend: Backend::default(),
            database: default_database(),
            storage_file: default_storage_file(),
            turso_url: None,
            turso_auth_token: None,
            sync_interval_seconds: default_sync_interval(),
        }
    }
}

/// Remote database an embedded replica syncs against.
#[derive(Debug, Clone)]
pub struct Replica {
    pub url: String,
    pub auth_token: String,
    pub sync_interval_seconds: u64,
}

impl App {
    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Database file, relative paths resolved against the data directory.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database)
    }

    pub fn storage_file_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.storage_file)
    }

    pub fn replica(&self) -> Option<Replica> {
        match (&self.turso_url, &self.turso_auth_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some(Replica {
                url: url.clone(),
                auth_token: token.clone(),
                sync_interval_seconds: self.sync_interval_seconds,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub app: App,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find('}') {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_app_section_uses_defaults() {
        let cfg = Config::from_yaml("app: {}\n").unwrap();
        assert_eq!(cfg.app.get_port(), 8787);
        assert_eq!(cfg.app.backend, Backend::Sqlite);
        assert!(cfg.app.replica().is_none());
        assert_eq!(
            cfg.app.database_path(Path::new("/data")),
            PathBuf::from("/data/bookmarked.db")
        );
    }

    #[test]
    fn unset_variable_falls_back_to_inline_default() {
        let yaml = "app:\n  port: ${BOOKMARKED_TEST_UNSET_PORT:-9100}\n  backend: file\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.app.get_port(), 9100);
        assert_eq!(cfg.app.backend, Backend::File);
    }

    #[test]
    fn replica_needs_url_and_token() {
        let yaml = "app:\n  turso_url: libsql://db.example\n";
        let cfg = Config::from_yaml(yaml).unwrap();
        assert!(cfg.app.replica().is_none());

        let yaml = "app:\n  turso_url: libsql://db.example\n  turso_auth_token: secret\n  sync_interval_seconds: 5\n";
        let replica = Config::from_yaml(yaml).unwrap().app.replica().unwrap();
        assert_eq!(replica.url, "libsql://db.example");
        assert_eq!(replica.sync_interval_seconds, 5);
    }
}

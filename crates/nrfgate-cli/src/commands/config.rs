//! Config command implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction, path: &Path, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let content =
                toml::to_string_pretty(config).context("Failed to serialize config")?;
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(path)?;
            eprintln!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        cmd_config(ConfigAction::Init { force: false }, &path, &Config::default()).unwrap();
        assert_eq!(Config::load(&path), Config::default());

        let err = cmd_config(ConfigAction::Init { force: false }, &path, &Config::default())
            .unwrap_err();
        assert!(err.to_string().contains("--force"));

        cmd_config(ConfigAction::Init { force: true }, &path, &Config::default()).unwrap();
    }
}

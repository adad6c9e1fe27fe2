//! Write a default configuration file

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use anoncheck_common::AppConfig;

use crate::output::print_success;

#[derive(Args)]
pub struct InitConfigArgs {
    /// Where to write the file (defaults to --config)
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InitConfigArgs, default_path: PathBuf) -> Result<()> {
    let path = args.path.unwrap_or(default_path);
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    AppConfig::default().save(&path)?;
    print_success(&format!("Wrote default configuration to {}", path.display()));
    println!("Fill in [reference] and [anonymized], or set ANONCHECK_*_USERNAME / ANONCHECK_*_PASSWORD.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_loadable_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anoncheck.toml");

        execute(InitConfigArgs { path: None, force: false }, path.clone())
            .await
            .unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.run.recycle_every, 50);
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anoncheck.toml");
        std::fs::write(&path, "# keep me\n").unwrap();

        let args = InitConfigArgs { path: Some(path.clone()), force: false };
        assert!(execute(args, PathBuf::from("unused.toml")).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# keep me\n");

        let args = InitConfigArgs { path: Some(path.clone()), force: true };
        execute(args, PathBuf::from("unused.toml")).await.unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[run]"));
    }
}

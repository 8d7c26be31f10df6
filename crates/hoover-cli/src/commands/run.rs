//! The `run` command: one cleanup pass over the configured project.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use hoover_config::{CleanupConfig, Overrides, RegistrySettings};
use hoover_registry::{HarborClient, HarborConfig};
use hoover_report::{console_summary, write_html, write_json};
use hoover_scheduler::{CancelHandle, RepositoryScheduler, RunOptions, cancellation};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::logging;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Report what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Retention window in days
    #[arg(long, value_name = "N")]
    pub days_to_keep: Option<u32>,

    /// Repositories processed concurrently
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Artifacts processed concurrently within each repository
    #[arg(long, value_name = "N")]
    pub artifact_workers: Option<usize>,

    /// Stop dispatching new work after this many seconds
    #[arg(long, value_name = "N")]
    pub timeout_secs: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            retention_days: self.days_to_keep,
            dry_run: self.dry_run,
            debug: self.debug,
            max_repositories: self.max_workers,
            max_artifacts: self.artifact_workers,
        }
    }
}

pub async fn run(config_path: &Path, args: RunArgs) -> Result<()> {
    let mut config = hoover_config::load_config(config_path)
        .with_context(|| format!("Failed to load config file: {}", config_path.display()))?;
    config
        .apply_overrides(&args.overrides())
        .context("Invalid command-line override")?;

    logging::init(&config.logging, args.debug)?;
    info!(config = %config_path.display(), "Loaded configuration");

    let scheduler = build_scheduler(&config)?;

    let (handle, signal) = cancellation();
    let handle = Arc::new(handle);
    let ctrl_c = spawn_ctrl_c_watcher(Arc::clone(&handle));
    let timeout = args
        .timeout_secs
        .map(|secs| spawn_timeout(Arc::clone(&handle), Duration::from_secs(secs)));

    let outcome = scheduler.run(signal).await;

    ctrl_c.abort();
    if let Some(timeout) = timeout {
        timeout.abort();
    }

    let result = outcome.context("Cleanup run failed")?;

    print!("{}", console_summary(&result));

    if let Some(path) = &config.report.html {
        write_html(path, &result)
            .with_context(|| format!("Failed to write HTML report: {}", path.display()))?;
    }
    if let Some(path) = &config.report.json {
        write_json(path, &result)
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
    }

    if result.cancelled {
        warn!("Run was cancelled; the report covers only completed work");
    }
    Ok(())
}

fn build_scheduler(config: &CleanupConfig) -> Result<RepositoryScheduler> {
    let policy = config.policy().context("Invalid retention policy")?;
    let client = HarborClient::new(harbor_config(&config.registry))
        .context("Failed to create Harbor client")?;

    let options = RunOptions::new(config.registry.project.as_str())
        .dry_run(config.dry_run)
        .concurrency(config.concurrency.repositories, config.concurrency.artifacts);

    Ok(RepositoryScheduler::new(
        Arc::new(client),
        policy,
        config.repository_filter(),
        options,
    ))
}

fn harbor_config(settings: &RegistrySettings) -> HarborConfig {
    let mut config = HarborConfig::new(
        settings.url.clone(),
        settings.username.as_str(),
        settings.password.expose(),
    );
    config.ca_cert = settings.ca_cert.clone();
    config.timeout = Duration::from_secs(settings.timeout_secs);
    config.max_retries = settings.max_retries;
    config.page_size = settings.page_size;
    config
}

fn spawn_ctrl_c_watcher(handle: Arc<CancelHandle>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            handle.cancel();
        }
    })
}

fn spawn_timeout(handle: Arc<CancelHandle>, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        warn!(timeout_secs = after.as_secs(), "Run timeout reached, finishing in-flight work");
        handle.cancel();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoover_config::{Secret, parse_config_with_env};

    const CONFIG: &str = r#"
registry "https://harbor.example.com" project="platform" {
    username "robot$cleaner"
    password-env "HARBOR_PASSWORD"
    timeout-secs 45
    max-retries 5
    page-size 50
}
retention days=7
"#;

    fn env(name: &str) -> Option<String> {
        (name == "HARBOR_PASSWORD").then(|| "s3cret".to_string())
    }

    #[test]
    fn test_harbor_config_mapping() {
        let config = parse_config_with_env(CONFIG, env).unwrap();
        let harbor = harbor_config(&config.registry);

        assert_eq!(harbor.base_url.as_str(), "https://harbor.example.com/");
        assert_eq!(harbor.username, "robot$cleaner");
        assert_eq!(harbor.password, "s3cret");
        assert_eq!(harbor.timeout, Duration::from_secs(45));
        assert_eq!(harbor.max_retries, 5);
        assert_eq!(harbor.page_size, 50);
        assert!(harbor.ca_cert.is_none());
    }

    #[test]
    fn test_overrides_from_args() {
        let args = RunArgs {
            dry_run: true,
            days_to_keep: Some(30),
            max_workers: Some(2),
            artifact_workers: None,
            timeout_secs: None,
            debug: false,
        };
        let mut config = parse_config_with_env(CONFIG, env).unwrap();
        config.apply_overrides(&args.overrides()).unwrap();

        assert!(config.dry_run);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.concurrency.repositories, 2);
        assert_eq!(config.registry.password, Secret::new("s3cret"));
    }

    #[test]
    fn test_build_scheduler_uses_config() {
        let mut config = parse_config_with_env(CONFIG, env).unwrap();
        config.dry_run = true;
        let scheduler = build_scheduler(&config).unwrap();

        let options = scheduler.options();
        assert_eq!(options.project, "platform");
        assert!(options.dry_run);
        assert_eq!(options.max_concurrent_repositories, 10);
        assert_eq!(options.max_concurrent_artifacts, 5);
    }
}

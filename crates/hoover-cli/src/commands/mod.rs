//! CLI command implementations.

pub mod run;

use std::path::Path;

use anyhow::{Context, Result};

pub fn validate(path: &Path) -> Result<()> {
    let config = hoover_config::load_config(path)
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;
    config
        .policy()
        .with_context(|| format!("Invalid retention policy in {}", path.display()))?;

    println!("Configuration is valid");
    println!("  Registry:    {}", config.registry.url);
    println!("  Project:     {}", config.registry.project);
    println!("  Retention:   {} day(s)", config.retention_days);
    println!("  Protected:   {}", config.protected_tags.join(", "));
    println!("  Scope:       {}", config.include_repositories.join(", "));
    println!(
        "  Concurrency: {} repositories x {} artifacts",
        config.concurrency.repositories, config.concurrency.artifacts
    );
    println!("  Dry run:     {}", config.dry_run);
    Ok(())
}

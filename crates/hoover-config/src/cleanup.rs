//! Cleanup configuration parsing.

use std::path::{Path, PathBuf};

use chrono::Duration;
use hoover_core::{MissingAgePolicy, Policy, RepositoryFilter};
use kdl::{KdlDocument, KdlNode};
use url::Url;

use crate::{ConfigError, ConfigResult};

const DEFAULT_RETENTION_DAYS: u32 = 2;
const DEFAULT_PROTECTED_TAGS: [&str; 3] = ["latest", "stable", "prod"];
const DEFAULT_INCLUDE: [&str; 2] = ["cdp", "sdp"];
const DEFAULT_HTML_REPORT: &str = "reports/cleanup_report.html";
/// Largest page Harbor's v2 API serves.
pub const MAX_PAGE_SIZE: u32 = 100;
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Connection settings for the registry.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub url: Url,
    pub project: String,
    pub username: String,
    pub password: Secret,
    /// Extra root certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencySettings {
    pub repositories: usize,
    pub artifacts: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            repositories: 10,
            artifacts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            html: Some(PathBuf::from(DEFAULT_HTML_REPORT)),
            json: None,
        }
    }
}

/// Fully parsed and validated configuration.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub registry: RegistrySettings,
    pub retention_days: u32,
    pub missing_age: MissingAgePolicy,
    pub protected_tags: Vec<String>,
    pub include_repositories: Vec<String>,
    pub exclude_repositories: Vec<String>,
    pub exclude_tag_patterns: Vec<String>,
    pub concurrency: ConcurrencySettings,
    pub dry_run: bool,
    pub logging: LoggingSettings,
    pub report: ReportSettings,
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub retention_days: Option<u32>,
    pub dry_run: bool,
    pub debug: bool,
    pub max_repositories: Option<usize>,
    pub max_artifacts: Option<usize>,
}

impl CleanupConfig {
    /// Build the retention policy for a run.
    pub fn policy(&self) -> ConfigResult<Policy> {
        Policy::new(Duration::days(i64::from(self.retention_days)))
            .with_protected_tags(self.protected_tags.iter().cloned())
            .with_excluded_repositories(self.exclude_repositories.iter().cloned())
            .with_missing_age(self.missing_age)
            .with_excluded_tag_patterns(self.exclude_tag_patterns.iter().cloned())
            .map_err(|e| ConfigError::invalid("exclude-tags", e.to_string()))
    }

    pub fn repository_filter(&self) -> RepositoryFilter {
        RepositoryFilter::new(
            self.include_repositories.iter(),
            self.exclude_repositories.iter().cloned(),
        )
    }

    /// Apply CLI overrides and re-validate.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> ConfigResult<()> {
        if let Some(days) = overrides.retention_days {
            self.retention_days = days;
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
        if overrides.debug {
            self.logging.level = "debug".to_string();
        }
        if let Some(n) = overrides.max_repositories {
            self.concurrency.repositories = n;
        }
        if let Some(n) = overrides.max_artifacts {
            self.concurrency.artifacts = n;
        }
        self.validate()
    }

    /// Check invariants the cleanup engine relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if !matches!(self.registry.url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "registry url",
                format!("unsupported scheme '{}'", self.registry.url.scheme()),
            ));
        }
        if self.registry.project.trim().is_empty() {
            return Err(ConfigError::MissingField("registry project".to_string()));
        }
        if self.registry.username.is_empty() {
            return Err(ConfigError::MissingField("registry username".to_string()));
        }
        if self.registry.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout-secs", "must be at least 1"));
        }
        if self.registry.max_retries == 0 {
            return Err(ConfigError::invalid("max-retries", "must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.registry.page_size) {
            return Err(ConfigError::invalid(
                "page-size",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        if self.include_repositories.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "repositories include",
                "at least one non-empty substring is required",
            ));
        }
        if self.concurrency.repositories == 0 {
            return Err(ConfigError::invalid(
                "concurrency repositories",
                "must be at least 1",
            ));
        }
        if self.concurrency.artifacts == 0 {
            return Err(ConfigError::invalid(
                "concurrency artifacts",
                "must be at least 1",
            ));
        }
        if let Some(pattern) = self.exclude_tag_patterns.iter().find(|p| p.is_empty()) {
            return Err(ConfigError::invalid(
                "exclude-tags",
                format!("empty pattern '{}'", pattern),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(
                "logging level",
                format!("expected one of {:?}, got '{}'", LOG_LEVELS, self.logging.level),
            ));
        }
        Ok(())
    }
}

/// Read and parse a configuration file, resolving `password-env` from the process environment.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<CleanupConfig> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_config(&content)
}

/// Parse configuration from KDL text, resolving `password-env` from the process environment.
pub fn parse_config(kdl: &str) -> ConfigResult<CleanupConfig> {
    parse_config_with_env(kdl, |name| std::env::var(name).ok())
}

/// Parse configuration from KDL text with a custom environment lookup.
pub fn parse_config_with_env<F>(kdl: &str, env: F) -> ConfigResult<CleanupConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let doc: KdlDocument = kdl.parse()?;

    let mut registry = None;
    let mut retention_days = DEFAULT_RETENTION_DAYS;
    let mut missing_age = MissingAgePolicy::default();
    let mut protected_tags: Vec<String> =
        DEFAULT_PROTECTED_TAGS.iter().map(|s| s.to_string()).collect();
    let mut include_repositories: Vec<String> =
        DEFAULT_INCLUDE.iter().map(|s| s.to_string()).collect();
    let mut exclude_repositories = Vec::new();
    let mut exclude_tag_patterns = Vec::new();
    let mut concurrency = ConcurrencySettings::default();
    let mut dry_run = false;
    let mut logging = LoggingSettings::default();
    let mut report = ReportSettings::default();

    for node in doc.nodes() {
        match node.name().value() {
            "registry" => {
                if registry.is_some() {
                    return Err(ConfigError::Duplicate("registry".to_string()));
                }
                registry = Some(parse_registry(node, &env)?);
            }
            "retention" => {
                retention_days = get_u32_prop(node, "days")?
                    .ok_or_else(|| ConfigError::MissingField("retention days".to_string()))?;
            }
            "missing-age" => {
                let value = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("missing-age value".to_string()))?;
                missing_age = value
                    .parse()
                    .map_err(|e: String| ConfigError::invalid("missing-age", e))?;
            }
            "protected-tags" => {
                protected_tags = get_all_string_args(node);
            }
            "repositories" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "include" => include_repositories = get_all_string_args(child),
                            "exclude" => exclude_repositories = get_all_string_args(child),
                            _ => {}
                        }
                    }
                }
            }
            "exclude-tags" => {
                exclude_tag_patterns = get_all_string_args(node);
            }
            "concurrency" => {
                if let Some(n) = get_usize_prop(node, "repositories")? {
                    concurrency.repositories = n;
                }
                if let Some(n) = get_usize_prop(node, "artifacts")? {
                    concurrency.artifacts = n;
                }
            }
            "dry-run" => {
                dry_run = get_first_bool_arg(node).unwrap_or(true);
            }
            "logging" => {
                logging = parse_logging(node)?;
            }
            "report" => {
                report = ReportSettings {
                    html: get_string_prop(node, "html").map(PathBuf::from),
                    json: get_string_prop(node, "json").map(PathBuf::from),
                };
            }
            _ => {} // Ignore unknown nodes
        }
    }

    let registry = registry.ok_or_else(|| ConfigError::MissingField("registry".to_string()))?;

    let config = CleanupConfig {
        registry,
        retention_days,
        missing_age,
        protected_tags,
        include_repositories,
        exclude_repositories,
        exclude_tag_patterns,
        concurrency,
        dry_run,
        logging,
        report,
    };
    config.validate()?;
    Ok(config)
}

fn parse_registry<F>(node: &KdlNode, env: &F) -> ConfigResult<RegistrySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_url = get_first_string_arg(node)
        .or_else(|| get_string_prop(node, "url"))
        .ok_or_else(|| ConfigError::MissingField("registry url".to_string()))?;
    let url = Url::parse(&raw_url).map_err(|e| ConfigError::invalid("registry url", e.to_string()))?;

    let mut project = get_string_prop(node, "project").unwrap_or_default();
    let mut username = String::new();
    let mut password = None;
    let mut password_env = None;
    let mut ca_cert = None;
    let mut timeout_secs = 30;
    let mut max_retries = 3;
    let mut page_size = 100;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "project" => project = get_first_string_arg(child).unwrap_or_default(),
                "username" => username = get_first_string_arg(child).unwrap_or_default(),
                "password" => password = get_first_string_arg(child),
                "password-env" => password_env = get_first_string_arg(child),
                "ca-cert" => ca_cert = get_first_string_arg(child).map(PathBuf::from),
                "timeout-secs" => {
                    timeout_secs = get_first_u64_arg(child, "timeout-secs")?.unwrap_or(timeout_secs)
                }
                "max-retries" => {
                    max_retries = get_first_u64_arg(child, "max-retries")?
                        .map(|n| to_u32(n, "max-retries"))
                        .transpose()?
                        .unwrap_or(max_retries)
                }
                "page-size" => {
                    page_size = get_first_u64_arg(child, "page-size")?
                        .map(|n| to_u32(n, "page-size"))
                        .transpose()?
                        .unwrap_or(page_size)
                }
                _ => {}
            }
        }
    }

    let password = match (password, password_env) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::invalid(
                "registry password",
                "set either password or password-env, not both",
            ));
        }
        (Some(value), None) => Secret::new(value),
        (None, Some(var)) => Secret::new(env(&var).ok_or(ConfigError::MissingEnv(var))?),
        (None, None) => return Err(ConfigError::MissingField("registry password".to_string())),
    };

    Ok(RegistrySettings {
        url,
        project,
        username,
        password,
        ca_cert,
        timeout_secs,
        max_retries,
        page_size,
    })
}

fn parse_logging(node: &KdlNode) -> ConfigResult<LoggingSettings> {
    let defaults = LoggingSettings::default();
    let format = match get_string_prop(node, "format") {
        Some(raw) => raw
            .parse()
            .map_err(|e: String| ConfigError::invalid("logging format", e))?,
        None => defaults.format,
    };
    Ok(LoggingSettings {
        level: get_string_prop(node, "level")
            .map(|l| l.to_lowercase())
            .unwrap_or(defaults.level),
        format,
        file: get_string_prop(node, "file").map(PathBuf::from),
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_bool_arg(node: &KdlNode) -> Option<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
}

fn get_first_u64_arg(node: &KdlNode, field: &str) -> ConfigResult<Option<u64>> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .map(|n| u64::try_from(n).map_err(|_| ConfigError::invalid(field, "must not be negative")))
        .transpose()
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_u32_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<u32>> {
    node.get(name)
        .and_then(|v| v.as_integer())
        .map(|n| {
            u32::try_from(n)
                .map_err(|_| ConfigError::invalid(name, format!("{} is out of range", n)))
        })
        .transpose()
}

fn get_usize_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<usize>> {
    node.get(name)
        .and_then(|v| v.as_integer())
        .map(|n| {
            usize::try_from(n)
                .map_err(|_| ConfigError::invalid(name, format!("{} is out of range", n)))
        })
        .transpose()
}

fn to_u32(n: u64, field: &str) -> ConfigResult<u32> {
    u32::try_from(n).map_err(|_| ConfigError::invalid(field, format!("{} is out of range", n)))
}

//! Harbor v2 registry client.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use hoover_core::registry::{RegistryClient, Repository};
use hoover_core::{Artifact, Error, Result};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use crate::wire::{HarborArtifact, HarborRepository};

/// Largest `page_size` Harbor honours; bigger requests are silently capped.
pub const HARBOR_MAX_PAGE_SIZE: u32 = 100;

const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Connection settings for [`HarborClient`].
#[derive(Debug, Clone)]
pub struct HarborConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    /// Extra root certificate (PEM) to trust, for registries behind a private CA.
    pub ca_cert: Option<PathBuf>,
    pub timeout: Duration,
    /// Total attempts per request, including the first.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub retry_delay: Duration,
    pub page_size: u32,
}

impl HarborConfig {
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            ca_cert: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            page_size: 100,
        }
    }
}

/// Harbor registry client.
pub struct HarborClient {
    client: reqwest::Client,
    config: HarborConfig,
}

impl HarborClient {
    pub fn new(config: HarborConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("hoover/", env!("CARGO_PKG_VERSION")));

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                Error::InvalidInput(format!("reading CA certificate {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| Error::InvalidInput(format!("parsing CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("building HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_base(&self) -> String {
        format!(
            "{}/api/v2.0",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }

    fn repositories_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{}/repositories",
            self.api_base(),
            urlencoding::encode(project)
        )
    }

    /// Harbor wants repository names containing `/` encoded twice.
    fn artifacts_url(&self, repository: &Repository) -> String {
        let once = urlencoding::encode(&repository.name);
        format!(
            "{}/projects/{}/repositories/{}/artifacts",
            self.api_base(),
            urlencoding::encode(&repository.project),
            urlencoding::encode(&once)
        )
    }

    /// Send a request, retrying transient failures with exponential backoff.
    async fn send(&self, method: Method, url: &str) -> Result<Response> {
        self.execute(method, url).await.0
    }

    /// Like [`send`](Self::send), but also reports how many attempts were made.
    async fn execute(&self, method: Method, url: &str) -> (Result<Response>, u32) {
        let max_attempts = self.config.max_retries.max(1);
        let mut delay = self.config.retry_delay;
        let mut attempt = 1;

        loop {
            let result = self
                .client
                .request(method.clone(), url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .header("Accept", "application/json")
                .send()
                .await;

            let err = match result {
                Ok(response) if response.status().is_success() => return (Ok(response), attempt),
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    classify_status(
                        status,
                        format!("{} {} returned {}: {}", method, url, status, body.trim()),
                    )
                }
                Err(e) => Error::Transport(format!("{} {}: {}", method, url, e)),
            };

            if !err.is_transient() || attempt >= max_attempts {
                if attempt > 1 {
                    error!(%method, url, attempts = attempt, error = %err, "Registry request failed");
                }
                return (Err(err), attempt);
            }

            warn!(
                %method,
                url,
                attempt,
                max_attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %err,
                "Registry request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }

    /// Fetch every page of a list endpoint.
    ///
    /// Stops on an empty page, once `X-Total-Count` items have arrived, or,
    /// when the header is missing, on a page shorter than the requested size.
    async fn get_all<T: DeserializeOwned>(&self, url: &str, extra_query: &str) -> Result<Vec<T>> {
        let page_size = self.config.page_size.clamp(1, HARBOR_MAX_PAGE_SIZE);
        let mut page = 1u32;
        let mut items = Vec::new();

        loop {
            let page_url = format!(
                "{}?page={}&page_size={}{}",
                url, page, page_size, extra_query
            );
            let response = self.send(Method::GET, &page_url).await?;
            let total = total_count(&response);
            let batch: Vec<T> = response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("decoding {}: {}", page_url, e)))?;

            let len = batch.len();
            items.extend(batch);
            debug!(url = %page_url, items = len, total = ?total, "Fetched page");

            let done = match total {
                _ if len == 0 => true,
                Some(total) => items.len() >= total,
                None => len < page_size as usize,
            };
            if done {
                break;
            }
            page += 1;
        }

        Ok(items)
    }
}

fn total_count(response: &Response) -> Option<usize> {
    response
        .headers()
        .get(TOTAL_COUNT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Map a non-success HTTP status onto the core error taxonomy.
pub fn classify_status(status: StatusCode, message: String) -> Error {
    match status {
        // 412 is how Harbor rejects deletes blocked by tag immutability rules.
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::PRECONDITION_FAILED => {
            Error::Permission(message)
        }
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => Error::Transport(message),
        s if s.is_server_error() => Error::Transport(message),
        _ => Error::InvalidInput(message),
    }
}

#[async_trait]
impl RegistryClient for HarborClient {
    fn name(&self) -> &'static str {
        "harbor"
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>> {
        let url = self.repositories_url(project);
        let repositories: Vec<HarborRepository> = self.get_all(&url, "").await?;
        Ok(repositories
            .iter()
            .map(|r| Repository::new(project, r.relative_name(project)))
            .collect())
    }

    async fn list_artifacts(&self, repository: &Repository) -> Result<Vec<Artifact>> {
        let url = self.artifacts_url(repository);
        let artifacts: Vec<HarborArtifact> = self.get_all(&url, "&with_tag=true").await?;
        Ok(artifacts
            .into_iter()
            .map(|a| a.into_artifact(&repository.name))
            .collect())
    }

    async fn delete_artifact(&self, repository: &Repository, digest: &str) -> Result<()> {
        let url = format!("{}/{}", self.artifacts_url(repository), digest);
        match self.execute(Method::DELETE, &url).await {
            (Ok(_), _) => Ok(()),
            // An earlier attempt may have succeeded with its response lost.
            (Err(Error::NotFound(msg)), attempts) if attempts > 1 => {
                warn!(
                    repository = %repository.name,
                    digest,
                    attempts,
                    error = %msg,
                    "Artifact already gone after retried delete"
                );
                Ok(())
            }
            (Err(e), _) => Err(e),
        }
    }
}

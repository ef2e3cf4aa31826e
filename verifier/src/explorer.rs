use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::ExplorerConfig;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status code {0}")]
    Status(StatusCode),
    #[error("invalid explorer url: {0}")]
    Url(#[from] url::ParseError),
    #[error("no explorer mirrors configured")]
    NoMirrors,
}

/// Where raw transaction documents come from. A failed fetch moves the
/// cursor forward with `switch_to_another_provider`, it never wraps
/// around, so a request makes at most one attempt per mirror.
#[async_trait]
pub trait TxSource: Send {
    async fn fetch(&mut self, path: &str) -> Result<String, ExplorerError>;
    fn switch_to_another_provider(&mut self) -> bool;
    fn current_provider(&self) -> Option<&Url>;
}

/// One lookup against the configured mirror list, starting at the first
/// mirror. Built fresh for every verification.
pub struct ExplorerRequest {
    client: Client,
    mirrors: Vec<Url>,
    current: usize,
}

impl ExplorerRequest {
    pub fn new(client: Client, mirrors: Vec<Url>) -> Self {
        Self {
            client,
            mirrors,
            current: 0,
        }
    }
}

#[async_trait]
impl TxSource for ExplorerRequest {
    async fn fetch(&mut self, path: &str) -> Result<String, ExplorerError> {
        let base = self.mirrors.get(self.current).ok_or(ExplorerError::NoMirrors)?;
        let url = base.join(path)?;
        debug!("fetching {}", url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ExplorerError::Status(response.status()));
        }
        Ok(response.text().await?)
    }

    fn switch_to_another_provider(&mut self) -> bool {
        if self.current + 1 < self.mirrors.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn current_provider(&self) -> Option<&Url> {
        self.mirrors.get(self.current)
    }
}

/// Shared HTTP client with the configured timeouts.
pub fn build_http_client(config: &ExplorerConfig) -> Result<Client, ExplorerError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?)
}

/// Parses mirror strings. A missing scheme defaults to https and the
/// path gets a trailing slash so joined paths stay under the API root.
pub fn parse_mirrors<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Url>, ExplorerError> {
    if raw.is_empty() {
        return Err(ExplorerError::NoMirrors);
    }
    let mut mirrors = Vec::with_capacity(raw.len());
    for entry in raw {
        let entry = entry.as_ref();
        let with_scheme = if entry.contains("://") {
            entry.to_string()
        } else {
            format!("https://{}", entry)
        };
        let normalized = if with_scheme.ends_with('/') {
            with_scheme
        } else {
            format!("{}/", with_scheme)
        };
        mirrors.push(Url::parse(&normalized)?);
    }
    Ok(mirrors)
}

/// Terminal state of one lookup. Transport failures rotate mirrors until
/// one answers or the list runs out, a served document is final even if
/// its content later fails validation.
pub(crate) enum FetchOutcome {
    Completed(String),
    Failed,
}

pub(crate) async fn fetch_with_failover<S: TxSource + ?Sized>(source: &mut S, path: &str) -> FetchOutcome {
    loop {
        match source.fetch(path).await {
            Ok(body) => return FetchOutcome::Completed(body),
            Err(e) => {
                let provider = source
                    .current_provider()
                    .map(|url| url.to_string())
                    .unwrap_or_else(|| "<none>".to_string());
                warn!("fetch of {} from {} failed: {}", path, provider, e);
                if !source.switch_to_another_provider() {
                    return FetchOutcome::Failed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedSource {
        outcomes: VecDeque<Result<String, ExplorerError>>,
        attempts: usize,
        switches: usize,
    }

    impl ScriptedSource {
        fn new(outcomes: Vec<Result<String, ExplorerError>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                attempts: 0,
                switches: 0,
            }
        }
    }

    #[async_trait]
    impl TxSource for ScriptedSource {
        async fn fetch(&mut self, _path: &str) -> Result<String, ExplorerError> {
            self.attempts += 1;
            self.outcomes.pop_front().unwrap_or(Err(ExplorerError::NoMirrors))
        }

        fn switch_to_another_provider(&mut self) -> bool {
            self.switches += 1;
            !self.outcomes.is_empty()
        }

        fn current_provider(&self) -> Option<&Url> {
            None
        }
    }

    #[test]
    fn test_parse_mirrors_normalization() {
        let mirrors = parse_mirrors(&["mempool.space/api", "http://localhost:3000/api/"]).unwrap();
        assert_eq!(mirrors[0].as_str(), "https://mempool.space/api/");
        assert_eq!(mirrors[1].as_str(), "http://localhost:3000/api/");
        // joining keeps the api root in the path
        assert_eq!(
            mirrors[0].join("tx/abc").unwrap().as_str(),
            "https://mempool.space/api/tx/abc"
        );
    }

    #[test]
    fn test_parse_mirrors_rejects_empty_and_invalid() {
        assert!(matches!(parse_mirrors::<&str>(&[]), Err(ExplorerError::NoMirrors)));
        assert!(parse_mirrors(&["https://"]).is_err());
    }

    #[test]
    fn test_cursor_is_forward_only() {
        let mut request = ExplorerRequest::new(Client::new(), parse_mirrors(&["a.example", "b.example", "c.example"]).unwrap());
        assert_eq!(request.current_provider().unwrap().as_str(), "https://a.example/");
        assert!(request.switch_to_another_provider());
        assert!(request.switch_to_another_provider());
        assert_eq!(request.current_provider().unwrap().as_str(), "https://c.example/");
        // exhausted, the cursor does not wrap around
        assert!(!request.switch_to_another_provider());
        assert_eq!(request.current_provider().unwrap().as_str(), "https://c.example/");
    }

    #[tokio::test]
    async fn test_failover_stops_at_first_success() {
        let mut source = ScriptedSource::new(vec![
            Err(ExplorerError::Status(StatusCode::BAD_GATEWAY)),
            Err(ExplorerError::Status(StatusCode::NOT_FOUND)),
            Ok("body".to_string()),
        ]);
        match fetch_with_failover(&mut source, "tx/abc").await {
            FetchOutcome::Completed(body) => assert_eq!(body, "body"),
            FetchOutcome::Failed => panic!("expected a completed fetch"),
        }
        // a success on the third mirror takes exactly three attempts
        assert_eq!(source.attempts, 3);
        assert_eq!(source.switches, 2);
    }

    #[tokio::test]
    async fn test_failover_exhausts_every_mirror_once() {
        let mut source = ScriptedSource::new(vec![
            Err(ExplorerError::Status(StatusCode::BAD_GATEWAY)),
            Err(ExplorerError::Status(StatusCode::BAD_GATEWAY)),
        ]);
        assert!(matches!(fetch_with_failover(&mut source, "tx/abc").await, FetchOutcome::Failed));
        assert_eq!(source.attempts, 2);
        assert_eq!(source.switches, 2);
    }
}

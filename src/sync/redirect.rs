use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Redirect status codes the resolver follows. 308 is deliberately
/// absent; 305 is deprecated but still honored when a `Location`
/// header is present.
const REDIRECT_STATUSES: [u16; 6] = [300, 301, 302, 303, 305, 307];

/// Errors that can occur while probing a redirect chain.
///
/// Any error means "could not confirm a redirect": reconciliation
/// keeps the naive diff result for that pair and moves on.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Probe exceeded the 10-second timeout.
    #[error("Request timed out")]
    Timeout,
    /// A URL in the chain could not be parsed.
    #[error("Invalid URL in redirect chain: {0}")]
    Url(#[from] url::ParseError),
    /// The `Location` header was not valid UTF-8.
    #[error("Location header is not readable")]
    BadLocation,
}

/// Walks an HTTP redirect chain to find a resource's current URL.
///
/// Redirect following is disabled on the client; each hop is inspected
/// explicitly so the chain can be cycle-checked. The walk is iterative
/// with a local visited set, so a pathological chain terminates with
/// `Ok(None)` instead of recursing without bound.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: reqwest::Client,
}

impl RedirectResolver {
    /// Creates a resolver with its own non-following client.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    /// Creates a resolver around an existing client.
    ///
    /// The client must have redirect following disabled, otherwise
    /// every probe short-circuits to the final hop and cycle detection
    /// never engages.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Resolves `url` to its final location.
    ///
    /// Returns `Ok(Some(final_url))` for a chain that terminates
    /// (including the zero-hop case where `url` answers directly),
    /// `Ok(None)` when the chain revisits a URL (cycle), and an error
    /// when the network or a URL in the chain fails.
    pub async fn resolve(&self, url: &str) -> Result<Option<String>, ResolveError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = url.to_owned();

        loop {
            if !visited.insert(current.clone()) {
                tracing::debug!(url = %url, cycle_at = %current, "Redirect cycle detected");
                return Ok(None);
            }

            let response =
                tokio::time::timeout(PROBE_TIMEOUT, self.client.get(&current).send())
                    .await
                    .map_err(|_| ResolveError::Timeout)?
                    .map_err(ResolveError::Network)?;

            let status = response.status().as_u16();
            if !REDIRECT_STATUSES.contains(&status) {
                return Ok(Some(current));
            }

            let location = match response.headers().get(reqwest::header::LOCATION) {
                Some(value) => value.to_str().map_err(|_| ResolveError::BadLocation)?,
                // Redirect status without a target: treat as terminal
                None => return Ok(Some(current)),
            };

            // Location may be relative; resolve against the current hop
            let next = Url::parse(&current)?.join(location)?.to_string();
            tracing::trace!(from = %current, to = %next, status = status, "Following redirect");
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver() -> RedirectResolver {
        RedirectResolver::new().unwrap()
    }

    #[tokio::test]
    async fn test_direct_url_resolves_to_itself() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let resolved = resolver().resolve(&url).await.unwrap();
        assert_eq!(resolved, Some(url));
    }

    #[tokio::test]
    async fn test_follows_chain_to_final_url() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", format!("{}/mid", base)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mid"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/new", base)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let resolved = resolver().resolve(&format!("{}/old", base)).await.unwrap();
        assert_eq!(resolved, Some(format!("{}/new", base)));
    }

    #[tokio::test]
    async fn test_relative_location_resolved_against_current_hop() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let resolved = resolver().resolve(&format!("{}/old", base)).await.unwrap();
        assert_eq!(resolved, Some(format!("{}/new", base)));
    }

    #[tokio::test]
    async fn test_cycle_returns_none() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/b", base)),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("{}/a", base)),
            )
            .mount(&mock_server)
            .await;

        let resolved = resolver().resolve(&format!("{}/a", base)).await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_self_redirect_returns_none() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("Location", format!("{}/loop", base)),
            )
            .mount(&mock_server)
            .await;

        let resolved = resolver().resolve(&format!("{}/loop", base)).await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_terminal() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(301))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let resolved = resolver().resolve(&url).await.unwrap();
        assert_eq!(resolved, Some(url));
    }

    #[tokio::test]
    async fn test_unfollowed_status_308_is_terminal() {
        let mock_server = MockServer::start().await;
        let base = mock_server.uri();
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(308).insert_header("Location", format!("{}/new", base)),
            )
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", base);
        let resolved = resolver().resolve(&url).await.unwrap();
        assert_eq!(resolved, Some(url));
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        // Nothing is listening on this port
        let result = resolver().resolve("http://127.0.0.1:1/feed").await;
        assert!(matches!(result, Err(ResolveError::Network(_))));
    }
}

use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::sync::opml::parse_list_content;

const IMPORT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LIST_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while importing a reading-list document.
///
/// `NotFound` is the one variant the scheduler treats specially: it
/// marks the list missing instead of scheduling a sooner retry.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The list no longer exists at its origin (404/410).
    #[error("reading list not found at origin")]
    NotFound,
    /// HTTP response with any other non-2xx status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the 30-second timeout.
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit.
    #[error("Response too large")]
    TooLarge,
    /// The body could not be parsed as an OPML document.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// One member-feed descriptor from a fetched list document.
#[derive(Debug, Clone)]
pub struct ListEntry {
    /// Feed URL as written in the document; may be relative to the
    /// document location.
    pub url: String,
    /// Display title, when the document provides one.
    pub title: Option<String>,
}

/// The parsed remote representation of a reading list.
#[derive(Debug, Clone, Default)]
pub struct ListDocument {
    /// Document title from the OPML head, if present.
    pub title: Option<String>,
    /// Member feeds in document order.
    pub entries: Vec<ListEntry>,
}

/// The external collaborator that fetches a reading list's remote
/// representation.
#[async_trait]
pub trait ListImporter: Send + Sync {
    async fn import_list(&self, url: &str) -> Result<ListDocument, ImportError>;
}

/// OPML-over-HTTP implementation of [`ListImporter`].
///
/// Fetches the list URL with a timeout and a streamed size cap, then
/// parses the body as OPML. The caller supplies the client so transport
/// configuration (proxies, user agent) stays in one place.
#[derive(Debug, Clone)]
pub struct HttpListImporter {
    client: reqwest::Client,
}

impl HttpListImporter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ListImporter for HttpListImporter {
    async fn import_list(&self, url: &str) -> Result<ListDocument, ImportError> {
        let response = tokio::time::timeout(IMPORT_TIMEOUT, self.client.get(url).send())
            .await
            .map_err(|_| ImportError::Timeout)?
            .map_err(ImportError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Err(ImportError::NotFound);
        }
        if !status.is_success() {
            return Err(ImportError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_LIST_SIZE).await?;
        let content = String::from_utf8_lossy(&bytes);

        parse_list_content(&content).map_err(|e| ImportError::Parse(e.to_string()))
    }
}

/// Reads a response body with a size limit using stream-based reading.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ImportError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ImportError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ImportError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ImportError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_LIST: &str = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Shared List</title></head>
  <body>
    <outline text="One" xmlUrl="https://one.example/feed"/>
    <outline text="Two" xmlUrl="https://two.example/feed"/>
  </body>
</opml>"#;

    #[tokio::test]
    async fn test_import_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_LIST)
                    .insert_header("Content-Type", "text/x-opml"),
            )
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let doc = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(doc.title.as_deref(), Some("Shared List"));
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].url, "https://one.example/feed");
    }

    #[tokio::test]
    async fn test_import_404_maps_to_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let result = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(ImportError::NotFound)));
    }

    #[tokio::test]
    async fn test_import_410_maps_to_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let result = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(ImportError::NotFound)));
    }

    #[tokio::test]
    async fn test_import_server_error_maps_to_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let result = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await;
        match result {
            Err(ImportError::HttpStatus(500)) => {}
            other => panic!("Expected HttpStatus(500), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_import_malformed_body_is_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let result = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(ImportError::Parse(_))));
    }

    #[tokio::test]
    async fn test_import_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        let oversized = vec![b' '; MAX_LIST_SIZE + 1];
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(oversized))
            .mount(&mock_server)
            .await;

        let importer = HttpListImporter::new(reqwest::Client::new());
        let result = importer
            .import_list(&format!("{}/list.opml", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(ImportError::TooLarge)));
    }
}

use crate::config::ScraperConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::PageSource;
use crate::assets::{DownloadedImage, ImageSource};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl NetworkError {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout { url: url.to_string() }
        } else if let Some(status) = err.status() {
            NetworkError::Status { url: url.to_string(), status }
        } else {
            NetworkError::Transport { url: url.to_string(), source: err }
        }
    }
}

/// Browser-looking client shared by page fetches and image downloads.
/// No retries here: a failed request surfaces to the caller once.
pub struct HttpClient {
    inner: reqwest::Client,
    image_timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .context("Invalid Accept-Language value")?,
        );

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            image_timeout: Duration::from_secs(config.image_timeout_secs),
        })
    }

    /// GET a page as text. Non-2xx is an error.
    pub async fn get_text(&self, url: &str) -> Result<String, NetworkError> {
        debug!("GET {}", url);
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NetworkError::from_reqwest(url, e))?;

        resp.text()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, e))
    }

    /// GET raw bytes with the longer image timeout.
    pub async fn get_bytes(&self, url: &str) -> Result<DownloadedImage, NetworkError> {
        debug!("GET {} (image)", url);
        let resp = self
            .inner
            .get(url)
            .timeout(self.image_timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NetworkError::from_reqwest(url, e))?;

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, e))?;

        Ok(DownloadedImage { bytes: bytes.to_vec(), content_type })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String, NetworkError> {
        self.get_text(url).await
    }
}

#[async_trait]
impl ImageSource for HttpClient {
    async fn download(&self, url: &str) -> Result<DownloadedImage> {
        Ok(self.get_bytes(url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single request with `response` after `delay`; the handle
    /// yields the raw request head.
    async fn serve_once(response: &'static str, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/list", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            tokio::time::sleep(delay).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&head).into_owned()
        });

        (url, handle)
    }

    const OK_HTML: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 10\r\nConnection: close\r\n\r\n<p>lip</p>";

    #[tokio::test]
    async fn test_get_text_sends_browser_headers() {
        let config = ScraperConfig::default();
        let (url, server) = serve_once(OK_HTML, Duration::ZERO).await;

        let body = HttpClient::new(&config).unwrap().get_text(&url).await.unwrap();
        assert_eq!(body, "<p>lip</p>");

        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /list "));
        assert!(head.contains(&format!(
            "accept-language: {}",
            config.accept_language.to_ascii_lowercase()
        )));
        assert!(head.contains(&format!(
            "user-agent: {}",
            config.user_agent.to_ascii_lowercase()
        )));
    }

    #[tokio::test]
    async fn test_non_success_status_is_status_error() {
        let (url, _server) = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Duration::ZERO,
        )
        .await;

        let err = HttpClient::new(&ScraperConfig::default())
            .unwrap()
            .get_text(&url)
            .await
            .unwrap_err();
        assert!(
            matches!(err, NetworkError::Status { status, .. } if status == reqwest::StatusCode::SERVICE_UNAVAILABLE),
            "got {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_slow_server_is_timeout_error() {
        let config = ScraperConfig {
            timeout_secs: 1,
            ..ScraperConfig::default()
        };
        let (url, server) = serve_once(OK_HTML, Duration::from_millis(2500)).await;

        let err = HttpClient::new(&config).unwrap().get_text(&url).await.unwrap_err();
        assert!(matches!(err, NetworkError::Timeout { .. }), "got {:?}", err);
        server.abort();
    }

    #[tokio::test]
    async fn test_get_bytes_keeps_content_type() {
        let (url, _server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\nConnection: close\r\n\r\n\u{1}\u{2}\u{3}\u{4}",
            Duration::ZERO,
        )
        .await;

        let image = HttpClient::new(&ScraperConfig::default())
            .unwrap()
            .get_bytes(&url)
            .await
            .unwrap();
        assert_eq!(image.bytes, vec![1, 2, 3, 4]);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
    }
}

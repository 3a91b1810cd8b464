//! # Rates Source
//!
//! `RateSource` adapter for the NBP (Narodowy Bank Polski) exchange rates API.
//!
//! `GET {base}/api/exchangerates/tables/{table}/?format=json` answers with a
//! JSON array of rate tables. The current table is a one-element array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use tracing::debug;

use rates_types::{RateSnapshot, RateSource, SourceError};

/// Production NBP API root.
pub const NBP_BASE_URL: &str = "https://api.nbp.pl/";

/// Request timeout used when `SOURCE_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// NBP exchange rates API client.
pub struct NbpClient {
    base_url: String,
    http: Client,
}

impl NbpClient {
    /// Creates a client with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/api/exchangerates/tables/{}/?format=json",
            self.base_url, table
        )
    }

    async fn handle_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<Vec<RateSnapshot>, SourceError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Err(SourceError::Empty);
        }

        let snapshots: Vec<RateSnapshot> =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))?;
        if snapshots.is_empty() {
            return Err(SourceError::Empty);
        }

        Ok(snapshots)
    }
}

fn transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(err.to_string())
    }
}

#[async_trait]
impl RateSource for NbpClient {
    async fn fetch_snapshot(&self, table: &str) -> Result<Vec<RateSnapshot>, SourceError> {
        let url = self.table_url(table);
        debug!(%url, "Fetching rate table");

        let resp = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        self.handle_response(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TABLE_B: &str = r#"[{
        "table": "B",
        "no": "002/B/NBP/2024",
        "effectiveDate": "2024-01-10",
        "rates": [
            {"currency": "afgani (Afganistan)", "code": "AFN", "mid": 0.0571},
            {"currency": "dolar amerykański", "code": "USD", "mid": 4.0123}
        ]
    }]"#;

    async fn mock_table(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/exchangerates/tables/B/"))
            .and(query_param("format", "json"))
            .and(header_eq("accept", "application/json"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;

        server
    }

    fn client(server: &MockServer) -> NbpClient {
        NbpClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = NbpClient::new("https://api.nbp.pl/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), "https://api.nbp.pl");
        assert_eq!(
            client.table_url("B"),
            "https://api.nbp.pl/api/exchangerates/tables/B/?format=json"
        );
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = mock_table(200, TABLE_B).await;

        let snapshots = client(&server).fetch_snapshot("B").await.unwrap();

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].table, "B");
        assert_eq!(snapshots[0].effective_date, "2024-01-10");
        assert_eq!(snapshots[0].rates.len(), 2);
        assert_eq!(snapshots[0].rates[1].code, "USD");
        assert_eq!(snapshots[0].rates[1].currency_name, "dolar amerykański");
        assert_eq!(snapshots[0].rates[1].mid, dec!(4.0123));
    }

    #[tokio::test]
    async fn test_fetch_keeps_exact_mid_digits() {
        let body = r#"[{"table": "B", "effectiveDate": "2024-01-10", "rates": [
            {"currency": "large", "code": "XLG", "mid": 1234567890.12345678}
        ]}]"#;
        let server = mock_table(200, body).await;

        let snapshots = client(&server).fetch_snapshot("B").await.unwrap();

        assert_eq!(snapshots[0].rates[0].mid, dec!(1234567890.12345678));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = mock_table(404, "404 NotFound - Not Found - Brak danych").await;

        let result = client(&server).fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Status(404))));
    }

    #[tokio::test]
    async fn test_empty_array_is_empty() {
        let server = mock_table(200, "[]").await;

        let result = client(&server).fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Empty)));
    }

    #[tokio::test]
    async fn test_empty_body_is_empty() {
        let server = mock_table(200, "").await;

        let result = client(&server).fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Empty)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = mock_table(200, r#"{"table": "B"}"#).await;

        let result = client(&server).fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(TABLE_B)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let client = NbpClient::new(server.uri(), Duration::from_millis(100)).unwrap();

        let result = client.fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn test_unreachable_source_is_transport_error() {
        let client = NbpClient::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();

        let result = client.fetch_snapshot("B").await;

        assert!(matches!(result, Err(SourceError::Transport(_))));
    }
}

//! HTTP surface for the dashboard endpoints.
//!
//! Every endpoint answers `GET /api/<endpoint>?<params>` with the JSON
//! envelope produced by [`Dashboard::handle`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use relaywatch_sdk::RelayStats;
//! use relaywatch_sdk::api::{ApiConfig, ApiServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = RelayStats::builder().build().unwrap();
//!     let config = ApiConfig::builder().listen_addr("127.0.0.1:8000").build();
//!
//!     let server = ApiServer::new(config, stats.dashboard()).start();
//!
//!     // http://127.0.0.1:8000/api/packet_stats?hours=6
//!     server.await.unwrap();
//! }
//! ```

use std::collections::BTreeMap;
use std::convert::Infallible;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::dashboard::{Dashboard, ENDPOINTS};
use crate::error::Result;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_PREFIX: &str = "/api";

/// Where and under which path prefix the API is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Address to listen on (e.g., "0.0.0.0:8000")
    pub listen_addr: String,
    /// Path prefix in front of every endpoint (e.g., "/api")
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl ApiConfig {
    /// Create a new builder for ApiConfig.
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }
}

/// Builder for ApiConfig.
#[derive(Debug, Default)]
pub struct ApiConfigBuilder {
    listen_addr: Option<String>,
    prefix: Option<String>,
}

impl ApiConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the path prefix. A trailing slash is ignored.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Build the ApiConfig.
    pub fn build(self) -> ApiConfig {
        let prefix = self
            .prefix
            .map(|p| p.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        ApiConfig {
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            prefix,
        }
    }
}

/// Serves a [`Dashboard`] over HTTP/1.
#[derive(Debug, Clone)]
pub struct ApiServer {
    config: ApiConfig,
    dashboard: Dashboard,
}

impl ApiServer {
    /// Create a server for `dashboard`.
    pub fn new(config: ApiConfig, dashboard: Dashboard) -> Self {
        Self { config, dashboard }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Bind the configured address and serve in a background task.
    ///
    /// Bind and accept failures are logged and end the task.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::error!(error = %e, addr = %server.config.listen_addr, "dashboard API stopped");
            }
        })
    }

    /// Bind the configured address and serve until an accept fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "dashboard API listening");
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.respond(&req)) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(%peer, error = %e, "dashboard API connection error");
                }
            });
        }
    }

    fn respond<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }
        route(
            &self.dashboard,
            &self.config.prefix,
            req.uri().path(),
            req.uri().query(),
        )
    }
}

fn route(
    dashboard: &Dashboard,
    prefix: &str,
    path: &str,
    query: Option<&str>,
) -> Response<Full<Bytes>> {
    if path == "/health" || path == "/healthz" {
        return text(StatusCode::OK, "OK");
    }
    let Some(rest) = path.strip_prefix(prefix) else {
        return not_found();
    };
    match rest.trim_matches('/') {
        "" => json(StatusCode::OK, serde_json::json!({ "endpoints": ENDPOINTS }).to_string()),
        endpoint if ENDPOINTS.contains(&endpoint) => {
            let params = parse_query(query.unwrap_or_default());
            json(StatusCode::OK, dashboard.handle(endpoint, &params).to_string())
        }
        _ => not_found(),
    }
}

fn not_found() -> Response<Full<Bytes>> {
    text(StatusCode::NOT_FOUND, "Not Found")
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    response(status, "text/plain", Bytes::from_static(body.as_bytes()))
}

fn json(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    response(status, "application/json", Bytes::from(body))
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Split a query string into decoded key/value pairs. Later duplicates win.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::RelayStats;
    use http_body_util::BodyExt;
    use relaywatch_types::PacketRecord;
    use serde_json::Value;
    use std::sync::Arc;

    fn dashboard() -> Dashboard {
        let stats = RelayStats::builder()
            .clock(Arc::new(ManualClock::new(1_700_000_000.0)))
            .build()
            .unwrap();
        let recorder = stats.recorder();
        recorder.record_packet(&PacketRecord::new(4).at(1_699_999_000.0));
        stats.run_maintenance();
        stats.dashboard()
    }

    async fn body(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn query_strings_are_decoded() {
        let params = parse_query("types=0%2C4&hours=6&flag&name=a+b&bad=%zz");
        assert_eq!(params["types"], "0,4");
        assert_eq!(params["hours"], "6");
        assert_eq!(params["flag"], "");
        assert_eq!(params["name"], "a b");
        assert_eq!(params["bad"], "%zz");
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn truncated_escapes_and_duplicates() {
        let params = parse_query("a=50%25&b=50%&c=50%2&d=%41&hours=1&hours=12");
        assert_eq!(params["a"], "50%");
        assert_eq!(params["b"], "50%");
        assert_eq!(params["c"], "50%2");
        assert_eq!(params["d"], "A");
        assert_eq!(params["hours"], "12");
    }

    #[test]
    fn config_builder_defaults() {
        let config = ApiConfig::builder().build();
        assert_eq!(config, ApiConfig::default());

        let config = ApiConfig::builder().prefix("/stats/").build();
        assert_eq!(config.prefix, "/stats");
    }

    #[tokio::test]
    async fn endpoints_answer_with_the_envelope() {
        let dashboard = dashboard();

        let response = route(&dashboard, "/api", "/api/packet_stats", Some("hours=1"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let value = body(response).await;
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["total_packets"], 1);

        let response = route(&dashboard, "/api", "/api/packet_stats", Some("hours=x"));
        let value = body(response).await;
        assert_eq!(value["success"], false);
        assert!(value["error"].as_str().unwrap().starts_with("Invalid parameter format"));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let dashboard = dashboard();

        let response = route(&dashboard, "/api", "/api/nope", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = route(&dashboard, "/api", "/metrics", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = route(&dashboard, "/api", "/health", None);
        assert_eq!(response.status(), StatusCode::OK);

        let value = body(route(&dashboard, "/api", "/api/", None)).await;
        assert_eq!(value["endpoints"].as_array().unwrap().len(), ENDPOINTS.len());
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = ApiServer::new(ApiConfig::default(), dashboard());
        let task = tokio::spawn(async move { server.serve(listener).await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /api/packet_type_stats?hours=2 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        task.abort();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        let (_, payload) = raw.split_once("\r\n\r\n").unwrap();
        let value: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["period"], "2 hours");
    }
}

//! Loopback HTTP server serving canned quote replies

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use url::Url;

use super::source::{with_symbol_query, QuoteSource, XueqiuSource, XUEQIU_SENTINEL};

/// Reply the mock server sends for a given symbol
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond { status: u16, reason: &'static str, body: String },
    /// Accept the request and never answer
    Stall,
}

impl MockReply {
    pub fn ok(body: impl Into<String>) -> Self {
        MockReply::Respond { status: 200, reason: "OK", body: body.into() }
    }

    pub fn status(status: u16, reason: &'static str) -> Self {
        MockReply::Respond { status, reason, body: String::new() }
    }
}

type Handler = Arc<dyn Fn(&str) -> MockReply + Send + Sync>;

pub struct MockServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> MockReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Handler = Arc::new(handler);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                tokio::spawn(serve(stream, handler));
            }
        });

        Self { addr, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Address nothing is listening on
    pub async fn unused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, handler: Handler) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let symbol = head
        .split_whitespace()
        .nth(1)
        .and_then(|target| Url::parse(&format!("http://localhost{target}")).ok())
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "symbol")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default();

    match handler(&symbol) {
        MockReply::Respond { status, reason, body } => {
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        MockReply::Stall => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

/// Xueqiu payload layout served from a loopback address
#[derive(Debug, Clone)]
pub struct LocalSource {
    base: String,
}

impl LocalSource {
    pub fn new(addr: SocketAddr) -> Self {
        Self { base: format!("http://{addr}/v5/stock/realtime/quotec.json") }
    }
}

impl QuoteSource for LocalSource {
    fn url_for(&self, symbol: &str) -> String {
        with_symbol_query(&self.base, symbol)
    }

    fn payload_sentinel(&self) -> &[u8] {
        XUEQIU_SENTINEL
    }

    fn field_map(&self) -> HashMap<&'static str, &'static str> {
        XueqiuSource.field_map()
    }
}

/// Vendor-shaped body for a record with the given symbol and change
pub fn quote_body(symbol: &str, chg: f64, percent: f64) -> String {
    format!(
        r#"{{"data":[{{"symbol":"{symbol}","current":85.10,"percent":{percent},"chg":{chg},"volume":12345678,"amount":1050000000,"market_capital":220000000000,"float_market_capital":210000000000,"turnover_rate":0.45,"amplitude":2.10,"open":84.00,"last_close":84.05,"high":85.50,"low":83.80,"avg_price":84.70}}],"error_code":0}}"#
    )
}

use crate::dashboard::store::TrafficStore;
use anyhow::Result;
use bytes::Bytes;
use chrono::{DateTime, Local, Utc};
use http_body_util::Full;
use hyper::{
    body::{self},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::{
    convert::Infallible,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};
use tokio::net::TcpListener;

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_LOOKBACK_DAYS: i64 = 7;

struct DashboardState {
    store: Arc<TrafficStore>,
    statistician_ready: Arc<AtomicBool>,
    dashboard_dir: PathBuf,
}

/// Serves the collector's HTTP surface: the `/api/traffics` query endpoint,
/// a `/healthcheck` route, and a static file mount for the dashboard bundle.
///
/// Built on `hyper` 1.x + `hyper-util`, in the style of the reference
/// `LurkHttpEndpoint`.
pub struct DashboardEndpoint {
    addr: SocketAddr,
    state: Arc<DashboardState>,
}

impl DashboardEndpoint {
    pub fn new(addr: SocketAddr, store: Arc<TrafficStore>, statistician_ready: Arc<AtomicBool>, dashboard_dir: PathBuf) -> DashboardEndpoint {
        DashboardEndpoint {
            addr,
            state: Arc::new(DashboardState {
                store,
                statistician_ready,
                dashboard_dir,
            }),
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Dashboard HTTP endpoint is listening on {}", self.addr);

        let http_builder = http1::Builder::new();

        loop {
            let (tcp_stream, client_addr) = listener.accept().await?;
            let io = TokioIo::new(tcp_stream);
            let state = Arc::clone(&self.state);

            trace!("Handling incoming HTTP request from {}", client_addr);

            let conn = http_builder.serve_connection(io, service_fn(move |req| {
                let state = Arc::clone(&state);
                async move { Ok::<_, Infallible>(route(req, state).await) }
            }));

            if let Err(err) = conn.await {
                warn!("error serving HTTP connection from {}: {}", client_addr, err);
            }
        }
    }
}

async fn route(req: Request<body::Incoming>, state: Arc<DashboardState>) -> Response<Full<Bytes>> {
    debug!("Handling incoming {req:?}");

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    match path.as_str() {
        "/healthcheck" => healthcheck(&state),
        "/api/traffics" => traffics(&query, &state).await,
        _ => serve_static(&path, &state.dashboard_dir).await,
    }
}

#[derive(Serialize)]
struct Healthcheck {
    ready: bool,
}

fn healthcheck(state: &DashboardState) -> Response<Full<Bytes>> {
    let body = Healthcheck {
        ready: state.statistician_ready.load(std::sync::atomic::Ordering::Relaxed),
    };
    json_response(StatusCode::OK, &body)
}

async fn traffics(query: &str, state: &DashboardState) -> Response<Full<Bytes>> {
    let params = parse_query(query);

    let Some(identifier) = params.get("identifier") else {
        return empty_response(StatusCode::BAD_REQUEST);
    };

    let now = Local::now();
    let default_begin = now - chrono::Duration::days(DEFAULT_LOOKBACK_DAYS);

    let begin = match params.get("begin") {
        Some(raw) => match parse_local_time(raw) {
            Some(time) => time,
            None => return empty_response(StatusCode::BAD_REQUEST),
        },
        None => default_begin,
    };

    let end = match params.get("end") {
        Some(raw) => match parse_local_time(raw) {
            Some(time) => time,
            None => return empty_response(StatusCode::BAD_REQUEST),
        },
        None => now,
    };

    if let Some(raw) = params.get("interval_secs") {
        if raw.parse::<u64>().is_err() {
            return empty_response(StatusCode::BAD_REQUEST);
        }
    }

    let records = state.store.list(identifier, begin, end).await;
    json_response(StatusCode::OK, &records)
}

fn parse_local_time(raw: &str) -> Option<DateTime<Local>> {
    let parsed: DateTime<Utc> = raw.parse().ok()?;
    Some(parsed.with_timezone(&Local))
}

async fn serve_static(path: &str, dashboard_dir: &Path) -> Response<Full<Bytes>> {
    let relative = if path == "/" { "index.html" } else { path.trim_start_matches('/') };

    if relative.contains("..") {
        return empty_response(StatusCode::NOT_FOUND);
    }

    let full_path = dashboard_dir.join(relative);
    match tokio::fs::read(&full_path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header(hyper::header::CONTENT_TYPE, content_type_for(&full_path))
            .body(Full::new(Bytes::from(contents)))
            .unwrap(),
        Err(_) => empty_response(StatusCode::NOT_FOUND),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).unwrap_or_default();
    Response::builder()
        .status(status)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))
        .unwrap()
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder().status(status).body(Full::new(Bytes::new())).unwrap()
}

/// Parses `k=v&k2=v2` query strings with minimal percent-decoding. No `url`
/// crate dependency; this mirrors the scale of parsing the query surface
/// actually needs.
fn parse_query(query: &str) -> std::collections::HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

fn percent_decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi.and_then(|h| h.to_digit(16)), lo.and_then(|l| l.to_digit(16))) {
                    (Some(hi), Some(lo)) => out.push(((hi * 16 + lo) as u8) as char),
                    _ => out.push('%'),
                }
            }
            other => out.push(other),
        }
    }

    out
}

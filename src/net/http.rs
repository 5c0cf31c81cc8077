//! Minimal HTTP transport over the lottery session.
//!
//! Routes:
//! - `GET /` - usage text
//! - `POST /start` - open a window (`time_scale` form/query field)
//! - `POST /register` - register `username`
//! - `GET /status` - window state, participants and result
//! - `POST /stop` - force the window closed and draw
//! - `GET /healthz`
//! - `GET /v1/loglevel?level=...`

use crate::lottery::{LotterySession, SessionError, SessionParams, SessionStatus};
use crate::telemetry::{self, LogHandle};
use crate::time::Clock;
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const MAX_REQUEST_BYTES: usize = 64 * 1024;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared state handed to every connection.
pub struct HttpState<C: Clock> {
    pub session: Arc<LotterySession<C>>,
    pub default_time_scale: f64,
    pub read_timeout: Duration,
    pub log_handle: Option<LogHandle>,
}

#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    query: String,
    body: String,
}

impl Request {
    /// Look a field up in the form body first, then the query string.
    fn param(&self, key: &str) -> Option<String> {
        [self.body.as_str(), self.query.as_str()]
            .into_iter()
            .flat_map(|src| url::form_urlencoded::parse(src.as_bytes()))
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

struct Response {
    status: u16,
    content_type: &'static str,
    body: String,
}

impl Response {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into(),
        }
    }
}

/// Bind the listener and serve until `shutdown` flips.
pub async fn start_http<C: Clock>(
    bind: &str,
    state: Arc<HttpState<C>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind lottery http endpoint on {bind}"))?;
    let addr = listener.local_addr()?;
    tracing::info!("lottery http endpoint listening on {}", addr);
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("lottery http endpoint shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((mut socket, peer)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_conn(&mut socket, peer, state).await {
                                tracing::warn!("http handler error: {err:?}");
                            }
                        });
                    }
                    Err(err) => {
                        tracing::warn!("http accept error: {err:?}");
                    }
                }
            }
        }
    });
    Ok((addr, handle))
}

async fn handle_conn<C: Clock>(
    socket: &mut TcpStream,
    peer: SocketAddr,
    state: Arc<HttpState<C>>,
) -> Result<()> {
    let response = match tokio::time::timeout(state.read_timeout, read_request(socket)).await {
        Ok(Ok(req)) => {
            tracing::debug!(%peer, method = %req.method, path = %req.path, "http request");
            route(&req, &state).await
        }
        Ok(Err(err)) => Response::text(400, format!("bad request: {err}")),
        Err(_) => {
            tracing::debug!(%peer, "http request read timed out");
            Response::text(408, "request timeout")
        }
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason(response.status),
        response.content_type,
        response.body.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(response.body.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

async fn route<C: Clock>(req: &Request, state: &HttpState<C>) -> Response {
    match (req.method.as_str(), req.path.as_str()) {
        ("GET", "/") => Response::text(200, usage()),
        ("POST", "/start") => start(req, state),
        ("POST", "/register") => register(req, state),
        ("GET", "/status") => Response::json(200, status_json(&state.session.status())),
        ("POST", "/stop") => {
            let result = state.session.stop_session().await;
            Response::json(
                200,
                json!({
                    "success": true,
                    "winner": result.as_ref().map(winner_json).unwrap_or(Value::Null),
                }),
            )
        }
        ("GET", "/healthz") => Response::json(200, json!({"status": "ok"})),
        ("GET" | "POST", "/v1/loglevel") => {
            let applied = match (&state.log_handle, req.param("level")) {
                (Some(handle), Some(level)) => telemetry::set_log_level(handle, &level),
                _ => false,
            };
            let status = if applied { "ok" } else { "ignored" };
            Response::json(200, json!({ "status": status }))
        }
        (_, "/" | "/start" | "/register" | "/status" | "/stop" | "/healthz") => {
            Response::text(405, "method not allowed")
        }
        _ => Response::text(404, "not found"),
    }
}

fn start<C: Clock>(req: &Request, state: &HttpState<C>) -> Response {
    let time_scale = match req.param("time_scale").filter(|s| !s.trim().is_empty()) {
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(scale) => scale,
            Err(_) => {
                return Response::json(
                    400,
                    json!({"success": false, "message": format!("invalid time_scale {raw}")}),
                )
            }
        },
        None => state.default_time_scale,
    };
    match state.session.start_session(SessionParams::scaled(time_scale)) {
        Ok(()) => Response::json(
            200,
            json!({"success": true, "message": "Lottery started", "time_scale": time_scale}),
        ),
        Err(err) => {
            let code = match err {
                SessionError::AlreadyActive => 409,
                SessionError::InvalidTimeScale(_) | SessionError::InvalidDuration(_) => 400,
            };
            Response::json(code, json!({"success": false, "message": err.to_string()}))
        }
    }
}

fn register<C: Clock>(req: &Request, state: &HttpState<C>) -> Response {
    let username = req.param("username").unwrap_or_default();
    let outcome = state.session.register_participant(username.trim());
    Response::json(
        200,
        json!({
            "success": outcome.ok(),
            "message": outcome.message(),
            "total_users": outcome.total_users,
        }),
    )
}

/// JSON view of the session state.
pub fn status_json(status: &SessionStatus) -> Value {
    let remaining = status.time_remaining.as_secs_f64();
    let whole = status.time_remaining.as_secs();
    let list: Vec<Value> = status
        .participants
        .iter()
        .map(|r| {
            json!({
                "username": r.username,
                "registered_at": r.registered_at.format(TIMESTAMP_FORMAT).to_string(),
            })
        })
        .collect();
    json!({
        "state": status.phase,
        "registration_open": status.phase.accepting(),
        "extension_used": status.extension_used,
        "time_remaining": {
            "minutes": whole / 60,
            "seconds": whole % 60,
            "total_seconds": remaining,
        },
        "users": {
            "count": status.participant_count,
            "list": list,
        },
        "winner": status.result.as_ref().map(winner_json).unwrap_or(Value::Null),
        "time_scale": status.time_scale,
        "audit_failures": status.audit_failures,
    })
}

fn winner_json(result: &crate::lottery::DrawResult) -> Value {
    match &result.winner {
        Some(winner) => json!({
            "username": winner.username,
            "registered_at": winner.registered_at.format(TIMESTAMP_FORMAT).to_string(),
            "total_participants": result.total_participants,
        }),
        None => Value::Null,
    }
}

async fn read_request(socket: &mut TcpStream) -> Result<Request> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            bail!("connection closed before request headers");
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_REQUEST_BYTES {
            bail!("request headers too large");
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("GET").to_ascii_uppercase();
    let target = first.next().unwrap_or("/");
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        bail!("request body too large");
    }
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    Ok(Request {
        method,
        path: path.to_string(),
        query: query.to_string(),
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        409 => "Conflict",
        _ => "Internal Server Error",
    }
}

fn usage() -> &'static str {
    "lottery http endpoint\n\
     POST /start     time_scale=<float>\n\
     POST /register  username=<name>\n\
     GET  /status\n\
     POST /stop\n"
}

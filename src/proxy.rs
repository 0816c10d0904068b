// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! HTTP forward proxy that reports every exchange as a pair of events.

use crate::config::Config;
use crate::events::{self, EventSender, RequestObserved, ResponseObserved};
use crate::record::BodyCapture;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderMap, HeaderName};
use hyper::upgrade::Upgraded;
use hyper::{service::service_fn, Method, Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client as LegacyClient;
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as AutoConnBuilder;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

type ProxyBody = BoxBody<Bytes, Infallible>;
type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<ProxyBody>, Infallible>> + Send>>;

// RFC 7230 Section 6.1: Hop-by-hop headers must not be forwarded by proxies.
static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

// Convert hyper::Version into the textual HTTP-version token used in start/status lines.
fn format_http_version(v: hyper::Version) -> &'static str {
    match v {
        hyper::Version::HTTP_09 => "HTTP/0.9",
        hyper::Version::HTTP_10 => "HTTP/1.0",
        hyper::Version::HTTP_11 => "HTTP/1.1",
        hyper::Version::HTTP_2 => "HTTP/2.0",
        _ => "HTTP/1.1",
    }
}

struct Shared {
    client: LegacyClient<
        hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>,
        Full<Bytes>,
    >,
    events: EventSender,
    suppress_headers: Vec<HeaderName>,
}

impl Shared {
    fn new(events: EventSender, suppress_headers: Vec<HeaderName>) -> anyhow::Result<Self> {
        let https = HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client: LegacyClient<_, Full<Bytes>> =
            LegacyClient::builder(TokioExecutor::new()).build(https);
        Ok(Self {
            client,
            events,
            suppress_headers,
        })
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Listener lifecycle. `start` and `stop` are idempotent.
pub struct ProxyEngine {
    listen: SocketAddr,
    events: EventSender,
    suppress_headers: Vec<HeaderName>,
    running: Option<Running>,
}

impl ProxyEngine {
    pub fn new(listen: SocketAddr, events: EventSender, suppress_headers: Vec<HeaderName>) -> Self {
        Self {
            listen,
            events,
            suppress_headers,
            running: None,
        }
    }

    pub fn from_config(cfg: &Config, events: EventSender) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.listen_addr()?, events, cfg.suppressed_headers()?))
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    /// Bind and start accepting. When already running, returns the bound
    /// address without rebinding.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        if let Some(running) = &self.running {
            return Ok(running.local_addr);
        }

        let shared = Arc::new(Shared::new(
            self.events.clone(),
            self.suppress_headers.clone(),
        )?);
        let listener = TcpListener::bind(self.listen).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "listening");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, shared, shutdown_rx));
        self.running = Some(Running {
            local_addr,
            shutdown,
            task,
        });
        Ok(local_addr)
    }

    /// Stop accepting and wait for the accept loop to exit. Connections
    /// already being served are left to finish on their own.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            error!(error = %e, "accept loop ended abnormally");
        }
        info!(local_addr = %running.local_addr, "stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let executor = TokioExecutor::new();
    let server_builder = AutoConnBuilder::new(executor);

    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };
        trace!(%remote_addr, "accepted");

        let shared = shared.clone();
        let builder_clone = server_builder.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let shared = shared.clone();
                let fut: ServiceFuture = Box::pin(async move { handle_request(req, shared).await });
                fut
            });

            let io = TokioIo::new(stream);
            if let Err(e) = builder_clone
                .serve_connection_with_upgrades(io, service)
                .await
            {
                debug!(%remote_addr, %e, "connection error");
            }
        });
    }
}

fn text_response(status: StatusCode, text: impl Into<Bytes>) -> Response<ProxyBody> {
    let mut resp = Response::new(Full::new(text.into()).boxed());
    *resp.status_mut() = status;
    resp
}

async fn handle_request<B>(
    req: Request<B>,
    shared: Arc<Shared>,
) -> Result<Response<ProxyBody>, Infallible>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.method() == Method::CONNECT {
        let Some(authority) = req.uri().authority().cloned() else {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                "CONNECT target must be host:port",
            ));
        };
        let host = authority.host().to_string();
        let port = authority.port_u16().unwrap_or(443);

        tokio::task::spawn(async move {
            match hyper::upgrade::on(req).await {
                Ok(upgraded) => {
                    if let Err(e) = tunnel(upgraded, &host, port).await {
                        debug!(%host, port, error = %e, "tunnel closed with error");
                    }
                }
                Err(e) => error!("upgrade error for {}:{}: {}", host, port, e),
            }
        });
        return Ok(Response::new(Full::new(Bytes::new()).boxed()));
    }

    handle_http_logic(req, shared).await
}

/// Emit a response event for a proxy-generated failure and build the
/// matching client response.
fn fail(
    shared: &Shared,
    url: &str,
    status: StatusCode,
    body: BodyCapture,
    message: String,
) -> Response<ProxyBody> {
    shared.events.response(ResponseObserved {
        url: url.to_string(),
        status: status.as_u16(),
        headers_text: events::response_headers_text("HTTP/1.1", status, &HeaderMap::new()),
        content_type: None,
        body,
    });
    text_response(status, message)
}

async fn handle_http_logic<B>(
    req: Request<B>,
    shared: Arc<Shared>,
) -> Result<Response<ProxyBody>, Infallible>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();

    let uri = if req.uri().scheme().is_some() {
        req.uri().clone()
    } else {
        let host = req
            .headers()
            .get(hyper::header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let s = format!("http://{}{}", host, path);
        s.parse::<Uri>()
            .unwrap_or_else(|_| Uri::from_static("http://localhost/"))
    };
    let url = uri.to_string();

    let mut builder = Request::builder().method(req.method()).uri(uri.clone());
    for (name, value) in req.headers().iter() {
        if !shared.suppress_headers.contains(name) {
            builder = builder.header(name, value);
        }
    }

    let method = req.method().clone();
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    let request_headers_text = events::request_headers_text(
        method.as_str(),
        &path_and_query,
        format_http_version(req.version()),
        req.headers(),
    );
    let request_content_type = events::content_type(req.headers());

    let observe_request = |body: BodyCapture| {
        shared.events.request(RequestObserved {
            method: method.to_string(),
            url: url.clone(),
            headers_text: request_headers_text.clone(),
            content_type: request_content_type.clone(),
            body,
        });
    };

    let body_bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let boxed: Box<dyn std::error::Error + Send + Sync> = e.into();
            error!(%url, "failed to collect request body: {}", boxed);
            observe_request(BodyCapture::Failed(boxed.to_string()));
            let message = format!("request body collect error: {}", boxed);
            return Ok(fail(
                &shared,
                &url,
                StatusCode::INTERNAL_SERVER_ERROR,
                BodyCapture::Bytes(Bytes::from(message.clone())),
                message,
            ));
        }
    };

    observe_request(if body_bytes.is_empty() {
        BodyCapture::Empty
    } else {
        BodyCapture::Bytes(body_bytes.clone())
    });

    let upstream_req = match builder.body(Full::new(body_bytes)) {
        Ok(r) => r,
        Err(e) => {
            error!(%url, "failed to build upstream request: {}", e);
            let message = format!("request build error: {}", e);
            return Ok(fail(
                &shared,
                &url,
                StatusCode::INTERNAL_SERVER_ERROR,
                BodyCapture::Bytes(Bytes::from(message.clone())),
                message,
            ));
        }
    };

    let resp = match shared.client.request(upstream_req).await {
        Ok(r) => r,
        Err(e) => {
            warn!(%url, error = %e, "upstream request failed");
            let message = format!("upstream error: {}", e);
            return Ok(fail(
                &shared,
                &url,
                StatusCode::BAD_GATEWAY,
                BodyCapture::Bytes(Bytes::from(message.clone())),
                message,
            ));
        }
    };

    let status = resp.status();
    let headers = resp.headers().clone();
    let response_headers_text =
        events::response_headers_text(format_http_version(resp.version()), status, &headers);

    let resp_body_bytes = match resp.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let boxed: Box<dyn std::error::Error + Send + Sync> = e.into();
            warn!(%url, "upstream body collect error: {}", boxed);
            return Ok(fail(
                &shared,
                &url,
                StatusCode::INTERNAL_SERVER_ERROR,
                BodyCapture::Failed(boxed.to_string()),
                format!("upstream body collect error: {}", boxed),
            ));
        }
    };

    shared.events.response(ResponseObserved {
        url: url.clone(),
        status: status.as_u16(),
        headers_text: response_headers_text,
        content_type: events::content_type(&headers),
        body: if resp_body_bytes.is_empty() {
            BodyCapture::Empty
        } else {
            BodyCapture::Bytes(resp_body_bytes.clone())
        },
    });
    debug!(
        %url,
        status = status.as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        "forwarded"
    );

    let mut out = Response::new(Full::new(resp_body_bytes).boxed());
    *out.status_mut() = status;
    let connection_hop_headers = parse_connection_tokens(headers.get(hyper::header::CONNECTION));
    for (name, value) in headers.iter() {
        if is_hop_by_hop_header(name.as_str(), &connection_hop_headers) {
            continue;
        }
        out.headers_mut().append(name, value.clone());
    }

    Ok(out)
}

// Parse a Connection header value into a lowercased set of tokens
fn parse_connection_tokens(
    val: Option<&hyper::header::HeaderValue>,
) -> std::collections::HashSet<String> {
    let mut set = std::collections::HashSet::new();
    if let Some(conn_val) = val {
        if let Ok(conn_str) = conn_val.to_str() {
            for token in conn_str.split(',') {
                let trimmed = token.trim().to_ascii_lowercase();
                if !trimmed.is_empty() {
                    set.insert(trimmed);
                }
            }
        }
    }
    set
}

fn is_hop_by_hop_header(
    name: &str,
    connection_hop_headers: &std::collections::HashSet<String>,
) -> bool {
    connection_hop_headers.contains(name) || HOP_BY_HOP_HEADERS.contains(&name)
}

async fn tunnel(upgraded: Upgraded, host: &str, port: u16) -> std::io::Result<()> {
    tunnel_with_io(TokioIo::new(upgraded), host, port).await
}

async fn tunnel_with_io<S>(mut client_io: S, host: &str, port: u16) -> std::io::Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    trace!("tunnel: connecting to {}:{}", host, port);
    let mut server = tokio::net::TcpStream::connect((host, port)).await?;
    let (n1, n2) = tokio::io::copy_bidirectional(&mut client_io, &mut server).await?;
    trace!("tunnel: copy finished: {} bytes -> {} bytes", n1, n2);
    Ok(())
}

// SPDX-FileCopyrightText: 2026 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use network_watcher::events::{self, EventReceiver};
use network_watcher::proxy::ProxyEngine;
use network_watcher::record::TrafficRecord;
use network_watcher::state::CaptureStore;

// Start a ProxyEngine on an ephemeral port and wait until it accepts connections
pub async fn start_engine_and_wait() -> anyhow::Result<(ProxyEngine, SocketAddr, EventReceiver)> {
    let (tx, rx) = events::channel();
    let mut engine = ProxyEngine::new("127.0.0.1:0".parse()?, tx, Vec::new());
    let addr = engine.start().await?;

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if Instant::now() > deadline {
            return Err(anyhow::anyhow!("timeout waiting for proxy to start"));
        }
        if let Ok(mut s) = tokio::net::TcpStream::connect(addr).await {
            let _ = s.shutdown().await;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    Ok((engine, addr, rx))
}

// Send a raw HTTP/1.1 request through the proxy and read until the server closes
pub async fn send_raw(proxy_addr: SocketAddr, request: &str) -> anyhow::Result<String> {
    let mut stream = tokio::net::TcpStream::connect(proxy_addr).await?;
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .map_err(|_| anyhow::anyhow!("timeout reading proxy response"))??;
    Ok(String::from_utf8_lossy(&buf).to_string())
}

pub fn absolute_get(url: &str, host: &str) -> String {
    format!(
        "GET {url} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n",
        url = url,
        host = host
    )
}

// Wait until the store snapshot satisfies `done`
pub async fn wait_for_store<F>(store: &CaptureStore, done: F) -> anyhow::Result<Vec<Arc<TrafficRecord>>>
where
    F: Fn(&[Arc<TrafficRecord>]) -> bool,
{
    let mut changes = store.subscribe();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = store.snapshot();
        if done(&snapshot) {
            return Ok(snapshot);
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            anyhow::bail!("timeout waiting for store; have {} records", snapshot.len());
        }
        let _ = timeout(left, changes.changed()).await;
    }
}

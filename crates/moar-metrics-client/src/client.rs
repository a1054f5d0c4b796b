//! metricd export client.
//!
//! One `send` call produces at most one UDP datagram: no retry, no
//! acknowledgment, no batching across calls. Failures never reach the
//! caller of [`MetricdClient::send`]; they are logged, handed to the
//! optional error callback, and otherwise dropped. [`MetricdClient::try_send`]
//! runs the same path with the error returned.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use sysinfo::System;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use moar_metrics_core::{MetricStore, Report};

use crate::codec::{self, MAX_DATAGRAM_BYTES};
use crate::config::MetricdSection;
use crate::error::ExportError;

/// Called with every absorbed export failure.
pub type ErrorCallback = Arc<dyn Fn(&ExportError) + Send + Sync>;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8125;
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct MetricdClient {
    host: String,
    port: u16,
    hostname: String,
    app: Option<String>,
    timeout: Duration,
    on_error: Option<ErrorCallback>,
}

impl Default for MetricdClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricdClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("hostname", &self.hostname)
            .field("app", &self.app)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MetricdClient {
    /// Client for `127.0.0.1:8125`, reporting the detected local hostname.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            hostname: local_hostname(),
            app: None,
            timeout: DEFAULT_TIMEOUT,
            on_error: None,
        }
    }

    pub fn from_config(cfg: &MetricdSection) -> Self {
        let client = Self::new()
            .with_host(cfg.host.clone())
            .with_port(cfg.port)
            .with_app(cfg.app.clone())
            .with_timeout(Duration::from_millis(cfg.timeout_ms));
        match &cfg.hostname {
            Some(h) => client.with_hostname(h.clone()),
            None => client,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Host on whose behalf metrics are submitted (`meta.host`).
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Application submitting metrics (`meta.app`).
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Upper bound on resolve + bind + send.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_error_callback(
        mut self,
        cb: impl Fn(&ExportError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(cb));
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    /// `host:port` this client sends to.
    pub fn destination(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Encode `metrics` plus meta into the exact datagram bytes.
    pub fn encode<M: Serialize + ?Sized>(
        &self,
        metrics: &M,
        extra_meta: Option<&Value>,
    ) -> Result<Bytes, ExportError> {
        let mut meta = Map::new();
        meta.insert("host".into(), Value::from(self.hostname.as_str()));
        meta.insert("app".into(), Value::from(self.app.clone()));

        let payload = codec::build_payload(meta, metrics, extra_meta)?;
        let bytes = codec::encode(&payload)?;
        if bytes.len() > MAX_DATAGRAM_BYTES {
            return Err(ExportError::Oversized(bytes.len()));
        }
        Ok(bytes)
    }

    /// Send one datagram; report what went wrong, if anything.
    pub async fn try_send<M: Serialize + ?Sized>(
        &self,
        metrics: &M,
        extra_meta: Option<&Value>,
    ) -> Result<usize, ExportError> {
        let rt = Handle::try_current().map_err(|_| ExportError::NoRuntime)?;
        let datagram = self.encode(metrics, extra_meta)?;
        self.transmit(&rt, datagram).await
    }

    /// Best-effort send. Never fails; returns `self` for chaining.
    pub async fn send<M: Serialize + ?Sized>(
        &self,
        metrics: &M,
        extra_meta: Option<&Value>,
    ) -> &Self {
        if let Err(e) = self.try_send(metrics, extra_meta).await {
            self.absorb(&e);
        }
        self
    }

    /// Encode now, send on a spawned task.
    ///
    /// The datagram is built before returning, so later store mutations
    /// cannot leak into it. Returns `None` (after reporting the failure)
    /// when encoding fails or no tokio runtime is running.
    pub fn send_detached<M: Serialize + ?Sized>(
        &self,
        metrics: &M,
        extra_meta: Option<&Value>,
    ) -> Option<JoinHandle<()>> {
        let datagram = match self.encode(metrics, extra_meta) {
            Ok(d) => d,
            Err(e) => {
                self.absorb(&e);
                return None;
            }
        };
        let Ok(rt) = Handle::try_current() else {
            self.absorb(&ExportError::NoRuntime);
            return None;
        };

        let this = self.clone();
        let inner = rt.clone();
        Some(rt.spawn(async move {
            if let Err(e) = this.transmit(&inner, datagram).await {
                this.absorb(&e);
            }
        }))
    }

    /// Run the bounded send on its own task so that a runtime missing the
    /// IO or time driver fails that task, not the caller.
    async fn transmit(&self, rt: &Handle, datagram: Bytes) -> Result<usize, ExportError> {
        let dest = self.destination();
        let timeout = self.timeout;
        let task = rt.spawn(send_bounded(dest.clone(), datagram, timeout));
        let sent = task.await.map_err(|e| ExportError::Task(e.to_string()))??;
        tracing::debug!(dest = %dest, bytes = sent, "metrics datagram sent");
        Ok(sent)
    }

    fn absorb(&self, e: &ExportError) {
        tracing::error!(dest = %self.destination(), error = %e, "failure sending metrics");
        if let Some(cb) = &self.on_error {
            cb(e);
        }
    }
}

async fn send_bounded(dest: String, datagram: Bytes, timeout: Duration) -> Result<usize, ExportError> {
    let sent = tokio::time::timeout(timeout, send_datagram(&dest, &datagram))
        .await
        .map_err(|_| ExportError::Timeout(timeout))??;
    Ok(sent)
}

async fn send_datagram(dest: &str, datagram: &[u8]) -> std::io::Result<usize> {
    let addr = tokio::net::lookup_host(dest).await?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no address for {dest}"),
        )
    })?;
    let bind: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(bind).await?;
    socket.send_to(datagram, addr).await
}

fn local_hostname() -> String {
    System::host_name().unwrap_or_else(|| "localhost".into())
}

/// Report `store` and ship it to the daemon described by `cfg`.
///
/// Returns the report that was sent, whether or not the send succeeded.
pub async fn metricd(store: &MetricStore, cfg: &MetricdSection, stop_running: bool) -> Report {
    let report = store.report(stop_running);
    MetricdClient::from_config(cfg).send(&report, None).await;
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::task::{Context, Poll, Wake, Waker};

    use serde_json::json;

    use super::*;

    #[test]
    fn defaults() {
        let c = MetricdClient::new();
        assert_eq!(c.destination(), "127.0.0.1:8125");
        assert!(!c.hostname().is_empty());
        assert_eq!(c.app(), None);
    }

    #[test]
    fn ipv6_destination_is_bracketed() {
        let c = MetricdClient::new().with_host("::1").with_port(9000);
        assert_eq!(c.destination(), "[::1]:9000");
    }

    #[test]
    fn encode_includes_meta() {
        let c = MetricdClient::new().with_hostname("web01").with_app("kaptcha");
        let bytes = c.encode(&json!({"foo": "9|ms"}), Some(&json!({"merc": 1}))).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            v,
            json!({
                "meta": {"host": "web01", "app": "kaptcha", "merc": 1},
                "metrics": {"foo": "9|ms"}
            })
        );
    }

    #[test]
    fn unset_app_encodes_as_null() {
        let c = MetricdClient::new().with_hostname("h");
        let bytes = c.encode(&json!({}), None).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["meta"]["app"], Value::Null);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let c = MetricdClient::new();
        let big = json!({ "blob": "x".repeat(MAX_DATAGRAM_BYTES) });
        assert!(matches!(c.encode(&big, None), Err(ExportError::Oversized(_))));
    }

    fn poll_once<F: Future>(fut: F) -> Poll<F::Output> {
        struct Noop;
        impl Wake for Noop {
            fn wake(self: Arc<Self>) {}
        }
        let waker = Waker::from(Arc::new(Noop));
        let mut cx = Context::from_waker(&waker);
        let mut fut = std::pin::pin!(fut);
        fut.as_mut().poll(&mut cx)
    }

    fn collecting_client(errors: &Arc<Mutex<Vec<String>>>) -> MetricdClient {
        let sink = Arc::clone(errors);
        MetricdClient::new().with_error_callback(move |e| {
            let label = match e {
                ExportError::NoRuntime => "no_runtime".to_string(),
                ExportError::Task(_) => "task".to_string(),
                other => other.to_string(),
            };
            sink.lock().unwrap().push(label);
        })
    }

    #[test]
    fn send_outside_runtime_is_absorbed() {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let c = collecting_client(&errors);

        match poll_once(c.send(&json!({"a": "1|c"}), None)) {
            Poll::Ready(returned) => assert!(std::ptr::eq(returned, &c)),
            Poll::Pending => panic!("send must resolve immediately without a runtime"),
        }
        assert!(matches!(
            poll_once(c.try_send(&json!({"a": "1|c"}), None)),
            Poll::Ready(Err(ExportError::NoRuntime))
        ));
        assert_eq!(*errors.lock().unwrap(), vec!["no_runtime".to_string()]);
    }

    #[test]
    fn send_on_runtime_without_timers_is_absorbed() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let c = collecting_client(&errors);

        let returned = rt.block_on(c.send(&json!({"a": "1|c"}), None));
        assert!(std::ptr::eq(returned, &c));
        assert!(matches!(
            rt.block_on(c.try_send(&json!({"a": "1|c"}), None)),
            Err(ExportError::Task(_))
        ));
        assert_eq!(*errors.lock().unwrap(), vec!["task".to_string()]);
    }

    #[test]
    fn detached_send_without_runtime_reports_failure() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let c = MetricdClient::new().with_error_callback(move |e| {
            assert!(matches!(e, ExportError::NoRuntime));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(c.send_detached(&json!({"a": "1|c"}), None).is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}

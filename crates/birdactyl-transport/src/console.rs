//! Push-based server console streaming.
//!
//! The panel answers `stream_console` with a newline-delimited body that
//! stays open while the server runs. Each complete line is handed to the
//! `on_line` callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::PanelClient;
use crate::error::{TransportError, TransportResult};

type LineFn = Arc<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&TransportError) + Send + Sync>;
type CompleteFn = Arc<dyn Fn() + Send + Sync>;

impl PanelClient {
    /// Starts building a console stream for `server_id`.
    pub fn console(&self, server_id: impl Into<String>) -> ConsoleStreamBuilder {
        ConsoleStreamBuilder::new(self.clone(), server_id)
    }
}

/// Builder for a [`ConsoleStream`].
#[must_use]
pub struct ConsoleStreamBuilder {
    client: PanelClient,
    server_id: String,
    include_history: bool,
    history_lines: u32,
    on_line: Option<LineFn>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl ConsoleStreamBuilder {
    pub fn new(client: PanelClient, server_id: impl Into<String>) -> Self {
        Self {
            client,
            server_id: server_id.into(),
            include_history: true,
            history_lines: 100,
            on_line: None,
            on_error: None,
            on_complete: None,
        }
    }

    /// Replays recent output before live lines (default: true).
    pub fn include_history(mut self, include: bool) -> Self {
        self.include_history = include;
        self
    }

    /// How many history lines to replay (default: 100).
    pub fn history_lines(mut self, lines: u32) -> Self {
        self.history_lines = lines;
        self
    }

    pub fn on_line(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_line = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }

    /// Spawns the reader task. Must be called within a tokio runtime.
    pub fn start(self) -> ConsoleStream {
        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();

        let stream = ConsoleStream {
            server_id: self.server_id.clone(),
            running: Arc::clone(&running),
            cancel: cancel.clone(),
        };

        tokio::spawn(async move {
            let server_id = self.server_id.clone();
            let result = tokio::select! {
                result = self.pump(&running) => result,
                () = cancel.cancelled() => {
                    running.store(false, Ordering::SeqCst);
                    debug!(server_id = %server_id, "Console stream stopped locally");
                    return;
                }
            };
            running.store(false, Ordering::SeqCst);

            match result {
                Ok(()) => {
                    debug!(server_id = %server_id, "Console stream ended");
                    if let Some(f) = &self.on_complete {
                        f();
                    }
                }
                Err(e) => {
                    warn!(server_id = %server_id, error = %e, "Console stream failed");
                    if let Some(f) = &self.on_error {
                        f(&e);
                    }
                }
            }
        });

        stream
    }

    async fn pump(&self, running: &AtomicBool) -> TransportResult<()> {
        let resp = self
            .client
            .request("stream_console")
            .json(&json!({
                "server_id": self.server_id,
                "include_history": self.include_history,
                "history_lines": self.history_lines,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::status(status.as_u16(), body));
        }

        let mut body = resp.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            pending.extend_from_slice(&chunk?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                self.emit(running, &line[..line.len() - 1]);
            }
        }
        if !pending.is_empty() {
            self.emit(running, &pending);
        }
        Ok(())
    }

    fn emit(&self, running: &AtomicBool, raw: &[u8]) {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(f) = &self.on_line {
            let line = String::from_utf8_lossy(raw);
            f(line.trim_end_matches('\r'));
        }
    }
}

/// Handle to a running console stream.
#[derive(Debug)]
pub struct ConsoleStream {
    server_id: String,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ConsoleStream {
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops delivering lines and closes the connection.
    ///
    /// `on_complete` only fires when the panel ends the stream, not after a
    /// local stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{Router, http::StatusCode, response::IntoResponse, routing::post};
    use parking_lot::Mutex;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    async fn panel_with(app: Router) -> PanelClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        PanelClient::new(&format!("http://{addr}"), "guard", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_lines_then_complete() {
        let app = Router::new().route(
            "/plugin-api/stream_console",
            post(|| async { "[boot] starting\r\n[boot] ready\npartial" }),
        );
        let client = panel_with(app).await;

        let lines = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();
        let done_tx = Mutex::new(Some(done_tx));

        let stream = client
            .console("s1")
            .history_lines(10)
            .on_line({
                let lines = Arc::clone(&lines);
                move |line| lines.lock().push(line.to_string())
            })
            .on_complete(move || {
                if let Some(tx) = done_tx.lock().take() {
                    let _ = tx.send(());
                }
            })
            .start();

        tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(!stream.is_running());
        assert_eq!(
            *lines.lock(),
            vec!["[boot] starting", "[boot] ready", "partial"]
        );
    }

    #[tokio::test]
    async fn test_error_status_reaches_on_error() {
        let app = Router::new().route(
            "/plugin-api/stream_console",
            post(|| async { (StatusCode::FORBIDDEN, "denied").into_response() }),
        );
        let client = panel_with(app).await;

        let (err_tx, err_rx) = oneshot::channel();
        let err_tx = Mutex::new(Some(err_tx));
        let _stream = client
            .console("s1")
            .on_error(move |e| {
                if let Some(tx) = err_tx.lock().take() {
                    let _ = tx.send(e.to_string());
                }
            })
            .start();

        let message = tokio::time::timeout(Duration::from_secs(5), err_rx)
            .await
            .unwrap()
            .unwrap();
        assert!(message.contains("403"));
    }

    #[tokio::test]
    async fn test_local_stop_skips_on_complete() {
        let app = Router::new().route(
            "/plugin-api/stream_console",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                "late"
            }),
        );
        let client = panel_with(app).await;

        let completed = Arc::new(AtomicBool::new(false));
        let stream = client
            .console("s1")
            .on_complete({
                let completed = Arc::clone(&completed);
                move || completed.store(true, Ordering::SeqCst)
            })
            .start();
        assert!(stream.is_running());
        stream.stop();
        assert!(!stream.is_running());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!completed.load(Ordering::SeqCst));
    }
}

//! Training-end notifications.
//!
//! [`WebhookNotifier`] posts a short JSON summary to a webhook when a run
//! finishes. Delivery happens on a background thread; failures are logged
//! and never reach the run.

use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use hs_search::{Plugin, PluginResult};
use hs_types::{HsError, HsResult, MetricMap, SCORE_KEY};

const DEFAULT_MESSAGE: &str = "Hypersweep training finished";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub text: String,
    pub trials: usize,
    pub best_score: Option<f64>,
}

pub struct WebhookNotifier {
    url: reqwest::Url,
    message: String,
    trials: usize,
    best_score: Option<f64>,
    pending: Option<JoinHandle<bool>>,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> HsResult<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| HsError::Configuration(format!("invalid webhook url {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HsError::Configuration(format!(
                "webhook url must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            message: DEFAULT_MESSAGE.to_string(),
            trials: 0,
            best_score: None,
            pending: None,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn notification(&self) -> Notification {
        Notification {
            text: self.message.clone(),
            trials: self.trials,
            best_score: self.best_score,
        }
    }

    /// Block until the last notification has been attempted. `Some(true)`
    /// when the webhook accepted it, `None` when nothing was sent.
    pub fn wait(&mut self) -> Option<bool> {
        let handle = self.pending.take()?;
        Some(handle.join().unwrap_or(false))
    }
}

/// Post `body` to `url`; true on a 2xx answer.
fn deliver(url: reqwest::Url, body: &Notification) -> bool {
    let sent = reqwest::blocking::Client::builder()
        .timeout(SEND_TIMEOUT)
        .build()
        .and_then(|client| client.post(url).json(body).send())
        .and_then(|response| response.error_for_status());
    match sent {
        Ok(response) => {
            info!(status = %response.status(), "training notification sent");
            true
        }
        Err(e) => {
            warn!(error = %e, "training notification failed");
            false
        }
    }
}

impl Plugin for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook_notifier"
    }

    fn on_training_start(&mut self) -> PluginResult {
        self.trials = 0;
        self.best_score = None;
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &MetricMap) -> PluginResult {
        self.trials += 1;
        if let Some(&score) = metrics.get(SCORE_KEY) {
            if self.best_score.map_or(true, |best| score > best) {
                self.best_score = Some(score);
            }
        }
        Ok(())
    }

    fn on_training_end(&mut self) -> PluginResult {
        info!(trials = self.trials, "training complete, notifying webhook");
        let url = self.url.clone();
        let body = self.notification();
        match std::thread::Builder::new()
            .name("hs-notify".into())
            .spawn(move || deliver(url, &body))
        {
            Ok(handle) => self.pending = Some(handle),
            Err(e) => warn!(error = %e, "could not start notification thread"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Accept one request, answer 200 and hand back the request body.
    fn one_shot_server() -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            let body_start = loop {
                let n = stream.read(&mut buf).unwrap();
                raw.extend_from_slice(&buf[..n]);
                if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&raw[..body_start]).to_ascii_lowercase();
            let length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while raw.len() < body_start + length {
                let n = stream.read(&mut buf).unwrap();
                raw.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8(raw[body_start..body_start + length].to_vec()).unwrap()
        });
        (url, server)
    }

    fn scored(score: f64) -> MetricMap {
        MetricMap::from([(SCORE_KEY.to_string(), score)])
    }

    #[test]
    fn posts_summary_when_training_ends() {
        let (url, server) = one_shot_server();
        let mut notifier = WebhookNotifier::new(&url).unwrap().with_message("sweep done");

        notifier.on_training_start().unwrap();
        notifier.on_epoch_end(&scored(0.4)).unwrap();
        notifier.on_epoch_end(&scored(0.9)).unwrap();
        notifier.on_training_end().unwrap();

        assert_eq!(notifier.wait(), Some(true));
        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body["text"], "sweep done");
        assert_eq!(body["trials"], 2);
        assert_eq!(body["best_score"], 0.9);
    }

    #[test]
    fn unreachable_webhook_does_not_fail_the_hook() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        drop(listener);

        let mut notifier = WebhookNotifier::new(&url).unwrap();
        assert!(notifier.on_training_end().is_ok());
        assert_eq!(notifier.wait(), Some(false));
        assert_eq!(notifier.wait(), None);
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            WebhookNotifier::new("not a url"),
            Err(HsError::Configuration(_))
        ));
        assert!(matches!(
            WebhookNotifier::new("ftp://example.com/hook"),
            Err(HsError::Configuration(_))
        ));
    }
}

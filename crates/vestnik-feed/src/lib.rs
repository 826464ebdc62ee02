//! RSS feed poller.
//!
//! [`Poller::poll`] spawns one task per feed URL and hands back two bounded
//! channels: decoded news items and non-fatal errors. Item consumers apply
//! backpressure: a slow writer throttles polling through the full channel.

use std::time::Duration;

use quick_xml::Error as XmlError;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vestnik_core::Item;

mod dates;
mod parse;

pub use dates::decode_pub_date;

use parse::parse_channel;

/// Upper bound on a single fetch; the effective deadline is the smaller of
/// this and the polling interval.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "vestnik/0.1 (rss poller)";

/// Bounded capacity of the item channel. Small on purpose: storage
/// throughput is meant to govern polling speed.
const ITEM_CHANNEL_CAPACITY: usize = 64;

const ERROR_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("fetch feed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("fetch feed {url}: unexpected status {status}")]
    Status { url: String, status: u16 },
    #[error("parse feed: {0}")]
    Xml(#[from] XmlError),
    #[error("decode pubDate {value:?}: no known layout matched")]
    DateFormat { value: String },
}

impl FeedError {
    /// Deadline-exceeded and connection-abort errors are routine during
    /// shutdown and slow ticks; they are not worth operator attention.
    pub fn is_benign(&self) -> bool {
        match self {
            FeedError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Periodic RSS collector over a shared HTTP client.
pub struct Poller {
    client: Client,
}

impl Poller {
    /// Build a poller with its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the client cannot be constructed.
    pub fn new() -> Result<Self, FeedError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// Start polling `urls` every `interval`.
    ///
    /// Each URL gets its own task: per-URL fetches are serial (a tick is
    /// skipped while the previous one is still being worked), fetches of
    /// different URLs race freely. Every decoded item goes to the first
    /// returned channel in feed order; network/XML/date errors go to the
    /// second and polling continues.
    ///
    /// Cancelling `token` stops scheduling, abandons in-flight work at the
    /// next await point, and closes both channels once every task has exited.
    pub fn poll(
        &self,
        token: CancellationToken,
        interval: Duration,
        urls: &[String],
    ) -> (mpsc::Receiver<Item>, mpsc::Receiver<FeedError>) {
        let (items_tx, items_rx) = mpsc::channel(ITEM_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let fetch_timeout = FETCH_TIMEOUT.min(interval);

        for url in urls {
            let url = url.clone();
            let client = self.client.clone();
            let token = token.clone();
            let items_tx = items_tx.clone();
            let errors_tx = errors_tx.clone();

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => {
                            tokio::select! {
                                () = token.cancelled() => break,
                                () = poll_once(&client, &url, fetch_timeout, &items_tx, &errors_tx) => {}
                            }
                        }
                    }
                }
                tracing::debug!(url = %url, "feed poll task stopped");
            });
        }

        // The receivers observe closure exactly when the last task drops its
        // sender clones.
        (items_rx, errors_rx)
    }
}

/// One fetch-parse-emit round for a single URL.
async fn poll_once(
    client: &Client,
    url: &str,
    timeout: Duration,
    items_tx: &mpsc::Sender<Item>,
    errors_tx: &mpsc::Sender<FeedError>,
) {
    let parsed = match fetch_channel(client, url, timeout).await {
        Ok(parsed) => parsed,
        Err(e) => {
            let _ = errors_tx.send(e).await;
            return;
        }
    };

    for err in parsed.soft_errors {
        if errors_tx.send(err).await.is_err() {
            return;
        }
    }
    for item in parsed.items {
        if items_tx.send(item).await.is_err() {
            return;
        }
    }
}

async fn fetch_channel(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<parse::ParsedChannel, FeedError> {
    let resp = client.get(url).timeout(timeout).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.text().await?;
    parse_channel(&body)
}

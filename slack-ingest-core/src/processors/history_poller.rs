//! HistoryPoller processor.
//!
//! Recovers messages that never arrived as webhook deliveries by reading
//! `conversations.history` for one channel on a fixed interval. Everything
//! it finds goes through the same [`IngestGate`] as pushed events, so it
//! never emits anything twice and adds no filtering of its own.

use async_trait::async_trait;
use itertools::Itertools;
use kanau::processor::Processor;
use slack_ingest_sdk::client::{ClientError, HistoryQuery, SlackWebClient};
use slack_ingest_sdk::objects::{HistoryResponse, SlackEvent, event::MESSAGE};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::gate::{IngestGate, IngestInput, Origin};
use crate::state::SlackTs;

/// Anything that can answer a `conversations.history` query.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse, ClientError>;
}

#[async_trait]
impl HistorySource for SlackWebClient {
    async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse, ClientError> {
        self.conversations_history(query).await
    }
}

/// Counts from one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub fetched: usize,
    pub accepted: usize,
}

pub struct HistoryPoller<H> {
    source: H,
    gate: IngestGate,
    channel: String,
    interval: Duration,
    limit: u32,
    /// Lower bound used while the watermark is unset, so a fresh start does
    /// not replay the channel's backlog.
    floor: SlackTs,
}

impl<H: HistorySource> HistoryPoller<H> {
    pub fn new(
        source: H,
        gate: IngestGate,
        channel: impl Into<String>,
        interval: Duration,
        limit: u32,
        floor: SlackTs,
    ) -> Self {
        Self {
            source,
            gate,
            channel: channel.into(),
            interval,
            limit,
            floor,
        }
    }

    /// Fetch everything newer than the watermark and feed it to the gate.
    pub async fn poll_once(&self) -> Result<PollSummary, ClientError> {
        // Only the snapshot is taken under the gate lock; the HTTP calls
        // below run without it.
        let oldest = match self.gate.watermark().await.get() {
            Some(ts) => ts.as_str().to_string(),
            None => self.floor.as_str().to_string(),
        };

        // Pages run newest-first and the cursor walks backwards, so every
        // page has to be in hand before the gate moves the watermark.
        let mut messages = Vec::new();
        let mut cursor = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .source
                .history(&HistoryQuery {
                    channel: self.channel.clone(),
                    oldest: Some(oldest.clone()),
                    limit: self.limit,
                    cursor: cursor.take(),
                })
                .await?;
            pages += 1;
            cursor = page.next_cursor().map(str::to_owned);
            messages.extend(page.messages);
            if cursor.is_none() {
                break;
            }
        }
        debug!(
            channel = %self.channel,
            pages,
            fetched = messages.len(),
            "History pages fetched"
        );

        let mut summary = PollSummary {
            fetched: messages.len(),
            ..Default::default()
        };
        for event in self.prepare(messages) {
            let decision = self
                .gate
                .process(IngestInput {
                    event,
                    origin: Origin::History,
                })
                .await
                .unwrap_or_else(|never| match never {});
            if decision.is_accept() {
                summary.accepted += 1;
            }
        }
        Ok(summary)
    }

    /// Oldest first, with the channel and type filled in where Slack
    /// omits them. Messages without a parseable `ts` keep their relative
    /// order at the end and are left for the gate to reject.
    fn prepare(&self, messages: Vec<SlackEvent>) -> impl Iterator<Item = SlackEvent> + '_ {
        messages
            .into_iter()
            .map(|mut event| {
                if event.channel.as_deref().is_none_or(str::is_empty) {
                    event.channel = Some(self.channel.as_str().into());
                }
                if event.event_type.is_empty() {
                    event.event_type = MESSAGE.into();
                }
                event
            })
            .sorted_by_cached_key(|event| {
                let ts = event
                    .decision_ts()
                    .and_then(|raw| raw.parse::<SlackTs>().ok());
                (ts.is_none(), ts)
            })
    }

    /// Run the poll loop until shutdown.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            channel = %self.channel,
            interval_secs = self.interval.as_secs(),
            "HistoryPoller started"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("HistoryPoller received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.interval) => {
                    match self.poll_once().await {
                        Ok(summary) if summary.accepted > 0 => info!(
                            channel = %self.channel,
                            fetched = summary.fetched,
                            accepted = summary.accepted,
                            "Recovered messages from history"
                        ),
                        Ok(summary) => debug!(
                            channel = %self.channel,
                            fetched = summary.fetched,
                            "History poll found nothing new"
                        ),
                        Err(e) => warn!(
                            channel = %self.channel,
                            error = %e,
                            "History poll failed"
                        ),
                    }
                }
            }
        }

        info!("HistoryPoller shutdown complete");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::gate::tests::{MemorySink, gate_in, message};
    use slack_ingest_sdk::objects::ResponseMetadata;
    use std::sync::{Arc, Mutex};

    /// Returns canned pages and records every query it was asked.
    #[derive(Clone, Default)]
    struct CannedHistory {
        pages: Arc<Mutex<Vec<Result<HistoryResponse, ClientError>>>>,
        queries: Arc<Mutex<Vec<HistoryQuery>>>,
    }

    impl CannedHistory {
        fn with_pages(pages: Vec<Result<HistoryResponse, ClientError>>) -> Self {
            Self {
                pages: Arc::new(Mutex::new(pages)),
                ..Default::default()
            }
        }

        fn queries(&self) -> Vec<HistoryQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistorySource for CannedHistory {
        async fn history(&self, query: &HistoryQuery) -> Result<HistoryResponse, ClientError> {
            self.queries.lock().unwrap().push(query.clone());
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                return Ok(HistoryResponse {
                    ok: true,
                    ..Default::default()
                });
            }
            pages.remove(0)
        }
    }

    fn page(messages: Vec<SlackEvent>, next_cursor: Option<&str>) -> HistoryResponse {
        HistoryResponse {
            ok: true,
            error: None,
            messages,
            has_more: next_cursor.is_some(),
            response_metadata: next_cursor.map(|cursor| ResponseMetadata {
                next_cursor: cursor.to_string(),
            }),
        }
    }

    fn history_message(ts: &str) -> SlackEvent {
        let mut event = message(ts, None);
        event.channel = None;
        event
    }

    fn floor() -> SlackTs {
        "1.0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_poll_sorts_and_fills_channel() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);
        let history = CannedHistory::with_pages(vec![Ok(page(
            vec![history_message("30.0"), history_message("10.0"), history_message("20.0")],
            None,
        ))]);
        let poller = HistoryPoller::new(
            history.clone(),
            gate,
            "C9",
            Duration::from_secs(60),
            20,
            floor(),
        );

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary, PollSummary { fetched: 3, accepted: 3 });

        let emitted = sink.emitted();
        let stamps: Vec<_> = emitted.iter().map(|e| e.ts.as_str()).collect();
        assert_eq!(stamps, vec!["10.0", "20.0", "30.0"]);
        assert!(emitted.iter().all(|e| e.channel == "C9"));

        let queries = history.queries();
        assert_eq!(queries[0].oldest.as_deref(), Some("1.0"));
        assert_eq!(queries[0].channel, "C9");
    }

    #[tokio::test]
    async fn test_poll_uses_watermark_and_skips_seen() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);

        gate.process(IngestInput {
            event: message("100.1", Some("m1")),
            origin: Origin::Webhook,
        })
        .await
        .unwrap();

        let mut pushed_again = message("100.1", Some("m1"));
        pushed_again.channel = None;
        let history = CannedHistory::with_pages(vec![Ok(page(
            vec![history_message("100.2"), pushed_again],
            None,
        ))]);
        let poller =
            HistoryPoller::new(history.clone(), gate, "C1", Duration::from_secs(60), 20, floor());

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(history.queries()[0].oldest.as_deref(), Some("100.1"));
        assert_eq!(sink.emitted().len(), 2);
    }

    #[tokio::test]
    async fn test_poll_follows_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);
        let history = CannedHistory::with_pages(vec![
            Ok(page(vec![history_message("5.0")], Some("next"))),
            Ok(page(vec![history_message("4.0")], None)),
        ]);
        let poller =
            HistoryPoller::new(history.clone(), gate, "C1", Duration::from_secs(60), 1, floor());

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary.accepted, 2);
        let queries = history.queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].cursor, None);
        assert_eq!(queries[1].cursor.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_poll_reads_every_page_before_advancing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);
        let pages = (11..=16)
            .rev()
            .map(|n| {
                let ts = format!("{n}.0");
                let next = (n > 11).then(|| format!("before-{n}"));
                Ok(page(vec![history_message(&ts)], next.as_deref()))
            })
            .collect();
        let history = CannedHistory::with_pages(pages);
        let poller =
            HistoryPoller::new(history.clone(), gate, "C1", Duration::from_secs(60), 1, floor());

        let summary = poller.poll_once().await.unwrap();
        assert_eq!(summary, PollSummary { fetched: 6, accepted: 6 });
        assert_eq!(history.queries().len(), 6);

        let emitted = sink.emitted();
        let stamps: Vec<_> = emitted.iter().map(|e| e.ts.as_str()).collect();
        assert_eq!(stamps, vec!["11.0", "12.0", "13.0", "14.0", "15.0", "16.0"]);

        poller.poll_once().await.unwrap();
        assert_eq!(history.queries()[6].oldest.as_deref(), Some("16.0"));
        assert_eq!(sink.emitted().len(), 6);
    }

    #[tokio::test]
    async fn test_poll_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);
        let history = CannedHistory::with_pages(vec![Err(ClientError::Slack(
            "not_in_channel".to_string(),
        ))]);
        let poller = HistoryPoller::new(history, gate, "C1", Duration::from_secs(60), 20, floor());

        assert!(poller.poll_once().await.is_err());
        assert!(sink.emitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::default();
        let (gate, _) = gate_in(dir.path(), sink.clone(), None);
        let history = CannedHistory::with_pages(vec![
            Err(ClientError::Slack("ratelimited".to_string())),
            Ok(page(vec![history_message("8.0")], None)),
        ]);
        let poller =
            HistoryPoller::new(history.clone(), gate, "C1", Duration::from_secs(60), 20, floor());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(history.queries().len(), 1);
        assert!(sink.emitted().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(history.queries().len(), 2);
        assert_eq!(sink.emitted().len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}

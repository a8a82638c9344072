//! BroadcastLog: append-log queue over any store
//!
//! A topic is a bucket. Each published message becomes one object keyed
//! by the UTC second it was published in:
//!
//! ```text
//! <topic>/yyyy/MM/dd/HH/mm/ss/<epoch-ms>_<node-id><sequence>.<nanos>
//! ```
//!
//! Consumers read a whole time prefix (`2024/01/23/21/00/` for one minute,
//! `2024/01/` for a month) page by page with a caller-held offset. Every
//! page rescans the prefix from the start and skips `offset` entries, so a
//! page costs O(prefix size). Order within a prefix is whatever the
//! backend's listing returns.
//!
//! ## Non-features
//!
//! - No acknowledgement or deletion of consumed messages
//! - No coordination between competing consumers
//! - Key uniqueness across processes relies on distinct node ids; with the
//!   default node id it is assumed to hold only below roughly 50 concurrent
//!   writers per second bucket

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use stow_core::{Store, StowError, StowResult};
use tracing::{debug, info};

/// chrono format of the per-second directory prefix
pub const TIME_BUCKET_FORMAT: &str = "%Y/%m/%d/%H/%M/%S";

/// Node id used when none is configured
pub const DEFAULT_NODE_ID: &str = "-";

static PUBLISH_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// UTC second prefix of an epoch-millisecond timestamp
///
/// Out-of-range timestamps yield an empty prefix.
pub fn directory_prefix(epoch_ms: i64) -> String {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .map(|t| t.format(TIME_BUCKET_FORMAT).to_string())
        .unwrap_or_default()
}

/// One page of a consumed prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePage {
    /// `(key, text)` pairs in listing order
    pub data: Vec<(String, String)>,
    /// Offset to pass to the next `consume`, `None` once the prefix is exhausted
    pub read_offset: Option<u64>,
    /// True if the prefix had more entries after this page
    pub has_more_data: bool,
}

impl QueuePage {
    fn new(data: Vec<(String, String)>, read_offset: Option<u64>) -> Self {
        Self {
            data,
            has_more_data: read_offset.is_some(),
            read_offset,
        }
    }
}

/// Append-log queue
#[derive(Debug)]
pub struct BroadcastLog<S> {
    store: Arc<S>,
    node_id: String,
}

impl<S> Clone for BroadcastLog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            node_id: self.node_id.clone(),
        }
    }
}

impl<S: Store> BroadcastLog<S> {
    /// Queue over `store` with the default node id
    pub fn new(store: Arc<S>) -> Self {
        Self::with_node_id(store, DEFAULT_NODE_ID)
    }

    /// Queue over `store` tagging every key with `node_id`
    pub fn with_node_id(store: Arc<S>, node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        info!(target: "stow::broadcast", node_id = %node_id, "Broadcast log ready");
        Self { store, node_id }
    }

    /// Queue over `store` with a freshly generated node id
    pub fn with_random_node_id(store: Arc<S>) -> Self {
        Self::with_node_id(store, uuid::Uuid::new_v4().simple().to_string())
    }

    /// Node id embedded in published keys
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn suffix(&self) -> String {
        let seq = PUBLISH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let nanos = Utc::now().timestamp_subsec_nanos();
        format!("{}{}.{}", self.node_id, seq, nanos)
    }

    /// Publish `data` to `topic` and return the key written
    ///
    /// # Errors
    ///
    /// `WriteFailed` if the store did not accept the write (for instance
    /// because the topic bucket does not exist).
    pub fn publish(&self, topic: &str, data: &str) -> StowResult<String> {
        let now_ms = Utc::now().timestamp_millis();
        let key = format!(
            "{}/{}_{}",
            directory_prefix(now_ms),
            now_ms,
            self.suffix()
        );
        debug!(target: "stow::broadcast", topic, key = %key, "Publishing");
        if !self.store.write_text(topic, &key, data)? {
            return Err(StowError::write_failed(topic, key));
        }
        Ok(key)
    }

    /// Read up to `max_records` entries of `time_prefix`, skipping `skip_offset`
    pub fn consume(
        &self,
        topic: &str,
        time_prefix: &str,
        max_records: u64,
        skip_offset: u64,
    ) -> StowResult<QueuePage> {
        let mut entries = self
            .store
            .entries(topic, time_prefix)
            .skip(usize::try_from(skip_offset).unwrap_or(usize::MAX));
        let data: Vec<(String, String)> = entries
            .by_ref()
            .take(usize::try_from(max_records).unwrap_or(usize::MAX))
            .collect();
        let read_offset = if entries.next().is_some() {
            Some(skip_offset.saturating_add(max_records))
        } else {
            None
        };
        debug!(target: "stow::broadcast", topic, time_prefix, read = data.len(), ?read_offset, "Consumed page");
        Ok(QueuePage::new(data, read_offset))
    }

    /// Hand every entry of `prefix` to `consumer`, `page_size` at a time
    ///
    /// Returns the number of entries consumed.
    ///
    /// # Errors
    ///
    /// Stops at the first consumer error and returns it as
    /// `StowError::Consumer`; entries already handed over stay consumed.
    pub fn consume_prefix<F, E>(
        &self,
        topic: &str,
        prefix: &str,
        page_size: u64,
        mut consumer: F,
    ) -> StowResult<u64>
    where
        F: FnMut(&str, (String, String)) -> Result<(), E>,
        E: std::fmt::Display,
    {
        let page_size = page_size.max(1);
        let mut offset = 0;
        let mut total = 0u64;
        loop {
            let page = self.consume(topic, prefix, page_size, offset)?;
            for entry in page.data {
                consumer(topic, entry).map_err(|e| StowError::consumer(e.to_string()))?;
                total += 1;
            }
            match page.read_offset {
                Some(next) => offset = next,
                None => break,
            }
        }
        info!(target: "stow::broadcast", topic, prefix, total, "Prefix consumed");
        Ok(total)
    }
}

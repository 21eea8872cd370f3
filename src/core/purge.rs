//! Large message purges using the dual-path deletion policy.
//!
//! Messages younger than the bulk-delete horizon go out in one batched
//! platform call, submitted as a single `Background` queued task. Older
//! messages are deleted one by one in sub-chunks, with a short delay after
//! each item and a longer one between sub-chunks, all still funnelled
//! through the request queue.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PurgeConfig;
use crate::core::batch::{BatchExecutor, BatchProgress, BatchResult, LABEL_MESSAGE_DELETE};
use crate::core::executor::Spawn;
use crate::core::platform::{MessageQuery, MessageRef, Platform};
use crate::core::request_queue::RequestQueue;
use crate::core::DispatchError;
use crate::runtime::TokioSpawner;
use crate::util::serde::{MessageId, Priority};

/// Final bookkeeping of a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Messages handed to the purge.
    pub total: usize,
    /// Messages confirmed deleted, by either path.
    pub deleted_count: usize,
    /// Messages that could not be deleted.
    pub failed_count: usize,
    /// Deleted through the batched call.
    pub bulk_deleted: usize,
    /// Deleted one by one.
    pub individually_deleted: usize,
}

/// Channel purge service.
pub struct Purger<S = TokioSpawner> {
    platform: Arc<dyn Platform>,
    queue: RequestQueue<S>,
    batch: BatchExecutor,
    config: PurgeConfig,
}

impl<S> Purger<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a purger.
    pub fn new(platform: Arc<dyn Platform>, queue: RequestQueue<S>, batch: BatchExecutor, config: PurgeConfig) -> Self {
        Self {
            platform,
            queue,
            batch,
            config,
        }
    }

    /// Page backwards from `end_message_id`, collecting every older message.
    ///
    /// # Errors
    ///
    /// The first non-rate-limit fetch error.
    pub async fn collect_before(&self, channel_id: &str, end_message_id: &str) -> Result<Vec<MessageRef>, DispatchError> {
        let page_size = self.config.fetch_page_size;
        let mut collected = Vec::new();
        let mut cursor: MessageId = end_message_id.to_string();
        loop {
            let platform = Arc::clone(&self.platform);
            let channel = channel_id.to_string();
            let before = cursor.clone();
            let page = self
                .queue
                .enqueue(
                    move || {
                        let (p, channel, query) =
                            (Arc::clone(&platform), channel.clone(), MessageQuery::before(before.clone(), page_size));
                        async move { p.fetch_messages(&channel, query).await }
                    },
                    Priority::Background,
                )
                .await?;
            let fetched = page.len();
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.id.clone();
            collected.extend(page);
            debug!(channel_id, fetched, collected = collected.len(), "history page fetched");
            if fetched < page_size {
                break;
            }
        }
        Ok(collected)
    }

    /// Delete `messages` from `channel_id`.
    ///
    /// Per-item failures are counted, never raised. `on_progress` receives
    /// progress over the individual path.
    pub async fn purge<P>(&self, channel_id: &str, messages: Vec<MessageRef>, now_ms: u64, mut on_progress: P) -> PurgeReport
    where
        P: FnMut(BatchProgress),
    {
        let cutoff = now_ms.saturating_sub(self.config.bulk_delete_horizon_ms);
        let (young, mut old): (Vec<_>, Vec<_>) = messages.into_iter().partition(|m| m.created_at_ms > cutoff);
        let mut report = PurgeReport {
            total: young.len() + old.len(),
            ..PurgeReport::default()
        };
        info!(channel_id, young = young.len(), old = old.len(), "purge started");

        if !young.is_empty() {
            match self.bulk_delete(channel_id, &young).await {
                Ok(deleted) => {
                    let deleted = deleted.min(young.len());
                    report.bulk_deleted = deleted;
                    report.failed_count += young.len() - deleted;
                }
                Err(err) => {
                    warn!(channel_id, error = %err, count = young.len(), "bulk delete failed, deleting individually");
                    old.extend(young);
                }
            }
        }

        let total_individual = old.len();
        let mut offset = 0;
        let chunk_size = self.config.chunk_size.max(1);
        let mut chunks = old.chunks(chunk_size).map(<[MessageRef]>::to_vec).peekable();
        while let Some(chunk) = chunks.next() {
            let len = chunk.len();
            let results = self
                .batch
                .process_batch(
                    chunk,
                    |message| self.delete_one(channel_id, message),
                    |p| {
                        on_progress(BatchProgress {
                            done: offset + p.done,
                            total: total_individual,
                        });
                    },
                    LABEL_MESSAGE_DELETE,
                )
                .await;
            for result in &results {
                match result {
                    BatchResult::Completed(()) => report.individually_deleted += 1,
                    BatchResult::Failed(_) => report.failed_count += 1,
                }
            }
            offset += len;
            if chunks.peek().is_some() {
                tokio::time::sleep(Duration::from_millis(self.config.chunk_delay_ms)).await;
            }
        }

        report.deleted_count = report.bulk_deleted + report.individually_deleted;
        info!(
            channel_id,
            deleted = report.deleted_count,
            failed = report.failed_count,
            bulk = report.bulk_deleted,
            individual = report.individually_deleted,
            "purge finished"
        );
        report
    }

    /// Collect everything before `end_message_id` and purge it.
    ///
    /// # Errors
    ///
    /// History fetch errors; deletion failures are only counted.
    pub async fn purge_before<P>(
        &self,
        channel_id: &str,
        end_message_id: &str,
        now_ms: u64,
        on_progress: P,
    ) -> Result<PurgeReport, DispatchError>
    where
        P: FnMut(BatchProgress),
    {
        let messages = self.collect_before(channel_id, end_message_id).await?;
        Ok(self.purge(channel_id, messages, now_ms, on_progress).await)
    }

    async fn bulk_delete(&self, channel_id: &str, messages: &[MessageRef]) -> Result<usize, DispatchError> {
        let platform = Arc::clone(&self.platform);
        let channel = channel_id.to_string();
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id.clone()).collect();
        self.queue
            .enqueue(
                move || {
                    let (p, channel, ids) = (Arc::clone(&platform), channel.clone(), ids.clone());
                    async move { p.bulk_delete_messages(&channel, &ids).await }
                },
                Priority::Background,
            )
            .await
    }

    async fn delete_one(&self, channel_id: &str, message: MessageRef) -> Result<(), DispatchError> {
        let platform = Arc::clone(&self.platform);
        let channel = channel_id.to_string();
        let id = message.id;
        let outcome = self
            .queue
            .enqueue(
                move || {
                    let (p, channel, id) = (Arc::clone(&platform), channel.clone(), id.clone());
                    async move { p.delete_message(&channel, &id).await }
                },
                Priority::Background,
            )
            .await;
        tokio::time::sleep(Duration::from_millis(self.config.item_delay_ms)).await;
        outcome
    }
}

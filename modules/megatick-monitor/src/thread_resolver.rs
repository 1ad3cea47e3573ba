// Thread resolver: walks reply/quote ancestry one parent at a time.
//
// Single consumer of the thread queue. Each fetched parent may enqueue its
// own parents back onto the same queue, so a chain is walked as a fixed
// point over the queue rather than by recursion. Every upstream fetch is
// preceded by the configured rate-limit wait.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use megatick_common::{NodeRef, ParentRef, RelType};

use crate::citation::CitationJob;
use crate::dispatcher::enqueue_followups;
use crate::extract::{extract, persist_extracted};
use crate::queue::WorkQueue;
use crate::stats::{bump, PipelineStats};
use crate::traits::{AncestorLookup, GraphSink};

/// A persisted child whose parent still has to be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTask {
    pub child: NodeRef,
    pub parent: ParentRef,
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Parent fetched, persisted and linked.
    Resolved,
    /// Parent was already in the graph; linked without a fetch.
    AlreadyKnown,
    /// Parent is gone upstream or came back unusable.
    NotFound,
    /// Transient or persistence failure. Not retried.
    Failed,
}

pub struct ThreadResolver {
    sink: Arc<dyn GraphSink>,
    lookup: Arc<dyn AncestorLookup>,
    threads: Arc<WorkQueue<ThreadTask>>,
    citations: Arc<WorkQueue<CitationJob>>,
    interval: Duration,
    stats: Arc<PipelineStats>,
}

impl ThreadResolver {
    pub fn new(
        sink: Arc<dyn GraphSink>,
        lookup: Arc<dyn AncestorLookup>,
        threads: Arc<WorkQueue<ThreadTask>>,
        citations: Arc<WorkQueue<CitationJob>>,
        interval: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            sink,
            lookup,
            threads,
            citations,
            interval,
            stats,
        }
    }

    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Thread resolver started");
        while let Some(task) = self.threads.pop().await {
            self.handle(&task).await;
        }
        info!("Thread resolver stopped");
    }

    /// Resolve one task, queueing the parent's own ancestry on success.
    pub async fn handle(&self, task: &ThreadTask) -> Resolution {
        let resolution = match self.resolve(task).await {
            Ok(r) => r,
            Err(e) => {
                warn!(child = %task.child, parent = %task.parent, error = %e, "Ancestor resolution failed");
                Resolution::Failed
            }
        };

        let counter = match resolution {
            Resolution::Resolved => &self.stats.ancestors_resolved,
            Resolution::AlreadyKnown => &self.stats.ancestors_known,
            Resolution::NotFound => &self.stats.ancestors_not_found,
            Resolution::Failed => &self.stats.ancestors_failed,
        };
        bump(counter);
        resolution
    }

    async fn resolve(&self, task: &ThreadTask) -> Result<Resolution> {
        let target = task.parent.node_ref();

        // Known parents were walked when first persisted.
        if let Some(existing) = self.sink.find_node(target.label, &target.key).await? {
            self.sink
                .upsert_edge(RelType::LinksTo, &task.child, &existing)
                .await?;
            debug!(child = %task.child, parent = %existing, "Linked to known ancestor");
            return Ok(Resolution::AlreadyKnown);
        }

        tokio::time::sleep(self.interval).await;

        let item = match self.lookup.lookup(&task.parent).await? {
            Some(item) => item,
            None => {
                info!(child = %task.child, parent = %task.parent, "Ancestor not found upstream");
                return Ok(Resolution::NotFound);
            }
        };

        let extracted = match extract(&item) {
            Ok(extracted) => extracted,
            Err(e) => {
                info!(parent = %task.parent, reason = %e, "Ancestor not usable");
                return Ok(Resolution::NotFound);
            }
        };

        let persisted = persist_extracted(self.sink.as_ref(), extracted).await?;
        self.sink
            .upsert_edge(RelType::LinksTo, &task.child, &persisted.content)
            .await?;
        debug!(child = %task.child, parent = %persisted.content, "Ancestor resolved");

        enqueue_followups(&persisted, &self.citations, &self.threads, &self.stats);
        Ok(Resolution::Resolved)
    }
}

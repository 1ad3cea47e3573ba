use std::sync::atomic::{AtomicU64, Ordering};

use crate::notability::RejectReason;

/// Live pipeline counters, shared by every worker.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub received: AtomicU64,
    pub accepted: AtomicU64,
    pub rejected_language: AtomicU64,
    pub rejected_reshare: AtomicU64,
    pub rejected_author: AtomicU64,
    pub rejected_keyword: AtomicU64,
    pub persisted: AtomicU64,
    pub persist_failed: AtomicU64,
    pub citation_jobs: AtomicU64,
    pub pages_created: AtomicU64,
    pub pages_reused: AtomicU64,
    pub urls_skipped: AtomicU64,
    pub fetch_failed: AtomicU64,
    pub citations_linked: AtomicU64,
    pub ancestors_resolved: AtomicU64,
    pub ancestors_known: AtomicU64,
    pub ancestors_not_found: AtomicU64,
    pub ancestors_failed: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineStats {
    pub fn record_reject(&self, reason: RejectReason) {
        let counter = match reason {
            RejectReason::Language => &self.rejected_language,
            RejectReason::Reshare => &self.rejected_reshare,
            RejectReason::BlacklistedAuthor => &self.rejected_author,
            RejectReason::BlacklistedKeyword => &self.rejected_keyword,
        };
        bump(counter);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            received: get(&self.received),
            accepted: get(&self.accepted),
            rejected_language: get(&self.rejected_language),
            rejected_reshare: get(&self.rejected_reshare),
            rejected_author: get(&self.rejected_author),
            rejected_keyword: get(&self.rejected_keyword),
            persisted: get(&self.persisted),
            persist_failed: get(&self.persist_failed),
            citation_jobs: get(&self.citation_jobs),
            pages_created: get(&self.pages_created),
            pages_reused: get(&self.pages_reused),
            urls_skipped: get(&self.urls_skipped),
            fetch_failed: get(&self.fetch_failed),
            citations_linked: get(&self.citations_linked),
            ancestors_resolved: get(&self.ancestors_resolved),
            ancestors_known: get(&self.ancestors_known),
            ancestors_not_found: get(&self.ancestors_not_found),
            ancestors_failed: get(&self.ancestors_failed),
            queue_drops: 0,
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub rejected_language: u64,
    pub rejected_reshare: u64,
    pub rejected_author: u64,
    pub rejected_keyword: u64,
    pub persisted: u64,
    pub persist_failed: u64,
    pub citation_jobs: u64,
    pub pages_created: u64,
    pub pages_reused: u64,
    pub urls_skipped: u64,
    pub fetch_failed: u64,
    pub citations_linked: u64,
    pub ancestors_resolved: u64,
    pub ancestors_known: u64,
    pub ancestors_not_found: u64,
    pub ancestors_failed: u64,
    /// Items evicted or refused by bounded queues.
    pub queue_drops: u64,
}

impl StatsSnapshot {
    pub fn rejected(&self) -> u64 {
        self.rejected_language + self.rejected_reshare + self.rejected_author + self.rejected_keyword
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Megatick Pipeline ===")?;
        writeln!(f, "Items received:     {}", self.received)?;
        writeln!(f, "Items accepted:     {}", self.accepted)?;
        writeln!(f, "Items rejected:     {}", self.rejected())?;
        if self.rejected() > 0 {
            writeln!(f, "  language:  {}", self.rejected_language)?;
            writeln!(f, "  reshare:   {}", self.rejected_reshare)?;
            writeln!(f, "  author:    {}", self.rejected_author)?;
            writeln!(f, "  keyword:   {}", self.rejected_keyword)?;
        }
        writeln!(f, "Items persisted:    {}", self.persisted)?;
        writeln!(f, "Persist failures:   {}", self.persist_failed)?;
        writeln!(f, "\nCitations:")?;
        writeln!(f, "  Jobs:          {}", self.citation_jobs)?;
        writeln!(f, "  Pages created: {}", self.pages_created)?;
        writeln!(f, "  Pages reused:  {}", self.pages_reused)?;
        writeln!(f, "  Urls skipped:  {}", self.urls_skipped)?;
        writeln!(f, "  Fetch failed:  {}", self.fetch_failed)?;
        writeln!(f, "  Links:         {}", self.citations_linked)?;
        writeln!(f, "\nAncestry:")?;
        writeln!(f, "  Resolved:      {}", self.ancestors_resolved)?;
        writeln!(f, "  Already known: {}", self.ancestors_known)?;
        writeln!(f, "  Not found:     {}", self.ancestors_not_found)?;
        writeln!(f, "  Failed:        {}", self.ancestors_failed)?;
        if self.queue_drops > 0 {
            writeln!(f, "\nQueue drops:        {}", self.queue_drops)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_are_counted_per_reason() {
        let stats = PipelineStats::default();
        stats.record_reject(RejectReason::Language);
        stats.record_reject(RejectReason::Language);
        stats.record_reject(RejectReason::BlacklistedKeyword);
        let snap = stats.snapshot();
        assert_eq!(snap.rejected_language, 2);
        assert_eq!(snap.rejected_keyword, 1);
        assert_eq!(snap.rejected(), 3);
        assert!(snap.to_string().contains("Items rejected:     3"));
    }
}

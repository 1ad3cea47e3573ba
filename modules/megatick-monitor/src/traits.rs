// Trait seams between the pipeline workers and the outside world.
//
// GraphSink: persistence (Neo4j writer, flat-file sink, in-memory mock).
// PageFetcher: cited page retrieval.
// AncestorLookup: single-id parent fetch for the thread resolver.
// FeedReader: RSS/Atom item links for the feed monitor.
//
// Workers only see these traits, so every pipeline test runs against the
// mocks in `testing.rs`: no network, no database.

use anyhow::{bail, Result};
use async_trait::async_trait;

use megatick_archive::{
    AncestorClient, FetchedPage, HttpFeedReader, HttpPageFetcher, LookupError,
};
use megatick_common::{EdgeRef, GraphNode, NodeLabel, NodeRef, ParentRef, RelType, StreamItem};
use megatick_graph::GraphWriter;

// ---------------------------------------------------------------------------
// GraphSink
// ---------------------------------------------------------------------------

/// Idempotent persistence. Safe to call concurrently for the same key.
#[async_trait]
pub trait GraphSink: Send + Sync {
    /// Create or update a node by identity key. Content and authors are last
    /// write wins; an existing WebPage is left untouched.
    async fn upsert_node(&self, node: &GraphNode) -> Result<NodeRef>;

    /// Create a relationship between two existing nodes. Repeats are no-ops.
    async fn upsert_edge(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> Result<EdgeRef>;

    async fn find_node(&self, label: NodeLabel, key: &str) -> Result<Option<NodeRef>>;
}

#[async_trait]
impl GraphSink for GraphWriter {
    async fn upsert_node(&self, node: &GraphNode) -> Result<NodeRef> {
        Ok(GraphWriter::upsert_node(self, node).await?)
    }

    async fn upsert_edge(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> Result<EdgeRef> {
        if !self.merge_edge(rel, from, to).await? {
            bail!("cannot link {from} -[{rel}]-> {to}: endpoint missing");
        }
        Ok(EdgeRef {
            rel,
            from: from.clone(),
            to: to.clone(),
        })
    }

    async fn find_node(&self, label: NodeLabel, key: &str) -> Result<Option<NodeRef>> {
        Ok(GraphWriter::find_node(self, label, key).await?)
    }
}

// ---------------------------------------------------------------------------
// PageFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a cited page. Any error means "skip this url".
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        Ok(HttpPageFetcher::fetch(self, url).await?)
    }
}

// ---------------------------------------------------------------------------
// AncestorLookup
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AncestorLookup: Send + Sync {
    /// `Ok(None)` when the parent is gone upstream (deleted, suspended,
    /// never existed). Errors are transient failures.
    async fn lookup(&self, parent: &ParentRef) -> Result<Option<StreamItem>>;
}

#[async_trait]
impl AncestorLookup for AncestorClient {
    async fn lookup(&self, parent: &ParentRef) -> Result<Option<StreamItem>> {
        match AncestorClient::lookup(self, parent).await {
            Ok(item) => Ok(Some(item)),
            Err(LookupError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FeedReader
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedReader: Send + Sync {
    async fn links(&self, feed_url: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl FeedReader for HttpFeedReader {
    async fn links(&self, feed_url: &str) -> Result<Vec<String>> {
        Ok(HttpFeedReader::links(self, feed_url).await?)
    }
}

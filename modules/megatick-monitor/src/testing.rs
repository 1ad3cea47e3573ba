// Test mocks for the pipeline.
//
// One mock per trait seam:
// - MockSink (GraphSink): stateful in-memory graph
// - MockPageFetcher (PageFetcher): HashMap-based url → page/status
// - MockLookup (AncestorLookup): HashMap-based parent → item, with call log
// - MockFeedReader (FeedReader): HashMap-based feed → links
//
// Plus fixtures for building stream items.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use megatick_archive::{ArchiveError, FetchedPage};
use megatick_common::{
    CommentPayload, EdgeRef, Entities, GraphNode, NodeLabel, NodeRef, ParentRef, RedditorPayload,
    RelType, StreamItem, SubmissionPayload, TweetPayload, TwitterUserPayload, UrlEntity,
};

use crate::traits::{AncestorLookup, FeedReader, GraphSink, PageFetcher};

// ---------------------------------------------------------------------------
// MockSink
// ---------------------------------------------------------------------------

/// Stateful in-memory graph. Thread-safe via interior Mutex.
/// Same contract as the real sinks: content last-write-wins, pages written
/// once, edges only between existing nodes and never duplicated.
#[derive(Default)]
pub struct MockSink {
    inner: Mutex<MockSinkInner>,
    failing_keys: HashSet<String>,
}

#[derive(Default)]
struct MockSinkInner {
    nodes: HashMap<NodeRef, GraphNode>,
    edges: HashSet<EdgeRef>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `upsert_node` fail for any node with this identity key.
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing_keys.insert(key.to_string());
        self
    }

    pub fn node(&self, node_ref: &NodeRef) -> Option<GraphNode> {
        self.inner.lock().unwrap().nodes.get(node_ref).cloned()
    }

    pub fn count(&self, label: NodeLabel) -> usize {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .keys()
            .filter(|r| r.label == label)
            .count()
    }

    pub fn node_count(&self) -> usize {
        self.inner.lock().unwrap().nodes.len()
    }

    pub fn edges(&self) -> Vec<EdgeRef> {
        self.inner.lock().unwrap().edges.iter().cloned().collect()
    }

    pub fn edge_count(&self, rel: RelType) -> usize {
        self.inner
            .lock()
            .unwrap()
            .edges
            .iter()
            .filter(|e| e.rel == rel)
            .count()
    }

    pub fn has_edge(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> bool {
        self.inner.lock().unwrap().edges.contains(&EdgeRef {
            rel,
            from: from.clone(),
            to: to.clone(),
        })
    }
}

#[async_trait]
impl GraphSink for MockSink {
    async fn upsert_node(&self, node: &GraphNode) -> Result<NodeRef> {
        let node_ref = node.node_ref();
        if self.failing_keys.contains(&node_ref.key) {
            bail!("mock failure writing {node_ref}");
        }
        let mut inner = self.inner.lock().unwrap();
        if node_ref.label == NodeLabel::WebPage && inner.nodes.contains_key(&node_ref) {
            return Ok(node_ref);
        }
        inner.nodes.insert(node_ref.clone(), node.clone());
        Ok(node_ref)
    }

    async fn upsert_edge(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> Result<EdgeRef> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.nodes.contains_key(from) || !inner.nodes.contains_key(to) {
            bail!("cannot link {from} -[{rel}]-> {to}: endpoint missing");
        }
        let edge = EdgeRef {
            rel,
            from: from.clone(),
            to: to.clone(),
        };
        inner.edges.insert(edge.clone());
        Ok(edge)
    }

    async fn find_node(&self, label: NodeLabel, key: &str) -> Result<Option<NodeRef>> {
        let node_ref = NodeRef::new(label, key);
        let inner = self.inner.lock().unwrap();
        Ok(inner.nodes.contains_key(&node_ref).then_some(node_ref))
    }
}

// ---------------------------------------------------------------------------
// MockPageFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Unregistered urls answer 404.
/// Builder pattern: `.on_page()`, `.on_status()`, `.with_delay()`.
#[derive(Default)]
pub struct MockPageFetcher {
    pages: HashMap<String, std::result::Result<Option<String>, u16>>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(Some(content.to_string())));
        self
    }

    /// A 200 with nothing readable in it.
    pub fn on_empty_page(mut self, url: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(None));
        self
    }

    pub fn on_status(mut self, url: &str, status: u16) -> Self {
        self.pages.insert(url.to_string(), Err(status));
        self
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.calls.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.pages.get(url) {
            Some(Ok(content)) => Ok(FetchedPage {
                url: url.to_string(),
                final_url: url.to_string(),
                content: content.clone(),
                fetched_at: Utc::now(),
            }),
            Some(Err(status)) => Err(ArchiveError::Status {
                url: url.to_string(),
                status: *status,
            }
            .into()),
            None => Err(ArchiveError::Status {
                url: url.to_string(),
                status: 404,
            }
            .into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockLookup
// ---------------------------------------------------------------------------

/// HashMap-based ancestor lookup. Unregistered parents are not found.
/// Records when each lookup happened so tests can check pacing.
#[derive(Default)]
pub struct MockLookup {
    items: HashMap<ParentRef, StreamItem>,
    failing: HashSet<ParentRef>,
    calls: Mutex<Vec<(ParentRef, Instant)>>,
}

impl MockLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_parent(mut self, parent: ParentRef, item: StreamItem) -> Self {
        self.items.insert(parent, item);
        self
    }

    /// Answer with a transient error.
    pub fn failing(mut self, parent: ParentRef) -> Self {
        self.failing.insert(parent);
        self
    }

    pub fn calls(&self) -> Vec<ParentRef> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl AncestorLookup for MockLookup {
    async fn lookup(&self, parent: &ParentRef) -> Result<Option<StreamItem>> {
        self.calls
            .lock()
            .unwrap()
            .push((parent.clone(), Instant::now()));
        if self.failing.contains(parent) {
            bail!("mock transient failure for {parent}");
        }
        Ok(self.items.get(parent).cloned())
    }
}

// ---------------------------------------------------------------------------
// MockFeedReader
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockFeedReader {
    feeds: HashMap<String, Vec<String>>,
}

impl MockFeedReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_feed(mut self, feed_url: &str, links: &[&str]) -> Self {
        self.feeds
            .insert(feed_url.to_string(), links.iter().map(|l| l.to_string()).collect());
        self
    }
}

#[async_trait]
impl FeedReader for MockFeedReader {
    async fn links(&self, feed_url: &str) -> Result<Vec<String>> {
        match self.feeds.get(feed_url) {
            Some(links) => Ok(links.clone()),
            None => bail!("no such feed: {feed_url}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Builder for tweet stream items.
pub struct TweetFixture {
    payload: TweetPayload,
}

impl TweetFixture {
    /// An English tweet by `user`.
    pub fn new(id: u64, user: u64) -> Self {
        Self {
            payload: TweetPayload {
                id,
                text: Some(format!("tweet {id}")),
                lang: Some("en".to_string()),
                user: Some(TwitterUserPayload {
                    id: Some(user),
                    screen_name: Some(format!("user{user}")),
                    name: Some(format!("User {user}")),
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.payload.text = Some(text.to_string());
        self
    }

    pub fn lang(mut self, lang: &str) -> Self {
        self.payload.lang = Some(lang.to_string());
        self
    }

    pub fn favorites(mut self, count: i64) -> Self {
        self.payload.favorite_count = Some(count);
        self
    }

    pub fn url(mut self, expanded: &str) -> Self {
        self.payload
            .entities
            .get_or_insert_with(Entities::default)
            .urls
            .push(UrlEntity {
                url: Some("https://t.co/abc".to_string()),
                expanded_url: Some(expanded.to_string()),
            });
        self
    }

    pub fn reply_to(mut self, id: u64) -> Self {
        self.payload.in_reply_to_status_id = Some(id);
        self
    }

    pub fn quoting(mut self, id: u64) -> Self {
        self.payload.quoted_status_id = Some(id);
        self
    }

    pub fn payload(self) -> TweetPayload {
        self.payload
    }

    pub fn build(self) -> StreamItem {
        StreamItem::Tweet(self.payload)
    }
}

pub fn redditor(id: &str) -> RedditorPayload {
    RedditorPayload {
        id: Some(id.to_string()),
        name: Some(format!("name_{id}")),
        ..Default::default()
    }
}

/// A submission; a `Some` url makes it a link post.
pub fn submission(id: &str, author: &str, url: Option<&str>) -> StreamItem {
    let permalink = format!("/r/netsec/comments/{id}/post/");
    StreamItem::Submission(SubmissionPayload {
        id: id.to_string(),
        title: format!("Submission {id}"),
        selftext: String::new(),
        url: Some(
            url.map(str::to_string)
                .unwrap_or_else(|| format!("https://www.reddit.com{permalink}")),
        ),
        permalink,
        subreddit: "netsec".to_string(),
        score: 1,
        upvote_ratio: 1.0,
        author: Some(redditor(author)),
        ..Default::default()
    })
}

/// A comment under `parent` (a `t1_`/`t3_` fullname).
pub fn comment(id: &str, author: &str, parent: &str) -> StreamItem {
    StreamItem::Comment(CommentPayload {
        id: id.to_string(),
        body: format!("comment {id}"),
        permalink: format!("/r/netsec/comments/x/post/{id}/"),
        subreddit: "netsec".to_string(),
        score: 1,
        parent_id: Some(parent.to_string()),
        author: Some(redditor(author)),
        ..Default::default()
    })
}

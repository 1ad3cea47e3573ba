//! Pipeline scenarios against the in-memory mocks: no network, no database.
//!
//! Workers are driven step by step through their `handle` methods so every
//! assertion sees a fully drained pipeline.

use std::sync::Arc;
use std::time::Duration;

use megatick_archive::UrlFilter;
use megatick_common::{
    Blacklists, Content, GraphNode, NodeLabel, NodeRef, ParentRef, RelType, StreamItem,
};
use megatick_monitor::testing::{
    comment, submission, MockLookup, MockPageFetcher, MockSink, TweetFixture,
};
use megatick_monitor::{
    CitationJob, CitationScraper, Dispatcher, GraphSink, PipelineStats, RejectReason,
    Resolution, RuleFilter, ThreadResolver, ThreadTask, Verdict, WorkQueue,
};

struct Harness {
    sink: Arc<MockSink>,
    fetcher: Arc<MockPageFetcher>,
    lookup: Arc<MockLookup>,
    citations: Arc<WorkQueue<CitationJob>>,
    threads: Arc<WorkQueue<ThreadTask>>,
    stats: Arc<PipelineStats>,
    dispatcher: Dispatcher,
    resolver: ThreadResolver,
    scraper: Arc<CitationScraper>,
}

impl Harness {
    fn new(sink: MockSink, fetcher: MockPageFetcher, lookup: MockLookup) -> Self {
        Self::with_interval(sink, fetcher, lookup, Duration::ZERO)
    }

    fn with_interval(
        sink: MockSink,
        fetcher: MockPageFetcher,
        lookup: MockLookup,
        interval: Duration,
    ) -> Self {
        let sink = Arc::new(sink);
        let fetcher = Arc::new(fetcher);
        let lookup = Arc::new(lookup);
        let citations = Arc::new(WorkQueue::unbounded("citations"));
        let threads = Arc::new(WorkQueue::unbounded("threads"));
        let stats = Arc::new(PipelineStats::default());

        let blacklists = Blacklists {
            keywords: Some(vec!["giveaway".to_string()]),
            ..Default::default()
        };
        let filter = RuleFilter::new(Some(&["en".to_string()]), &blacklists).unwrap();

        let dyn_sink: Arc<dyn GraphSink> = sink.clone();
        let dispatcher = Dispatcher::new(
            dyn_sink.clone(),
            Arc::new(filter),
            citations.clone(),
            threads.clone(),
            stats.clone(),
        );
        let resolver = ThreadResolver::new(
            dyn_sink.clone(),
            lookup.clone(),
            threads.clone(),
            citations.clone(),
            interval,
            stats.clone(),
        );
        let scraper = Arc::new(CitationScraper::new(
            dyn_sink,
            fetcher.clone(),
            UrlFilter::default(),
            stats.clone(),
        ));

        Self {
            sink,
            fetcher,
            lookup,
            citations,
            threads,
            stats,
            dispatcher,
            resolver,
            scraper,
        }
    }

    /// Run ancestry and citation work until both queues are empty.
    async fn drain(&self) -> Vec<Resolution> {
        let mut resolutions = Vec::new();
        loop {
            if let Some(task) = self.threads.try_pop() {
                resolutions.push(self.resolver.handle(&task).await);
            } else if let Some(job) = self.citations.try_pop() {
                self.scraper.handle(&job).await;
            } else {
                return resolutions;
            }
        }
    }
}

fn tweet_ref(id: u64) -> NodeRef {
    NodeRef::new(NodeLabel::Tweet, id.to_string())
}

// ---------------------------------------------------------------------------
// Filtering and idempotent persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_items_create_nothing() {
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), MockLookup::new());

    let items = [
        TweetFixture::new(1, 10).lang("fr").url("https://a.example/").build(),
        TweetFixture::new(2, 10).text("RT @someone: hello").build(),
        TweetFixture::new(3, 10).text("Crypto GIVEAWAY").reply_to(1).build(),
    ];
    let mut verdicts = Vec::new();
    for item in &items {
        verdicts.push(h.dispatcher.handle(item).await);
    }
    h.drain().await;

    assert_eq!(
        verdicts,
        vec![
            Verdict::Reject(RejectReason::Language),
            Verdict::Reject(RejectReason::Reshare),
            Verdict::Reject(RejectReason::BlacklistedKeyword),
        ]
    );
    assert_eq!(h.sink.node_count(), 0);
    assert!(h.sink.edges().is_empty());
    assert!(h.fetcher.calls().is_empty());
    assert!(h.lookup.calls().is_empty());
    assert_eq!(h.stats.snapshot().rejected(), 3);
}

#[tokio::test]
async fn same_content_twice_keeps_later_snapshot() {
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), MockLookup::new());

    h.dispatcher
        .handle(&TweetFixture::new(1, 10).text("draft").favorites(1).build())
        .await;
    h.dispatcher
        .handle(&TweetFixture::new(1, 10).text("draft").favorites(9).build())
        .await;

    assert_eq!(h.sink.count(NodeLabel::Tweet), 1);
    assert_eq!(h.sink.count(NodeLabel::TwitterUser), 1);
    assert_eq!(h.sink.edge_count(RelType::Authored), 1);
    match h.sink.node(&tweet_ref(1)) {
        Some(GraphNode::Content(Content::Tweet(t))) => assert_eq!(t.favorite_count, 9),
        other => panic!("expected tweet node, got {other:?}"),
    }
}

#[tokio::test]
async fn persistence_failure_drops_item_and_continues() {
    let h = Harness::new(
        MockSink::new().failing_on("5"),
        MockPageFetcher::new(),
        MockLookup::new(),
    );

    h.dispatcher
        .handle(&TweetFixture::new(5, 10).url("https://a.example/").build())
        .await;
    h.dispatcher.handle(&TweetFixture::new(6, 10).build()).await;

    let stats = h.stats.snapshot();
    assert_eq!(stats.persist_failed, 1);
    assert_eq!(stats.persisted, 1);
    assert!(h.sink.node(&tweet_ref(6)).is_some());
    assert!(h.citations.is_empty());
}

// ---------------------------------------------------------------------------
// Citations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_jobs_for_same_url_create_one_page() {
    let url = "https://news.example/story";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new()
            .on_page(url, "story text")
            .with_delay(Duration::from_millis(20)),
        MockLookup::new(),
    );

    h.dispatcher.handle(&TweetFixture::new(1, 10).build()).await;
    h.dispatcher.handle(&TweetFixture::new(2, 11).build()).await;

    let first = CitationJob::cited_by(tweet_ref(1), vec![url.to_string()]);
    let second = CitationJob::cited_by(tweet_ref(2), vec![url.to_string()]);
    let (a, b) = tokio::join!(h.scraper.handle(&first), h.scraper.handle(&second));

    let page = NodeRef::web_page(url);
    assert_eq!(a, vec![page.clone()]);
    assert_eq!(b, vec![page.clone()]);
    assert_eq!(h.sink.count(NodeLabel::WebPage), 1);
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(1), &page));
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(2), &page));
}

#[tokio::test]
async fn same_url_cited_twice_is_fetched_once() {
    let url = "https://news.example/story";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_page(url, "story text"),
        MockLookup::new(),
    );

    h.dispatcher.handle(&TweetFixture::new(1, 10).url(url).build()).await;
    h.drain().await;
    h.dispatcher.handle(&TweetFixture::new(2, 11).url(url).build()).await;
    h.drain().await;

    let page = NodeRef::web_page(url);
    assert_eq!(h.sink.count(NodeLabel::WebPage), 1);
    assert_eq!(h.sink.edge_count(RelType::LinksTo), 2);
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(1), &page));
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(2), &page));
    assert_eq!(h.fetcher.fetch_count(url), 1);
    assert_eq!(h.stats.snapshot().pages_reused, 1);
}

#[tokio::test]
async fn pdf_is_never_fetched() {
    let url = "https://papers.example/report.pdf";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_page(url, "binary"),
        MockLookup::new(),
    );

    h.dispatcher.handle(&TweetFixture::new(1, 10).url(url).build()).await;
    h.drain().await;

    assert!(h.fetcher.calls().is_empty());
    assert_eq!(h.sink.count(NodeLabel::WebPage), 0);
    assert_eq!(h.sink.edge_count(RelType::LinksTo), 0);
    assert_eq!(h.stats.snapshot().urls_skipped, 1);
}

#[tokio::test]
async fn failed_fetch_creates_no_page() {
    let ok = "https://ok.example/";
    let gone = "https://gone.example/";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_page(ok, "fine").on_status(gone, 500),
        MockLookup::new(),
    );

    h.dispatcher
        .handle(&TweetFixture::new(1, 10).url(gone).url(ok).build())
        .await;
    h.drain().await;

    assert_eq!(h.sink.count(NodeLabel::WebPage), 1);
    assert!(h.sink.node(&NodeRef::web_page(gone)).is_none());
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(1), &NodeRef::web_page(ok)));
    assert_eq!(h.fetcher.fetch_count(gone), 1);
}

#[tokio::test]
async fn empty_page_is_stored_without_content() {
    let url = "https://blank.example/";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_empty_page(url),
        MockLookup::new(),
    );

    h.dispatcher.handle(&TweetFixture::new(1, 10).url(url).build()).await;
    h.drain().await;

    match h.sink.node(&NodeRef::web_page(url)) {
        Some(GraphNode::WebPage(p)) => assert!(p.content.is_none()),
        other => panic!("expected web page, got {other:?}"),
    }
}

#[tokio::test]
async fn repeated_url_in_one_job_is_processed_once() {
    let url = "https://news.example/story";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_page(url, "text"),
        MockLookup::new(),
    );
    h.dispatcher.handle(&TweetFixture::new(1, 10).build()).await;

    let pages = h
        .scraper
        .handle(&CitationJob::cited_by(
            tweet_ref(1),
            vec![url.to_string(), url.to_string()],
        ))
        .await;

    assert_eq!(pages.len(), 1);
    assert_eq!(h.fetcher.fetch_count(url), 1);
}

// ---------------------------------------------------------------------------
// Ancestry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chain_resolves_to_a_fixed_point() {
    let lookup = MockLookup::new()
        .on_parent(ParentRef::Tweet(2), TweetFixture::new(2, 20).reply_to(1).build())
        .on_parent(ParentRef::Tweet(1), TweetFixture::new(1, 30).build());
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), lookup);

    h.dispatcher
        .handle(&TweetFixture::new(3, 10).reply_to(2).build())
        .await;
    let resolutions = h.drain().await;

    assert_eq!(resolutions, vec![Resolution::Resolved, Resolution::Resolved]);
    assert_eq!(h.sink.count(NodeLabel::Tweet), 3);
    assert_eq!(h.sink.count(NodeLabel::TwitterUser), 3);
    assert_eq!(h.sink.edge_count(RelType::LinksTo), 2);
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(3), &tweet_ref(2)));
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(2), &tweet_ref(1)));
    assert_eq!(h.threads.high_water(), 1);
    assert_eq!(h.lookup.calls(), vec![ParentRef::Tweet(2), ParentRef::Tweet(1)]);
}

#[tokio::test]
async fn quote_and_reply_are_both_resolved() {
    let lookup = MockLookup::new()
        .on_parent(ParentRef::Tweet(7), TweetFixture::new(7, 20).build())
        .on_parent(ParentRef::Tweet(8), TweetFixture::new(8, 30).build());
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), lookup);

    h.dispatcher
        .handle(&TweetFixture::new(9, 10).quoting(7).reply_to(8).build())
        .await;
    h.drain().await;

    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(9), &tweet_ref(7)));
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(9), &tweet_ref(8)));
}

#[tokio::test]
async fn known_parent_is_linked_without_lookup() {
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), MockLookup::new());

    h.dispatcher.handle(&TweetFixture::new(1, 10).build()).await;
    h.dispatcher
        .handle(&TweetFixture::new(2, 11).reply_to(1).build())
        .await;
    let resolutions = h.drain().await;

    assert_eq!(resolutions, vec![Resolution::AlreadyKnown]);
    assert!(h.lookup.calls().is_empty());
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet_ref(2), &tweet_ref(1)));
}

#[tokio::test]
async fn unusable_and_failing_parents_are_dropped() {
    let mut orphan = TweetFixture::new(4, 0).payload();
    orphan.user = None;
    let lookup = MockLookup::new()
        .on_parent(ParentRef::Tweet(4), StreamItem::Tweet(orphan))
        .failing(ParentRef::Tweet(5));
    let h = Harness::new(MockSink::new(), MockPageFetcher::new(), lookup);

    h.dispatcher
        .handle(&TweetFixture::new(1, 10).reply_to(4).build())
        .await;
    h.dispatcher
        .handle(&TweetFixture::new(2, 10).reply_to(5).build())
        .await;
    let resolutions = h.drain().await;

    assert_eq!(resolutions, vec![Resolution::NotFound, Resolution::Failed]);
    assert_eq!(h.sink.count(NodeLabel::Tweet), 2);
    assert_eq!(h.sink.edge_count(RelType::LinksTo), 0);
    // no retry
    assert_eq!(h.lookup.calls().len(), 2);
}

#[tokio::test]
async fn lookups_are_paced_by_the_interval() {
    let interval = Duration::from_millis(30);
    let lookup = MockLookup::new()
        .on_parent(ParentRef::Tweet(2), TweetFixture::new(2, 20).reply_to(1).build())
        .on_parent(ParentRef::Tweet(1), TweetFixture::new(1, 30).build());
    let h = Harness::with_interval(MockSink::new(), MockPageFetcher::new(), lookup, interval);

    h.dispatcher
        .handle(&TweetFixture::new(3, 10).reply_to(2).build())
        .await;
    h.drain().await;

    let times = h.lookup.call_times();
    assert_eq!(times.len(), 2);
    assert!(times[1].duration_since(times[0]) >= interval);
}

#[tokio::test]
async fn reddit_comment_chain_reaches_link_submission() {
    let lookup = MockLookup::new()
        .on_parent(
            ParentRef::RedditComment("c1".to_string()),
            comment("c1", "u1", "t3_s1"),
        )
        .on_parent(
            ParentRef::RedditSubmission("s1".to_string()),
            submission("s1", "u2", Some("https://news.example/breach")),
        );
    let fetcher = MockPageFetcher::new().on_page("https://news.example/breach", "details");
    let h = Harness::new(MockSink::new(), fetcher, lookup);

    h.dispatcher.handle(&comment("c2", "u3", "t1_c1")).await;
    h.drain().await;

    let c2 = NodeRef::new(NodeLabel::RedditComment, "c2");
    let c1 = NodeRef::new(NodeLabel::RedditComment, "c1");
    let s1 = NodeRef::new(NodeLabel::RedditSubmission, "s1");
    let page = NodeRef::web_page("https://news.example/breach");

    assert!(h.sink.has_edge(RelType::LinksTo, &c2, &c1));
    assert!(h.sink.has_edge(RelType::LinksTo, &c1, &s1));
    assert!(h.sink.has_edge(RelType::LinksTo, &s1, &page));
    assert_eq!(h.sink.count(NodeLabel::Redditor), 3);
}

// ---------------------------------------------------------------------------
// Scenario: a reply citing one url, whose parent was deleted
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reply_to_deleted_parent_still_archives_its_citation() {
    let url = "https://news.example/article";
    let h = Harness::new(
        MockSink::new(),
        MockPageFetcher::new().on_page(url, "article body"),
        MockLookup::new(),
    );

    h.dispatcher
        .handle(&TweetFixture::new(10, 100).url(url).reply_to(99).build())
        .await;
    let resolutions = h.drain().await;

    let tweet = tweet_ref(10);
    let author = NodeRef::new(NodeLabel::TwitterUser, "100");
    let page = NodeRef::web_page(url);

    assert_eq!(resolutions, vec![Resolution::NotFound]);
    assert_eq!(h.lookup.calls(), vec![ParentRef::Tweet(99)]);
    assert!(h.sink.has_edge(RelType::Authored, &author, &tweet));
    assert!(h.sink.has_edge(RelType::LinksTo, &tweet, &page));
    assert_eq!(h.sink.edge_count(RelType::LinksTo), 1);
    assert_eq!(h.sink.count(NodeLabel::Tweet), 1);
    assert_eq!(h.sink.count(NodeLabel::WebPage), 1);
}

pub mod citation;
pub mod dispatcher;
pub mod extract;
pub mod feeds;
pub mod monitor;
pub mod notability;
pub mod queue;
pub mod stats;
pub mod store;
pub mod stream;
pub mod thread_resolver;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use citation::{CitationJob, CitationScraper};
pub use dispatcher::Dispatcher;
pub use extract::{persist_item, Persisted};
pub use feeds::FeedMonitor;
pub use monitor::{FeedSource, Monitor, MonitorDeps, StatsHandle};
pub use notability::{Notability, RejectReason, RuleFilter, Verdict};
pub use queue::{PushOutcome, WorkQueue};
pub use stats::{PipelineStats, StatsSnapshot};
pub use store::{build_sink, JsonlSink};
pub use stream::{ndjson_events, run_stream, Control, StreamEnd, StreamError, StreamListener};
pub use thread_resolver::{Resolution, ThreadResolver, ThreadTask};
pub use traits::{AncestorLookup, FeedReader, GraphSink, PageFetcher};

pub mod jsonl;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use megatick_common::Backend;
use megatick_graph::{migrate::migrate, GraphClient, GraphWriter};

use crate::traits::GraphSink;

pub use jsonl::JsonlSink;

/// Build the configured sink. Neo4j gets its schema migrated first.
pub async fn build_sink(backend: &Backend) -> Result<Arc<dyn GraphSink>> {
    match backend {
        Backend::Neo4j {
            uri,
            user,
            password,
        } => {
            let client = GraphClient::connect(uri, user, password).await?;
            migrate(&client).await?;
            info!(uri = uri.as_str(), "Neo4j sink ready");
            Ok(Arc::new(GraphWriter::new(client)))
        }
        Backend::Jsonl { path } => {
            let sink = JsonlSink::open(path).await?;
            info!(path = %path.display(), "Flat-file sink ready");
            Ok(Arc::new(sink))
        }
    }
}

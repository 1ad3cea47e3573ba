// Flat-file sink: one JSON line per write, appended.
//
// Replaying the file in order reproduces the graph: later node lines
// overwrite earlier ones for the same key. An in-memory index of keys and
// edges serves `find_node` and edge dedup; it is rebuilt from the file on
// open.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};

use megatick_common::{EdgeRef, GraphNode, NodeLabel, NodeRef, RelType};

use crate::traits::GraphSink;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Record {
    Node { node: GraphNode },
    Edge { edge: EdgeRef },
}

pub struct JsonlSink {
    path: PathBuf,
    inner: Mutex<Inner>,
}

struct Inner {
    file: tokio::fs::File,
    nodes: HashSet<NodeRef>,
    edges: HashSet<EdgeRef>,
}

impl JsonlSink {
    pub async fn open(path: &Path) -> Result<Self> {
        let mut nodes = HashSet::new();
        let mut edges = HashSet::new();

        let mut torn_tail = false;
        match tokio::fs::read_to_string(path).await {
            Ok(existing) => {
                torn_tail = !existing.is_empty() && !existing.ends_with('\n');
                for (n, line) in existing.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Record>(line) {
                        Ok(Record::Node { node }) => {
                            nodes.insert(node.node_ref());
                        }
                        Ok(Record::Edge { edge }) => {
                            edges.insert(edge);
                        }
                        Err(e) => warn!(line = n + 1, error = %e, "Skipping unreadable record"),
                    }
                }
                info!(path = %path.display(), nodes = nodes.len(), edges = edges.len(), "Loaded existing records");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        // A crash mid-write leaves a partial last line. Terminate it so the
        // next record starts on its own line.
        if torn_tail {
            warn!(path = %path.display(), "Terminating torn last record");
            file.write_all(b"\n").await?;
            file.flush().await?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { file, nodes, edges }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Inner {
    async fn append(&mut self, record: &Record) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl GraphSink for JsonlSink {
    async fn upsert_node(&self, node: &GraphNode) -> Result<NodeRef> {
        let node_ref = node.node_ref();
        let mut inner = self.inner.lock().await;

        // Pages are written once.
        if node_ref.label == NodeLabel::WebPage && inner.nodes.contains(&node_ref) {
            return Ok(node_ref);
        }

        inner.append(&Record::Node { node: node.clone() }).await?;
        inner.nodes.insert(node_ref.clone());
        Ok(node_ref)
    }

    async fn upsert_edge(&self, rel: RelType, from: &NodeRef, to: &NodeRef) -> Result<EdgeRef> {
        let edge = EdgeRef {
            rel,
            from: from.clone(),
            to: to.clone(),
        };
        let mut inner = self.inner.lock().await;

        if inner.edges.contains(&edge) {
            return Ok(edge);
        }
        if !inner.nodes.contains(from) || !inner.nodes.contains(to) {
            bail!("cannot link {from} -[{rel}]-> {to}: endpoint missing");
        }

        inner.append(&Record::Edge { edge: edge.clone() }).await?;
        inner.edges.insert(edge.clone());
        Ok(edge)
    }

    async fn find_node(&self, label: NodeLabel, key: &str) -> Result<Option<NodeRef>> {
        let node_ref = NodeRef::new(label, key);
        let inner = self.inner.lock().await;
        Ok(inner.nodes.contains(&node_ref).then_some(node_ref))
    }
}

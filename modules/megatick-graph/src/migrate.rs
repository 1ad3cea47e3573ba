use neo4rs::query;
use tracing::{info, warn};

use megatick_common::NodeLabel;

use crate::GraphClient;

/// Run idempotent schema migrations.
///
/// One uniqueness constraint per identity field. Besides indexing the MERGE
/// lookups, the constraint is what makes concurrent MERGEs of the same key
/// collapse into a single node.
pub async fn migrate(client: &GraphClient) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    for label in NodeLabel::ALL {
        let cypher = format!(
            "CREATE CONSTRAINT {name} IF NOT EXISTS FOR (n:{label}) REQUIRE n.{field} IS UNIQUE",
            name = constraint_name(label),
            label = label.as_str(),
            field = label.key_field(),
        );
        run_ignoring_exists(g, &cypher).await?;
    }
    info!("Identity uniqueness constraints created");

    Ok(())
}

fn constraint_name(label: NodeLabel) -> String {
    format!("{}_{}_unique", label.as_str().to_lowercase(), label.key_field())
}

async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!("Already exists (skipped): {}", cypher.chars().take(80).collect::<String>());
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}

#![cfg(feature = "test-utils")]

// Persistence contract tests against a real Neo4j.
//
// Requirements: Docker (for Neo4j via testcontainers)
//
// Run with: cargo test -p megatick-graph --features test-utils --test writer_test

use chrono::Utc;
use futures::future::join_all;

use megatick_common::{
    Author, Content, GraphNode, NodeLabel, NodeRef, RelType, Tweet, TwitterUser, WebPage,
};
use megatick_graph::{query, GraphClient, GraphWriter};

async fn count(client: &GraphClient, cypher: &str) -> i64 {
    let mut stream = client.inner().execute(query(cypher)).await.expect("query");
    let row = stream.next().await.expect("row").expect("one row");
    row.get::<i64>("c").expect("count column")
}

fn tweet(id: &str, text: &str, favorites: i64) -> Tweet {
    Tweet {
        tweet_id: id.to_string(),
        text: text.to_string(),
        created_at: Some(Utc::now()),
        lang: Some("en".to_string()),
        geo: None,
        coordinates: None,
        source: None,
        favorite_count: favorites,
        retweet_count: 0,
        favorited: false,
        retweeted: false,
    }
}

fn user(id: &str) -> TwitterUser {
    TwitterUser {
        user_id: id.to_string(),
        handle: format!("user{id}"),
        user_name: "Someone".to_string(),
        created_at: None,
        url: None,
        description: None,
        location: None,
        lang: None,
        verified: false,
        geo_enabled: false,
        default_profile: true,
        default_profile_image: false,
        followers_count: 10,
        friends_count: 5,
        favourites_count: 0,
        statuses_count: 100,
        listed_count: 0,
    }
}

#[tokio::test]
async fn content_upsert_is_last_write_wins() {
    let (_container, client) = megatick_graph::testutil::neo4j_container().await;
    let writer = GraphWriter::new(client.clone());

    let first = GraphNode::Content(Content::Tweet(tweet("1", "first", 1)));
    let second = GraphNode::Content(Content::Tweet(tweet("1", "edited", 9)));
    writer.upsert_node(&first).await.unwrap();
    let node = writer.upsert_node(&second).await.unwrap();

    assert_eq!(node, NodeRef::new(NodeLabel::Tweet, "1"));
    assert_eq!(count(&client, "MATCH (t:Tweet) RETURN count(t) AS c").await, 1);
    assert_eq!(
        count(&client, "MATCH (t:Tweet {tweet_id: '1'}) RETURN t.favorite_count AS c").await,
        9
    );
}

#[tokio::test]
async fn concurrent_web_page_merges_collapse_to_one_node() {
    let (_container, client) = megatick_graph::testutil::neo4j_container().await;
    let writer = GraphWriter::new(client.clone());

    let page = GraphNode::WebPage(WebPage {
        url: "https://example.com/article".to_string(),
        content: Some("body".to_string()),
        fetched_at: Utc::now(),
    });
    let writes = (0..8).map(|_| {
        let writer = writer.clone();
        let page = page.clone();
        async move { writer.upsert_node(&page).await }
    });
    for result in join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(count(&client, "MATCH (p:WebPage) RETURN count(p) AS c").await, 1);
}

#[tokio::test]
async fn edges_merge_once_and_require_endpoints() {
    let (_container, client) = megatick_graph::testutil::neo4j_container().await;
    let writer = GraphWriter::new(client.clone());

    let author = writer
        .upsert_node(&GraphNode::Author(Author::Twitter(user("7"))))
        .await
        .unwrap();
    let content = writer
        .upsert_node(&GraphNode::Content(Content::Tweet(tweet("70", "hello", 0))))
        .await
        .unwrap();

    assert!(writer.merge_edge(RelType::Authored, &author, &content).await.unwrap());
    assert!(writer.merge_edge(RelType::Authored, &author, &content).await.unwrap());
    assert_eq!(count(&client, "MATCH ()-[r:AUTHORED]->() RETURN count(r) AS c").await, 1);

    let missing = NodeRef::web_page("https://nowhere.example");
    assert!(!writer.merge_edge(RelType::LinksTo, &content, &missing).await.unwrap());
    assert_eq!(count(&client, "MATCH ()-[r:LINKS_TO]->() RETURN count(r) AS c").await, 0);
}

#[tokio::test]
async fn find_node_by_identity_key() {
    let (_container, client) = megatick_graph::testutil::neo4j_container().await;
    let writer = GraphWriter::new(client);

    assert!(writer
        .find_node(NodeLabel::WebPage, "https://example.com/")
        .await
        .unwrap()
        .is_none());

    writer
        .upsert_node(&GraphNode::WebPage(WebPage {
            url: "https://example.com/".to_string(),
            content: None,
            fetched_at: Utc::now(),
        }))
        .await
        .unwrap();

    let found = writer
        .find_node(NodeLabel::WebPage, "https://example.com/")
        .await
        .unwrap();
    assert_eq!(found, Some(NodeRef::web_page("https://example.com/")));
}

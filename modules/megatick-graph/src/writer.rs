use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::{debug, warn};

use megatick_common::{
    Author, Content, GraphNode, NodeLabel, NodeRef, RedditComment, RedditSubmission, Redditor,
    RelType, Tweet, TwitterUser, WebPage,
};

use crate::GraphClient;

/// Write-side wrapper for the graph.
///
/// Every node write is a `MERGE` on the label's identity field, so repeated
/// sightings update in place. Concurrent merges of the same key rely on the
/// uniqueness constraints created by `migrate()`.
#[derive(Clone)]
pub struct GraphWriter {
    client: GraphClient,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Create or update any node kind. Returns the node's reference.
    pub async fn upsert_node(&self, node: &GraphNode) -> Result<NodeRef, neo4rs::Error> {
        match node {
            GraphNode::Author(Author::Twitter(u)) => self.upsert_twitter_user(u).await?,
            GraphNode::Author(Author::Reddit(u)) => self.upsert_redditor(u).await?,
            GraphNode::Content(Content::Tweet(t)) => self.upsert_tweet(t).await?,
            GraphNode::Content(Content::Submission(s)) => self.upsert_submission(s).await?,
            GraphNode::Content(Content::Comment(c)) => self.upsert_comment(c).await?,
            GraphNode::WebPage(p) => self.merge_web_page(p).await?,
        }
        Ok(node.node_ref())
    }

    // --- Authors ---

    /// Create or update a TwitterUser node. MERGE on user_id, last write wins.
    pub async fn upsert_twitter_user(&self, u: &TwitterUser) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (u:TwitterUser {user_id: $user_id})
             SET u.handle = $handle,
                 u.user_name = $user_name,
                 u.created_at = CASE WHEN $created_at = '' THEN null ELSE datetime($created_at) END,
                 u.url = CASE WHEN $url = '' THEN null ELSE $url END,
                 u.description = CASE WHEN $description = '' THEN null ELSE $description END,
                 u.location = CASE WHEN $location = '' THEN null ELSE $location END,
                 u.lang = CASE WHEN $lang = '' THEN null ELSE $lang END,
                 u.verified = $verified,
                 u.geo_enabled = $geo_enabled,
                 u.default_profile = $default_profile,
                 u.default_profile_image = $default_profile_image,
                 u.followers_count = $followers_count,
                 u.friends_count = $friends_count,
                 u.favourites_count = $favourites_count,
                 u.statuses_count = $statuses_count,
                 u.listed_count = $listed_count",
        )
        .param("user_id", u.user_id.as_str())
        .param("handle", u.handle.as_str())
        .param("user_name", u.user_name.as_str())
        .param("created_at", format_datetime_opt(u.created_at.as_ref()))
        .param("url", opt_str(&u.url))
        .param("description", opt_str(&u.description))
        .param("location", opt_str(&u.location))
        .param("lang", opt_str(&u.lang))
        .param("verified", u.verified)
        .param("geo_enabled", u.geo_enabled)
        .param("default_profile", u.default_profile)
        .param("default_profile_image", u.default_profile_image)
        .param("followers_count", u.followers_count)
        .param("friends_count", u.friends_count)
        .param("favourites_count", u.favourites_count)
        .param("statuses_count", u.statuses_count)
        .param("listed_count", u.listed_count);

        self.run_merge(q).await
    }

    /// Create or update a Redditor node. MERGE on user_id, last write wins.
    pub async fn upsert_redditor(&self, u: &Redditor) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (u:Redditor {user_id: $user_id})
             SET u.name = $name,
                 u.created_at = CASE WHEN $created_at = '' THEN null ELSE datetime($created_at) END,
                 u.comment_karma = $comment_karma,
                 u.link_karma = $link_karma,
                 u.has_verified_email = $has_verified_email,
                 u.is_mod = $is_mod",
        )
        .param("user_id", u.user_id.as_str())
        .param("name", u.name.as_str())
        .param("created_at", format_datetime_opt(u.created_at.as_ref()))
        .param("comment_karma", u.comment_karma)
        .param("link_karma", u.link_karma)
        .param("has_verified_email", u.has_verified_email)
        .param("is_mod", u.is_mod);

        self.run_merge(q).await
    }

    // --- Content ---

    /// Create or update a Tweet node. MERGE on tweet_id, last write wins.
    pub async fn upsert_tweet(&self, t: &Tweet) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (t:Tweet {tweet_id: $tweet_id})
             SET t.text = $text,
                 t.created_at = CASE WHEN $created_at = '' THEN null ELSE datetime($created_at) END,
                 t.lang = CASE WHEN $lang = '' THEN null ELSE $lang END,
                 t.geo = CASE WHEN $geo = '' THEN null ELSE $geo END,
                 t.coordinates = CASE WHEN $coordinates = '' THEN null ELSE $coordinates END,
                 t.source = CASE WHEN $source = '' THEN null ELSE $source END,
                 t.favorite_count = $favorite_count,
                 t.retweet_count = $retweet_count,
                 t.favorited = $favorited,
                 t.retweeted = $retweeted",
        )
        .param("tweet_id", t.tweet_id.as_str())
        .param("text", t.text.as_str())
        .param("created_at", format_datetime_opt(t.created_at.as_ref()))
        .param("lang", opt_str(&t.lang))
        .param("geo", json_str(t.geo.as_ref()))
        .param("coordinates", json_str(t.coordinates.as_ref()))
        .param("source", opt_str(&t.source))
        .param("favorite_count", t.favorite_count)
        .param("retweet_count", t.retweet_count)
        .param("favorited", t.favorited)
        .param("retweeted", t.retweeted);

        self.run_merge(q).await
    }

    /// Create or update a RedditSubmission node. MERGE on submission_id.
    pub async fn upsert_submission(&self, s: &RedditSubmission) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (s:RedditSubmission {submission_id: $submission_id})
             SET s.title = $title,
                 s.text = $text,
                 s.permalink = $permalink,
                 s.url = CASE WHEN $url = '' THEN null ELSE $url END,
                 s.subreddit = $subreddit,
                 s.score = $score,
                 s.upvote_ratio = $upvote_ratio,
                 s.created_at = CASE WHEN $created_at = '' THEN null ELSE datetime($created_at) END",
        )
        .param("submission_id", s.submission_id.as_str())
        .param("title", s.title.as_str())
        .param("text", s.text.as_str())
        .param("permalink", s.permalink.as_str())
        .param("url", opt_str(&s.url))
        .param("subreddit", s.subreddit.as_str())
        .param("score", s.score)
        .param("upvote_ratio", s.upvote_ratio)
        .param("created_at", format_datetime_opt(s.created_at.as_ref()));

        self.run_merge(q).await
    }

    /// Create or update a RedditComment node. MERGE on comment_id.
    pub async fn upsert_comment(&self, c: &RedditComment) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (c:RedditComment {comment_id: $comment_id})
             SET c.body = $body,
                 c.permalink = $permalink,
                 c.subreddit = $subreddit,
                 c.score = $score,
                 c.is_submitter = $is_submitter,
                 c.created_at = CASE WHEN $created_at = '' THEN null ELSE datetime($created_at) END",
        )
        .param("comment_id", c.comment_id.as_str())
        .param("body", c.body.as_str())
        .param("permalink", c.permalink.as_str())
        .param("subreddit", c.subreddit.as_str())
        .param("score", c.score)
        .param("is_submitter", c.is_submitter)
        .param("created_at", format_datetime_opt(c.created_at.as_ref()));

        self.run_merge(q).await
    }

    // --- Web pages ---

    /// Find or create a WebPage by url. Attributes are only written on create:
    /// pages are never refreshed.
    pub async fn merge_web_page(&self, p: &WebPage) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (p:WebPage {url: $url})
             ON CREATE SET
                 p.content = CASE WHEN $content = '' THEN null ELSE $content END,
                 p.fetched_at = datetime($fetched_at)",
        )
        .param("url", p.url.as_str())
        .param("content", opt_str(&p.content))
        .param("fetched_at", format_datetime(&p.fetched_at));

        self.run_merge(q).await
    }

    // --- Lookups ---

    /// Look up a node by identity key.
    pub async fn find_node(
        &self,
        label: NodeLabel,
        key: &str,
    ) -> Result<Option<NodeRef>, neo4rs::Error> {
        let cypher = format!(
            "MATCH (n:{label} {{{field}: $key}}) RETURN n.{field} AS key LIMIT 1",
            label = label.as_str(),
            field = label.key_field(),
        );
        let mut stream = self.client.graph.execute(query(&cypher).param("key", key)).await?;
        if let Some(row) = stream.next().await? {
            let found: String = row.get("key").unwrap_or_default();
            if !found.is_empty() {
                return Ok(Some(NodeRef::new(label, found)));
            }
        }
        Ok(None)
    }

    // --- Relationships ---

    /// MERGE a relationship between two existing nodes.
    /// Returns false when either endpoint is missing (nothing is created).
    pub async fn merge_edge(
        &self,
        rel: RelType,
        from: &NodeRef,
        to: &NodeRef,
    ) -> Result<bool, neo4rs::Error> {
        let cypher = format!(
            "MATCH (a:{from_label} {{{from_field}: $from}})
             MATCH (b:{to_label} {{{to_field}: $to}})
             MERGE (a)-[r:{rel}]->(b)
             RETURN count(r) AS merged",
            from_label = from.label.as_str(),
            from_field = from.label.key_field(),
            to_label = to.label.as_str(),
            to_field = to.label.key_field(),
            rel = rel.as_str(),
        );
        let q = query(&cypher)
            .param("from", from.key.as_str())
            .param("to", to.key.as_str());

        let mut stream = self.client.graph.execute(q).await?;
        let merged = match stream.next().await? {
            Some(row) => row.get::<i64>("merged").unwrap_or(0) > 0,
            None => false,
        };
        if merged {
            debug!(rel = rel.as_str(), from = %from, to = %to, "Edge merged");
        }
        Ok(merged)
    }

    /// Run a MERGE statement. A uniqueness violation means a concurrent
    /// writer created the node between our match and create; the retry
    /// then matches it.
    async fn run_merge(&self, q: neo4rs::Query) -> Result<(), neo4rs::Error> {
        match self.client.graph.run(q.clone()).await {
            Ok(()) => Ok(()),
            Err(e) if is_constraint_violation(&e) => {
                warn!(error = %e, "Concurrent MERGE collided, retrying");
                self.client.graph.run(q).await
            }
            Err(e) => Err(e),
        }
    }
}

fn is_constraint_violation(e: &neo4rs::Error) -> bool {
    let msg = e.to_string();
    msg.contains("ConstraintValidationFailed") || msg.contains("already exists with label")
}

fn opt_str(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("")
}

fn json_str(v: Option<&serde_json::Value>) -> String {
    match v {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(v) => v.to_string(),
    }
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn format_datetime_opt(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(format_datetime).unwrap_or_default()
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Labels ---

/// Graph label of a persisted node. Each label has exactly one identity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    TwitterUser,
    Redditor,
    Tweet,
    RedditSubmission,
    RedditComment,
    WebPage,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 6] = [
        NodeLabel::TwitterUser,
        NodeLabel::Redditor,
        NodeLabel::Tweet,
        NodeLabel::RedditSubmission,
        NodeLabel::RedditComment,
        NodeLabel::WebPage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::TwitterUser => "TwitterUser",
            NodeLabel::Redditor => "Redditor",
            NodeLabel::Tweet => "Tweet",
            NodeLabel::RedditSubmission => "RedditSubmission",
            NodeLabel::RedditComment => "RedditComment",
            NodeLabel::WebPage => "WebPage",
        }
    }

    /// Property holding the identity key for this label.
    pub fn key_field(&self) -> &'static str {
        match self {
            NodeLabel::TwitterUser | NodeLabel::Redditor => "user_id",
            NodeLabel::Tweet => "tweet_id",
            NodeLabel::RedditSubmission => "submission_id",
            NodeLabel::RedditComment => "comment_id",
            NodeLabel::WebPage => "url",
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(
            self,
            NodeLabel::Tweet | NodeLabel::RedditSubmission | NodeLabel::RedditComment
        )
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelType {
    /// Author -> Content
    Authored,
    /// Content|WebPage -> WebPage (citation), Content -> Content (ancestry)
    LinksTo,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Authored => "AUTHORED",
            RelType::LinksTo => "LINKS_TO",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- References ---

/// Handle to a persisted node: its label plus identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }

    pub fn web_page(url: &str) -> Self {
        Self::new(NodeLabel::WebPage, url)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeRef {
    pub rel: RelType,
    pub from: NodeRef,
    pub to: NodeRef,
}

/// A reply/quote parent that still has to be looked up upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParentRef {
    Tweet(u64),
    RedditSubmission(String),
    RedditComment(String),
}

impl ParentRef {
    /// The node this parent becomes once persisted.
    pub fn node_ref(&self) -> NodeRef {
        match self {
            ParentRef::Tweet(id) => NodeRef::new(NodeLabel::Tweet, id.to_string()),
            ParentRef::RedditSubmission(id) => NodeRef::new(NodeLabel::RedditSubmission, id.as_str()),
            ParentRef::RedditComment(id) => NodeRef::new(NodeLabel::RedditComment, id.as_str()),
        }
    }

    /// Parse a Reddit fullname (`t1_abc`, `t3_xyz`).
    pub fn from_reddit_fullname(fullname: &str) -> Option<Self> {
        let (kind, id) = fullname.split_once('_')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "t1" => Some(ParentRef::RedditComment(id.to_string())),
            "t3" => Some(ParentRef::RedditSubmission(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Tweet(id) => write!(f, "tweet:{id}"),
            ParentRef::RedditSubmission(id) => write!(f, "t3_{id}"),
            ParentRef::RedditComment(id) => write!(f, "t1_{id}"),
        }
    }
}

// --- Authors ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub user_id: String,
    pub handle: String,
    pub user_name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub lang: Option<String>,
    pub verified: bool,
    pub geo_enabled: bool,
    pub default_profile: bool,
    pub default_profile_image: bool,
    pub followers_count: i64,
    pub friends_count: i64,
    pub favourites_count: i64,
    pub statuses_count: i64,
    pub listed_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redditor {
    pub user_id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub comment_karma: i64,
    pub link_karma: i64,
    pub has_verified_email: bool,
    pub is_mod: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Author {
    Twitter(TwitterUser),
    Reddit(Redditor),
}

impl Author {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            Author::Twitter(u) => NodeRef::new(NodeLabel::TwitterUser, u.user_id.as_str()),
            Author::Reddit(u) => NodeRef::new(NodeLabel::Redditor, u.user_id.as_str()),
        }
    }
}

// --- Content ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub tweet_id: String,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub lang: Option<String>,
    pub geo: Option<serde_json::Value>,
    pub coordinates: Option<serde_json::Value>,
    pub source: Option<String>,
    pub favorite_count: i64,
    pub retweet_count: i64,
    pub favorited: bool,
    pub retweeted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditSubmission {
    pub submission_id: String,
    pub title: String,
    pub text: String,
    pub permalink: String,
    pub url: Option<String>,
    pub subreddit: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditComment {
    pub comment_id: String,
    pub body: String,
    pub permalink: String,
    pub subreddit: String,
    pub score: i64,
    pub is_submitter: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Tweet(Tweet),
    Submission(RedditSubmission),
    Comment(RedditComment),
}

impl Content {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            Content::Tweet(t) => NodeRef::new(NodeLabel::Tweet, t.tweet_id.as_str()),
            Content::Submission(s) => {
                NodeRef::new(NodeLabel::RedditSubmission, s.submission_id.as_str())
            }
            Content::Comment(c) => NodeRef::new(NodeLabel::RedditComment, c.comment_id.as_str()),
        }
    }
}

// --- Web pages ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebPage {
    pub url: String,
    /// Extracted body text. None when the page had no usable body.
    pub content: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

// --- Graph nodes ---

/// Every node kind the pipeline persists, one persistence mapping per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum GraphNode {
    Author(Author),
    Content(Content),
    WebPage(WebPage),
}

impl GraphNode {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            GraphNode::Author(a) => a.node_ref(),
            GraphNode::Content(c) => c.node_ref(),
            GraphNode::WebPage(p) => NodeRef::web_page(&p.url),
        }
    }
}

impl From<Author> for GraphNode {
    fn from(a: Author) -> Self {
        GraphNode::Author(a)
    }
}

impl From<Content> for GraphNode {
    fn from(c: Content) -> Self {
        GraphNode::Content(c)
    }
}

impl From<WebPage> for GraphNode {
    fn from(p: WebPage) -> Self {
        GraphNode::WebPage(p)
    }
}

// --- URL helpers ---

/// Extract the host from a URL (e.g., "https://www.example.com/path" -> "www.example.com").
pub fn extract_domain(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Normalize a domain for comparison: lowercase, port stripped, leading `www.` stripped.
pub fn normalize_domain(domain: &str) -> String {
    let d = domain.trim().to_lowercase();
    let d = d.split(':').next().unwrap_or("");
    d.strip_prefix("www.").unwrap_or(d).to_string()
}

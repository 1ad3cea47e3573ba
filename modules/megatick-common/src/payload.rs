// Raw platform payloads as delivered by the stream and the ancestor lookups.
// Field names follow the platform JSON so payloads deserialize directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event from the live stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "platform", content = "data", rename_all = "snake_case")]
pub enum StreamItem {
    Tweet(TweetPayload),
    Submission(SubmissionPayload),
    Comment(CommentPayload),
}

impl StreamItem {
    /// Declared language, if the platform declares one.
    pub fn lang(&self) -> Option<&str> {
        match self {
            StreamItem::Tweet(t) => t.lang.as_deref(),
            StreamItem::Submission(s) => s.lang.as_deref(),
            StreamItem::Comment(_) => None,
        }
    }

    /// Platform id of the author, if present.
    pub fn author_id(&self) -> Option<String> {
        match self {
            StreamItem::Tweet(t) => t.user.as_ref().and_then(|u| u.id).map(|id| id.to_string()),
            StreamItem::Submission(s) => s.author.as_ref().and_then(|a| a.id.clone()),
            StreamItem::Comment(c) => c.author.as_ref().and_then(|a| a.id.clone()),
        }
    }

    /// Short identifier for logs.
    pub fn describe(&self) -> String {
        match self {
            StreamItem::Tweet(t) => format!("tweet:{}", t.id),
            StreamItem::Submission(s) => format!("t3_{}", s.id),
            StreamItem::Comment(c) => format!("t1_{}", c.id),
        }
    }
}

// --- Twitter ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TweetPayload {
    pub id: u64,
    pub text: Option<String>,
    pub full_text: Option<String>,
    pub truncated: bool,
    pub extended_tweet: Option<ExtendedTweet>,
    pub retweeted_status: Option<Box<TweetPayload>>,
    pub quoted_status_id: Option<u64>,
    pub in_reply_to_status_id: Option<u64>,
    pub entities: Option<Entities>,
    pub user: Option<TwitterUserPayload>,
    pub lang: Option<String>,
    pub created_at: Option<String>,
    pub geo: Option<serde_json::Value>,
    pub coordinates: Option<serde_json::Value>,
    pub source: Option<String>,
    pub favorite_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub favorited: Option<bool>,
    pub retweeted: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedTweet {
    pub full_text: Option<String>,
    pub entities: Option<Entities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entities {
    pub urls: Vec<UrlEntity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlEntity {
    pub url: Option<String>,
    pub expanded_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterUserPayload {
    pub id: Option<u64>,
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub created_at: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub lang: Option<String>,
    pub verified: Option<bool>,
    pub geo_enabled: Option<bool>,
    pub default_profile: Option<bool>,
    pub default_profile_image: Option<bool>,
    pub followers_count: Option<i64>,
    pub friends_count: Option<i64>,
    pub favourites_count: Option<i64>,
    pub statuses_count: Option<i64>,
    pub listed_count: Option<i64>,
}

// --- Reddit ---

/// Expanded author record. The stream client resolves these; lookups only
/// know the fullname and name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditorPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub created_utc: Option<f64>,
    pub comment_karma: Option<i64>,
    pub link_karma: Option<i64>,
    pub has_verified_email: Option<bool>,
    pub is_mod: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionPayload {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub permalink: String,
    pub url: Option<String>,
    pub subreddit: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub created_utc: Option<f64>,
    pub lang: Option<String>,
    pub author: Option<RedditorPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentPayload {
    pub id: String,
    pub body: String,
    pub permalink: String,
    pub subreddit: String,
    pub score: i64,
    pub is_submitter: bool,
    pub created_utc: Option<f64>,
    /// Fullname of the parent (`t1_` comment or `t3_` submission).
    pub parent_id: Option<String>,
    pub link_id: Option<String>,
    pub author: Option<RedditorPayload>,
}

// --- Time helpers ---

/// Parse Twitter's `created_at` format ("Wed Oct 10 20:19:24 +0000 2018").
pub fn parse_twitter_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s.trim(), "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert Reddit's fractional epoch seconds.
pub fn reddit_time(created_utc: f64) -> Option<DateTime<Utc>> {
    if !created_utc.is_finite() {
        return None;
    }
    DateTime::from_timestamp(created_utc.trunc() as i64, 0)
}

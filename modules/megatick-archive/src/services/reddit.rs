// Reddit thing lookup by fullname via /api/info.json.

use std::time::Duration;

use megatick_common::{CommentPayload, RedditorPayload, StreamItem, SubmissionPayload};
use serde::Deserialize;
use tracing::debug;

use crate::error::LookupError;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";
const USER_AGENT: &str = "megatick-archive/0.1";

pub struct RedditLookup {
    client: reqwest::Client,
    base_url: String,
}

impl RedditLookup {
    pub fn new() -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch a comment (`t1_…`) or submission (`t3_…`).
    pub async fn thing(&self, fullname: &str) -> Result<StreamItem, LookupError> {
        let url = format!("{}/api/info.json", self.base_url);
        debug!(fullname, "reddit: looking up thing");

        let resp = self
            .client
            .get(&url)
            .query(&[("id", fullname), ("raw_json", "1")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::from_status(status.as_u16(), fullname));
        }

        let listing: Listing = resp
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;

        let thing = listing
            .data
            .children
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound(fullname.to_string()))?;

        thing_to_item(thing)
    }
}

// --- Listing JSON ---

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: serde_json::Value,
}

/// Fields shared by t1 and t3 data. Reddit reports the author as a bare name
/// plus a `t2_` fullname; both disappear when the account is deleted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThingData {
    id: String,
    title: String,
    selftext: String,
    body: String,
    permalink: String,
    url: Option<String>,
    subreddit: String,
    score: i64,
    upvote_ratio: Option<f64>,
    is_submitter: bool,
    created_utc: Option<f64>,
    parent_id: Option<String>,
    link_id: Option<String>,
    author: Option<String>,
    author_fullname: Option<String>,
}

impl ThingData {
    fn author(&self) -> Option<RedditorPayload> {
        let id = self.author_fullname.as_deref()?;
        Some(RedditorPayload {
            id: Some(id.strip_prefix("t2_").unwrap_or(id).to_string()),
            name: self.author.clone(),
            ..Default::default()
        })
    }
}

fn thing_to_item(thing: Thing) -> Result<StreamItem, LookupError> {
    let data: ThingData =
        serde_json::from_value(thing.data).map_err(|e| LookupError::Malformed(e.to_string()))?;
    let author = data.author();

    match thing.kind.as_str() {
        "t1" => Ok(StreamItem::Comment(CommentPayload {
            id: data.id,
            body: data.body,
            permalink: data.permalink,
            subreddit: data.subreddit,
            score: data.score,
            is_submitter: data.is_submitter,
            created_utc: data.created_utc,
            parent_id: data.parent_id,
            link_id: data.link_id,
            author,
        })),
        "t3" => Ok(StreamItem::Submission(SubmissionPayload {
            id: data.id,
            title: data.title,
            selftext: data.selftext,
            permalink: data.permalink,
            url: data.url,
            subreddit: data.subreddit,
            score: data.score,
            upvote_ratio: data.upvote_ratio.unwrap_or_default(),
            created_utc: data.created_utc,
            lang: None,
            author,
        })),
        other => Err(LookupError::Malformed(format!("unexpected kind {other}"))),
    }
}

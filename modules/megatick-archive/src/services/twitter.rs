// Twitter v1.1 single-status lookup.

use std::time::Duration;

use megatick_common::TweetPayload;
use tracing::debug;

use crate::error::LookupError;

const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

pub struct TwitterLookup {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterLookup {
    pub fn new(bearer_token: &str) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            bearer_token: bearer_token.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch one status in extended mode.
    pub async fn status(&self, id: u64) -> Result<TweetPayload, LookupError> {
        let url = format!("{}/1.1/statuses/show.json", self.base_url);
        debug!(id, "twitter: looking up status");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&[("id", id.to_string().as_str()), ("tweet_mode", "extended")])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LookupError::from_status(
                status.as_u16(),
                format!("status {id}: {}", body.chars().take(200).collect::<String>()),
            ));
        }

        let tweet: TweetPayload = resp
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        if tweet.id != id {
            return Err(LookupError::Malformed(format!(
                "asked for status {id}, got {}",
                tweet.id
            )));
        }
        Ok(tweet)
    }
}

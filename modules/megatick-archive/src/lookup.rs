// Ancestor lookup: routes a parent reference to the platform client that can
// fetch it.

use megatick_common::{ParentRef, StreamItem};

use crate::error::LookupError;
use crate::services::reddit::RedditLookup;
use crate::services::twitter::TwitterLookup;

pub struct AncestorClient {
    twitter: Option<TwitterLookup>,
    reddit: Option<RedditLookup>,
}

impl AncestorClient {
    pub fn new(twitter: Option<TwitterLookup>, reddit: Option<RedditLookup>) -> Self {
        Self { twitter, reddit }
    }

    /// Twitter when a bearer token is available, Reddit always.
    pub fn from_token(bearer_token: Option<&str>) -> Result<Self, LookupError> {
        let twitter = bearer_token.map(TwitterLookup::new).transpose()?;
        let reddit = Some(RedditLookup::new()?);
        Ok(Self::new(twitter, reddit))
    }

    pub async fn lookup(&self, parent: &ParentRef) -> Result<StreamItem, LookupError> {
        match parent {
            ParentRef::Tweet(id) => {
                let client = self
                    .twitter
                    .as_ref()
                    .ok_or_else(|| LookupError::Unsupported("twitter".to_string()))?;
                Ok(StreamItem::Tweet(client.status(*id).await?))
            }
            ParentRef::RedditSubmission(_) | ParentRef::RedditComment(_) => {
                let client = self
                    .reddit
                    .as_ref()
                    .ok_or_else(|| LookupError::Unsupported("reddit".to_string()))?;
                client.thing(&parent.to_string()).await
            }
        }
    }
}

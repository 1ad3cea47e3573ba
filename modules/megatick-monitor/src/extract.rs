// Raw stream item → graph entities.
//
// Shared by the dispatcher (live items) and the thread resolver (fetched
// ancestors): both persist an item the same way.

use anyhow::Result;

use megatick_common::{
    parse_twitter_time, reddit_time, Author, CommentPayload, Content, GraphNode, MegatickError,
    NodeRef, ParentRef, RedditComment, RedditSubmission, Redditor, RedditorPayload, RelType,
    StreamItem, SubmissionPayload, Tweet, TweetPayload, TwitterUser, TwitterUserPayload,
};

use crate::traits::GraphSink;

/// Everything the pipeline needs from one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub author: Author,
    pub content: Content,
    /// Outbound citation urls, deduplicated in order of appearance.
    pub urls: Vec<String>,
    /// Quote and reply parents still to resolve.
    pub parents: Vec<ParentRef>,
}

/// Result of persisting an item: the nodes written plus its follow-up work.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted {
    pub author: NodeRef,
    pub content: NodeRef,
    pub urls: Vec<String>,
    pub parents: Vec<ParentRef>,
}

/// Upsert author and content, then link them with AUTHORED.
pub async fn persist_item(sink: &dyn GraphSink, item: &StreamItem) -> Result<Persisted> {
    let extracted = extract(item)?;
    persist_extracted(sink, extracted).await
}

pub async fn persist_extracted(sink: &dyn GraphSink, extracted: Extracted) -> Result<Persisted> {
    let author = sink.upsert_node(&GraphNode::Author(extracted.author)).await?;
    let content = sink.upsert_node(&GraphNode::Content(extracted.content)).await?;
    sink.upsert_edge(RelType::Authored, &author, &content).await?;

    Ok(Persisted {
        author,
        content,
        urls: extracted.urls,
        parents: extracted.parents,
    })
}

/// Build graph entities from a raw item. Items without an identity or
/// without an identifiable author are not usable.
pub fn extract(item: &StreamItem) -> Result<Extracted, MegatickError> {
    match item {
        StreamItem::Tweet(t) => extract_tweet(t),
        StreamItem::Submission(s) => extract_submission(s),
        StreamItem::Comment(c) => extract_comment(c),
    }
}

/// The text a reader sees, whichever representation the item came in.
pub fn canonical_text(item: &StreamItem) -> String {
    match item {
        StreamItem::Tweet(t) => tweet_text(t),
        StreamItem::Submission(s) => submission_text(s),
        StreamItem::Comment(c) => c.body.clone(),
    }
}

// --- Twitter ---

/// Retweets carry the original in `retweeted_status`; long tweets carry the
/// untruncated text in `extended_tweet`.
pub fn tweet_text(t: &TweetPayload) -> String {
    let source = t.retweeted_status.as_deref().unwrap_or(t);
    source
        .extended_tweet
        .as_ref()
        .and_then(|e| e.full_text.clone())
        .or_else(|| source.full_text.clone())
        .or_else(|| source.text.clone())
        .unwrap_or_default()
}

/// The status' own text, before any retweet unwrapping.
pub(crate) fn raw_tweet_text(t: &TweetPayload) -> &str {
    t.full_text
        .as_deref()
        .or(t.text.as_deref())
        .unwrap_or("")
}

fn extract_tweet(t: &TweetPayload) -> Result<Extracted, MegatickError> {
    if t.id == 0 {
        return Err(MegatickError::Extraction("tweet without id".to_string()));
    }
    let user = t
        .user
        .as_ref()
        .filter(|u| u.id.is_some())
        .ok_or_else(|| MegatickError::Extraction(format!("tweet {} has no author", t.id)))?;

    let content = Content::Tweet(Tweet {
        tweet_id: t.id.to_string(),
        text: tweet_text(t),
        created_at: t.created_at.as_deref().and_then(parse_twitter_time),
        lang: t.lang.clone(),
        geo: t.geo.clone().filter(|v| !v.is_null()),
        coordinates: t.coordinates.clone().filter(|v| !v.is_null()),
        source: t.source.clone(),
        favorite_count: t.favorite_count.unwrap_or(0),
        retweet_count: t.retweet_count.unwrap_or(0),
        favorited: t.favorited.unwrap_or(false),
        retweeted: t.retweeted.unwrap_or(false),
    });

    let mut parents = Vec::new();
    if let Some(id) = t.quoted_status_id {
        parents.push(ParentRef::Tweet(id));
    }
    if let Some(id) = t.in_reply_to_status_id {
        if t.quoted_status_id != Some(id) {
            parents.push(ParentRef::Tweet(id));
        }
    }

    Ok(Extracted {
        author: Author::Twitter(twitter_user(user)),
        content,
        urls: tweet_urls(t),
        parents,
    })
}

fn twitter_user(u: &TwitterUserPayload) -> TwitterUser {
    TwitterUser {
        user_id: u.id.unwrap_or_default().to_string(),
        handle: u.screen_name.clone().unwrap_or_default(),
        user_name: u.name.clone().unwrap_or_default(),
        created_at: u.created_at.as_deref().and_then(parse_twitter_time),
        url: u.url.clone(),
        description: u.description.clone(),
        location: u.location.clone(),
        lang: u.lang.clone(),
        verified: u.verified.unwrap_or(false),
        geo_enabled: u.geo_enabled.unwrap_or(false),
        default_profile: u.default_profile.unwrap_or(false),
        default_profile_image: u.default_profile_image.unwrap_or(false),
        followers_count: u.followers_count.unwrap_or(0),
        friends_count: u.friends_count.unwrap_or(0),
        favourites_count: u.favourites_count.unwrap_or(0),
        statuses_count: u.statuses_count.unwrap_or(0),
        listed_count: u.listed_count.unwrap_or(0),
    }
}

/// Expanded urls from the entities that belong to the canonical text.
pub fn tweet_urls(t: &TweetPayload) -> Vec<String> {
    let source = t.retweeted_status.as_deref().unwrap_or(t);
    let entities = source
        .extended_tweet
        .as_ref()
        .and_then(|e| e.entities.as_ref())
        .or(source.entities.as_ref());

    let urls = entities
        .map(|e| {
            e.urls
                .iter()
                .filter_map(|u| u.expanded_url.clone().or_else(|| u.url.clone()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    dedup_urls(urls)
}

// --- Reddit ---

fn submission_text(s: &SubmissionPayload) -> String {
    format!("{}\n\n{}", s.title, s.selftext).trim().to_string()
}

fn extract_submission(s: &SubmissionPayload) -> Result<Extracted, MegatickError> {
    if s.id.is_empty() {
        return Err(MegatickError::Extraction("submission without id".to_string()));
    }
    let author = redditor(s.author.as_ref())
        .ok_or_else(|| MegatickError::Extraction(format!("t3_{} has no author", s.id)))?;

    let urls = s
        .url
        .as_deref()
        .filter(|u| is_link_post(u, &s.permalink))
        .map(|u| vec![u.to_string()])
        .unwrap_or_default();

    Ok(Extracted {
        author: Author::Reddit(author),
        content: Content::Submission(RedditSubmission {
            submission_id: s.id.clone(),
            title: s.title.clone(),
            text: s.selftext.clone(),
            permalink: s.permalink.clone(),
            url: s.url.clone(),
            subreddit: s.subreddit.clone(),
            score: s.score,
            upvote_ratio: s.upvote_ratio,
            created_at: s.created_utc.and_then(reddit_time),
        }),
        urls,
        parents: Vec::new(),
    })
}

/// Self posts point back at their own permalink (often as an absolute url).
fn is_link_post(url: &str, permalink: &str) -> bool {
    let absolute = url.starts_with("http://") || url.starts_with("https://");
    let own = url == permalink || (!permalink.is_empty() && url.ends_with(permalink));
    absolute && !own
}

fn extract_comment(c: &CommentPayload) -> Result<Extracted, MegatickError> {
    if c.id.is_empty() {
        return Err(MegatickError::Extraction("comment without id".to_string()));
    }
    let author = redditor(c.author.as_ref())
        .ok_or_else(|| MegatickError::Extraction(format!("t1_{} has no author", c.id)))?;

    let parents = c
        .parent_id
        .as_deref()
        .and_then(ParentRef::from_reddit_fullname)
        .into_iter()
        .collect();

    Ok(Extracted {
        author: Author::Reddit(author),
        content: Content::Comment(RedditComment {
            comment_id: c.id.clone(),
            body: c.body.clone(),
            permalink: c.permalink.clone(),
            subreddit: c.subreddit.clone(),
            score: c.score,
            is_submitter: c.is_submitter,
            created_at: c.created_utc.and_then(reddit_time),
        }),
        urls: Vec::new(),
        parents,
    })
}

fn redditor(p: Option<&RedditorPayload>) -> Option<Redditor> {
    let p = p?;
    let user_id = p.id.clone().filter(|id| !id.is_empty())?;
    Some(Redditor {
        user_id,
        name: p.name.clone().unwrap_or_default(),
        created_at: p.created_utc.and_then(reddit_time),
        comment_karma: p.comment_karma.unwrap_or(0),
        link_karma: p.link_karma.unwrap_or(0),
        has_verified_email: p.has_verified_email.unwrap_or(false),
        is_mod: p.is_mod.unwrap_or(false),
    })
}

fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

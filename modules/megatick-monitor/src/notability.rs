// Notability filter: decides which stream items are worth persisting.

use std::collections::HashSet;
use std::fmt;

use regex::{Regex, RegexBuilder};

use megatick_common::{Blacklists, StreamItem};

use crate::extract::{canonical_text, raw_tweet_text};

/// Pure reshares start with this prefix and add nothing.
const RESHARE_PREFIX: &str = "RT @";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Language,
    Reshare,
    BlacklistedAuthor,
    BlacklistedKeyword,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::Language => "language",
            RejectReason::Reshare => "reshare",
            RejectReason::BlacklistedAuthor => "blacklisted_author",
            RejectReason::BlacklistedKeyword => "blacklisted_keyword",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// Swappable notability model.
pub trait Notability: Send + Sync {
    fn judge(&self, item: &StreamItem) -> Verdict;
}

/// Fixed rule set. Every rule must pass; an unconfigured rule always passes.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    languages: Option<HashSet<String>>,
    author_ids: Option<HashSet<String>>,
    keywords: Option<Regex>,
}

impl RuleFilter {
    /// Keyword blacklist entries are matched as literal, case-insensitive
    /// substrings. Regex operators in an entry are escaped, not interpreted.
    pub fn new(languages: Option<&[String]>, blacklists: &Blacklists) -> Result<Self, regex::Error> {
        let keywords = match blacklists.keywords.as_deref() {
            Some(terms) => keyword_regex(terms)?,
            None => None,
        };
        Ok(Self {
            languages: languages.map(|l| l.iter().map(|s| s.to_lowercase()).collect()),
            author_ids: blacklists.author_ids.clone(),
            keywords,
        })
    }

    fn language_ok(&self, item: &StreamItem) -> bool {
        match (&self.languages, item.lang()) {
            (Some(accepted), Some(lang)) => accepted.contains(&lang.to_lowercase()),
            _ => true,
        }
    }

    fn author_ok(&self, item: &StreamItem) -> bool {
        match (&self.author_ids, item.author_id()) {
            (Some(blocked), Some(id)) => !blocked.contains(&id),
            _ => true,
        }
    }

    fn keywords_ok(&self, item: &StreamItem) -> bool {
        match &self.keywords {
            Some(re) => !re.is_match(&canonical_text(item)),
            None => true,
        }
    }
}

impl Notability for RuleFilter {
    fn judge(&self, item: &StreamItem) -> Verdict {
        if !self.language_ok(item) {
            return Verdict::Reject(RejectReason::Language);
        }
        if is_reshare(item) {
            return Verdict::Reject(RejectReason::Reshare);
        }
        if !self.author_ok(item) {
            return Verdict::Reject(RejectReason::BlacklistedAuthor);
        }
        if !self.keywords_ok(item) {
            return Verdict::Reject(RejectReason::BlacklistedKeyword);
        }
        Verdict::Accept
    }
}

fn is_reshare(item: &StreamItem) -> bool {
    match item {
        StreamItem::Tweet(t) => raw_tweet_text(t).starts_with(RESHARE_PREFIX),
        _ => false,
    }
}

/// One case-insensitive alternation of the literal terms. None when no
/// term is left after trimming.
fn keyword_regex(terms: &[String]) -> Result<Option<Regex>, regex::Error> {
    let pattern = terms
        .iter()
        .map(|t| regex::escape(t.trim()))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("|");
    if pattern.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&pattern).case_insensitive(true).build().map(Some)
}

#[cfg(test)]
mod tests {
    use megatick_common::{CommentPayload, RedditorPayload, TweetPayload, TwitterUserPayload};

    use super::*;

    fn tweet(text: &str, lang: &str, user: u64) -> StreamItem {
        StreamItem::Tweet(TweetPayload {
            id: 1,
            text: Some(text.to_string()),
            lang: Some(lang.to_string()),
            user: Some(TwitterUserPayload {
                id: Some(user),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn english_only() -> RuleFilter {
        RuleFilter::new(Some(&["en".to_string()]), &Blacklists::default()).unwrap()
    }

    #[test]
    fn default_rule_is_english() {
        let f = english_only();
        assert_eq!(f.judge(&tweet("hello", "en", 1)), Verdict::Accept);
        assert_eq!(
            f.judge(&tweet("bonjour", "fr", 1)),
            Verdict::Reject(RejectReason::Language)
        );
    }

    #[test]
    fn unconfigured_rules_pass() {
        let f = RuleFilter::default();
        assert_eq!(f.judge(&tweet("hola", "es", 1)), Verdict::Accept);
    }

    #[test]
    fn reshares_are_rejected() {
        let f = RuleFilter::default();
        assert_eq!(
            f.judge(&tweet("RT @someone: news", "en", 1)),
            Verdict::Reject(RejectReason::Reshare)
        );
        assert!(f.judge(&tweet("my take on RT @someone", "en", 1)).is_accept());
    }

    #[test]
    fn blacklisted_author_rejected() {
        let lists = Blacklists {
            author_ids: Some(["42".to_string()].into_iter().collect()),
            ..Default::default()
        };
        let f = RuleFilter::new(None, &lists).unwrap();
        assert_eq!(
            f.judge(&tweet("hi", "en", 42)),
            Verdict::Reject(RejectReason::BlacklistedAuthor)
        );
        assert!(f.judge(&tweet("hi", "en", 43)).is_accept());
    }

    #[test]
    fn keywords_match_case_insensitively_as_literals() {
        let lists = Blacklists {
            keywords: Some(vec!["giveaway".to_string(), "c++".to_string()]),
            ..Default::default()
        };
        let f = RuleFilter::new(None, &lists).unwrap();
        assert_eq!(
            f.judge(&tweet("Huge GIVEAWAY today", "en", 1)),
            Verdict::Reject(RejectReason::BlacklistedKeyword)
        );
        assert_eq!(
            f.judge(&tweet("learning c++", "en", 1)),
            Verdict::Reject(RejectReason::BlacklistedKeyword)
        );
        assert!(f.judge(&tweet("learning cpp", "en", 1)).is_accept());
    }

    #[test]
    fn regex_syntax_in_keywords_is_not_interpreted() {
        let lists = Blacklists {
            keywords: Some(vec!["free.*crypto".to_string()]),
            ..Default::default()
        };
        let f = RuleFilter::new(None, &lists).unwrap();
        assert!(f.judge(&tweet("free bitcoin and crypto", "en", 1)).is_accept());
        assert_eq!(
            f.judge(&tweet("get FREE.*CRYPTO now", "en", 1)),
            Verdict::Reject(RejectReason::BlacklistedKeyword)
        );
    }

    #[test]
    fn blank_keyword_list_filters_nothing() {
        let lists = Blacklists {
            keywords: Some(vec!["  ".to_string()]),
            ..Default::default()
        };
        let f = RuleFilter::new(None, &lists).unwrap();
        assert!(f.judge(&tweet("anything", "en", 1)).is_accept());
    }

    #[test]
    fn reddit_items_without_language_pass_language_rule() {
        let comment = StreamItem::Comment(CommentPayload {
            id: "c1".to_string(),
            body: "text".to_string(),
            author: Some(RedditorPayload {
                id: Some("u1".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(english_only().judge(&comment).is_accept());
    }
}

pub mod error;
mod fetchers;
pub mod lookup;
mod readability;
mod services;
pub mod url_filter;

pub use error::{ArchiveError, LookupError, Result};
pub use fetchers::page::{FetchedPage, HttpPageFetcher};
pub use lookup::AncestorClient;
pub use services::feed::HttpFeedReader;
pub use services::reddit::RedditLookup;
pub use services::twitter::TwitterLookup;
pub use url_filter::{SkipReason, UrlFilter};

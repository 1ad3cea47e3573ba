// Upstream services. Each knows how to fetch one kind of thing from one
// place and return the shared payload types.

pub(crate) mod feed;
pub(crate) mod reddit;
pub(crate) mod twitter;

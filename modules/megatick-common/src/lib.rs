pub mod blacklist;
pub mod config;
pub mod error;
pub mod payload;
pub mod types;

pub use blacklist::{read_lines, Blacklists};
pub use config::{Backend, Config, OverflowPolicy};
pub use error::MegatickError;
pub use payload::*;
pub use types::*;

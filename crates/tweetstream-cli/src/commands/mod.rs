//! Command implementations for tweetstream

pub mod tail;

pub use tail::{tail, TailOptions};

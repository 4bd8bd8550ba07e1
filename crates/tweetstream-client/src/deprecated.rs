//! Old per-predicate constructors, kept for existing callers

use tracing::warn;
use tweetstream_core::{Credentials, FilterSpec, Result};

use crate::client::StreamClient;
use crate::config::StreamConfig;

fn forward(
    name: &str,
    credentials: Credentials,
    filter: FilterSpec,
    catchup: Option<u32>,
    url: Option<&str>,
) -> Result<StreamClient> {
    warn!("{} is deprecated, use StreamClient::filter instead", name);
    let mut config = StreamConfig::filter(credentials, filter);
    config.catchup = catchup;
    config.url = url.map(String::from);
    StreamClient::new(config)
}

/// Filter stream following the given user IDs
#[deprecated(since = "0.1.0", note = "use StreamClient::filter with FilterSpec::follow")]
pub fn follow_stream<I, S>(
    credentials: Credentials,
    follow: I,
    catchup: Option<u32>,
    url: Option<&str>,
) -> Result<StreamClient>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let filter = FilterSpec::new().follow(follow);
    forward("follow_stream", credentials, filter, catchup, url)
}

/// Filter stream tracking the given keywords
#[deprecated(since = "0.1.0", note = "use StreamClient::filter with FilterSpec::track")]
pub fn track_stream<I, S>(
    credentials: Credentials,
    track: I,
    catchup: Option<u32>,
    url: Option<&str>,
) -> Result<StreamClient>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let filter = FilterSpec::new().track(track);
    forward("track_stream", credentials, filter, catchup, url)
}

/// Filter stream restricted to bounding boxes
///
/// A locations-only filter is rejected, so this always fails with a
/// configuration error. Combine locations with track or follow through
/// [`StreamClient::filter`] instead.
#[deprecated(since = "0.1.0", note = "use StreamClient::filter with FilterSpec::locations")]
pub fn location_stream<I, S>(
    credentials: Credentials,
    locations: I,
    catchup: Option<u32>,
    url: Option<&str>,
) -> Result<StreamClient>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let filter = FilterSpec::new().locations(locations);
    forward("location_stream", credentials, filter, catchup, url)
}

//! Filter parameters for the filter stream

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Predicates for a filter stream
///
/// Each list is sent comma-joined as a form field. At least one of `track`
/// or `follow` must be non-empty; `locations` on its own is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Keywords to track
    #[serde(default)]
    pub track: Vec<String>,

    /// User IDs to follow
    #[serde(default)]
    pub follow: Vec<String>,

    /// Bounding boxes, as the flat list of coordinates the API expects
    #[serde(default)]
    pub locations: Vec<String>,
}

impl FilterSpec {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add keywords to track
    pub fn track<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.track.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Add user IDs to follow
    pub fn follow<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.follow.extend(users.into_iter().map(Into::into));
        self
    }

    /// Add location coordinates
    pub fn locations<I, S>(mut self, coordinates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations.extend(coordinates.into_iter().map(Into::into));
        self
    }

    /// True when no predicate at all is set
    pub fn is_empty(&self) -> bool {
        self.track.is_empty() && self.follow.is_empty() && self.locations.is_empty()
    }

    /// Check that the filter can be sent
    pub fn validate(&self) -> Result<()> {
        if self.track.is_empty() && self.follow.is_empty() {
            return Err(StreamError::configuration(
                "Must specify at least one track or follow",
            ));
        }
        Ok(())
    }

    /// Form fields for the request body, in a fixed order
    pub fn form_params(&self) -> Vec<(&'static str, String)> {
        [
            ("track", &self.track),
            ("follow", &self.follow),
            ("locations", &self.locations),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, values)| (name, values.join(",")))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_filter_is_rejected() {
        let err = FilterSpec::new().validate().unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[test]
    fn test_locations_alone_is_rejected() {
        let filter = FilterSpec::new().locations(["-122.75", "36.8", "-121.75", "37.8"]);
        assert!(!filter.is_empty());
        assert!(filter.validate().is_err());
    }

    #[test]
    fn test_track_or_follow_is_enough() {
        assert!(FilterSpec::new().track(["rust"]).validate().is_ok());
        assert!(FilterSpec::new().follow(["12"]).validate().is_ok());
    }

    #[test]
    fn test_form_params_join_and_order() {
        let filter = FilterSpec::new()
            .locations(["1", "2"])
            .follow(["12", "34"])
            .track(["υƞιϲɸδε", "foo"]);

        assert_eq!(
            filter.form_params(),
            vec![
                ("track", "υƞιϲɸδε,foo".to_string()),
                ("follow", "12,34".to_string()),
                ("locations", "1,2".to_string()),
            ]
        );
    }

    #[test]
    fn test_form_params_skip_empty() {
        let filter = FilterSpec::new().track(["a"]);
        assert_eq!(filter.form_params(), vec![("track", "a".to_string())]);
    }

    #[test]
    fn test_deserialize_partial() {
        let filter: FilterSpec = serde_json::from_str(r#"{"follow": ["1", "2"]}"#).unwrap();
        assert!(filter.track.is_empty());
        assert_eq!(filter.follow, vec!["1", "2"]);
    }
}

//! Attribute map with shallow-merge and significance detection.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use super::{AttributeKey, AttributeValue};
use crate::error::FrameError;

/// Absolute tolerance below which numeric changes are not significant.
pub const NUMERIC_TOLERANCE: f64 = 0.5;

/// Mapping of attribute name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<AttributeKey, AttributeValue>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &AttributeKey) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: AttributeKey, value: impl Into<AttributeValue>) {
        self.0.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &AttributeKey) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AttributeKey, AttributeValue> {
        self.0.iter()
    }

    /// Builder-style insert, handy for literals.
    #[must_use]
    pub fn with(mut self, key: AttributeKey, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Shallow-merge `incoming` into `self`.
    ///
    /// New keys overwrite, untouched keys persist and `Null` removes.
    /// Returns `true` when at least one significant attribute changed
    /// beyond [`NUMERIC_TOLERANCE`].
    pub fn merge(&mut self, incoming: &Self) -> bool {
        let mut significant = false;
        for (key, value) in incoming.iter() {
            if value.is_null() {
                if self.0.remove(key).is_some() && key.is_significant() {
                    significant = true;
                }
                continue;
            }
            let changed = self
                .0
                .get(key)
                .is_none_or(|current| !current.approx_eq(value, NUMERIC_TOLERANCE));
            if changed && key.is_significant() {
                significant = true;
            }
            self.0.insert(key.clone(), value.clone());
        }
        significant
    }

    /// Parse a JSON object received at the ingestion boundary.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NonScalarAttribute`] if any value is an array
    /// or an object.
    pub fn from_json_object(
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, FrameError> {
        let mut attributes = Self::new();
        for (key, value) in object {
            attributes.insert(
                AttributeKey::from(key.as_str()),
                AttributeValue::from_json(key, value)?,
            );
        }
        Ok(attributes)
    }
}

impl FromIterator<(AttributeKey, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (AttributeKey, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a AttributeKey, &'a AttributeValue);
    type IntoIter = btree_map::Iter<'a, AttributeKey, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch(value: &str) -> Attributes {
        Attributes::new().with(AttributeKey::Switch, value)
    }

    #[test]
    fn should_keep_untouched_keys_when_merging() {
        let mut current = switch("off").with(AttributeKey::Level, 40_i64);
        current.merge(&switch("on"));
        assert_eq!(current.get(&AttributeKey::Switch), Some(&"on".into()));
        assert_eq!(
            current.get(&AttributeKey::Level),
            Some(&AttributeValue::Int(40))
        );
    }

    #[test]
    fn should_report_significant_when_switch_changes() {
        let mut current = switch("off");
        assert!(current.merge(&switch("on")));
    }

    #[test]
    fn should_report_insignificant_when_only_rssi_changes() {
        let mut current = switch("off").with(AttributeKey::Rssi, -60_i64);
        let changed = current.merge(&Attributes::new().with(AttributeKey::Rssi, -72_i64));
        assert!(!changed);
        assert_eq!(
            current.get(&AttributeKey::Rssi),
            Some(&AttributeValue::Int(-72))
        );
    }

    #[test]
    fn should_report_insignificant_when_number_moves_within_tolerance() {
        let mut current = Attributes::new().with(AttributeKey::Temperature, 21.3);
        assert!(!current.merge(&Attributes::new().with(AttributeKey::Temperature, 21.7)));
        assert!(current.merge(&Attributes::new().with(AttributeKey::Temperature, 22.5)));
    }

    #[test]
    fn should_remove_key_when_merging_null() {
        let mut current = Attributes::new().with(AttributeKey::TrackName, "Song");
        let changed =
            current.merge(&Attributes::new().with(AttributeKey::TrackName, AttributeValue::Null));
        assert!(changed);
        assert!(current.get(&AttributeKey::TrackName).is_none());
    }

    #[test]
    fn should_report_significant_when_key_appears() {
        let mut current = Attributes::new();
        assert!(current.merge(&switch("off")));
    }

    #[test]
    fn should_parse_json_object() {
        let json = serde_json::json!({"switch": "on", "level": 20, "fan_speed": 2.5});
        let attributes = Attributes::from_json_object(json.as_object().unwrap()).unwrap();
        assert_eq!(attributes.len(), 3);
        assert_eq!(
            attributes.get(&AttributeKey::Other("fan_speed".to_string())),
            Some(&AttributeValue::Float(2.5))
        );
    }

    #[test]
    fn should_serialize_as_plain_object() {
        let json = serde_json::to_value(switch("on")).unwrap();
        assert_eq!(json, serde_json::json!({"switch": "on"}));
    }
}

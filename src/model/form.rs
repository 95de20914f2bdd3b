use itertools::Itertools;
use std::collections::HashMap;

/// Decoded form body with repeated keys grouped in arrival order.
///
/// Presence of a key is what drives the partial update merge, so a key sent
/// with an empty value is still present.
#[derive(Debug, Clone, Default)]
pub struct FormFields {
    fields: HashMap<String, Vec<String>>,
}

impl FormFields {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            fields: pairs.into_iter().into_group_map(),
        }
    }

    /// First value for a key, if the key was sent.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for a list field, if the key was sent. Empty values are
    /// dropped so `key=` clears a list.
    pub fn list(&self, key: &str) -> Option<Vec<&str>> {
        self.fields.get(key).map(|values| {
            values
                .iter()
                .map(String::as_str)
                .filter(|v| !v.is_empty())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
    }

    #[test]
    fn test_repeated_keys_keep_order() {
        let f = form(&[("questionIDs", "a"), ("doctor", "Dr. B"), ("questionIDs", "b")]);
        assert_eq!(f.list("questionIDs"), Some(vec!["a", "b"]));
        assert_eq!(f.first("doctor"), Some("Dr. B"));
        assert_eq!(f.first("location"), None);
    }

    #[test]
    fn test_empty_value_is_present_but_clears_lists() {
        let f = form(&[("description", ""), ("appointmentIDs", "")]);
        assert_eq!(f.first("description"), Some(""));
        assert_eq!(f.list("appointmentIDs"), Some(vec![]));
        assert_eq!(f.list("questionIDs"), None);
    }
}

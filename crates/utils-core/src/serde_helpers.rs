use serde::{Deserialize, Deserializer};

/// Distinguishes an absent field from an explicit `null` in partial updates.
///
/// Use together with `#[serde(default)]`: a missing key stays `None`, `null`
/// becomes `Some(None)`, and a value becomes `Some(Some(value))`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::deserialize_some;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        value: Option<Option<u8>>,
    }

    #[test]
    fn absent_null_and_present_are_distinct() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"value": null}"#).unwrap();
        let present: Patch = serde_json::from_str(r#"{"value": 4}"#).unwrap();
        assert_eq!(absent.value, None);
        assert_eq!(null.value, Some(None));
        assert_eq!(present.value, Some(Some(4)));
    }
}

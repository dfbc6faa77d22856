//! Anchor records from the site's anchors data file.

use serde::{Deserialize, Deserializer};

/// An anchor entry. Only `id` is used; other fields in the file are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Anchor {
    /// Anchor identifier, used as the last route segment
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

/// Accept string or integer ids; integers are rendered in decimal.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

// SPDX-License-Identifier: Apache-2.0

use serde::{de, Deserialize, Deserializer};

/// Fields like `dns_search` accept either a sequence or a single
/// whitespace-separated scalar.
pub(crate) fn one_or_many_string<'de, D>(
    deserializer: D,
) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(OneOrMany::One(value)) => {
            Ok(value.split_whitespace().map(str::to_string).collect())
        }
        Some(OneOrMany::Many(values)) => Ok(values),
    }
}

/// Netmasks show up both as dotted strings and as bare prefix lengths
/// (IPv6 lease blocks carry `64`), normalize to a string.
pub(crate) fn option_string_or_number<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Text(String),
        Integer(u64),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Text(value)) => Ok(Some(value)),
        Some(StringOrNumber::Integer(value)) => Ok(Some(value.to_string())),
    }
}

pub(crate) fn option_u32_or_string<'de, D>(
    deserializer: D,
) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U32OrString {
        Integer(u32),
        Text(String),
    }

    match Option::<U32OrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(U32OrString::Integer(value)) => Ok(Some(value)),
        Some(U32OrString::Text(value)) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("Invalid integer: {e}"))),
    }
}

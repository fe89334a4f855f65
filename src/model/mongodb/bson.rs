use std::{
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// An opaque document identifier, backed by a MongoDB `ObjectId`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a fresh, unique ID.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching on this `_id`.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl From<Id> for Bson {
    fn from(id: Id) -> Self {
        Bson::ObjectId(id.0)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// De/serialize a map with non-string keys via their string representation.
///
/// BSON documents only permit string keys, and JSON objects likewise, so maps
/// keyed by integers need converting on the way in and out.
pub mod serde_string_map {
    use std::{collections::BTreeMap, fmt::Display, str::FromStr};

    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Display,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v)))
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: FromStr + Ord,
        K::Err: Display,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        BTreeMap::<String, V>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, v)| Ok((parse_key::<_, D::Error>(&k)?, v)))
            .collect()
    }

    pub(super) fn parse_key<K, E>(k: &str) -> Result<K, E>
    where
        K: FromStr,
        K::Err: Display,
        E: Error,
    {
        k.parse::<K>()
            .map_err(|e| E::custom(format!("invalid map key `{k}`: {e}")))
    }
}

/// Like [`serde_string_map`], for a map of maps where both levels of keys
/// need converting.
///
/// Needed wherever the map ends up inside a `#[serde(flatten)]` struct, since
/// flattening hides serde_json's own integer key handling.
pub mod serde_nested_string_map {
    use std::{collections::BTreeMap, fmt::Display, str::FromStr};

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::serde_string_map::{self, parse_key};

    /// Serializes an inner map with string keys.
    struct Inner<'a, K, V>(&'a BTreeMap<K, V>);

    impl<K: Display, V: Serialize> Serialize for Inner<'_, K, V> {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serde_string_map::serialize(self.0, serializer)
        }
    }

    pub fn serialize<K1, K2, V, S>(
        map: &BTreeMap<K1, BTreeMap<K2, V>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        K1: Display,
        K2: Display,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, inner)| (k.to_string(), Inner(inner))))
    }

    pub fn deserialize<'de, K1, K2, V, D>(
        deserializer: D,
    ) -> Result<BTreeMap<K1, BTreeMap<K2, V>>, D::Error>
    where
        K1: FromStr + Ord,
        K1::Err: Display,
        K2: FromStr + Ord,
        K2::Err: Display,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        BTreeMap::<String, BTreeMap<String, V>>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, inner)| {
                let inner: BTreeMap<K2, V> = inner
                    .into_iter()
                    .map(|(k, v)| Ok((parse_key::<_, D::Error>(&k)?, v)))
                    .collect::<Result<_, D::Error>>()?;
                Ok((parse_key::<_, D::Error>(&k)?, inner))
            })
            .collect()
    }
}

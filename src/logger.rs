use std::collections::btree_map::{self, BTreeMap};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::Error;

/// Key the logger reserves for the severity of every record.
pub const LEVEL_KEY: &str = "level";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Error,
    Debug,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value: plain JSON, or an error that is written as its message.
#[derive(Clone)]
pub enum FieldValue {
    Json(Value),
    Error(Arc<dyn StdError + Send + Sync>),
}

impl FieldValue {
    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        FieldValue::Error(Arc::new(error))
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Json(value) => fmt::Debug::fmt(value, f),
            FieldValue::Error(err) => write!(f, "Error({})", err),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Json(a), FieldValue::Json(b)) => a == b,
            (FieldValue::Error(a), FieldValue::Error(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Json(value) => value.serialize(serializer),
            FieldValue::Error(err) => serializer.collect_str(err),
        }
    }
}

macro_rules! impl_from_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Json(Value::from(value))
                }
            }
        )*
    };
}

impl_from_json!(Value, bool, i32, i64, u32, u64, f64, String, &str);

impl From<Box<dyn StdError + Send + Sync>> for FieldValue {
    fn from(error: Box<dyn StdError + Send + Sync>) -> Self {
        FieldValue::Error(Arc::from(error))
    }
}

/// The key/value pairs of one log record.
///
/// Keys are kept sorted, so a record always encodes the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Inserts any serializable value, failing if it cannot be represented as JSON.
    pub fn try_insert<T>(&mut self, key: impl Into<String>, value: &T) -> Result<(), Error>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        self.0.insert(key.into(), FieldValue::Json(value));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// Adds `global` values for keys the caller did not set, then tags the
    /// record with `level`, replacing any caller or global `level`.
    pub fn merge(mut self, global: &Fields, level: Level) -> Fields {
        for (key, value) in global.iter() {
            self.0
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self.0.insert(LEVEL_KEY.to_string(), level.as_str().into());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A structured logger.
///
/// Implementations merge their global fields into `fields`, tag the record
/// with its level and hand it to their sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, fields: Fields) -> Result<(), Error>;

    fn info(&self, fields: Fields) -> Result<(), Error> {
        self.log(Level::Info, fields)
    }

    fn error(&self, fields: Fields) -> Result<(), Error> {
        self.log(Level::Error, fields)
    }

    fn debug(&self, fields: Fields) -> Result<(), Error> {
        self.log(Level::Debug, fields)
    }
}

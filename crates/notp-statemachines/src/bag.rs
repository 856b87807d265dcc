use std::collections::HashMap;

/// Bag key holding the flow identifier shared by both participants.
pub const FLOW_ID_KEY: &str = "flowid";

/// A typed value stored in a [`Bag`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BagValue {
    FlowId(u64),
    Str(String),
    Bool(bool),
    U64(u64),
    Bytes(Vec<u8>),
    StrList(Vec<String>),
}

impl BagValue {
    /// The flow id, if this is one.
    pub fn as_flow_id(&self) -> Option<u64> {
        match self {
            Self::FlowId(id) => Some(*id),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    /// The bool, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The number, if this is one.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(value) => Some(*value),
            _ => None,
        }
    }

    /// The bytes, if this is a byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// The list, if this is a string list.
    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for BagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for BagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for BagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for BagValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<Vec<u8>> for BagValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<String>> for BagValue {
    fn from(value: Vec<String>) -> Self {
        Self::StrList(value)
    }
}

/// Per-run key/value store shared by the runtime and the host handler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bag {
    values: HashMap<String, BagValue>,
}

impl Bag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&BagValue> {
        self.values.get(key)
    }

    /// Insert or replace `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<BagValue>) -> Option<BagValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder form of [`Bag::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<BagValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<BagValue> {
        self.values.remove(key)
    }

    /// `true` if `key` is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The negotiated flow id, stored under [`FLOW_ID_KEY`].
    pub fn flow_id(&self) -> Option<u64> {
        self.get(FLOW_ID_KEY).and_then(BagValue::as_flow_id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the bag has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BagValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

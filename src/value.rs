//! In-memory form of the game-data payload.
//!
//! The container never looks inside these values; it only carries a
//! [`Table`] between the payload codec and the caller.

use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Table(Table),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _             => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _             => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _               => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Value::Table(t) => Some(t),
            _               => None,
        }
    }
}

impl From<bool>    for Value { fn from(v: bool)    -> Self { Value::Bool(v) } }
impl From<i64>     for Value { fn from(v: i64)     -> Self { Value::Int(v) } }
impl From<i32>     for Value { fn from(v: i32)     -> Self { Value::Int(v.into()) } }
impl From<f64>     for Value { fn from(v: f64)     -> Self { Value::Float(v) } }
impl From<&str>    for Value { fn from(v: &str)    -> Self { Value::Str(v.to_owned()) } }
impl From<String>  for Value { fn from(v: String)  -> Self { Value::Str(v) } }
impl From<Vec<u8>> for Value { fn from(v: Vec<u8>) -> Self { Value::Bytes(v) } }
impl From<Table>   for Value { fn from(v: Table)   -> Self { Value::Table(v) } }

/// Key/value mapping that keeps entries in the order they were inserted.
///
/// Order is kept so that re-encoding an untouched table reproduces the
/// bytes it was decoded from, but equality ignores it. Lookups are linear.
/// Float keys match by bit pattern, so `0.0` and `-0.0` are distinct keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    entries: Vec<(Value, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| same_key(k, key)).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        self.entries.iter_mut().find(|(k, _)| same_key(k, key)).map(|(_, v)| v)
    }

    /// Insert or replace. A replaced entry keeps its position.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| same_key(k, key))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Table::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl IntoIterator for Table {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut t = Table::new();
        t.insert("money", 10);
        t.insert("level", 5);
        assert_eq!(t.insert("money", 99), Some(Value::Int(10)));
        let keys: Vec<_> = t.keys().cloned().collect();
        assert_eq!(keys, vec![Value::from("money"), Value::from("level")]);
        assert_eq!(t.get(&"money".into()).and_then(Value::as_int), Some(99));
    }

    #[test]
    fn remove_and_len() {
        let mut t: Table = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(t.len(), 2);
        assert_eq!(t.remove(&"a".into()), Some(Value::Int(1)));
        assert_eq!(t.remove(&"a".into()), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn non_string_keys() {
        let mut t = Table::new();
        t.insert(1, "one");
        t.insert(true, Value::Nil);
        assert_eq!(t.get(&Value::Int(1)).and_then(Value::as_str), Some("one"));
        assert_eq!(t.get(&Value::Bool(true)), Some(&Value::Nil));
    }

    #[test]
    fn json_export_import() {
        let mut inner = Table::new();
        inner.insert("weapon", "amcar");
        let mut t = Table::new();
        t.insert("slots", Value::List(vec![1.into(), 2.5.into()]));
        t.insert("loadout", inner);
        t.insert(7, Value::Bytes(vec![0, 255]));

        let json = t.to_json().unwrap();
        assert_eq!(Table::from_json(&json).unwrap(), t);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a: Table = [("a", 1), ("b", 2)].into_iter().collect();
        let b: Table = [("b", 2), ("a", 1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(Value::Table(a.clone()), Value::Table(b));

        let c: Table = [("a", 1), ("b", 3)].into_iter().collect();
        assert_ne!(a, c);
        let d: Table = [("a", 1)].into_iter().collect();
        assert_ne!(a, d);
        assert_ne!(d, a);
    }

    #[test]
    fn signed_zero_float_keys_are_distinct() {
        let mut t = Table::new();
        t.insert(0.0, "positive");
        t.insert(-0.0, "negative");
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&Value::Float(0.0)).and_then(Value::as_str), Some("positive"));
        assert_eq!(t.get(&Value::Float(-0.0)).and_then(Value::as_str), Some("negative"));

        assert_eq!(t.remove(&Value::Float(-0.0)), Some(Value::from("negative")));
        assert_eq!(t.len(), 1);
        assert!(t.get(&Value::Float(-0.0)).is_none());
    }
}

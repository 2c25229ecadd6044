// SPDX-License-Identifier: MIT

//! Runtime values

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::error::EvalError;
use super::quantity::Quantity;

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(Arc<str>),
    List(Arc<Vec<Value>>),
    Map(MapValue),
    Quantity(Quantity),
    Semver(Arc<semver::Version>),
}

/// Shared handle to any map implementation
pub type MapValue = Arc<dyn Mapper>;

/// Read-only map access used by the interpreter
///
/// `find` backs indexing and field selection; `contains` backs `in` and
/// `has()`. Implementations may answer `find` for keys they do not contain.
pub trait Mapper: Send + Sync + fmt::Debug {
    fn find(&self, key: &Value) -> Option<Value>;

    fn contains(&self, key: &Value) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in iteration order
    fn keys(&self) -> Vec<Value>;
}

/// Hashable subset of values usable as map keys
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    String(Arc<str>),
}

impl MapKey {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::String(Arc::from(s))
    }
}

/// Plain ordered map
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    entries: BTreeMap<MapKey, Value>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<MapKey>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn into_value(self) -> Value {
        Value::Map(Arc::new(self))
    }
}

impl FromIterator<(MapKey, Value)> for ValueMap {
    fn from_iter<T: IntoIterator<Item = (MapKey, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Mapper for ValueMap {
    fn find(&self, key: &Value) -> Option<Value> {
        MapKey::from_value(key).and_then(|k| self.entries.get(&k).cloned())
    }

    fn contains(&self, key: &Value) -> bool {
        MapKey::from_value(key).is_some_and(|k| self.entries.contains_key(&k))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn keys(&self) -> Vec<Value> {
        self.entries.keys().map(MapKey::to_value).collect()
    }
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Quantity(_) => "kubernetes.Quantity",
            Value::Semver(_) => "kubernetes.Semver",
        }
    }

    /// Size used by the cost model: characters for strings, entries for collections
    pub fn size(&self) -> u64 {
        match self {
            Value::String(s) => s.chars().count() as u64,
            Value::List(items) => items.len() as u64,
            Value::Map(map) => map.len() as u64,
            _ => 1,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Heterogeneous equality: values of unrelated kinds are simply unequal
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Int(a), Value::Double(b)) | (Value::Double(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.keys().iter().all(|k| match (a.find(k), b.contains(k)) {
                        (Some(av), true) => b.find(k).is_some_and(|bv| av.equals(&bv)),
                        _ => false,
                    })
            }
            (Value::Quantity(a), Value::Quantity(b)) => a == b,
            (Value::Semver(a), Value::Semver(b)) => a == b,
            _ => false,
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`
    pub fn compare(&self, other: &Value, function: &str) -> Result<Ordering, EvalError> {
        let ordering = match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Quantity(a), Value::Quantity(b)) => Some(a.cmp(b)),
            (Value::Quantity(a), Value::Int(b)) => Some(a.cmp_int(*b)),
            (Value::Int(a), Value::Quantity(b)) => Some(b.cmp_int(*a).reverse()),
            (Value::Quantity(a), Value::Double(b)) => a.cmp_f64(*b),
            (Value::Double(a), Value::Quantity(b)) => b.cmp_f64(*a).map(Ordering::reverse),
            (Value::Semver(a), Value::Semver(b)) => Some(a.cmp(b)),
            _ => {
                return Err(EvalError::no_such_overload(
                    function,
                    &[self.type_name(), other.type_name()],
                ))
            }
        };
        // NaN never orders; report it the way an unsupported pair is reported
        ordering.ok_or_else(|| {
            EvalError::no_such_overload(function, &[self.type_name(), other.type_name()])
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, key) in map.keys().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    let value = map.find(key).unwrap_or(Value::Null);
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Quantity(q) => write!(f, "quantity({:?})", q.to_string()),
            Value::Semver(v) => write!(f, "semver({:?})", v.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Value::Quantity(q)
    }
}

impl From<semver::Version> for Value {
    fn from(v: semver::Version) -> Self {
        Value::Semver(Arc::new(v))
    }
}

impl From<MapValue> for Value {
    fn from(map: MapValue) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heterogeneous_equality() {
        assert!(Value::Int(1).equals(&Value::Double(1.0)));
        assert!(!Value::string("1").equals(&Value::Int(1)));
        assert!(!Value::Null.equals(&Value::string("A100")));
        assert!(Value::Null.equals(&Value::Null));
    }

    #[test]
    fn test_map_equality() {
        let mut a = ValueMap::new();
        a.insert("x", 1i64);
        let mut b = ValueMap::new();
        b.insert("x", 1i64);
        assert!(a.clone().into_value().equals(&b.into_value()));

        let mut c = ValueMap::new();
        c.insert("x", 2i64);
        assert!(!a.into_value().equals(&c.into_value()));
    }

    #[test]
    fn test_compare_quantity_with_int() {
        let q: Quantity = "16".parse().unwrap();
        let ordering = Value::Quantity(q).compare(&Value::Int(8), "_>_").unwrap();
        assert_eq!(ordering, Ordering::Greater);
    }

    #[test]
    fn test_compare_unsupported_pair() {
        let err = Value::string("a").compare(&Value::Int(1), "_<_").unwrap_err();
        assert_eq!(err, EvalError::no_such_overload("_<_", &["string", "int"]));
    }

    #[test]
    fn test_value_map_lookup() {
        let mut map = ValueMap::new();
        map.insert("model", "A100");
        assert!(map.contains(&Value::string("model")));
        assert!(map.find(&Value::string("missing")).is_none());
        assert!(map.find(&Value::Double(1.0)).is_none());
        assert_eq!(map.keys().len(), 1);
    }

    #[test]
    fn test_display() {
        let list = Value::list(vec![Value::Int(1), Value::string("a")]);
        assert_eq!(list.to_string(), r#"[1, "a"]"#);
    }
}

// SPDX-License-Identifier: MIT

//! Maps with a default value for absent keys

use std::sync::Arc;

use crate::expr::{MapValue, Mapper, Value};

/// Wraps a map so that looking up an absent key yields `default`
///
/// Only lookups are affected. `in` and `has()` still see the real keys, and
/// size and iteration cover only the wrapped entries.
#[derive(Debug)]
pub struct MapWithDefault {
    map: MapValue,
    default: Value,
}

impl MapWithDefault {
    pub fn new(map: MapValue, default: Value) -> Self {
        Self { map, default }
    }

    pub fn into_value(self) -> Value {
        Value::Map(Arc::new(self))
    }
}

impl Mapper for MapWithDefault {
    fn find(&self, key: &Value) -> Option<Value> {
        Some(self.map.find(key).unwrap_or_else(|| self.default.clone()))
    }

    fn contains(&self, key: &Value) -> bool {
        self.map.contains(key)
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn keys(&self) -> Vec<Value> {
        self.map.keys()
    }
}

// SPDX-License-Identifier: MIT

//! Reshape flat device data into per-domain maps
//!
//! A device lists attributes as `domain/id -> value`. Expressions read them
//! as `device.attributes[domain][id]`, so the flat entries are grouped by
//! domain here, with unqualified names landing in the driver's domain.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::device::{Device, DeviceAttribute};
use super::error::{AttributeError, MatchError};
use super::mapper::MapWithDefault;
use crate::expr::{MapKey, Value, ValueMap};

/// Values grouped by domain, then by identifier
#[derive(Debug, Default)]
pub struct DomainMap {
    domains: BTreeMap<String, ValueMap>,
}

impl DomainMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identifier map of one domain, created on first use
    fn get_or_create(&mut self, domain: &str) -> &mut ValueMap {
        self.domains.entry(domain.to_string()).or_default()
    }

    pub fn insert(&mut self, domain: &str, id: &str, value: impl Into<Value>) {
        self.get_or_create(domain).insert(id, value);
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Convert into a map value
    ///
    /// An absent domain yields `absent_domain`; an absent identifier in any
    /// domain yields `null`.
    pub fn into_value(self, absent_domain: &Value) -> Value {
        let domains: ValueMap = self
            .domains
            .into_iter()
            .map(|(domain, ids)| {
                let ids = MapWithDefault::new(Arc::new(ids), Value::Null).into_value();
                (MapKey::from(domain.as_str()), ids)
            })
            .collect();
        MapWithDefault::new(Arc::new(domains), absent_domain.clone()).into_value()
    }
}

/// The native value of the one populated variant
///
/// Variants are tried in the order int, bool, string, version.
pub fn attribute_value(attribute: &DeviceAttribute) -> Result<Value, AttributeError> {
    if let Some(value) = attribute.int {
        return Ok(Value::Int(value));
    }
    if let Some(value) = attribute.bool {
        return Ok(Value::Bool(value));
    }
    if let Some(value) = &attribute.string {
        return Ok(Value::string(value));
    }
    if let Some(text) = &attribute.version {
        let version =
            semver::Version::parse(text).map_err(|e| AttributeError::Version(e.to_string()))?;
        return Ok(Value::from(version));
    }
    Err(AttributeError::Unsupported)
}

/// Group a device's attributes by domain
///
/// Fails on the first malformed attribute, naming it.
pub fn attributes(device: &Device) -> Result<DomainMap, MatchError> {
    let mut map = DomainMap::new();
    for (name, attribute) in &device.attributes {
        let value = attribute_value(attribute).map_err(|source| MatchError::Attribute {
            name: name.to_string(),
            source,
        })?;
        let (domain, id) = name.split(&device.driver);
        map.insert(domain, id, value);
    }
    Ok(map)
}

/// Group a device's capacities by domain
pub fn capacity(device: &Device) -> DomainMap {
    let mut map = DomainMap::new();
    for (name, capacity) in &device.capacity {
        let (domain, id) = name.split(&device.driver);
        map.insert(domain, id, capacity.value.clone());
    }
    map
}

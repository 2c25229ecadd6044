// SPDX-License-Identifier: MIT

//! Device descriptions
//!
//! These mirror the shape devices are published in: a driver name plus
//! attributes and capacities keyed by qualified name.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::expr::Quantity;

/// `domain/identifier`, or a bare `identifier` in the driver's domain
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(domain, identifier)`, using `default_domain` when no domain is given
    pub fn split<'a>(&'a self, default_domain: &'a str) -> (&'a str, &'a str) {
        parse_qualified_name(&self.0, default_domain)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QualifiedName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Split a qualified name on its first `/`
pub fn parse_qualified_name<'a>(name: &'a str, default_domain: &'a str) -> (&'a str, &'a str) {
    match name.split_once('/') {
        Some((domain, id)) => (domain, id),
        None => (default_domain, name),
    }
}

/// One attribute value; exactly one variant is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,

    /// Semantic version text, e.g. `1.2.3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl DeviceAttribute {
    pub fn int_value(value: i64) -> Self {
        Self {
            int: Some(value),
            ..Self::default()
        }
    }

    pub fn bool_value(value: bool) -> Self {
        Self {
            bool: Some(value),
            ..Self::default()
        }
    }

    pub fn string_value(value: impl Into<String>) -> Self {
        Self {
            string: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn version_value(value: impl Into<String>) -> Self {
        Self {
            version: Some(value.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceCapacity {
    /// Resource quantity such as `16Gi` or `4`
    #[schemars(with = "String")]
    pub value: Quantity,
}

impl From<Quantity> for DeviceCapacity {
    fn from(value: Quantity) -> Self {
        Self { value }
    }
}

/// A device to be matched against selector expressions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Device {
    /// Name used when reporting results; not visible to expressions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Driver name; also the domain of unqualified attribute and capacity names
    pub driver: String,

    #[serde(default)]
    pub attributes: BTreeMap<QualifiedName, DeviceAttribute>,

    #[serde(default)]
    pub capacity: BTreeMap<QualifiedName, DeviceCapacity>,
}

impl Device {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<QualifiedName>,
        attribute: DeviceAttribute,
    ) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn with_capacity(mut self, name: impl Into<QualifiedName>, value: Quantity) -> Self {
        self.capacity.insert(name.into(), value.into());
        self
    }

    /// Name for reports, falling back to the driver
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified_name() {
        assert_eq!(
            parse_qualified_name("vendor/tier", "driverX"),
            ("vendor", "tier")
        );
        assert_eq!(parse_qualified_name("tier", "driverX"), ("driverX", "tier"));
        assert_eq!(parse_qualified_name("a/b/c", "driverX"), ("a", "b/c"));
        assert_eq!(parse_qualified_name("/id", "driverX"), ("", "id"));
    }

    #[test]
    fn test_qualified_name_split() {
        let name = QualifiedName::from("gpu.example.com/model");
        assert_eq!(name.split("other"), ("gpu.example.com", "model"));
        assert_eq!(name.to_string(), "gpu.example.com/model");
    }

    #[test]
    fn test_device_yaml_shape() {
        let yaml = r#"
name: gpu-0
driver: gpu.example.com
attributes:
  model:
    string: A100
  vendor.example.com/generation:
    int: 4
  driverVersion:
    version: 1.2.3
capacity:
  memory:
    value: 16Gi
"#;
        let device: Device = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(device.display_name(), "gpu-0");
        assert_eq!(
            device.attributes.get(&QualifiedName::from("model")),
            Some(&DeviceAttribute::string_value("A100"))
        );
        assert_eq!(
            device
                .attributes
                .get(&QualifiedName::from("vendor.example.com/generation")),
            Some(&DeviceAttribute::int_value(4))
        );
        let memory = &device.capacity[&QualifiedName::from("memory")];
        assert_eq!(memory.value, "16Gi".parse().unwrap());
    }

    #[test]
    fn test_device_json_round_trip_keeps_shape() {
        let device = Device::new("gpu.example.com")
            .with_attribute("ecc", DeviceAttribute::bool_value(true))
            .with_capacity("cores", Quantity::from_int(8));
        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["attributes"]["ecc"], serde_json::json!({"bool": true}));
        assert_eq!(json["capacity"]["cores"], serde_json::json!({"value": "8"}));
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_missing_maps_default_to_empty() {
        let device: Device = serde_json::from_str(r#"{"driver": "d"}"#).unwrap();
        assert!(device.attributes.is_empty());
        assert!(device.capacity.is_empty());
        assert_eq!(device.display_name(), "d");
    }
}

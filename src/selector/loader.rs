// SPDX-License-Identifier: MIT

//! Device loader - YAML and JSON file loading
//!
//! A device file holds either one device or a list of devices.

use schemars::schema::RootSchema;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::device::Device;
use super::error::SelectorError;

#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceFile {
    Many(Vec<Device>),
    One(Box<Device>),
}

impl From<DeviceFile> for Vec<Device> {
    fn from(file: DeviceFile) -> Self {
        match file {
            DeviceFile::Many(devices) => devices,
            DeviceFile::One(device) => vec![*device],
        }
    }
}

/// Loads device descriptions from files
pub struct DeviceLoader;

impl DeviceLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load devices from a `.yaml`, `.yml` or `.json` file
    pub fn load_devices<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Device>, SelectorError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let devices = match extension.as_deref() {
            Some("json") => Self::parse_json(&content)?,
            Some("yaml") | Some("yml") => Self::parse_yaml(&content)?,
            _ => return Err(SelectorError::UnsupportedFormat(path.display().to_string())),
        };
        log::debug!("Loaded {} device(s) from {}", devices.len(), path.display());
        Ok(devices)
    }

    /// Parse devices from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Vec<Device>, SelectorError> {
        let file: DeviceFile = serde_yaml::from_str(content)?;
        Ok(file.into())
    }

    /// Parse devices from a JSON string
    pub fn parse_json(content: &str) -> Result<Vec<Device>, SelectorError> {
        let file: DeviceFile = serde_json::from_str(content)?;
        Ok(file.into())
    }

    /// JSON Schema of a single device
    pub fn device_schema() -> RootSchema {
        schemars::schema_for!(Device)
    }
}

impl Default for DeviceLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_device() {
        let yaml = r#"
driver: gpu.example.com
attributes:
  model:
    string: A100
"#;
        let devices = DeviceLoader::parse_yaml(yaml).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].driver, "gpu.example.com");
    }

    #[test]
    fn test_parse_device_list() {
        let json = r#"[
            {"name": "a", "driver": "d", "capacity": {"memory": {"value": "1Gi"}}},
            {"name": "b", "driver": "d", "capacity": {"memory": {"value": 2}}}
        ]"#;
        let devices = DeviceLoader::parse_json(json).unwrap();
        let names: Vec<&str> = devices.iter().map(Device::display_name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_quantity_is_rejected() {
        let json = r#"{"driver": "d", "capacity": {"memory": {"value": "lots"}}}"#;
        assert!(matches!(
            DeviceLoader::parse_json(json),
            Err(SelectorError::Json(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let loader = DeviceLoader::new();
        let path = std::env::temp_dir().join("dra-select-loader-test.txt");
        fs::write(&path, "driver: d").unwrap();
        let err = loader.load_devices(&path).unwrap_err();
        assert!(matches!(err, SelectorError::UnsupportedFormat(_)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_yaml_file() {
        let loader = DeviceLoader::new();
        let path = std::env::temp_dir().join("dra-select-loader-test.yaml");
        fs::write(&path, "- driver: a\n- driver: b\n").unwrap();
        let devices = loader.load_devices(&path).unwrap();
        assert_eq!(devices.len(), 2);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_schema_mentions_device_fields() {
        let schema = serde_json::to_value(DeviceLoader::device_schema()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("driver").is_some());
        assert!(properties.get("attributes").is_some());
        assert!(properties.get("capacity").is_some());
        assert_eq!(schema["required"], serde_json::json!(["driver"]));
    }
}

// SPDX-License-Identifier: MIT

//! The device selection environment
//!
//! Declares the single root variable `device` and the object type behind it.
//! Attribute and capacity maps are declared with size bounds so the cost of
//! any expression over them can be estimated before it runs.

use crate::expr::{
    DeclField, DeclType, EnvOption, EnvSet, ExprError, Library, PlatformVersion, Type,
    VersionedOptions,
};

pub const DEVICE_VAR: &str = "device";
pub const DRIVER_VAR: &str = "driver";
pub const ATTRIBUTES_VAR: &str = "attributes";
pub const CAPACITY_VAR: &str = "capacity";

/// Name of the object type bound to `device`
pub const DEVICE_TYPE_NAME: &str = "kubernetes.DRADevice";

/// Maximum number of attributes and capacities a single device may carry
pub const DEVICE_MAX_ATTRIBUTES_AND_CAPACITIES: u64 = 32;

/// Maximum length of attribute string values, domains and identifiers
pub const DEVICE_ATTRIBUTE_MAX_VALUE_LENGTH: u64 = 64;

/// Maximum length of a driver name (a DNS subdomain label)
pub const DRIVER_NAME_MAX_LENGTH: u64 = 63;

/// Default runtime cost limit of a selector expression
pub const SELECTOR_EXPRESSION_MAX_COST: u64 = 1_000_000;

/// Comprehension iterations between two cancellation checks
pub const CHECK_FREQUENCY: u64 = 100;

/// Version whose environment is used for newly written expressions
pub const DEFAULT_COMPATIBILITY_VERSION: PlatformVersion = PlatformVersion::new(1, 31);

/// Version that introduced the `device` variable
pub const DEVICE_INTRODUCED_VERSION: PlatformVersion = PlatformVersion::new(1, 31);

fn domain_map(value: DeclType) -> DeclType {
    let key = || DeclType::string().with_max_size(DEVICE_ATTRIBUTE_MAX_VALUE_LENGTH);
    DeclType::map(
        key(),
        DeclType::map(key(), value, DEVICE_MAX_ATTRIBUTES_AND_CAPACITIES),
        DEVICE_MAX_ATTRIBUTES_AND_CAPACITIES,
    )
}

/// The declared type of `device`
pub fn device_type() -> DeclType {
    DeclType::object(
        DEVICE_TYPE_NAME,
        [
            DeclField::new(
                DRIVER_VAR,
                DeclType::string().with_max_size(DRIVER_NAME_MAX_LENGTH),
                true,
            ),
            DeclField::new(
                ATTRIBUTES_VAR,
                domain_map(
                    DeclType::scalar(Type::Dyn).with_max_size(DEVICE_ATTRIBUTE_MAX_VALUE_LENGTH),
                ),
                true,
            ),
            DeclField::new(CAPACITY_VAR, domain_map(DeclType::quantity()), true),
        ],
    )
}

/// Environment entries added on top of the language core
pub fn device_options() -> Vec<VersionedOptions> {
    vec![VersionedOptions {
        introduced_version: DEVICE_INTRODUCED_VERSION,
        options: vec![
            EnvOption::variable(DEVICE_VAR, device_type()),
            EnvOption::Library(Library::Semver),
            // cel.bind(dra, device.attributes["dra.example.com"], dra.a && dra.b)
            EnvOption::Library(Library::Bindings),
        ],
        decl_types: vec![device_type()],
    }]
}

/// Build the device selection environments for a compatibility version
pub fn build_env(compatibility_version: PlatformVersion) -> Result<EnvSet, ExprError> {
    EnvSet::base(compatibility_version).extend(device_options())
}

/// Build the default environments
///
/// # Panics
///
/// The declarations are static, so a failure here is a programming error and
/// there is nothing a caller could do about it.
pub(crate) fn must_build_env() -> EnvSet {
    match build_env(DEFAULT_COMPATIBILITY_VERSION) {
        Ok(envset) => envset,
        Err(err) => panic!("internal error building expression environment: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::EnvType;

    #[test]
    fn test_device_variable_declared_from_1_31() {
        let envset = must_build_env();

        let current = envset.env(EnvType::NewExpressions).unwrap();
        assert_eq!(
            current.variable(DEVICE_VAR).map(DeclType::cel_type),
            Some(Type::Object(DEVICE_TYPE_NAME.to_string()))
        );
        assert!(current.has_library(Library::Bindings));
        assert!(current.has_library(Library::Semver));

        let older = envset
            .env(EnvType::Version(PlatformVersion::new(1, 30)))
            .unwrap();
        assert!(older.variable(DEVICE_VAR).is_none());
        assert!(!older.has_library(Library::Bindings));
        assert!(older.has_library(Library::Quantity));
    }

    #[test]
    fn test_device_fields() {
        let device = device_type();
        let attributes = device.field(ATTRIBUTES_VAR).unwrap();
        assert_eq!(
            attributes.decl.cel_type(),
            Type::map(Type::String, Type::map(Type::String, Type::Dyn))
        );
        assert_eq!(
            attributes.decl.max_size,
            Some(DEVICE_MAX_ATTRIBUTES_AND_CAPACITIES)
        );
        assert_eq!(
            device.field(CAPACITY_VAR).map(|f| f.decl.cel_type()),
            Some(Type::map(Type::String, Type::map(Type::String, Type::Quantity)))
        );
        assert!(device.field(DRIVER_VAR).is_some_and(|f| f.required));
    }

    #[test]
    fn test_older_compatibility_version() {
        let envset = build_env(PlatformVersion::new(1, 30)).unwrap();
        let new = envset.env(EnvType::NewExpressions).unwrap();
        assert!(new.variable(DEVICE_VAR).is_none());
        let stored = envset.env(EnvType::StoredExpressions).unwrap();
        assert!(stored.variable(DEVICE_VAR).is_some());
    }
}

// SPDX-License-Identifier: MIT

//! Device selection
//!
//! Compiles selector expressions such as
//! - `device.driver == "gpu.example.com"`
//! - `device.attributes["gpu.example.com"].model == "A100"`
//! - `device.capacity[device.driver].memory.compareTo(quantity("16Gi")) >= 0`
//!
//! and decides, per device, whether the device satisfies them.

mod compiler;
mod config;
mod device;
mod engine;
mod environment;
mod error;
mod loader;
mod mapper;
mod matcher;
mod normalize;

pub use compiler::{compile_with, compiler, CompilationResult, Compiler, Options};
pub use config::{SelectorConfig, COST_LIMIT_VAR, ENV_TYPE_VAR, TIMEOUT_MS_VAR};
pub use device::{parse_qualified_name, Device, DeviceAttribute, DeviceCapacity, QualifiedName};
pub use engine::{Engine, Runnable};
pub use environment::{
    build_env, device_options, device_type, ATTRIBUTES_VAR, CAPACITY_VAR, CHECK_FREQUENCY,
    DEFAULT_COMPATIBILITY_VERSION, DEVICE_ATTRIBUTE_MAX_VALUE_LENGTH, DEVICE_INTRODUCED_VERSION,
    DEVICE_MAX_ATTRIBUTES_AND_CAPACITIES, DEVICE_TYPE_NAME, DEVICE_VAR, DRIVER_NAME_MAX_LENGTH,
    DRIVER_VAR, SELECTOR_EXPRESSION_MAX_COST,
};
pub use error::{AttributeError, CompileError, ErrorKind, MatchError, SelectorError};
pub use loader::DeviceLoader;
pub use mapper::MapWithDefault;
pub use matcher::Match;
pub use normalize::{attribute_value, DomainMap};

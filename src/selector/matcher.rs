// SPDX-License-Identifier: MIT

//! Evaluate a compiled expression against one device

use super::compiler::CompilationResult;
use super::device::Device;
use super::engine::Runnable;
use super::environment::{ATTRIBUTES_VAR, CAPACITY_VAR, DEVICE_VAR, DRIVER_VAR};
use super::error::{CompileError, MatchError};
use super::normalize;
use crate::expr::{EvalContext, EvalDetails, MapActivation, Value, ValueMap};

/// A successful match decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub matched: bool,
    pub details: EvalDetails,
}

impl CompilationResult {
    /// Decide whether `device` satisfies the expression
    ///
    /// An error means the decision could not be made. It is not the same as
    /// "does not match", and it says nothing about other devices.
    pub fn device_matches(&self, ctx: &EvalContext, device: &Device) -> Result<Match, MatchError> {
        if let Some(err) = &self.error {
            return Err(MatchError::Compile(err.clone()));
        }
        let program = self.program.as_ref().ok_or_else(|| {
            CompileError::internal(self.expression.as_str(), "no program was compiled")
        })?;

        let attributes = normalize::attributes(device)?.into_value(&self.empty_map);
        let capacity = normalize::capacity(device).into_value(&self.empty_map);

        let mut binding = ValueMap::new();
        binding.insert(DRIVER_VAR, device.driver.as_str());
        binding.insert(ATTRIBUTES_VAR, attributes);
        binding.insert(CAPACITY_VAR, capacity);
        let activation = MapActivation::new().with(DEVICE_VAR, binding.into_value());

        let evaluation = program.run(&activation, ctx);
        let details = evaluation.details;
        log::debug!(
            "Evaluated {:?} for device {}: cost {}",
            self.expression,
            device.display_name(),
            details.actual_cost
        );

        match evaluation.result {
            Ok(Value::Bool(matched)) => Ok(Match { matched, details }),
            Ok(other) => Err(MatchError::NotBool {
                type_name: other.type_name().to_string(),
                details,
            }),
            Err(source) => Err(MatchError::Eval { source, details }),
        }
    }
}

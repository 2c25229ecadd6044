// SPDX-License-Identifier: MIT

//! Compilation of selector expressions
//!
//! A [`Compiler`] owns the versioned environments; [`compiler()`] returns the
//! process-wide instance, built on first use. Compiling never panics and
//! never returns a bare error: every outcome is a [`CompilationResult`].

use once_cell::sync::Lazy;
use std::sync::Arc;

use super::engine::{Engine, Runnable};
use super::environment::{must_build_env, CHECK_FREQUENCY, SELECTOR_EXPRESSION_MAX_COST};
use super::error::CompileError;
use super::mapper::MapWithDefault;
use crate::expr::{EnvSet, EnvType, ProgramOptions, Type, Value};

static COMPILER: Lazy<Compiler> = Lazy::new(Compiler::new);

/// The shared compiler, built exactly once
pub fn compiler() -> &'static Compiler {
    &COMPILER
}

/// Optional overrides for [`Compiler::compile`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Environment to compile against; defaults to [`EnvType::StoredExpressions`]
    pub env_type: Option<EnvType>,

    /// Runtime cost limit; defaults to [`SELECTOR_EXPRESSION_MAX_COST`]
    pub cost_limit: Option<u64>,
}

/// A compiled expression, or the reason it could not be compiled
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub program: Option<Arc<dyn Runnable>>,
    pub error: Option<CompileError>,
    pub expression: String,
    pub output_type: Option<Type>,
    pub environment: Option<Arc<dyn Engine>>,
    /// Worst-case cost in cost units, under the environment's declared bounds
    pub max_cost: u64,

    /// Lookup result for a domain the device does not have
    pub(crate) empty_map: Value,
}

impl CompilationResult {
    fn failed(expression: &str, error: CompileError) -> Self {
        Self {
            program: None,
            error: Some(error),
            expression: expression.to_string(),
            output_type: None,
            environment: None,
            max_cost: 0,
            empty_map: Value::Null,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.program.is_some()
    }

    pub fn error(&self) -> Option<&CompileError> {
        self.error.as_ref()
    }
}

pub struct Compiler {
    envset: EnvSet,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_env_set(must_build_env())
    }

    /// Compiler over a caller-built set of environments
    pub fn with_env_set(envset: EnvSet) -> Self {
        Self { envset }
    }

    pub fn env_set(&self) -> &EnvSet {
        &self.envset
    }

    /// Compile an expression that must evaluate to bool
    pub fn compile(&self, expression: &str, options: &Options) -> CompilationResult {
        let env_type = options.env_type.unwrap_or_default();
        match self.envset.env(env_type) {
            Ok(env) => compile_with(env, expression, options),
            Err(err) => {
                let result = CompilationResult::failed(
                    expression,
                    CompileError::internal(
                        expression,
                        format!("unexpected error loading expression environment: {}", err),
                    ),
                );
                log_outcome(&result);
                result
            }
        }
    }
}

/// Compile against a caller-supplied engine
///
/// `options.env_type` is ignored: the engine already is the environment.
pub fn compile_with(
    engine: Arc<dyn Engine>,
    expression: &str,
    options: &Options,
) -> CompilationResult {
    let result = compile_inner(engine, expression, options);
    log_outcome(&result);
    result
}

fn log_outcome(result: &CompilationResult) {
    match &result.error {
        Some(err) if err.is_internal() => {
            log::error!("Compiling {:?} failed: {}", result.expression, err)
        }
        Some(err) => log::debug!("Rejected {:?}: {}", result.expression, err),
        None => log::debug!(
            "Compiled {:?}: output type {}, max cost {}",
            result.expression,
            result.output_type.as_ref().unwrap_or(&Type::Dyn),
            result.max_cost
        ),
    }
}

fn compile_inner(engine: Arc<dyn Engine>, expression: &str, options: &Options) -> CompilationResult {
    let ast = match engine.check(expression) {
        Ok(ast) => ast,
        Err(issues) => {
            return CompilationResult::failed(
                expression,
                CompileError::invalid(expression, format!("compilation failed: {}", issues)),
            )
        }
    };

    let output_type = ast.output_type();
    if output_type != Type::Bool && output_type != Type::Dyn {
        return CompilationResult::failed(
            expression,
            CompileError::invalid(
                expression,
                format!(
                    "must evaluate to {} or the unknown type, not {}",
                    Type::Bool,
                    output_type
                ),
            ),
        );
    }

    let program_options = ProgramOptions {
        cost_limit: Some(options.cost_limit.unwrap_or(SELECTOR_EXPRESSION_MAX_COST)),
        interrupt_check_frequency: CHECK_FREQUENCY,
    };
    let program = match engine.instantiate(&ast, program_options) {
        Ok(program) => program,
        Err(err) => {
            return CompilationResult::failed(
                expression,
                CompileError::internal(expression, format!("program instantiation failed: {}", err)),
            )
        }
    };

    let empty_map = MapWithDefault::new(engine.empty_map(), Value::Null).into_value();
    let estimate = engine.estimate_cost(&ast);
    let mut result = CompilationResult {
        program: Some(program),
        error: None,
        expression: expression.to_string(),
        output_type: Some(output_type),
        environment: Some(engine),
        max_cost: 0,
        empty_map,
    };

    match estimate {
        Ok(cost) => result.max_cost = cost.max,
        Err(err) => {
            // the program stays attached; the error marks it unusable
            result.error = Some(CompileError::internal(
                expression,
                format!("cost estimation failed: {}", err),
            ));
        }
    }
    result
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{
        Ast, CostEstimate, Env, EvalContext, ExprError, Issues, MapValue, PlatformVersion,
    };
    use crate::selector::device::Device;
    use crate::selector::error::{ErrorKind, MatchError};

    /// Built-in environment with one stage made to fail
    #[derive(Debug)]
    struct Faulty {
        env: Arc<Env>,
        fail_instantiate: bool,
    }

    impl Faulty {
        fn new(fail_instantiate: bool) -> Arc<dyn Engine> {
            let env = compiler()
                .env_set()
                .env(EnvType::StoredExpressions)
                .unwrap();
            Arc::new(Self {
                env,
                fail_instantiate,
            })
        }
    }

    impl Engine for Faulty {
        fn check(&self, text: &str) -> Result<Ast, Issues> {
            self.env.check(text)
        }

        fn instantiate(
            &self,
            ast: &Ast,
            options: ProgramOptions,
        ) -> Result<Arc<dyn Runnable>, ExprError> {
            if self.fail_instantiate {
                return Err(ExprError::Program("no backend".into()));
            }
            self.env.instantiate(ast, options)
        }

        fn estimate_cost(&self, _ast: &Ast) -> Result<CostEstimate, ExprError> {
            Err(ExprError::Cost("no size bounds".into()))
        }

        fn empty_map(&self) -> MapValue {
            Engine::empty_map(self.env.as_ref())
        }
    }

    fn compile(expression: &str) -> CompilationResult {
        compiler().compile(expression, &Options::default())
    }

    #[test]
    fn test_compile_bool_expression() {
        let result = compile(r#"device.driver == "gpu.example.com""#);
        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.output_type, Some(Type::Bool));
        assert!(result.max_cost > 0);
        assert_eq!(
            result.program.as_ref().and_then(|p| p.cost_limit()),
            Some(SELECTOR_EXPRESSION_MAX_COST)
        );
    }

    #[test]
    fn test_dyn_output_is_accepted() {
        let result = compile(r#"device.attributes["gpu.example.com"]["ecc"]"#);
        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.output_type, Some(Type::Dyn));
    }

    #[test]
    fn test_wrong_output_type_is_invalid() {
        let result = compile("device.driver");
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Invalid);
        assert_eq!(
            err.detail,
            "must evaluate to bool or the unknown type, not string"
        );
        assert!(result.program.is_none());
    }

    #[test]
    fn test_syntax_error_is_invalid() {
        let result = compile("device.driver ==");
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Invalid);
        assert!(err.detail.starts_with("compilation failed: ERROR: <input>:1:"));
        assert_eq!(err.expression, "device.driver ==");
    }

    #[test]
    fn test_unknown_field_is_invalid() {
        let result = compile("device.vendor == 'x'");
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Invalid);
        assert!(err.detail.contains("undefined field 'vendor'"));
    }

    #[test]
    fn test_cost_limit_override() {
        let options = Options {
            cost_limit: Some(5),
            ..Options::default()
        };
        let result = compiler().compile("device.driver == 'x'", &options);
        assert_eq!(
            result.program.as_ref().and_then(|p| p.cost_limit()),
            Some(5)
        );
    }

    #[test]
    fn test_older_environment_rejects_device() {
        let options = Options {
            env_type: Some(EnvType::Version(PlatformVersion::new(1, 30))),
            ..Options::default()
        };
        let result = compiler().compile("device.driver == 'x'", &options);
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Invalid);
        assert!(err.detail.contains("undeclared reference to 'device'"));
    }

    #[test]
    fn test_bindings_and_semver_available() {
        let result = compile(
            r#"cel.bind(dra, device.attributes["dra.example.com"], dra.driverVersion.isGreaterThan(semver("1.0.0")))"#,
        );
        assert!(result.is_ok(), "{:?}", result.error);
    }

    #[test]
    fn test_uncosted_program_is_unusable() {
        let result = compile_with(Faulty::new(false), "device.driver == 'd'", &Options::default());
        assert!(result.program.is_some());
        assert!(!result.is_ok());
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.detail.starts_with("cost estimation failed: "));

        let outcome = result.device_matches(&EvalContext::background(), &Device::new("d"));
        assert!(matches!(outcome, Err(MatchError::Compile(_))));
    }

    #[test]
    fn test_instantiation_failure_is_internal() {
        let result = compile_with(Faulty::new(true), "device.driver == 'd'", &Options::default());
        assert!(result.program.is_none());
        let err = result.error().unwrap();
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.detail, "program instantiation failed: program error: no backend");
    }

    #[test]
    fn test_injected_engine_still_checks_output_type() {
        let result = compile_with(Faulty::new(true), "device.driver", &Options::default());
        assert_eq!(result.error().map(|e| e.kind), Some(ErrorKind::Invalid));
    }

    #[test]
    fn test_compiler_is_shared() {
        assert!(std::ptr::eq(compiler(), compiler()));
    }

    #[test]
    fn test_same_text_same_result() {
        let text = r#"device.capacity[device.driver].exists(k, device.capacity[device.driver][k] > 1)"#;
        let a = compile(text);
        let b = compile(text);
        assert_eq!(a.output_type, b.output_type);
        assert_eq!(a.max_cost, b.max_cost);
    }
}

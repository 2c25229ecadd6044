// SPDX-License-Identifier: MIT

//! Versioned compilation environments
//!
//! An [`Env`] declares which variables, object types and libraries an
//! expression may use. An [`EnvSet`] accumulates [`VersionedOptions`] keyed by
//! the platform version that introduced them, so an environment can be built
//! for any version: every entry introduced at or before that version applies.

use once_cell::sync::OnceCell;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::ast::Ast;
use super::checker;
use super::cost::{self, CostEstimate};
use super::error::{ExprError, Issues};
use super::interpreter::{Program, ProgramOptions};
use super::library::{FunctionDecl, Library};
use super::parser::{self, ParserOptions};
use super::types::{DeclKind, DeclType};
use super::value::{MapValue, ValueMap};

/// A `major.minor` platform version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformVersion {
    pub major: u32,
    pub minor: u32,
}

impl PlatformVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PlatformVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("expected <major>.<minor>, got '{}'", s))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid major version '{}'", major))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid minor version '{}'", minor))?;
        Ok(Self { major, minor })
    }
}

/// Which environment of an [`EnvSet`] to compile against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvType {
    /// Environment at the compatibility version, for newly written expressions
    NewExpressions,
    /// Every declared option, for expressions that were already persisted
    #[default]
    StoredExpressions,
    /// Environment as of an explicit platform version
    Version(PlatformVersion),
}

impl FromStr for EnvType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "newexpressions" => Ok(EnvType::NewExpressions),
            "stored" | "storedexpressions" => Ok(EnvType::StoredExpressions),
            other => other.parse().map(EnvType::Version),
        }
    }
}

/// One environment option
#[derive(Debug, Clone, PartialEq)]
pub enum EnvOption {
    Variable { name: String, decl: DeclType },
    Library(Library),
}

impl EnvOption {
    pub fn variable(name: impl Into<String>, decl: DeclType) -> Self {
        EnvOption::Variable {
            name: name.into(),
            decl,
        }
    }
}

/// Options and type declarations introduced at one platform version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedOptions {
    pub introduced_version: PlatformVersion,
    pub options: Vec<EnvOption>,
    pub decl_types: Vec<DeclType>,
}

/// The language core shared by every environment
pub fn base_options() -> Vec<VersionedOptions> {
    vec![
        VersionedOptions {
            introduced_version: PlatformVersion::new(1, 0),
            options: vec![
                EnvOption::Library(Library::Core),
                EnvOption::Library(Library::Strings),
            ],
            decl_types: Vec::new(),
        },
        VersionedOptions {
            introduced_version: PlatformVersion::new(1, 29),
            options: vec![EnvOption::Library(Library::Quantity)],
            decl_types: Vec::new(),
        },
    ]
}

/// An immutable compilation environment
#[derive(Debug)]
pub struct Env {
    variables: BTreeMap<String, DeclType>,
    decl_types: BTreeMap<String, DeclType>,
    functions: BTreeMap<&'static str, FunctionDecl>,
    libraries: BTreeSet<Library>,
}

impl Env {
    /// Build from the given entries, skipping those introduced after `version`
    pub fn build(
        entries: &[VersionedOptions],
        version: Option<PlatformVersion>,
    ) -> Result<Self, ExprError> {
        let mut env = Env {
            variables: BTreeMap::new(),
            decl_types: BTreeMap::new(),
            functions: BTreeMap::new(),
            libraries: BTreeSet::new(),
        };

        let applicable = entries
            .iter()
            .filter(|e| version.map_or(true, |v| e.introduced_version <= v));
        for entry in applicable {
            for decl in &entry.decl_types {
                env.add_decl_type(decl)?;
            }
            for option in &entry.options {
                match option {
                    EnvOption::Variable { name, decl } => env.add_variable(name, decl)?,
                    EnvOption::Library(lib) => env.add_library(*lib),
                }
            }
        }
        Ok(env)
    }

    fn add_decl_type(&mut self, decl: &DeclType) -> Result<(), ExprError> {
        let name = decl.object_name().ok_or_else(|| {
            ExprError::Environment("only object types can be declared by name".to_string())
        })?;
        match self.decl_types.get(name) {
            Some(existing) if existing != decl => Err(ExprError::Environment(format!(
                "type '{}' declared twice with different definitions",
                name
            ))),
            _ => {
                self.decl_types.insert(name.to_string(), decl.clone());
                Ok(())
            }
        }
    }

    fn add_variable(&mut self, name: &str, decl: &DeclType) -> Result<(), ExprError> {
        if self.variables.contains_key(name) {
            return Err(ExprError::Environment(format!(
                "variable '{}' declared twice",
                name
            )));
        }
        self.require_declared(decl)?;
        self.variables.insert(name.to_string(), decl.clone());
        Ok(())
    }

    fn require_declared(&self, decl: &DeclType) -> Result<(), ExprError> {
        match &decl.kind {
            DeclKind::Object { name, .. } if !self.decl_types.contains_key(name) => Err(
                ExprError::Environment(format!("undeclared object type '{}'", name)),
            ),
            DeclKind::Object { fields, .. } => fields
                .values()
                .try_for_each(|f| self.require_declared(&f.decl)),
            DeclKind::List(elem) => self.require_declared(elem),
            DeclKind::Map { key, value } => {
                self.require_declared(key)?;
                self.require_declared(value)
            }
            DeclKind::Scalar(_) => Ok(()),
        }
    }

    fn add_library(&mut self, lib: Library) {
        if !self.libraries.insert(lib) {
            return;
        }
        for decl in lib.functions() {
            match self.functions.entry(decl.name) {
                Entry::Occupied(mut existing) => existing.get_mut().overloads.extend(decl.overloads),
                Entry::Vacant(slot) => {
                    slot.insert(decl);
                }
            }
        }
    }

    pub fn variable(&self, name: &str) -> Option<&DeclType> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&String, &DeclType)> {
        self.variables.iter()
    }

    pub fn decl_type(&self, name: &str) -> Option<&DeclType> {
        self.decl_types.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    pub fn has_library(&self, lib: Library) -> bool {
        self.libraries.contains(&lib)
    }

    /// Parse and type-check an expression
    pub fn compile(&self, source: &str) -> Result<Ast, Issues> {
        let options = ParserOptions {
            bindings: self.has_library(Library::Bindings),
        };
        let root = parser::parse(source, options)?;
        let types = checker::check(&root, self, source)?;
        Ok(Ast::new(source.to_string(), root, types))
    }

    /// Instantiate an executable program from a checked expression
    pub fn program(&self, ast: &Ast, options: ProgramOptions) -> Result<Program, ExprError> {
        Program::new(Arc::new(ast.clone()), options)
    }

    /// Worst-case cost of evaluating the expression under the declared bounds
    pub fn estimate_cost(&self, ast: &Ast) -> Result<CostEstimate, ExprError> {
        cost::estimate(ast, self)
    }

    /// An empty map, shared as the default for absent map entries
    pub fn empty_map(&self) -> MapValue {
        Arc::new(ValueMap::new())
    }
}

/// All environments of one schema, across platform versions
#[derive(Debug)]
pub struct EnvSet {
    compatibility_version: PlatformVersion,
    entries: Vec<VersionedOptions>,
    new_env: OnceCell<Arc<Env>>,
    stored_env: OnceCell<Arc<Env>>,
}

impl EnvSet {
    pub fn new(compatibility_version: PlatformVersion, entries: Vec<VersionedOptions>) -> Self {
        Self {
            compatibility_version,
            entries,
            new_env: OnceCell::new(),
            stored_env: OnceCell::new(),
        }
    }

    /// Set containing only the language core
    pub fn base(compatibility_version: PlatformVersion) -> Self {
        Self::new(compatibility_version, base_options())
    }

    /// Add more versioned entries, validating that they build
    pub fn extend(&self, entries: Vec<VersionedOptions>) -> Result<EnvSet, ExprError> {
        let mut all = self.entries.clone();
        all.extend(entries);
        let extended = EnvSet::new(self.compatibility_version, all);
        extended.env(EnvType::StoredExpressions)?;
        extended.env(EnvType::NewExpressions)?;
        Ok(extended)
    }

    pub fn compatibility_version(&self) -> PlatformVersion {
        self.compatibility_version
    }

    /// Newest version that introduced any option
    pub fn latest_version(&self) -> Option<PlatformVersion> {
        self.entries.iter().map(|e| e.introduced_version).max()
    }

    /// The environment for the requested type, built once per type
    pub fn env(&self, env_type: EnvType) -> Result<Arc<Env>, ExprError> {
        match env_type {
            EnvType::NewExpressions => self
                .new_env
                .get_or_try_init(|| {
                    Env::build(&self.entries, Some(self.compatibility_version)).map(Arc::new)
                })
                .cloned(),
            EnvType::StoredExpressions => self
                .stored_env
                .get_or_try_init(|| Env::build(&self.entries, None).map(Arc::new))
                .cloned(),
            EnvType::Version(version) => Env::build(&self.entries, Some(version)).map(Arc::new),
        }
    }
}

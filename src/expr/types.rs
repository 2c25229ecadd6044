// SPDX-License-Identifier: MIT

//! Static types and size-bounded type declarations
//!
//! [`Type`] is what the checker assigns to every node. [`DeclType`] is what
//! an environment declares for its variables: the same shape, plus upper
//! bounds on string length and collection size that feed cost estimation.

use std::collections::BTreeMap;
use std::fmt;

/// Static type of an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Int,
    Double,
    String,
    /// The dynamic type; checked at runtime
    Dyn,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// Declared object type, by name
    Object(String),
    Quantity,
    Semver,
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn is_dyn(&self) -> bool {
        matches!(self, Type::Dyn)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// Whether values of the two types may meet at runtime
    pub fn is_compatible(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::Null, _) | (_, Type::Null) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Type::List(a), Type::List(b)) => a.is_compatible(b),
            (Type::Map(ak, av), Type::Map(bk, bv)) => ak.is_compatible(bk) && av.is_compatible(bv),
            (a, b) => a == b,
        }
    }

    /// Least common type of two branches, falling back to `dyn`
    pub fn join(&self, other: &Type) -> Type {
        if self == other {
            self.clone()
        } else if *self == Type::Null {
            other.clone()
        } else if *other == Type::Null {
            self.clone()
        } else {
            Type::Dyn
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => write!(f, "null_type"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Dyn => write!(f, "dyn"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(key, value) => write!(f, "map({}, {})", key, value),
            Type::Object(name) => write!(f, "{}", name),
            Type::Quantity => write!(f, "kubernetes.Quantity"),
            Type::Semver => write!(f, "kubernetes.Semver"),
        }
    }
}

/// Shape of a declared type
#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Scalar(Type),
    List(Box<DeclType>),
    Map {
        key: Box<DeclType>,
        value: Box<DeclType>,
    },
    Object {
        name: String,
        fields: BTreeMap<String, DeclField>,
    },
}

/// A declared type with an optional size bound
///
/// For strings (and `dyn` values that may be strings) the bound is a length
/// in characters; for lists and maps it is the number of entries.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclType {
    pub kind: DeclKind,
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclField {
    pub name: String,
    pub decl: DeclType,
    pub required: bool,
}

impl DeclField {
    pub fn new(name: impl Into<String>, decl: DeclType, required: bool) -> Self {
        Self {
            name: name.into(),
            decl,
            required,
        }
    }
}

impl DeclType {
    pub fn scalar(ty: Type) -> Self {
        Self {
            kind: DeclKind::Scalar(ty),
            max_size: None,
        }
    }

    pub fn string() -> Self {
        Self::scalar(Type::String)
    }

    pub fn dyn_type() -> Self {
        Self::scalar(Type::Dyn)
    }

    pub fn quantity() -> Self {
        Self::scalar(Type::Quantity)
    }

    pub fn list(elem: DeclType, max_size: u64) -> Self {
        Self {
            kind: DeclKind::List(Box::new(elem)),
            max_size: Some(max_size),
        }
    }

    pub fn map(key: DeclType, value: DeclType, max_size: u64) -> Self {
        Self {
            kind: DeclKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
            max_size: Some(max_size),
        }
    }

    pub fn object(name: impl Into<String>, fields: impl IntoIterator<Item = DeclField>) -> Self {
        Self {
            kind: DeclKind::Object {
                name: name.into(),
                fields: fields.into_iter().map(|f| (f.name.clone(), f)).collect(),
            },
            max_size: None,
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Object type name, if this declares an object
    pub fn object_name(&self) -> Option<&str> {
        match &self.kind {
            DeclKind::Object { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DeclField> {
        match &self.kind {
            DeclKind::Object { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    /// The checker-level type of this declaration
    pub fn cel_type(&self) -> Type {
        match &self.kind {
            DeclKind::Scalar(ty) => ty.clone(),
            DeclKind::List(elem) => Type::list(elem.cel_type()),
            DeclKind::Map { key, value } => Type::map(key.cel_type(), value.cel_type()),
            DeclKind::Object { name, .. } => Type::Object(name.clone()),
        }
    }

    /// Declaration of the values produced by indexing or iterating
    pub fn element(&self) -> Option<&DeclType> {
        match &self.kind {
            DeclKind::List(elem) => Some(elem),
            DeclKind::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Declaration of the map keys (the comprehension variable for maps)
    pub fn key(&self) -> Option<&DeclType> {
        match &self.kind {
            DeclKind::Map { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(Type::map(Type::String, Type::Dyn).to_string(), "map(string, dyn)");
        assert_eq!(Type::list(Type::Int).to_string(), "list(int)");
        assert_eq!(Type::Object("dra.Device".into()).to_string(), "dra.Device");
    }

    #[test]
    fn test_compatibility() {
        assert!(Type::Int.is_compatible(&Type::Double));
        assert!(Type::Dyn.is_compatible(&Type::String));
        assert!(Type::Null.is_compatible(&Type::Quantity));
        assert!(!Type::String.is_compatible(&Type::Int));
        assert!(Type::list(Type::Dyn).is_compatible(&Type::list(Type::Int)));
        assert!(!Type::list(Type::String).is_compatible(&Type::list(Type::Bool)));
    }

    #[test]
    fn test_join() {
        assert_eq!(Type::Int.join(&Type::Int), Type::Int);
        assert_eq!(Type::Null.join(&Type::String), Type::String);
        assert_eq!(Type::Int.join(&Type::String), Type::Dyn);
    }

    #[test]
    fn test_decl_cel_type() {
        let decl = DeclType::map(
            DeclType::string(),
            DeclType::map(DeclType::string(), DeclType::dyn_type(), 8),
            8,
        );
        assert_eq!(
            decl.cel_type(),
            Type::map(Type::String, Type::map(Type::String, Type::Dyn))
        );
        assert_eq!(decl.max_size, Some(8));
        assert_eq!(decl.element().and_then(|e| e.max_size), Some(8));
    }

    #[test]
    fn test_object_fields() {
        let decl = DeclType::object(
            "test.Object",
            [DeclField::new("name", DeclType::string(), true)],
        );
        assert_eq!(decl.object_name(), Some("test.Object"));
        assert!(decl.field("name").is_some_and(|f| f.required));
        assert!(decl.field("missing").is_none());
    }
}

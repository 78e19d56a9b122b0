//! Type model for grasp
//!
//! The capture engine never infers types. It only needs to know the declared
//! fields of aggregates (to expand `+self.*`) and the declared types of the
//! outer bindings a closure may name. Both are supplied by the host through
//! the types in this crate.

pub mod table;

pub use table::{FieldProvider, HostContext, StructDef, TypeTable};

use std::fmt;

/// A declared type, as written by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Nominal type with optional generic arguments (`Vec<u8>`, `Counter`)
    Named { name: String, args: Vec<Type> },
    /// Reference type (`&T`, `&mut T`)
    Ref { mutable: bool, inner: Box<Type> },
    /// Tuple type; the empty tuple is unit
    Tuple(Vec<Type>),
}

impl Type {
    /// A named type without generic arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Type::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn reference(inner: Type) -> Self {
        Type::Ref {
            mutable: false,
            inner: Box::new(inner),
        }
    }

    pub fn unit() -> Self {
        Type::Tuple(Vec::new())
    }

    /// The type with every layer of reference removed.
    pub fn peel_refs(&self) -> &Type {
        let mut ty = self;
        while let Type::Ref { inner, .. } = ty {
            ty = inner;
        }
        ty
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Ref { .. })
    }

    /// Name of the nominal type behind any references.
    pub fn nominal_name(&self) -> Option<&str> {
        match self.peel_refs() {
            Type::Named { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Type::Ref { mutable, inner } => {
                if *mutable {
                    write!(f, "&mut {}", inner)
                } else {
                    write!(f, "&{}", inner)
                }
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem)?;
                }
                if elems.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A declared field of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

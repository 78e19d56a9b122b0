//! Field metadata and host context.

use crate::{FieldInfo, Type};
use std::collections::{BTreeMap, BTreeSet};

/// Field-level type information supplied by the host.
///
/// Implementations are shared read-only between closures processed in
/// parallel, hence the `Send + Sync` bound.
pub trait FieldProvider: Send + Sync {
    /// Declared fields of an aggregate type, in declaration order, looking
    /// through references. `None` when `ty` is not an aggregate the provider
    /// knows about.
    fn enumerate_fields(&self, ty: &Type) -> Option<Vec<FieldInfo>>;

    /// Declared type of one field.
    fn field_type(&self, ty: &Type, field: &str) -> Option<Type> {
        self.enumerate_fields(ty)?
            .into_iter()
            .find(|f| f.name == field)
            .map(|f| f.ty)
    }
}

/// A struct declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldInfo>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Struct declarations keyed by name; the standard [`FieldProvider`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    structs: BTreeMap<String, StructDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. A later declaration of the same name replaces the
    /// earlier one.
    pub fn insert(&mut self, def: StructDef) {
        if self.structs.contains_key(&def.name) {
            log::debug!("struct `{}` redeclared, keeping the latest fields", def.name);
        }
        self.structs.insert(def.name.clone(), def);
    }

    /// Merge `other` into `self`; declarations in `other` win.
    pub fn extend(&mut self, other: TypeTable) {
        for (_, def) in other.structs {
            self.insert(def);
        }
    }

    pub fn get(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }
}

impl FieldProvider for TypeTable {
    fn enumerate_fields(&self, ty: &Type) -> Option<Vec<FieldInfo>> {
        let name = ty.nominal_name()?;
        self.structs.get(name).map(|def| def.fields.clone())
    }
}

/// What the host knows about the scope a closure is written in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostContext {
    /// Type of `self` when the closure sits inside a method
    self_ty: Option<Type>,
    /// Declared outer bindings
    bindings: BTreeMap<String, Type>,
    /// Names bound by enclosing code, type unknown
    locals: BTreeSet<String>,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receiver type; `self` is then in scope.
    pub fn with_self(mut self, ty: Type) -> Self {
        self.self_ty = Some(ty);
        self
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.insert(name.into(), ty);
    }

    /// Mark `name` as bound by the code around the closure. Unlike
    /// [`declare`](Self::declare) this carries no type.
    pub fn bind_local(&mut self, name: impl Into<String>) {
        self.locals.insert(name.into());
    }

    pub fn self_type(&self) -> Option<&Type> {
        self.self_ty.as_ref()
    }

    pub fn has_self(&self) -> bool {
        self.self_ty.is_some()
    }

    /// Whether `name` is an outer binding, declared or locally bound.
    pub fn declares(&self, name: &str) -> bool {
        self.bindings.contains_key(name) || self.locals.contains(name)
    }

    /// Declared type of a path root; `self` maps to the receiver type.
    pub fn root_type(&self, root: &str) -> Option<&Type> {
        if root == "self" {
            self.self_ty.as_ref()
        } else {
            self.bindings.get(root)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> StructDef {
        StructDef::new(
            "Counter",
            vec![
                FieldInfo::new("count", Type::named("u32")),
                FieldInfo::new("label", Type::named("String")),
            ],
        )
    }

    #[test]
    fn test_enumerate_fields_through_reference() {
        let mut table = TypeTable::new();
        table.insert(counter());

        let fields = table
            .enumerate_fields(&Type::reference(Type::named("Counter")))
            .unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["count", "label"]);
        assert_eq!(
            table.field_type(&Type::named("Counter"), "label"),
            Some(Type::named("String"))
        );
        assert!(table.enumerate_fields(&Type::named("u32")).is_none());
    }

    #[test]
    fn test_extend_replaces_same_name() {
        let mut table = TypeTable::new();
        table.insert(counter());
        let mut other = TypeTable::new();
        other.insert(StructDef::new("Counter", vec![]));
        table.extend(other);
        assert_eq!(table.len(), 1);
        assert_eq!(table.enumerate_fields(&Type::named("Counter")), Some(vec![]));
    }

    #[test]
    fn test_host_context_roots() {
        let mut ctx = HostContext::new().with_self(Type::reference(Type::named("Counter")));
        ctx.declare("my_vec", Type::named("Vec"));

        assert!(ctx.has_self());
        assert!(ctx.declares("my_vec"));
        assert!(!ctx.declares("self"));
        assert_eq!(ctx.root_type("my_vec"), Some(&Type::named("Vec")));
        assert_eq!(
            ctx.root_type("self").and_then(Type::nominal_name),
            Some("Counter")
        );
        assert_eq!(ctx.root_type("other"), None);
    }

    #[test]
    fn test_local_bindings_have_no_type() {
        let mut ctx = HostContext::new();
        ctx.bind_local("f");
        assert!(ctx.declares("f"));
        assert_eq!(ctx.root_type("f"), None);
    }

    #[test]
    fn test_providers_are_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<TypeTable>();
        assert_sync::<HostContext>();
    }
}

//! Managed type descriptions and their interned handles
//!
//! Native code never sees a [`TypeDesc`] directly. It sees a [`TypeHandle`]
//! produced by the [`TypeInterner`]; equal descriptions always intern to the
//! same handle, and handles stay valid for the life of the interner.

use dynbridge_sdk::TypeHandle;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Storage class of a managed type, as far as the interpreter cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// No value (return types only)
    Void,
    /// Boolean
    Bool,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Reference to a heap object
    Object,
    /// Unmanaged pointer
    Pointer,
    /// User-defined value type
    ValueType,
}

/// Description of a managed type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDesc {
    name: String,
    kind: ValueKind,
}

/// Shared reference to a type description
pub type TypeRef = Arc<TypeDesc>;

impl TypeDesc {
    /// Create a type description
    pub fn new(name: impl Into<String>, kind: ValueKind) -> TypeRef {
        Arc::new(TypeDesc {
            name: name.into(),
            kind,
        })
    }

    /// `void`
    pub fn void() -> TypeRef {
        Self::new("void", ValueKind::Void)
    }

    /// `bool`
    pub fn bool() -> TypeRef {
        Self::new("bool", ValueKind::Bool)
    }

    /// `int32`
    pub fn i32() -> TypeRef {
        Self::new("int32", ValueKind::I32)
    }

    /// `int64`
    pub fn i64() -> TypeRef {
        Self::new("int64", ValueKind::I64)
    }

    /// `float32`
    pub fn f32() -> TypeRef {
        Self::new("float32", ValueKind::F32)
    }

    /// `float64`
    pub fn f64() -> TypeRef {
        Self::new("float64", ValueKind::F64)
    }

    /// A reference type by name
    pub fn object(name: impl Into<String>) -> TypeRef {
        Self::new(name, ValueKind::Object)
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage class
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Default)]
struct InternerInner {
    types: Vec<TypeRef>,
    index: FxHashMap<TypeDesc, TypeHandle>,
}

/// Append-only interner mapping type descriptions to handles
pub struct TypeInterner {
    inner: RwLock<InternerInner>,
}

impl TypeInterner {
    /// Create an empty interner
    pub fn new() -> Self {
        TypeInterner {
            inner: RwLock::new(InternerInner::default()),
        }
    }

    /// Handle for `ty`, interning it on first sight
    pub fn intern(&self, ty: &TypeDesc) -> TypeHandle {
        if let Some(handle) = self.inner.read().index.get(ty) {
            return *handle;
        }

        let mut inner = self.inner.write();
        if let Some(handle) = inner.index.get(ty) {
            return *handle;
        }
        inner.types.push(Arc::new(ty.clone()));
        let handle = TypeHandle::from_raw(inner.types.len() as u64);
        inner.index.insert(ty.clone(), handle);
        handle
    }

    /// Description behind a handle
    pub fn resolve(&self, handle: TypeHandle) -> Option<TypeRef> {
        let index = (handle.as_raw() as usize).checked_sub(1)?;
        self.inner.read().types.get(index).cloned()
    }

    /// Number of interned types
    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Check if nothing has been interned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<TypeInterner> = Lazy::new(TypeInterner::new);

/// Process-wide interner used by views
pub fn global() -> &'static TypeInterner {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedupes() {
        let interner = TypeInterner::new();
        let a = interner.intern(&TypeDesc::i32());
        let b = interner.intern(&TypeDesc::i32());
        assert_eq!(a, b);
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn test_same_name_different_kind() {
        let interner = TypeInterner::new();
        let a = interner.intern(&TypeDesc::new("Point", ValueKind::ValueType));
        let b = interner.intern(&TypeDesc::new("Point", ValueKind::Object));
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve() {
        let interner = TypeInterner::new();
        let handle = interner.intern(&TypeDesc::object("System.String"));
        assert!(!handle.is_null());

        let ty = interner.resolve(handle).unwrap();
        assert_eq!(ty.name(), "System.String");
        assert_eq!(ty.kind(), ValueKind::Object);

        assert!(interner.resolve(TypeHandle::NULL).is_none());
        assert!(interner.resolve(TypeHandle::from_raw(50)).is_none());
    }
}

//! Method and type descriptors for intercepted calls
//!
//! Callers describe the shape of the code being intercepted: which types
//! exist, which methods they declare and how types relate. The operation
//! source uses this to walk from a dispatched method to its most specific
//! implementation and to the declaring types when searching for cache
//! operations.

use crate::constants::OBJECT_TYPE_NAME;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    PackagePrivate,
    Private,
}

/// Name plus parameter types; what an override must match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSignature {
    pub name: String,
    pub param_types: Vec<String>,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.param_types.join(", "))
    }
}

/// Identity of a method: its declaring type plus its signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodKey {
    pub declaring_type: String,
    pub signature: MethodSignature,
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.signature)
    }
}

/// A method as seen on a specific target type.
///
/// Used to key per-element caches (compiled expressions, operation
/// metadata) so that the same method reached through different target
/// types is treated separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub method: MethodKey,
    pub target_type: String,
}

impl ElementKey {
    pub fn new(method: &Method, target_type: &TypeDescriptor) -> Self {
        Self {
            method: method.key(),
            target_type: target_type.name().to_string(),
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.method, self.target_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

/// A method declared on some type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Method {
    declaring_type: String,
    name: String,
    params: Vec<Parameter>,
    visibility: Visibility,
    varargs: bool,
    synthetic: bool,
}

pub type MethodRef = Arc<Method>;

impl Method {
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Whether the last parameter collects a variable number of arguments
    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Compiler-generated methods (bridges and the like) are not user level.
    pub fn is_user_level(&self) -> bool {
        !self.synthetic
    }

    pub fn is_object_method(&self) -> bool {
        self.declaring_type == OBJECT_TYPE_NAME
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            param_types: self.params.iter().map(|p| p.type_name.clone()).collect(),
        }
    }

    pub fn key(&self) -> MethodKey {
        MethodKey {
            declaring_type: self.declaring_type.clone(),
            signature: self.signature(),
        }
    }

    /// Whether a subtype may provide its own implementation of this method
    fn is_overridable(&self) -> bool {
        self.visibility != Visibility::Private
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.signature())
    }
}

/// Builder for methods added to a [`TypeBuilder`].
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    params: Vec<Parameter>,
    visibility: Visibility,
    varargs: bool,
    synthetic: bool,
}

impl MethodBuilder {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            visibility,
            varargs: false,
            synthetic: false,
        }
    }

    pub fn public(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Public)
    }

    pub fn protected(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Protected)
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self::new(name, Visibility::Private)
    }

    pub fn param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    /// Mark the last parameter as variadic
    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    fn build(self, declaring_type: &str) -> Method {
        // a variadic method needs a parameter to collect into
        let varargs = self.varargs && !self.params.is_empty();
        Method {
            declaring_type: declaring_type.to_string(),
            name: self.name,
            params: self.params,
            visibility: self.visibility,
            varargs,
            synthetic: self.synthetic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
}

/// A type with its declared methods and its supertypes.
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    superclass: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    methods: Vec<MethodRef>,
}

impl TypeDescriptor {
    /// Start describing a class; its superclass defaults to [`TypeDescriptor::object`].
    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Interface)
    }

    /// The root type every class ultimately extends
    pub fn object() -> Arc<TypeDescriptor> {
        static OBJECT: OnceLock<Arc<TypeDescriptor>> = OnceLock::new();
        OBJECT
            .get_or_init(|| {
                let methods = [
                    MethodBuilder::public("equals").param("other", OBJECT_TYPE_NAME),
                    MethodBuilder::public("hash_code"),
                    MethodBuilder::public("to_string"),
                ]
                .into_iter()
                .map(|m| Arc::new(m.build(OBJECT_TYPE_NAME)))
                .collect();
                Arc::new(TypeDescriptor {
                    name: OBJECT_TYPE_NAME.to_string(),
                    kind: TypeKind::Class,
                    superclass: None,
                    interfaces: Vec::new(),
                    methods,
                })
            })
            .clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn superclass(&self) -> Option<&Arc<TypeDescriptor>> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    /// Methods declared directly on this type
    pub fn declared_methods(&self) -> &[MethodRef] {
        &self.methods
    }

    /// First method declared directly on this type with the given name
    pub fn declared_method(&self, name: &str) -> Option<MethodRef> {
        self.methods.iter().find(|m| m.name == name).cloned()
    }

    /// Look up a method by name through this type and its supertypes.
    pub fn method(&self, name: &str) -> Option<MethodRef> {
        self.declared_method(name)
            .or_else(|| self.superclass.as_ref().and_then(|s| s.method(name)))
            .or_else(|| self.interfaces.iter().find_map(|i| i.method(name)))
    }

    /// Find the implementation of `signature` visible on this type, searching
    /// the class chain first and interfaces after.
    pub fn find_method(&self, signature: &MethodSignature) -> Option<MethodRef> {
        let mut current = Some(self);
        while let Some(ty) = current {
            if let Some(found) = ty.methods.iter().find(|m| m.signature() == *signature) {
                return Some(found.clone());
            }
            current = ty.superclass.as_deref();
        }
        self.all_interfaces()
            .into_iter()
            .find_map(|i| i.methods.iter().find(|m| m.signature() == *signature).cloned())
    }

    /// Resolve `method`, possibly declared on a supertype, to the most
    /// specific implementation reachable from this type.
    ///
    /// Returns `method` itself when this type is its declaring type, when it
    /// cannot be overridden, or when no implementation is found here.
    pub fn most_specific_method(&self, method: &MethodRef) -> MethodRef {
        if method.declaring_type == self.name || !method.is_overridable() {
            return method.clone();
        }
        self.find_method(&method.signature())
            .unwrap_or_else(|| method.clone())
    }

    /// Whether a value of this type is also a `type_name`
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        if self.name == type_name {
            return true;
        }
        self.superclass
            .as_ref()
            .is_some_and(|s| s.is_assignable_to(type_name))
            || self.interfaces.iter().any(|i| i.is_assignable_to(type_name))
    }

    fn all_interfaces(&self) -> Vec<&TypeDescriptor> {
        let mut found: Vec<&TypeDescriptor> = Vec::new();
        let mut current = Some(self);
        while let Some(ty) = current {
            for iface in &ty.interfaces {
                collect_interfaces(iface, &mut found);
            }
            current = ty.superclass.as_deref();
        }
        found
    }
}

fn collect_interfaces<'a>(ty: &'a TypeDescriptor, found: &mut Vec<&'a TypeDescriptor>) {
    if found.iter().any(|f| f.name == ty.name) {
        return;
    }
    found.push(ty);
    for iface in &ty.interfaces {
        collect_interfaces(iface, found);
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    superclass: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    methods: Vec<MethodBuilder>,
}

impl TypeBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: Arc<TypeDescriptor>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Arc<TypeDescriptor>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        let superclass = match self.kind {
            TypeKind::Class => Some(self.superclass.unwrap_or_else(TypeDescriptor::object)),
            TypeKind::Interface => None,
        };
        let methods = self
            .methods
            .into_iter()
            .map(|m| Arc::new(m.build(&self.name)))
            .collect();
        Arc::new(TypeDescriptor {
            name: self.name,
            kind: self.kind,
            superclass,
            interfaces: self.interfaces,
            methods,
        })
    }
}

/// The object a call is dispatched on: its runtime type and its state.
///
/// The state is what `#root.target` evaluates to in expressions.
#[derive(Debug, Clone)]
pub struct Target {
    target_type: Arc<TypeDescriptor>,
    state: Value,
}

impl Target {
    pub fn new(target_type: Arc<TypeDescriptor>, state: Value) -> Self {
        Self { target_type, state }
    }

    /// A target without observable state
    pub fn of(target_type: Arc<TypeDescriptor>) -> Self {
        Self::new(target_type, Value::Null)
    }

    pub fn target_type(&self) -> &Arc<TypeDescriptor> {
        &self.target_type
    }

    pub fn state(&self) -> &Value {
        &self.state
    }
}

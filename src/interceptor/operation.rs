//! Cache operation descriptors
//!
//! A [`CacheOperation`] is the immutable description of one caching intent
//! attached to a method: read-through, unconditional update or eviction.
//! Descriptors are compared, hashed and displayed by their rendered
//! description so that two independently built but identical descriptors
//! share metadata cache entries.

use crate::error::{CacheAspectError, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The three kinds of caching intent and their kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Return a cached value if present, otherwise invoke and store.
    Cacheable { unless: Option<String>, sync: bool },
    /// Always invoke and store the result.
    Put { unless: Option<String> },
    /// Remove one key or, with `all_entries`, everything.
    Evict {
        all_entries: bool,
        before_invocation: bool,
    },
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cacheable { .. } => "Cacheable",
            Self::Put { .. } => "Put",
            Self::Evict { .. } => "Evict",
        }
    }

    /// The veto expression evaluated against the result before writing
    pub fn unless(&self) -> Option<&str> {
        match self {
            Self::Cacheable { unless, .. } | Self::Put { unless } => unless.as_deref(),
            Self::Evict { .. } => None,
        }
    }

    pub fn is_sync(&self) -> bool {
        matches!(self, Self::Cacheable { sync: true, .. })
    }
}

#[derive(Debug, Clone)]
pub struct CacheOperation {
    name: String,
    cache_names: Vec<String>,
    key: Option<String>,
    key_generator: Option<String>,
    cache_manager: Option<String>,
    cache_resolver: Option<String>,
    condition: Option<String>,
    kind: OperationKind,
    description: String,
}

impl CacheOperation {
    pub fn cacheable() -> CacheOperationBuilder {
        CacheOperationBuilder::new(OperationKind::Cacheable {
            unless: None,
            sync: false,
        })
    }

    pub fn put() -> CacheOperationBuilder {
        CacheOperationBuilder::new(OperationKind::Put { unless: None })
    }

    pub fn evict() -> CacheOperationBuilder {
        CacheOperationBuilder::new(OperationKind::Evict {
            all_entries: false,
            before_invocation: false,
        })
    }

    /// Identity of the declaring element
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_names(&self) -> &[String] {
        &self.cache_names
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn key_generator(&self) -> Option<&str> {
        self.key_generator.as_deref()
    }

    pub fn cache_manager(&self) -> Option<&str> {
        self.cache_manager.as_deref()
    }

    pub fn cache_resolver(&self) -> Option<&str> {
        self.cache_resolver.as_deref()
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn unless(&self) -> Option<&str> {
        self.kind.unless()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for CacheOperation {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
    }
}

impl Eq for CacheOperation {}

impl Hash for CacheOperation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.description.hash(state);
    }
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Type-level defaults applied to every operation declared on a type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDefaults {
    pub cache_names: Vec<String>,
    pub key_generator: Option<String>,
    pub cache_manager: Option<String>,
    pub cache_resolver: Option<String>,
}

impl CacheDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn key_generator(mut self, name: impl Into<String>) -> Self {
        self.key_generator = Some(name.into());
        self
    }

    pub fn cache_manager(mut self, name: impl Into<String>) -> Self {
        self.cache_manager = Some(name.into());
        self
    }

    pub fn cache_resolver(mut self, name: impl Into<String>) -> Self {
        self.cache_resolver = Some(name.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CacheOperationBuilder {
    name: String,
    cache_names: Vec<String>,
    key: Option<String>,
    key_generator: Option<String>,
    cache_manager: Option<String>,
    cache_resolver: Option<String>,
    condition: Option<String>,
    kind: OperationKind,
    misuse: Option<String>,
}

/// Blank attribute values mean "not set"
fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.trim().is_empty()).then_some(value)
}

impl CacheOperationBuilder {
    fn new(kind: OperationKind) -> Self {
        Self {
            name: String::new(),
            cache_names: Vec::new(),
            key: None,
            key_generator: None,
            cache_manager: None,
            cache_resolver: None,
            condition: None,
            kind,
            misuse: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    /// Cache names in resolution order; duplicates are dropped.
    pub fn cache_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cache_names.clear();
        for name in names {
            let name = name.into();
            if !self.cache_names.contains(&name) {
                self.cache_names.push(name);
            }
        }
        self
    }

    pub fn cache_name(self, name: impl Into<String>) -> Self {
        self.cache_names([name.into()])
    }

    pub fn key(mut self, expression: impl Into<String>) -> Self {
        self.key = non_blank(expression);
        self
    }

    pub fn key_generator(mut self, name: impl Into<String>) -> Self {
        self.key_generator = non_blank(name);
        self
    }

    pub fn cache_manager(mut self, name: impl Into<String>) -> Self {
        self.cache_manager = non_blank(name);
        self
    }

    pub fn cache_resolver(mut self, name: impl Into<String>) -> Self {
        self.cache_resolver = non_blank(name);
        self
    }

    pub fn condition(mut self, expression: impl Into<String>) -> Self {
        self.condition = non_blank(expression);
        self
    }

    pub fn unless(mut self, expression: impl Into<String>) -> Self {
        if let OperationKind::Cacheable { unless, .. } | OperationKind::Put { unless } =
            &mut self.kind
        {
            *unless = non_blank(expression);
            return self;
        }
        self.record_misuse("unless");
        self
    }

    pub fn sync(mut self, enabled: bool) -> Self {
        if let OperationKind::Cacheable { sync, .. } = &mut self.kind {
            *sync = enabled;
            return self;
        }
        self.record_misuse("sync");
        self
    }

    pub fn all_entries(mut self, enabled: bool) -> Self {
        if let OperationKind::Evict { all_entries, .. } = &mut self.kind {
            *all_entries = enabled;
            return self;
        }
        self.record_misuse("all_entries");
        self
    }

    pub fn before_invocation(mut self, enabled: bool) -> Self {
        if let OperationKind::Evict {
            before_invocation, ..
        } = &mut self.kind
        {
            *before_invocation = enabled;
            return self;
        }
        self.record_misuse("before_invocation");
        self
    }

    fn record_misuse(&mut self, attribute: &str) {
        if self.misuse.is_none() {
            self.misuse = Some(format!(
                "'{attribute}' is not supported on {} operations",
                self.kind.label()
            ));
        }
    }

    /// Fill unset attributes from type-level defaults.
    ///
    /// Cache names apply only when none are set, the key generator only when
    /// neither key nor key generator is set. Resolver and manager are
    /// inherited only if the operation sets neither, resolver first.
    pub fn apply_defaults(mut self, defaults: &CacheDefaults) -> Self {
        if self.cache_names.is_empty() && !defaults.cache_names.is_empty() {
            self = self.cache_names(defaults.cache_names.clone());
        }
        if self.key.is_none() && self.key_generator.is_none() {
            self.key_generator = defaults.key_generator.clone();
        }
        if self.cache_manager.is_none() && self.cache_resolver.is_none() {
            if defaults.cache_resolver.is_some() {
                self.cache_resolver = defaults.cache_resolver.clone();
            } else if defaults.cache_manager.is_some() {
                self.cache_manager = defaults.cache_manager.clone();
            }
        }
        self
    }

    /// Validate and freeze the descriptor.
    pub fn build(self) -> Result<CacheOperation> {
        let element = if self.name.is_empty() {
            "<unnamed>"
        } else {
            self.name.as_str()
        };
        if let Some(misuse) = &self.misuse {
            return Err(CacheAspectError::configuration(format!(
                "Invalid cache operation on '{element}': {misuse}"
            )));
        }
        if self.key.is_some() && self.key_generator.is_some() {
            return Err(CacheAspectError::configuration(format!(
                "Invalid cache operation on '{element}'. Both 'key' and 'key_generator' are set; \
                 set either the key expression or the name of the key generator"
            )));
        }
        if self.cache_manager.is_some() && self.cache_resolver.is_some() {
            return Err(CacheAspectError::configuration(format!(
                "Invalid cache operation on '{element}'. Both 'cache_manager' and 'cache_resolver' \
                 are set; a cache manager only configures the default resolver"
            )));
        }

        let description = self.describe();
        Ok(CacheOperation {
            name: self.name,
            cache_names: self.cache_names,
            key: self.key,
            key_generator: self.key_generator,
            cache_manager: self.cache_manager,
            cache_resolver: self.cache_resolver,
            condition: self.condition,
            kind: self.kind,
            description,
        })
    }

    fn describe(&self) -> String {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let mut description = format!(
            "{}[{}] caches=[{}] | key='{}' | keyGenerator='{}' | cacheManager='{}' | cacheResolver='{}' | condition='{}'",
            self.kind.label(),
            self.name,
            self.cache_names.join(", "),
            opt(&self.key),
            opt(&self.key_generator),
            opt(&self.cache_manager),
            opt(&self.cache_resolver),
            opt(&self.condition),
        );
        match &self.kind {
            OperationKind::Cacheable { unless, sync } => {
                description.push_str(&format!(" | unless='{}' | sync='{sync}'", opt(unless)));
            }
            OperationKind::Put { unless } => {
                description.push_str(&format!(" | unless='{}'", opt(unless)));
            }
            OperationKind::Evict {
                all_entries,
                before_invocation,
            } => {
                description.push_str(&format!(",{all_entries},{before_invocation}"));
            }
        }
        description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_description_renders_all_attributes() {
        let op = CacheOperation::cacheable()
            .name("UserService.find(i64)")
            .cache_names(["users", "people"])
            .key("#id")
            .unless("#result == null")
            .build()
            .unwrap();
        assert_eq!(
            op.to_string(),
            "Cacheable[UserService.find(i64)] caches=[users, people] | key='#id' | keyGenerator='' \
             | cacheManager='' | cacheResolver='' | condition='' | unless='#result == null' | sync='false'"
        );
    }

    #[test]
    fn test_identity_follows_description() {
        let a = CacheOperation::evict().name("m").cache_name("c").all_entries(true).build().unwrap();
        let b = CacheOperation::evict().name("m").cache_name("c").all_entries(true).build().unwrap();
        let c = CacheOperation::evict().name("m").cache_name("c").build().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<CacheOperation> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_key_and_key_generator_are_exclusive() {
        let err = CacheOperation::cacheable()
            .name("m")
            .key("#id")
            .key_generator("custom")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_manager_and_resolver_are_exclusive() {
        let err = CacheOperation::put()
            .cache_manager("primary")
            .cache_resolver("runtime")
            .build()
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_kind_specific_attribute_misuse() {
        let err = CacheOperation::evict().unless("true").build().unwrap_err();
        assert!(err.to_string().contains("'unless' is not supported on Evict"));
        assert!(CacheOperation::put().sync(true).build().is_err());
    }

    #[test]
    fn test_blank_expressions_are_unset() {
        let op = CacheOperation::cacheable().key("  ").condition("").build().unwrap();
        assert_eq!(op.key(), None);
        assert_eq!(op.condition(), None);
    }

    #[test]
    fn test_defaults_fill_unset_attributes() {
        let defaults = CacheDefaults::new()
            .cache_names(["users"])
            .key_generator("custom")
            .cache_manager("secondary");

        let op = CacheOperation::cacheable().apply_defaults(&defaults).build().unwrap();
        assert_eq!(op.cache_names(), ["users"]);
        assert_eq!(op.key_generator(), Some("custom"));
        assert_eq!(op.cache_manager(), Some("secondary"));

        let keyed = CacheOperation::cacheable()
            .cache_name("orders")
            .key("#id")
            .cache_resolver("runtime")
            .apply_defaults(&defaults)
            .build()
            .unwrap();
        assert_eq!(keyed.cache_names(), ["orders"]);
        assert_eq!(keyed.key_generator(), None);
        assert_eq!(keyed.cache_manager(), None);
        assert_eq!(keyed.cache_resolver(), Some("runtime"));
    }

    #[test]
    fn test_resolver_default_wins_over_manager_default() {
        let defaults = CacheDefaults::new()
            .cache_manager("primary")
            .cache_resolver("runtime");
        let op = CacheOperation::put().apply_defaults(&defaults).build().unwrap();
        assert_eq!(op.cache_resolver(), Some("runtime"));
        assert_eq!(op.cache_manager(), None);
    }
}

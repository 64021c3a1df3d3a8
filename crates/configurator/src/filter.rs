//! Namespace filtering for observed objects.

use kube::Resource;

/// Objects that can report the namespace they live in.
pub trait HasNamespace {
    /// Namespace of the object, `None` for cluster-scoped or incomplete objects.
    fn namespace(&self) -> Option<&str>;
}

impl<K: Resource> HasNamespace for K {
    fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }
}

/// Passes only objects that live in the watched namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFilter {
    namespace: String,
}

impl NamespaceFilter {
    /// Creates a filter for `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace this filter accepts.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns true iff `obj` has a namespace equal to the watched one.
    pub fn should_observe<K: HasNamespace + ?Sized>(&self, obj: &K) -> bool {
        obj.namespace() == Some(self.namespace.as_str())
    }
}

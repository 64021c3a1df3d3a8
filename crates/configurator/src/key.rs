//! Identity of the watched resource.

use kube::Resource;
use kube_runtime::reflector::ObjectRef;
use std::fmt;

/// Namespace and name of the single watched object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WatchedResourceKey {
    namespace: String,
    name: String,
}

impl WatchedResourceKey {
    /// Creates a key for `namespace/name`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace of the watched object.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the watched object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store reference used for cache lookups.
    pub fn object_ref<K>(&self) -> ObjectRef<K>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        ObjectRef::new(&self.name).within(&self.namespace)
    }
}

impl fmt::Display for WatchedResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    #[test]
    fn test_display_is_namespace_slash_name() {
        let key = WatchedResourceKey::new("osm-system", "osm-config");
        assert_eq!(key.to_string(), "osm-system/osm-config");
    }

    #[test]
    fn test_object_ref_embeds_namespace() {
        let key = WatchedResourceKey::new("osm-system", "osm-config");
        let obj_ref = key.object_ref::<ConfigMap>();
        assert_eq!(obj_ref.name, "osm-config");
        assert_eq!(obj_ref.namespace.as_deref(), Some("osm-system"));
    }
}

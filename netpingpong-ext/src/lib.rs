pub use k8s_openapi as openapi;
pub use k8s_openapi::api::core::v1 as corev1;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;

pub use taint::NO_SCHEDULE;
pub use taint::TaintExt;

mod taint;

pub trait NodeExt {
    fn new(name: impl ToString) -> Self;
    fn with_taints(self, taints: impl IntoIterator<Item = corev1::Taint>) -> Self;
    fn taints(&self) -> &[corev1::Taint];
    fn has_taint(&self, key: &str) -> bool;
    fn without_taint(self, key: &str) -> Self;
}

impl NodeExt for corev1::Node {
    fn new(name: impl ToString) -> Self {
        let metadata = metav1::ObjectMeta::new(name);
        Self {
            metadata,
            ..default()
        }
    }

    fn with_taints(self, taints: impl IntoIterator<Item = corev1::Taint>) -> Self {
        let taints = Some(taints.into_iter().collect());
        let spec = corev1::NodeSpec {
            taints,
            ..self.spec.unwrap_or_default()
        };
        Self {
            spec: Some(spec),
            ..self
        }
    }

    fn taints(&self) -> &[corev1::Taint] {
        self.spec
            .as_ref()
            .and_then(|spec| spec.taints.as_deref())
            .unwrap_or_default()
    }

    fn has_taint(&self, key: &str) -> bool {
        self.taints().iter().any(|taint| taint.key == key)
    }

    /// Drops every taint whose key is `key`.
    ///
    /// Taints with other keys keep their values and relative order. A node
    /// without a matching taint is returned unchanged.
    fn without_taint(mut self, key: &str) -> Self {
        if let Some(taints) = self
            .spec
            .as_mut()
            .and_then(|spec| spec.taints.as_mut())
        {
            taints.retain(|taint| taint.key != key);
        }
        self
    }
}

pub trait ObjectMetaExt {
    fn new(name: impl ToString) -> Self;
    fn resource_version(self, version: impl ToString) -> Self;
}

impl ObjectMetaExt for metav1::ObjectMeta {
    fn new(name: impl ToString) -> Self {
        let name = Some(name.to_string());
        Self { name, ..default() }
    }

    fn resource_version(self, version: impl ToString) -> Self {
        Self {
            resource_version: Some(version.to_string()),
            ..self
        }
    }
}

pub fn default<T: Default>() -> T {
    T::default()
}

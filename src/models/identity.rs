use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Container;

/// Role a container plays inside the dispatcher pod.
///
/// External readers index the container list positionally and assume the
/// dispatcher container comes first; lookups inside this crate go through
/// `DispatcherIdentity::role_of` instead of relying on that position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerRole {
    /// The container running the dispatcher's fan-out logic.
    Dispatcher,
    /// The TLS-terminating proxy in front of the dispatcher's metrics port.
    Monitoring,
}

/// Fixed identity strings for the dispatcher workload.
///
/// Constructed once at process start and shared by reference with every
/// builder, so the well-known names live in a single place instead of
/// module-level globals.
#[derive(Clone, Debug)]
pub struct DispatcherIdentity {
    /// Name of the dispatcher deployment.
    pub name: String,

    /// Labels used both as the deployment selector and as pod labels.
    pub labels: BTreeMap<String, String>,

    /// Name of the primary dispatcher container.
    pub container_name: String,

    /// Name of the monitoring sidecar container.
    pub sidecar_container_name: String,
}

impl Default for DispatcherIdentity {
    fn default() -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            "messaging.knative.dev/channel".to_string(),
            "kafka-channel".to_string(),
        );
        labels.insert(
            "messaging.knative.dev/role".to_string(),
            "dispatcher".to_string(),
        );

        DispatcherIdentity {
            name: "kafka-ch-dispatcher".to_string(),
            labels,
            container_name: "dispatcher".to_string(),
            sidecar_container_name: "kube-rbac-proxy".to_string(),
        }
    }
}

impl DispatcherIdentity {
    /// Classifies a container by its well-known name. Containers this crate
    /// did not put there come back as `None`.
    pub fn role_of(&self, container: &Container) -> Option<ContainerRole> {
        if container.name == self.container_name {
            Some(ContainerRole::Dispatcher)
        } else if container.name == self.sidecar_container_name {
            Some(ContainerRole::Monitoring)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Container;

    use super::{ContainerRole, DispatcherIdentity};

    #[test]
    fn classifies_containers_by_name() {
        let identity = DispatcherIdentity::default();

        let dispatcher = Container {
            name: "dispatcher".to_string(),
            ..Default::default()
        };
        let proxy = Container {
            name: "kube-rbac-proxy".to_string(),
            ..Default::default()
        };
        let stranger = Container {
            name: "istio-proxy".to_string(),
            ..Default::default()
        };

        assert_eq!(identity.role_of(&dispatcher), Some(ContainerRole::Dispatcher));
        assert_eq!(identity.role_of(&proxy), Some(ContainerRole::Monitoring));
        assert_eq!(identity.role_of(&stranger), None);
    }
}

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::{Deserialize, Serialize};

/// Caller-supplied arguments overlaid onto the dispatcher deployment by
/// `DispatcherBuilder::build`. Assembled by the controller from cluster and
/// environment configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatcherArgs {
    /// `"namespace"` for a namespace-scoped dispatcher, anything else means
    /// cluster-wide. Only affects which environment variables are injected.
    pub scope: String,

    /// Namespace the dispatcher deployment lives in.
    pub namespace: String,

    /// Dispatcher container image.
    pub image: String,

    /// Desired replica count.
    pub replicas: i32,

    /// Service account the dispatcher pods run as.
    pub service_account: String,

    /// Hash of the external configuration, stamped onto the pod template as
    /// an annotation so a changed config rolls the pods. Never interpreted.
    pub config_map_hash: String,

    /// Owner of the deployment, for garbage collection.
    pub owner_ref: OwnerReference,

    /// Whether to inject the TLS metrics proxy sidecar.
    pub enable_monitoring: bool,
}

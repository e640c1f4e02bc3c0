use std::collections::BTreeMap;
use std::env;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector,
    PodSpec, PodTemplateSpec, ResourceRequirements, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use log::{debug, warn};

use crate::models::dispatcher_args::DispatcherArgs;
use crate::models::identity::{ContainerRole, DispatcherIdentity};
use crate::utils::error::Error;

/// Pod-template annotation carrying the configuration hash.
pub const CONFIG_MAP_HASH_ANNOTATION_KEY: &str = "kafka.eventing.knative.dev/configmap-hash";

/// ConfigMap holding the dispatcher settings, mounted into the primary container.
pub const SETTINGS_CONFIG_MAP_NAME: &str = "config-kafka";
pub const SETTINGS_CONFIG_MAP_MOUNT_PATH: &str = "/etc/config-kafka";

/// Environment variable naming the monitoring sidecar image.
pub const SIDECAR_IMAGE_ENV_VAR: &str = "IMAGE_KUBE_RBAC_PROXY";

const SYSTEM_NAMESPACE_ENV_VAR: &str = "SYSTEM_NAMESPACE";
const NAMESPACE_SCOPE: &str = "namespace";
const METRICS_PORT: i32 = 9090;
const TLS_SECRET_NAME: &str = "kafka-ch-dispatcher-sm-service-tls";
const TLS_VOLUME_NAME: &str = "secret-kafka-ch-dispatcher-sm-service-tls";
const TLS_MOUNT_PATH: &str = "/etc/tls/private";

/// Assembles the dispatcher `Deployment`, either from the blank template or
/// on top of the live object fetched by the controller.
///
/// The builder exclusively owns the deployment for the duration of the call
/// chain; `build` consumes the builder and hands the same instance back.
pub struct DispatcherBuilder<'a> {
    identity: &'a DispatcherIdentity,
    deployment: Deployment,
    args: Option<DispatcherArgs>,
}

impl<'a> DispatcherBuilder<'a> {
    /// Returns a builder which builds a dispatcher deployment from scratch.
    /// Intended to be used when creating the dispatcher deployment for the first time.
    pub fn new(identity: &'a DispatcherIdentity) -> Self {
        DispatcherBuilder {
            identity,
            deployment: dispatcher_template(identity),
            args: None,
        }
    }

    /// Returns a builder which builds a dispatcher deployment from the given deployment.
    /// Intended to be used when updating an existing dispatcher deployment.
    pub fn from_deployment(identity: &'a DispatcherIdentity, deployment: Deployment) -> Self {
        DispatcherBuilder {
            identity,
            deployment,
            args: None,
        }
    }

    /// Attaches the args used by `build`. Must be called before `build`.
    pub fn with_args(mut self, args: DispatcherArgs) -> Self {
        self.args = Some(args);
        self
    }

    /// Overlays the attached args onto the wrapped deployment and returns it.
    ///
    /// Namespace, owner references, replicas, service account and the
    /// dispatcher image are always overwritten from the args. The pod
    /// template's annotation map is replaced with the single configuration
    /// hash entry; callers that need unrelated annotations to survive must
    /// re-apply them. The primary container's environment is populated only
    /// when currently empty, so operator edits on a live object survive a
    /// rebuild. An already injected sidecar is never removed, even when
    /// `enable_monitoring` is off.
    pub fn build(mut self) -> Result<Deployment, Error> {
        let identity = self.identity;
        let args = self.args.take().ok_or(Error::MissingArgs)?;

        self.deployment.metadata.namespace = Some(args.namespace.clone());
        self.deployment.metadata.owner_references = Some(vec![args.owner_ref.clone()]);

        let spec = self.deployment.spec.get_or_insert_with(DeploymentSpec::default);
        spec.replicas = Some(args.replicas);

        let template_metadata = spec.template.metadata.get_or_insert_with(ObjectMeta::default);
        let mut annotations = BTreeMap::new();
        annotations.insert(
            CONFIG_MAP_HASH_ANNOTATION_KEY.to_string(),
            args.config_map_hash.clone(),
        );
        template_metadata.annotations = Some(annotations);

        let pod_spec = spec.template.spec.get_or_insert_with(PodSpec::default);
        pod_spec.service_account_name = Some(args.service_account.clone());

        let dispatcher = pod_spec
            .containers
            .iter_mut()
            .find(|c| identity.role_of(c) == Some(ContainerRole::Dispatcher));
        match dispatcher {
            Some(container) => {
                container.image = Some(args.image.clone());
                if container.env.as_ref().map_or(true, Vec::is_empty) {
                    container.env = Some(make_env(&args, identity));
                }
            }
            None => warn!(
                "no container named {} in the dispatcher deployment, leaving containers as-is",
                identity.container_name
            ),
        }

        if args.enable_monitoring && pod_spec.containers.len() == 1 {
            debug!("injecting monitoring sidecar {}", identity.sidecar_container_name);
            pod_spec.volumes.get_or_insert_with(Vec::new).push(Volume {
                name: TLS_VOLUME_NAME.to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(TLS_SECRET_NAME.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            });
            // Appended after the dispatcher container: external readers
            // assume the component container is first in the list.
            pod_spec.containers.push(monitoring_sidecar(identity));
        }

        Ok(self.deployment)
    }
}

/// Resolves the monitoring sidecar image from the deployment-time environment.
/// Absence is propagated as an empty string so misconfiguration surfaces at
/// the orchestration boundary instead of being masked by a default tag.
pub fn sidecar_image() -> String {
    let image = env::var(SIDECAR_IMAGE_ENV_VAR).unwrap_or_default();
    if image.is_empty() {
        warn!("{} is not set, monitoring sidecar has no image", SIDECAR_IMAGE_ENV_VAR);
    }
    image
}

/// The zero-state dispatcher deployment: identity, selector, the primary
/// container skeleton (no image, no env) and the settings volume.
fn dispatcher_template(identity: &DispatcherIdentity) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(identity.name.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(identity.labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(identity.labels.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: identity.container_name.clone(),
                        ports: Some(vec![ContainerPort {
                            name: Some("metrics".to_string()),
                            container_port: METRICS_PORT,
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: SETTINGS_CONFIG_MAP_NAME.to_string(),
                            mount_path: SETTINGS_CONFIG_MAP_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: SETTINGS_CONFIG_MAP_NAME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(SETTINGS_CONFIG_MAP_NAME.to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The TLS proxy terminating HTTPS in front of the dispatcher's metrics port.
fn monitoring_sidecar(identity: &DispatcherIdentity) -> Container {
    let mut requests = BTreeMap::new();
    requests.insert("memory".to_string(), Quantity("20Mi".to_string()));
    requests.insert("cpu".to_string(), Quantity("10m".to_string()));

    Container {
        name: identity.sidecar_container_name.clone(),
        image: Some(sidecar_image()),
        args: Some(vec![
            "--secure-listen-address=0.0.0.0:8444".to_string(),
            "--upstream=http://127.0.0.1:9090/".to_string(),
            "--tls-cert-file=/etc/tls/private/tls.crt".to_string(),
            "--tls-private-key-file=/etc/tls/private/tls.key".to_string(),
            "--logtostderr=true".to_string(),
            "--v=10".to_string(),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: TLS_VOLUME_NAME.to_string(),
            mount_path: TLS_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements {
            requests: Some(requests),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn make_env(args: &DispatcherArgs, identity: &DispatcherIdentity) -> Vec<EnvVar> {
    let mut vars = vec![
        EnvVar {
            name: SYSTEM_NAMESPACE_ENV_VAR.to_string(),
            value: Some(env::var(SYSTEM_NAMESPACE_ENV_VAR).unwrap_or_default()),
            ..Default::default()
        },
        EnvVar {
            name: "METRICS_DOMAIN".to_string(),
            value: Some("knative.dev/eventing".to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "CONFIG_LOGGING_NAME".to_string(),
            value: Some("config-logging".to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "CONFIG_LEADERELECTION_NAME".to_string(),
            value: Some("config-leader-election".to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "METRICS_PROMETHEUS_HOST".to_string(),
            value: Some("127.0.0.1".to_string()),
            ..Default::default()
        },
    ];

    if args.scope == NAMESPACE_SCOPE {
        vars.push(EnvVar {
            name: "NAMESPACE".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    api_version: None,
                    field_path: "metadata.namespace".to_string(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        });
    }

    vars.push(EnvVar {
        name: "POD_NAME".to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                api_version: None,
                field_path: "metadata.name".to_string(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    });
    vars.push(EnvVar {
        name: "CONTAINER_NAME".to_string(),
        value: Some(identity.container_name.clone()),
        ..Default::default()
    });

    vars
}

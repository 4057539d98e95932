//! Helpers for the Pod half of the Data Model (spec.md §3): ordinal
//! derivation, finalizer bookkeeping, and the readiness gate, all expressed
//! as small functions over `k8s_openapi::api::core::v1::Pod` plus the
//! `util::patch` annotation helpers.

use k8s_openapi::api::core::v1::{Pod, PodCondition};
use kube::{Api, Client, ResourceExt, api::Patch, api::PatchParams};
use mysql_operator_common::annotations;

use crate::util::{Error, MANAGER_NAME};

/// Label applied to every pod belonging to a managed cluster, mirroring
/// `cluster_objects.py`'s `mysql.oracle.com/cluster` selector label.
pub const CLUSTER_LABEL: &str = "mysql.oracle.com/cluster";

/// Derives the pod's ordinal index from its StatefulSet-style name
/// (`<cluster>-<n>`), per spec.md §3's "ordinal index within the cluster
/// (0..N-1)".
pub fn pod_ordinal(pod_name: &str, cluster_name: &str) -> Option<u32> {
    pod_name
        .strip_prefix(cluster_name)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|n| n.parse().ok())
}

/// Admin-protocol endpoint for a pod, addressed through the cluster's
/// headless instances service.
pub fn admin_endpoint(pod_name: &str, cluster_name: &str, namespace: &str, port: u16) -> String {
    format!("{pod_name}.{cluster_name}-instances.{namespace}.svc.cluster.local:{port}")
}

pub fn is_deleting(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}

pub fn has_member_finalizer(pod: &Pod) -> bool {
    pod.finalizers()
        .iter()
        .any(|f| f == annotations::MEMBER_FINALIZER)
}

/// Adds the member finalizer *before* any admin call that would make this
/// pod a cluster member, so the finalizer is never missing while the pod is
/// actually a member (spec.md §3 invariant).
pub async fn add_member_finalizer(client: Client, pod: &Pod) -> Result<(), Error> {
    if has_member_finalizer(pod) {
        return Ok(());
    }
    set_finalizers(client, pod, true).await
}

/// Removes the member finalizer once `remove_instance`/`destroy_cluster`
/// has run, allowing the pod to be garbage-collected.
pub async fn remove_member_finalizer(client: Client, pod: &Pod) -> Result<(), Error> {
    if !has_member_finalizer(pod) {
        return Ok(());
    }
    set_finalizers(client, pod, false).await
}

async fn set_finalizers(client: Client, pod: &Pod, add: bool) -> Result<(), Error> {
    let namespace = pod
        .namespace()
        .ok_or_else(|| Error::UserInput("Pod is missing metadata.namespace".to_string()))?;
    let name = pod.name_any();

    let mut finalizers = pod.finalizers().to_vec();
    if add {
        if !finalizers.iter().any(|f| f == annotations::MEMBER_FINALIZER) {
            finalizers.push(annotations::MEMBER_FINALIZER.to_string());
        }
    } else {
        finalizers.retain(|f| f != annotations::MEMBER_FINALIZER);
    }

    let api: Api<Pod> = Api::namespaced(client, &namespace);
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&name, &PatchParams::apply(MANAGER_NAME), &Patch::Merge(patch))
        .await?;
    Ok(())
}

/// Readiness-gate condition type this operator drives (spec.md §3's "ready"
/// boolean gate).
pub const READY_CONDITION_TYPE: &str = "mysql.oracle.com/ready";

/// Flips the pod's member readiness gate. `ready` becomes `True` once the
/// pod's observed membership status is ONLINE, `False` otherwise.
pub async fn set_ready_gate(client: Client, pod: &Pod, ready: bool) -> Result<(), Error> {
    let namespace = pod
        .namespace()
        .ok_or_else(|| Error::UserInput("Pod is missing metadata.namespace".to_string()))?;
    let name = pod.name_any();

    let mut conditions: Vec<PodCondition> = pod
        .status
        .as_ref()
        .and_then(|s| s.conditions.clone())
        .unwrap_or_default();

    let now = k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
        k8s_openapi::jiff::Timestamp::now().into(),
    );
    let status = if ready { "True" } else { "False" }.to_string();

    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.type_ == READY_CONDITION_TYPE)
    {
        if existing.status != status {
            existing.status = status;
            existing.last_transition_time = Some(now);
        }
    } else {
        conditions.push(PodCondition {
            type_: READY_CONDITION_TYPE.to_string(),
            status,
            last_transition_time: Some(now),
            ..Default::default()
        });
    }

    let api: Api<Pod> = Api::namespaced(client, &namespace);
    let patch = serde_json::json!({ "status": { "conditions": conditions } });
    api.patch_status(&name, &PatchParams::apply(MANAGER_NAME), &Patch::Merge(patch))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_parses_stateful_set_suffix() {
        assert_eq!(pod_ordinal("mycluster-0", "mycluster"), Some(0));
        assert_eq!(pod_ordinal("mycluster-12", "mycluster"), Some(12));
    }

    #[test]
    fn ordinal_rejects_mismatched_prefix() {
        assert_eq!(pod_ordinal("othercluster-0", "mycluster"), None);
    }

    #[test]
    fn endpoint_uses_headless_instances_service() {
        let ep = admin_endpoint("mycluster-0", "mycluster", "db", 33060);
        assert_eq!(
            ep,
            "mycluster-0.mycluster-instances.db.svc.cluster.local:33060"
        );
    }
}

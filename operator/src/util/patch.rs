use super::MANAGER_NAME;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::{apimachinery::pkg::apis::meta::v1::Time, jiff::Timestamp};
use kube::{
    Api, Client, Error,
    api::{Patch, PatchParams, Resource},
    core::NamespaceResourceScope,
};
use mysql_operator_types::*;
use serde::{Serialize, de::DeserializeOwned};
use std::{clone::Clone, fmt::Debug};

pub trait Object<S: Status> {
    /// Returns a mutable reference to the status object, initializing
    /// it with the default value if it does not exist.
    fn mut_status(&mut self) -> &mut S;
}

pub trait Status {
    /// Sets the last-probed timestamp to the given value.
    fn set_last_probe_time(&mut self, t: Time);
}

impl Object<ClusterStatus> for InnoDbCluster {
    fn mut_status(&mut self) -> &mut ClusterStatus {
        if self.status.is_some() {
            return self.status.as_mut().unwrap();
        }
        self.status = Some(Default::default());
        self.status.as_mut().unwrap()
    }
}

impl Status for ClusterStatus {
    fn set_last_probe_time(&mut self, t: Time) {
        self.last_probe_time = Some(t);
    }
}

/// Patch the resource's status object with the provided function.
/// The function is passed a mutable reference to the status object,
/// which is to be mutated in-place. Move closures are supported.
pub async fn patch_status<S: Status, T>(
    client: Client,
    instance: &T,
    f: impl FnOnce(&mut S),
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Clone
        + Resource
        + Object<S>
        + Serialize
        + DeserializeOwned
        + Debug
        + Resource<Scope = NamespaceResourceScope>,
{
    let patch = Patch::Json::<T>({
        let mut modified = instance.clone();
        let status = modified.mut_status();
        f(status);
        status.set_last_probe_time(Time::from(Timestamp::now()));
        json_patch::diff(
            &serde_json::to_value(instance).unwrap(),
            &serde_json::to_value(&modified).unwrap(),
        )
    });
    let name = instance.meta().name.as_deref().unwrap();
    let namespace = instance.meta().namespace.as_deref().unwrap();
    let api: Api<T> = Api::namespaced(client, namespace);
    api.patch_status(name, &PatchParams::apply(MANAGER_NAME), &patch)
        .await
}

/// Merges the given membership fields into a pod's observed-state
/// annotations, one annotation key per `PodMembership` field. Used by both
/// the reconciliation domain (after admin calls) and the Group Monitor
/// (after a view change) — spec.md §5 requires last-writer-wins on
/// individual fields, so a caller that only sets `status` (say) must not
/// clobber a `view_id` some other writer set moments earlier. A merge patch
/// only omitting the keys this call leaves as `None` gives us that; folding
/// every field into one JSON-blob annotation would not.
pub async fn patch_pod_membership(
    client: Client,
    namespace: &str,
    pod_name: &str,
    membership: &PodMembership,
) -> Result<Pod, Error> {
    use mysql_operator_common::annotations as a;

    let api: Api<Pod> = Api::namespaced(client, namespace);
    let mut annotations = serde_json::Map::new();
    if let Some(member_id) = &membership.member_id {
        annotations.insert(a::MEMBERSHIP_MEMBER_ID.to_string(), member_id.clone().into());
    }
    if let Some(role) = &membership.role {
        annotations.insert(
            a::MEMBERSHIP_ROLE.to_string(),
            serde_json::to_value(role).expect("MemberRole always serializes"),
        );
    }
    if let Some(status) = &membership.status {
        annotations.insert(
            a::MEMBERSHIP_STATUS.to_string(),
            serde_json::to_value(status).expect("MemberStatus always serializes"),
        );
    }
    if let Some(view_id) = &membership.view_id {
        annotations.insert(a::MEMBERSHIP_VIEW_ID.to_string(), view_id.clone().into());
    }
    if let Some(server_version) = &membership.server_version {
        annotations.insert(
            a::MEMBERSHIP_SERVER_VERSION.to_string(),
            server_version.clone().into(),
        );
    }
    if let Some(last_transition_time) = &membership.last_transition_time {
        annotations.insert(
            a::MEMBERSHIP_LAST_TRANSITION_TIME.to_string(),
            serde_json::to_value(last_transition_time).expect("Time always serializes"),
        );
    }

    if annotations.is_empty() {
        return api.get(pod_name).await;
    }

    let patch = serde_json::json!({
        "metadata": {
            "annotations": serde_json::Value::Object(annotations),
        }
    });
    api.patch(
        pod_name,
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(patch),
    )
    .await
}

pub fn read_pod_membership(pod: &Pod) -> PodMembership {
    use mysql_operator_common::annotations as a;

    let Some(annotations) = pod.metadata.annotations.as_ref() else {
        return PodMembership::default();
    };
    let get = |key: &str| annotations.get(key);
    let parse = |key: &str| get(key).and_then(|v| serde_json::from_str(&format!("{v:?}")).ok());

    PodMembership {
        member_id: get(a::MEMBERSHIP_MEMBER_ID).cloned(),
        role: parse(a::MEMBERSHIP_ROLE),
        status: parse(a::MEMBERSHIP_STATUS),
        view_id: get(a::MEMBERSHIP_VIEW_ID).cloned(),
        server_version: get(a::MEMBERSHIP_SERVER_VERSION).cloned(),
        last_transition_time: parse(a::MEMBERSHIP_LAST_TRANSITION_TIME),
    }
}

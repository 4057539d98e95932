//! Cluster Controller entrypoint (spec.md §4.4): wires a
//! `kube::runtime::Controller` over `InnoDbCluster`, owning `Pod`, behind
//! leader election, and dispatches each reconciliation through the
//! [`crate::mutex::ClusterMutex`] into the actions in
//! [`crate::cluster::actions`].
//!
//! `cluster_controller.py`'s original shape is a set of discrete kopf
//! handlers (`on_pod_created`, `on_pod_restarted`, `on_pod_deleted`,
//! `on_group_view_change`). `kube-rs`'s ownership-based watch instead
//! delivers one reconcile per changed `InnoDbCluster` or owned `Pod`, with
//! no diff of what changed — so `reconcile` below re-derives "what kind of
//! pod event this looks like" from each pod's finalizer/deletion state on
//! every pass, which is both simpler and safe to run redundantly.

use futures::stream::StreamExt;
use kube::{
    Api, Client, ResourceExt,
    api::{Patch, PatchParams},
    runtime::{Controller, controller::Action},
};
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use k8s_openapi::api::core::v1::Pod;
use mysql_operator_types::InnoDbCluster;

use super::{actions, pod};
use crate::admin::{AdminClient, MysqlAdminClient};
use crate::monitor::{ClusterRef, GroupMonitor, GroupMonitorHandle, PodEndpoint, PodSource};
use crate::mutex::ClusterMutex;
use crate::util::patch::read_pod_membership;
use crate::util::{Error, MANAGER_NAME, PROBE_INTERVAL};

#[cfg(feature = "metrics")]
use crate::util::metrics::ControllerMetrics;

/// Entrypoint for the `InnoDbCluster` controller. Runs leader election the
/// same way the teacher's `clusters::reconcile::run` does, so only one
/// operator replica drives reconciliation at a time; the others stay hot
/// standbys.
pub async fn run(client: Client, admin: Arc<MysqlAdminClient>) -> Result<(), Error> {
    println!("{}", "⚙️ Starting Cluster controller...".green());

    let (monitor, monitor_handle) = GroupMonitor::<MysqlAdminClient>::new();
    let context: Arc<ContextData<MysqlAdminClient>> = Arc::new(ContextData::new(
        client.clone(),
        admin,
        monitor_handle.clone(),
    ));

    let lease_namespace = std::env::var("NAMESPACE").unwrap_or_else(|_| "default".to_string());
    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("mysql-cluster-controller-{}", uuid::Uuid::new_v4()));
    let lease_name = "mysql-cluster-controller-lock".to_string();
    let lease_ttl = Duration::from_secs(15);
    let renew_every = Duration::from_secs(5);
    let leadership = LeaseLock::new(
        client.clone(),
        &lease_namespace,
        LeaseLockParams {
            holder_id,
            lease_name,
            lease_ttl,
        },
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        mysql_operator_common::shutdown::shutdown_signal().await;
        shutdown_signal.cancel();
    });

    let monitor_cancel = shutdown.clone();
    tokio::spawn(async move { monitor.run(monitor_cancel).await });

    mysql_operator_common::signal_ready();
    println!(
        "{}",
        "🌱 Cluster controller ready, awaiting leadership...".green()
    );

    let mut controller_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(renew_every);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(task) = controller_task.take() {
                    task.abort();
                    task.await.ok();
                }
                break Ok(())
            },
            _ = tick.tick() => {}
        }

        let lease = match leadership.try_acquire_or_renew().await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                if let Some(task) = controller_task.take() {
                    task.abort();
                    eprintln!("aborted controller due to leader election error");
                }
                continue;
            }
        };

        if matches!(lease, LeaseLockResult::Acquired(_)) {
            if controller_task.is_none() {
                println!("{}", "👑 Acquired leadership; starting controller".green());
                let client_for_controller = client.clone();
                let context_for_controller = context.clone();
                let controller_namespace = lease_namespace.clone();
                let crd_api: Api<InnoDbCluster> =
                    Api::namespaced(client_for_controller.clone(), &controller_namespace);
                let pod_api: Api<Pod> =
                    Api::namespaced(client_for_controller, &controller_namespace);
                controller_task = Some(tokio::spawn(async move {
                    println!("{}", "🚀 Cluster controller started.".green());
                    Controller::new(crd_api, Default::default())
                        .owns(pod_api, Default::default())
                        .run(reconcile, on_error, context_for_controller)
                        .for_each(|_res| async move {})
                        .await;
                }));
            }
        } else if let Some(task) = controller_task.take() {
            eprintln!("lost leadership; stopping controller");
            task.abort();
        }
    }
}

/// Context injected into every `reconcile`/`on_error` call.
struct ContextData<A: AdminClient> {
    client: Client,
    admin: Arc<A>,
    mutex: ClusterMutex,
    monitor: GroupMonitorHandle<A>,

    #[cfg(feature = "metrics")]
    metrics: ControllerMetrics,
}

impl<A: AdminClient + 'static> ContextData<A> {
    fn new(client: Client, admin: Arc<A>, monitor: GroupMonitorHandle<A>) -> Self {
        #[cfg(feature = "metrics")]
        {
            ContextData {
                client,
                admin,
                mutex: ClusterMutex::new(),
                monitor,
                metrics: ControllerMetrics::new("cluster_controller"),
            }
        }
        #[cfg(not(feature = "metrics"))]
        {
            ContextData {
                client,
                admin,
                mutex: ClusterMutex::new(),
                monitor,
            }
        }
    }
}

/// Supplies the Group Monitor with a cluster's current pod inventory,
/// reading `admin_port` off the live `InnoDbCluster` so the endpoints it
/// builds match whatever the spec declares.
struct KubePodSource {
    client: Client,
}

#[async_trait::async_trait]
impl PodSource for KubePodSource {
    async fn list_pods(&self, cluster: &ClusterRef) -> Result<Vec<PodEndpoint>, Error> {
        let clusters: Api<InnoDbCluster> =
            Api::namespaced(self.client.clone(), &cluster.namespace);
        let instance = clusters.get(&cluster.name).await?;

        let pods_api: Api<Pod> = Api::namespaced(self.client.clone(), &cluster.namespace);
        let lp = kube::api::ListParams::default()
            .labels(&format!("{}={}", pod::CLUSTER_LABEL, cluster.name));
        let pods = pods_api.list(&lp).await?.items;

        Ok(pods
            .into_iter()
            .filter(|p| !pod::is_deleting(p))
            .map(|p| {
                let name = p.name_any();
                let endpoint = pod::admin_endpoint(
                    &name,
                    &cluster.name,
                    &cluster.namespace,
                    instance.spec.admin_port,
                );
                let membership = read_pod_membership(&p);
                PodEndpoint {
                    name,
                    endpoint,
                    last_role: membership.role,
                }
            })
            .collect())
    }
}

/// Builds the handler the Group Monitor invokes on every view change
/// (spec.md §4.5 step 2): mirrors each member's observed role/status back
/// onto its pod annotation. The callback itself must stay synchronous, so
/// the actual patch work runs on a spawned task.
fn make_view_change_handler(client: Client) -> crate::monitor::ViewChangeHandler {
    Arc::new(
        move |cluster: &ClusterRef,
              members: &[mysql_operator_types::MemberView],
              _changed: bool| {
            let client = client.clone();
            let namespace = cluster.namespace.clone();
            let members = members.to_vec();
            tokio::spawn(async move {
                for member in &members {
                    let result = crate::util::patch::patch_pod_membership(
                        client.clone(),
                        &namespace,
                        &member.host,
                        &mysql_operator_types::PodMembership {
                            member_id: Some(member.member_id.clone()),
                            role: Some(member.role),
                            status: Some(member.status),
                            view_id: Some(member.view_id.clone()),
                            server_version: Some(member.server_version.clone()),
                            last_transition_time: None,
                        },
                    )
                    .await;
                    if let Err(e) = result {
                        mysql_operator_common::log::warning(&format!(
                            "failed to mirror membership for {}: {e}",
                            member.host
                        ));
                    }
                }
            });
        },
    )
}

async fn ensure_cluster_finalizer(client: Client, instance: &InnoDbCluster) -> Result<(), Error> {
    let spec_hash = crate::util::hash_spec(&instance.spec);
    let stamped = instance
        .meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(mysql_operator_common::annotations::SPEC_HASH))
        == Some(&spec_hash);
    let has_finalizer = instance
        .finalizers()
        .iter()
        .any(|f| f == mysql_operator_common::annotations::CLUSTER_FINALIZER);
    if has_finalizer && stamped {
        return Ok(());
    }
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("InnoDbCluster is missing metadata.namespace".into()))?;
    let mut finalizers = instance.finalizers().to_vec();
    if !has_finalizer {
        finalizers.push(mysql_operator_common::annotations::CLUSTER_FINALIZER.to_string());
    }
    let api: Api<InnoDbCluster> = Api::namespaced(client, &namespace);
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers,
            "annotations": {
                mysql_operator_common::annotations::CREATED_BY: MANAGER_NAME,
                mysql_operator_common::annotations::SPEC_HASH: spec_hash,
            },
        }
    });
    api.patch(
        &instance.name_any(),
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(patch),
    )
    .await?;
    Ok(())
}

async fn remove_cluster_finalizer(client: Client, instance: &InnoDbCluster) -> Result<(), Error> {
    let namespace = instance
        .namespace()
        .ok_or_else(|| Error::UserInput("InnoDbCluster is missing metadata.namespace".into()))?;
    let mut finalizers = instance.finalizers().to_vec();
    finalizers.retain(|f| f != mysql_operator_common::annotations::CLUSTER_FINALIZER);
    let api: Api<InnoDbCluster> = Api::namespaced(client, &namespace);
    let patch = serde_json::json!({ "metadata": { "finalizers": finalizers } });
    api.patch(
        &instance.name_any(),
        &PatchParams::apply(MANAGER_NAME),
        &Patch::Merge(patch),
    )
    .await?;
    Ok(())
}

/// Reconciliation function for the `InnoDbCluster` resource.
async fn reconcile<A: AdminClient + 'static>(
    instance: Arc<InnoDbCluster>,
    context: Arc<ContextData<A>>,
) -> Result<Action, Error> {
    let client = context.client.clone();
    let namespace = instance.namespace().ok_or_else(|| {
        Error::UserInput(
            "Expected InnoDbCluster resource to be namespaced, can't reconcile without one".into(),
        )
    })?;
    let name = instance.name_any();
    let holder = format!("{name}-controller");

    let _guard = context.mutex.acquire(&namespace, &name, &holder)?;

    #[cfg(feature = "metrics")]
    context
        .metrics
        .reconcile_counter
        .with_label_values(&[&name, &namespace])
        .inc();

    if instance.meta().deletion_timestamp.is_some() {
        return on_cluster_deleting(client, &context, &instance).await;
    }

    ensure_cluster_finalizer(client.clone(), &instance).await?;

    let pods_api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
    let lp = kube::api::ListParams::default().labels(&format!("{}={name}", pod::CLUSTER_LABEL));
    let mut pods = pods_api.list(&lp).await?.items;
    pods.sort_by_key(|p| pod::pod_ordinal(&p.name_any(), &name).unwrap_or(u32::MAX));

    let has_create_time = instance
        .status
        .as_ref()
        .and_then(|s| s.create_time.as_ref())
        .is_some();

    for p in &pods {
        if pod::is_deleting(p) {
            if pod::has_member_finalizer(p) {
                crate::util::retry_loop(|| {
                    actions::remove_instance(client.clone(), context.admin.as_ref(), &instance, p)
                })
                .await?;
            }
            continue;
        }

        if !pod::has_member_finalizer(p) {
            let is_seed = !has_create_time && pod::pod_ordinal(&p.name_any(), &name) == Some(0);
            if is_seed {
                crate::util::retry_loop(|| {
                    actions::create_cluster(client.clone(), context.admin.as_ref(), &instance, p)
                })
                .await?;
            } else {
                let primary = pods.iter().find(|q| q.name_any() != p.name_any());
                crate::util::retry_loop(|| {
                    actions::reconcile_pod(
                        client.clone(),
                        context.admin.as_ref(),
                        &instance,
                        primary.map(|q| q.name_any()).as_deref(),
                        p,
                    )
                })
                .await?;
            }
        }
    }

    let diagnostic = crate::util::retry_loop(|| {
        actions::probe_status(client.clone(), context.admin.as_ref(), &instance)
    })
    .await?;

    for p in &pods {
        if pod::is_deleting(p) {
            continue;
        }
        let membership = read_pod_membership(p);
        let ready = matches!(
            membership.status,
            Some(mysql_operator_types::MemberStatus::Online)
        );
        pod::set_ready_gate(client.clone(), p, ready).await?;
    }

    context.monitor.monitor_cluster(
        ClusterRef {
            namespace: namespace.clone(),
            name: name.clone(),
        },
        context.admin.clone(),
        Arc::new(KubePodSource {
            client: client.clone(),
        }),
        make_view_change_handler(client.clone()),
    );

    if !diagnostic.kind.is_online_family() {
        crate::util::retry_loop(|| {
            actions::repair_cluster(client.clone(), context.admin.as_ref(), &instance, &diagnostic)
        })
        .await?;
    }

    Ok(Action::requeue(PROBE_INTERVAL))
}

/// Runs the cluster's teardown path: best-effort stop on the last pod, then
/// drop the cluster finalizer and forget it from the Group Monitor.
async fn on_cluster_deleting<A: AdminClient + 'static>(
    client: Client,
    context: &ContextData<A>,
    instance: &InnoDbCluster,
) -> Result<Action, Error> {
    let namespace = instance.namespace().unwrap_or_default();
    let name = instance.name_any();

    context.monitor.remove_cluster(ClusterRef {
        namespace: namespace.clone(),
        name: name.clone(),
    });

    let pods_api: Api<Pod> = Api::namespaced(client.clone(), &namespace);
    let lp = kube::api::ListParams::default().labels(&format!("{}={name}", pod::CLUSTER_LABEL));
    let pods = pods_api.list(&lp).await?.items;

    if let Some(last) = pods.iter().find(|p| pod::has_member_finalizer(p)) {
        actions::destroy_cluster(client.clone(), context.admin.as_ref(), instance, last).await?;
    }

    if pods.iter().all(|p| !pod::has_member_finalizer(p)) {
        remove_cluster_finalizer(client, instance).await?;
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(Duration::from_secs(5)))
    }
}

fn on_error<A: AdminClient>(
    instance: Arc<InnoDbCluster>,
    error: &Error,
    _context: Arc<ContextData<A>>,
) -> Action {
    eprintln!(
        "{}",
        format!(
            "Reconciliation error for {}/{}: {error}",
            instance.namespace().unwrap_or_default(),
            instance.name_any()
        )
        .red()
    );
    error.into_action()
}

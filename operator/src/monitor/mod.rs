//! Monitored Cluster / Group Monitor (spec.md §4.5, §4.6): a long-lived
//! watcher that keeps a live session to each managed cluster's PRIMARY and
//! pushes membership-change notices back into the Cluster Controller's
//! `on_group_view_change` sink. This domain never acquires the
//! [`crate::mutex::ClusterMutex`] and never mutates cluster membership —
//! only informational pod annotations (spec.md §5).
//!
//! The classic MySQL protocol this core's `AdminClient` speaks (via
//! `mysql_async`) has no equivalent of the X-protocol's asynchronous
//! `GRViewChanged` server push that `group_monitor.py` subscribes to.
//! `handle_notice` approximates it by re-querying the session's own view_id
//! every tick and diffing against the last observed value — functionally
//! equivalent from the controller's point of view, since `on_view_change`
//! only ever reacts to "did the view_id change", never to the notice
//! envelope itself.

use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::admin::AdminClient;
use crate::util::Error;
use mysql_operator_types::{MemberRole, MemberView};

/// Throttle on connection attempts (spec.md §4.5): at most one attempt per
/// 10 seconds after a failure.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound on how long one `GroupMonitor` tick waits before re-checking
/// for newly registered clusters (spec.md §4.6): new clusters must become
/// effective within this period even if nothing else is readable.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Identifies a managed cluster the way Kubernetes does: by namespace/name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterRef {
    pub namespace: String,
    pub name: String,
}

/// One pod the monitor can try to connect to, as last observed by the
/// reconciliation domain.
#[derive(Debug, Clone)]
pub struct PodEndpoint {
    pub name: String,
    pub endpoint: String,
    pub last_role: Option<MemberRole>,
}

/// Supplies the monitor with each managed cluster's current pod inventory.
/// Implemented against `kube::Api<Pod>` in the binary; kept as a trait here
/// so the connection algorithm is testable against a fixed fixture.
#[async_trait::async_trait]
pub trait PodSource: Send + Sync {
    async fn list_pods(&self, cluster: &ClusterRef) -> Result<Vec<PodEndpoint>, Error>;
}

/// Invoked on every view change with `(cluster, members, view_id_changed)`.
/// Updates per-pod observed-state annotations; never drives lifecycle
/// transitions (spec.md §4.5 step 2).
pub type ViewChangeHandler = Arc<dyn Fn(&ClusterRef, &[MemberView], bool) + Send + Sync>;

/// Maintains at most one live session to a single managed cluster,
/// preferring the PRIMARY (spec.md §4.5).
pub struct MonitoredCluster<A: AdminClient> {
    pub cluster: ClusterRef,
    admin: Arc<A>,
    pods: Arc<dyn PodSource>,
    handler: ViewChangeHandler,

    session: Option<A::Session>,
    target: Option<String>,
    target_not_primary: bool,
    last_connect_attempt: Option<Instant>,
    last_view_id: Option<String>,
    last_primary_member_id: Option<String>,
}

impl<A: AdminClient> MonitoredCluster<A> {
    pub fn new(
        cluster: ClusterRef,
        admin: Arc<A>,
        pods: Arc<dyn PodSource>,
        handler: ViewChangeHandler,
    ) -> Self {
        MonitoredCluster {
            cluster,
            admin,
            pods,
            handler,
            session: None,
            target: None,
            target_not_primary: false,
            last_connect_attempt: None,
            last_view_id: None,
            last_primary_member_id: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Connects if there's no live session and the retry throttle allows
    /// it (spec.md §4.5 connection algorithm, steps 1-3).
    pub async fn ensure_connected(&mut self) {
        if self.session.is_some() {
            return;
        }
        if let Some(last) = self.last_connect_attempt
            && last.elapsed() < CONNECT_RETRY_INTERVAL
        {
            return;
        }
        self.last_connect_attempt = Some(Instant::now());

        println!(
            "{}",
            format!(
                "GroupMonitor: connecting to a member of {}/{}",
                self.cluster.namespace, self.cluster.name
            )
            .dimmed()
        );

        match self.connect_to_primary().await {
            Ok(Some((session, target, target_not_primary))) => {
                self.session = Some(session);
                self.target = Some(target);
                self.target_not_primary = target_not_primary;
                // Force a refresh so we don't miss anything that happened
                // while disconnected.
                self.on_view_change(None).await;
            }
            Ok(None) => {
                println!(
                    "{}",
                    format!(
                        "GroupMonitor: no reachable member for {}/{}",
                        self.cluster.namespace, self.cluster.name
                    )
                    .yellow()
                );
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    format!(
                        "GroupMonitor: connect error for {}/{}: {e}",
                        self.cluster.namespace, self.cluster.name
                    )
                    .red()
                );
            }
        }
    }

    /// Step 1: prefer a pod last known to be PRIMARY, jumping from it.
    /// Step 2: otherwise try every pod in turn.
    /// Step 4: on a transient transport error, retry within the call.
    async fn connect_to_primary(&self) -> Result<Option<(A::Session, String, bool)>, Error> {
        let pods = self.pods.list_pods(&self.cluster).await?;

        let ordered: Vec<&PodEndpoint> = pods
            .iter()
            .filter(|p| p.last_role == Some(MemberRole::Primary))
            .chain(pods.iter().filter(|p| p.last_role != Some(MemberRole::Primary)))
            .collect();

        for pod in ordered {
            loop {
                let mut session = match self.admin.connect(&pod.endpoint).await {
                    Ok(s) => s,
                    Err(e) if e.is_transient() => continue,
                    Err(_) => break,
                };

                match self.admin.jump_to_primary(&mut session).await {
                    Ok(Some(primary_session)) => {
                        return Ok(Some((
                            primary_session,
                            pod.endpoint.clone(),
                            false,
                        )));
                    }
                    Ok(None) => {
                        // Reachable but not the PRIMARY; keep as a fallback
                        // candidate while trying the rest of the inventory.
                        return Ok(Some((session, pod.endpoint.clone(), true)));
                    }
                    Err(e) if e.is_transient() => continue,
                    Err(_) => break,
                }
            }
        }

        Ok(None)
    }

    /// Approximates `handle_notice` (spec.md §4.5): re-reads the session's
    /// own view_id and, if it moved, runs `on_view_change`. Any error closes
    /// the session so the next tick reconnects.
    pub async fn handle_notice(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match self.admin.query_membership(session).await {
            Ok(membership) => {
                if Some(membership.view_id.as_str()) != self.last_view_id.as_deref() {
                    let view_id = membership.view_id;
                    self.on_view_change(Some(view_id)).await;
                }
            }
            Err(e) => {
                eprintln!(
                    "{}",
                    format!(
                        "GroupMonitor: error fetching notice dest={:?} error={e}",
                        self.target
                    )
                    .red()
                );
                self.session = None;
            }
        }
    }

    /// spec.md §4.5's `on_view_change`: query all members, invoke the
    /// handler, then force reconnection if the PRIMARY moved away from the
    /// pod we're connected to.
    async fn on_view_change(&mut self, view_id: Option<String>) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let members = match self.admin.query_members(session).await {
            Ok(m) => m,
            Err(e) => {
                eprintln!(
                    "{}",
                    format!("GroupMonitor: query_members failed: {e}").red()
                );
                self.session = None;
                return;
            }
        };

        let view_id_changed = view_id.as_deref() != self.last_view_id.as_deref();
        (self.handler)(&self.cluster, &members, view_id_changed);
        self.last_view_id = view_id;

        let mut force_reconnect = false;
        let mut primary = None;
        for m in &members {
            if self.last_primary_member_id.as_deref() == Some(m.member_id.as_str())
                && m.role != MemberRole::Primary
            {
                force_reconnect = true;
            }
            if m.role == MemberRole::Primary && primary.is_none() {
                primary = Some(m.member_id.clone());
            }
        }
        self.last_primary_member_id = primary;

        if self.target_not_primary || force_reconnect {
            println!(
                "{}",
                format!(
                    "GroupMonitor: PRIMARY changed for {}/{}",
                    self.cluster.namespace, self.cluster.name
                )
                .yellow()
            );
            self.session = None;
        }
    }
}

enum Command<A: AdminClient> {
    Add(ClusterRef, Arc<A>, Arc<dyn PodSource>, ViewChangeHandler),
    Remove(ClusterRef),
}

/// Handle used by the reconciliation domain to register/unregister clusters
/// with the background `GroupMonitor` task. Registration is idempotent on
/// `(namespace, name)` (spec.md §4.6).
#[derive(Clone)]
pub struct GroupMonitorHandle<A: AdminClient> {
    tx: mpsc::UnboundedSender<Command<A>>,
}

impl<A: AdminClient + 'static> GroupMonitorHandle<A> {
    pub fn monitor_cluster(
        &self,
        cluster: ClusterRef,
        admin: Arc<A>,
        pods: Arc<dyn PodSource>,
        handler: ViewChangeHandler,
    ) {
        let _ = self.tx.send(Command::Add(cluster, admin, pods, handler));
    }

    pub fn remove_cluster(&self, cluster: ClusterRef) {
        let _ = self.tx.send(Command::Remove(cluster));
    }
}

/// Runs all `MonitoredCluster`s concurrently, multiplexing their sessions
/// (spec.md §4.6). A single long-lived task; interruptible via
/// `CancellationToken` and a control channel so newly added clusters take
/// effect within one tick.
pub struct GroupMonitor<A: AdminClient> {
    clusters: HashMap<ClusterRef, MonitoredCluster<A>>,
    rx: mpsc::UnboundedReceiver<Command<A>>,
}

impl<A: AdminClient + 'static> GroupMonitor<A> {
    pub fn new() -> (Self, GroupMonitorHandle<A>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            GroupMonitor {
                clusters: HashMap::new(),
                rx,
            },
            GroupMonitorHandle { tx },
        )
    }

    fn apply(&mut self, cmd: Command<A>) {
        match cmd {
            Command::Add(cluster, admin, pods, handler) => {
                if self.clusters.contains_key(&cluster) {
                    return;
                }
                println!(
                    "{}",
                    format!("Added monitor for {}/{}", cluster.namespace, cluster.name).green()
                );
                self.clusters.insert(
                    cluster.clone(),
                    MonitoredCluster::new(cluster, admin, pods, handler),
                );
            }
            Command::Remove(cluster) => {
                self.clusters.remove(&cluster);
            }
        }
    }

    /// Drives every managed cluster until `cancel` fires. Each tick: ensure
    /// every cluster has a live session (throttled), then poll every live
    /// session for pending notices.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.apply(cmd),
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    for cluster in self.clusters.values_mut() {
                        cluster.ensure_connected().await;
                        if cluster.has_session() {
                            cluster.handle_notice().await;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_ref_equality_is_namespace_and_name() {
        let a = ClusterRef {
            namespace: "ns".into(),
            name: "mycluster".into(),
        };
        let b = ClusterRef {
            namespace: "ns".into(),
            name: "mycluster".into(),
        };
        assert_eq!(a, b);
    }
}

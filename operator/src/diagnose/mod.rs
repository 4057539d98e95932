//! Diagnostic Engine (spec.md §4.2): produces a `ClusterDiagnostic` from a
//! pod inventory plus a per-pod reachability/view snapshot, and a
//! `CandidateDiagnosticKind` for one pod at a time. Both are pure functions
//! of their inputs — no I/O happens here; `probe_status` in
//! `crate::cluster::actions` gathers the inputs via the `AdminClient` and
//! calls straight into `diagnose_cluster`.

use mysql_operator_types::{ClusterDiagnosticKind, MemberRole, MemberStatus, MemberView};
use std::collections::HashMap;

/// One pod's slot in the inventory the Diagnostic Engine cross-references
/// against the group view.
#[derive(Debug, Clone)]
pub struct PodFact {
    pub name: String,
    pub index: u32,
}

/// What a single pod's session reported when probed, or that it couldn't be
/// reached at all.
#[derive(Debug, Clone)]
pub enum PodProbe {
    Unreachable,
    /// The full `query_members` view as seen from this pod's session. Empty
    /// when Group Replication isn't running on that member at all.
    Reachable(Vec<MemberView>),
}

/// Result of `diagnose_cluster`: the tagged variant from spec.md §3 plus its
/// auxiliary data.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterDiagnostic {
    pub kind: ClusterDiagnosticKind,
    /// member_ids of every member seen ONLINE in the winning view.
    pub online_members: Vec<String>,
    /// The pod name inferred to be hosting the PRIMARY, if any.
    pub primary: Option<String>,
    /// Pods to try, in order, as a `force_quorum_using_partition_of` seed.
    pub quorum_candidates: Vec<String>,
}

impl ClusterDiagnostic {
    fn simple(kind: ClusterDiagnosticKind) -> Self {
        ClusterDiagnostic {
            kind,
            online_members: Vec::new(),
            primary: None,
            quorum_candidates: Vec::new(),
        }
    }
}

/// Per-pod variant used by `reconcile_pod` to decide what to do with one
/// particular instance (spec.md §3/§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDiagnostic {
    Joinable,
    Rejoinable,
    Member,
    Unreachable,
    Broken,
}

impl From<CandidateDiagnostic> for mysql_operator_types::CandidateDiagnosticKind {
    fn from(value: CandidateDiagnostic) -> Self {
        use mysql_operator_types::CandidateDiagnosticKind as K;
        match value {
            CandidateDiagnostic::Joinable => K::Joinable,
            CandidateDiagnostic::Rejoinable => K::Rejoinable,
            CandidateDiagnostic::Member => K::Member,
            CandidateDiagnostic::Unreachable => K::Unreachable,
            CandidateDiagnostic::Broken => K::Broken,
        }
    }
}

/// True when `view` represents a strict majority of the cluster's declared
/// instance count — "quorum" per the GLOSSARY.
fn has_quorum(view: &[MemberView], total_pods: usize) -> bool {
    !view.is_empty() && view.len() * 2 > total_pods
}

/// True when a group's ONLINE members form a strict majority of that same
/// group's own view — i.e. the partition believes it has quorum relative to
/// its own last known membership, regardless of what the rest of the cluster
/// looks like. Two disjoint groups can each independently satisfy this (each
/// only knows its own side), which is exactly split brain; they can never
/// both satisfy `has_quorum` against the same global total.
fn is_self_quorate(view: &[MemberView]) -> bool {
    let online = view.iter().filter(|m| m.status == MemberStatus::Online).count();
    online * 2 > view.len()
}

/// Dedupe reachable non-empty views by their member-id set, so that two
/// pods inside the same functioning group (who will report an identical
/// view) collapse into one group, while a genuine partition produces a
/// second, distinct group.
fn distinct_views(reachable: &[&[MemberView]]) -> Vec<&[MemberView]> {
    let mut seen: Vec<Vec<String>> = Vec::new();
    let mut out = Vec::new();
    for view in reachable {
        if view.is_empty() {
            continue;
        }
        let mut ids: Vec<String> = view.iter().map(|m| m.member_id.clone()).collect();
        ids.sort();
        if !seen.contains(&ids) {
            seen.push(ids);
            out.push(*view);
        }
    }
    out
}

/// Tie-break rule (spec.md §4.2): of the members self-reporting PRIMARY in a
/// view, the one with the highest `view_id` wins; equal `view_id`s leave the
/// primary ambiguous (`None`).
fn infer_primary(view: &[MemberView]) -> Option<&MemberView> {
    let mut primaries: Vec<&MemberView> = view
        .iter()
        .filter(|m| m.role == MemberRole::Primary)
        .collect();
    primaries.sort_by(|a, b| b.view_id.cmp(&a.view_id));
    match primaries.as_slice() {
        [] => None,
        [only] => Some(only),
        [first, second, ..] => {
            if first.view_id == second.view_id {
                None
            } else {
                Some(first)
            }
        }
    }
}

fn member_id_for_pod<'a>(pod_name: &str, probes: &'a HashMap<String, PodProbe>) -> Option<&'a str> {
    // The inventory maps pods by Kubernetes name; the group view only knows
    // member_ids. A pod's own probe (if reachable) is the only source that
    // lets us connect the two: its `query_membership` row names itself.
    match probes.get(pod_name) {
        Some(PodProbe::Reachable(view)) => view.first().map(|m| m.member_id.as_str()),
        _ => None,
    }
}

/// Given the pod inventory and a per-pod reachability snapshot, produce the
/// cluster-wide diagnosis (spec.md §4.2 step 4, evaluated in the documented
/// order).
pub fn diagnose_cluster(
    pods: &[PodFact],
    probes: &HashMap<String, PodProbe>,
    has_create_time: bool,
    cluster_deleting: bool,
) -> ClusterDiagnostic {
    if pods.is_empty() {
        return ClusterDiagnostic::simple(if has_create_time {
            ClusterDiagnosticKind::Invalid
        } else {
            ClusterDiagnosticKind::Initializing
        });
    }

    if cluster_deleting {
        return ClusterDiagnostic::simple(ClusterDiagnosticKind::Finalizing);
    }

    let reachable_views: Vec<&[MemberView]> = pods
        .iter()
        .filter_map(|p| match probes.get(&p.name) {
            Some(PodProbe::Reachable(v)) => Some(v.as_slice()),
            _ => None,
        })
        .collect();

    if reachable_views.is_empty() {
        return ClusterDiagnostic::simple(ClusterDiagnosticKind::Unknown);
    }

    let unreachable = pods.len() - reachable_views.len();
    let groups = distinct_views(&reachable_views);

    // No member ONLINE anywhere reachable == the group is simply stopped
    // (complete outage), not a partition.
    let any_online = groups
        .iter()
        .any(|g| g.iter().any(|m| m.status == MemberStatus::Online));

    if groups.is_empty() || !any_online {
        return ClusterDiagnostic::simple(if unreachable > 0 {
            ClusterDiagnosticKind::OfflineUncertain
        } else {
            ClusterDiagnosticKind::Offline
        });
    }

    let self_quorate_groups: Vec<&[MemberView]> = groups
        .iter()
        .copied()
        .filter(|g| is_self_quorate(g))
        .collect();

    if self_quorate_groups.len() >= 2 {
        return ClusterDiagnostic::simple(if unreachable > 0 {
            ClusterDiagnosticKind::SplitBrainUncertain
        } else {
            ClusterDiagnosticKind::SplitBrain
        });
    }

    let quorum_groups: Vec<&[MemberView]> = groups
        .iter()
        .copied()
        .filter(|g| has_quorum(g, pods.len()))
        .collect();

    match quorum_groups.len() {
        0 => {
            // Partitioned with no majority anywhere. Offer every reachable
            // pod as a `force_quorum` candidate, ranked by how many online
            // members its own view contains (the most informed partition
            // first).
            let mut candidates: Vec<(&str, usize)> = pods
                .iter()
                .filter_map(|p| match probes.get(&p.name) {
                    Some(PodProbe::Reachable(v)) => Some((
                        p.name.as_str(),
                        v.iter().filter(|m| m.status == MemberStatus::Online).count(),
                    )),
                    _ => None,
                })
                .collect();
            candidates.sort_by(|a, b| b.1.cmp(&a.1));

            ClusterDiagnostic {
                kind: if unreachable > 0 {
                    ClusterDiagnosticKind::NoQuorumUncertain
                } else {
                    ClusterDiagnosticKind::NoQuorum
                },
                online_members: Vec::new(),
                primary: None,
                quorum_candidates: candidates.into_iter().map(|(n, _)| n.to_string()).collect(),
            }
        }
        1 => {
            let view = quorum_groups[0];
            let online_members: Vec<String> = view
                .iter()
                .filter(|m| m.status == MemberStatus::Online)
                .map(|m| m.member_id.clone())
                .collect();
            let primary = infer_primary(view).and_then(|primary_view| {
                pods.iter()
                    .find(|p| member_id_for_pod(&p.name, probes) == Some(primary_view.member_id.as_str()))
                    .map(|p| p.name.clone())
            });

            let all_expected_online = view.len() == pods.len()
                && view.iter().all(|m| m.status == MemberStatus::Online);

            let kind = if unreachable > 0 {
                ClusterDiagnosticKind::OnlineUncertain
            } else if all_expected_online {
                ClusterDiagnosticKind::Online
            } else {
                ClusterDiagnosticKind::OnlinePartial
            };

            ClusterDiagnostic {
                kind,
                online_members,
                primary,
                quorum_candidates: Vec::new(),
            }
        }
        _ => ClusterDiagnostic::simple(if unreachable > 0 {
            ClusterDiagnosticKind::SplitBrainUncertain
        } else {
            ClusterDiagnosticKind::SplitBrain
        }),
    }
}

/// Per-pod decision (spec.md §4.2 step 5): what should `reconcile_pod` do
/// with this one instance.
///
/// - `pod_reachable`: false if the pod's own session couldn't be opened.
/// - `pod_self_report`: the pod's own `query_membership` row, if it reports
///   ever having joined a group (`None` means "no prior membership record").
/// - `cluster_view`: `query_members` as seen from the cluster's current
///   PRIMARY (or any reachable member if no PRIMARY is known).
pub fn diagnose_cluster_candidate(
    pod_reachable: bool,
    pod_self_report: Option<&MemberView>,
    cluster_view: &[MemberView],
) -> CandidateDiagnostic {
    if !pod_reachable {
        return CandidateDiagnostic::Unreachable;
    }

    let Some(self_report) = pod_self_report else {
        return CandidateDiagnostic::Joinable;
    };

    match cluster_view
        .iter()
        .find(|m| m.member_id == self_report.member_id)
    {
        Some(m) if m.status == MemberStatus::Online => CandidateDiagnostic::Member,
        Some(_) => CandidateDiagnostic::Rejoinable,
        None => CandidateDiagnostic::Broken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_operator_types::{MemberRole, MemberStatus};

    fn pods(n: usize) -> Vec<PodFact> {
        (0..n)
            .map(|i| PodFact {
                name: format!("mycluster-{i}"),
                index: i as u32,
            })
            .collect()
    }

    fn member(id: &str, role: MemberRole, status: MemberStatus, view_id: &str) -> MemberView {
        MemberView {
            member_id: id.to_string(),
            host: format!("mycluster-{id}"),
            role,
            status,
            view_id: view_id.to_string(),
            server_version: "8.0.39".to_string(),
        }
    }

    fn online_view() -> Vec<MemberView> {
        vec![
            member("m0", MemberRole::Primary, MemberStatus::Online, "v1"),
            member("m1", MemberRole::Secondary, MemberStatus::Online, "v1"),
            member("m2", MemberRole::Secondary, MemberStatus::Online, "v1"),
        ]
    }

    #[test]
    fn no_pods_is_initializing_before_create_time() {
        let diag = diagnose_cluster(&[], &HashMap::new(), false, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Initializing);
    }

    #[test]
    fn no_pods_after_create_time_is_invalid() {
        let diag = diagnose_cluster(&[], &HashMap::new(), true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Invalid);
    }

    #[test]
    fn deleting_cluster_is_finalizing() {
        let diag = diagnose_cluster(&pods(3), &HashMap::new(), true, true);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Finalizing);
    }

    #[test]
    fn no_pod_reachable_is_unknown() {
        let mut probes = HashMap::new();
        for p in pods(3) {
            probes.insert(p.name, PodProbe::Unreachable);
        }
        let diag = diagnose_cluster(&pods(3), &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Unknown);
    }

    #[test]
    fn fully_online_quorum_reports_online() {
        let p = pods(3);
        let mut probes = HashMap::new();
        for pod in &p {
            probes.insert(pod.name.clone(), PodProbe::Reachable(online_view()));
        }
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Online);
        assert_eq!(diag.primary.as_deref(), Some("mycluster-0"));
        assert_eq!(diag.online_members.len(), 3);
    }

    #[test]
    fn one_unreachable_pod_with_quorum_is_online_uncertain() {
        let p = pods(3);
        let mut probes = HashMap::new();
        probes.insert(p[0].name.clone(), PodProbe::Reachable(online_view()));
        probes.insert(p[1].name.clone(), PodProbe::Reachable(online_view()));
        probes.insert(p[2].name.clone(), PodProbe::Unreachable);
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::OnlineUncertain);
    }

    #[test]
    fn partial_membership_with_offline_member_is_online_partial() {
        let p = pods(3);
        let mut view = online_view();
        view[2].status = MemberStatus::Offline;
        let mut probes = HashMap::new();
        for pod in &p {
            probes.insert(pod.name.clone(), PodProbe::Reachable(view.clone()));
        }
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::OnlinePartial);
    }

    #[test]
    fn complete_outage_is_offline() {
        let p = pods(3);
        let mut probes = HashMap::new();
        for pod in &p {
            probes.insert(pod.name.clone(), PodProbe::Reachable(Vec::new()));
        }
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::Offline);
    }

    #[test]
    fn complete_outage_with_unreachable_peer_is_offline_uncertain() {
        let p = pods(3);
        let mut probes = HashMap::new();
        probes.insert(p[0].name.clone(), PodProbe::Reachable(Vec::new()));
        probes.insert(p[1].name.clone(), PodProbe::Reachable(Vec::new()));
        probes.insert(p[2].name.clone(), PodProbe::Unreachable);
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::OfflineUncertain);
    }

    /// Scenario 4 (spec.md §8): a network partition kills two of three
    /// pods; the surviving pod sees a 1-member view with no quorum, and
    /// itself is offered as the `force_quorum` candidate.
    #[test]
    fn partition_with_no_majority_is_no_quorum() {
        let p = pods(3);
        let mut probes = HashMap::new();
        let lone_view = vec![member("m0", MemberRole::Primary, MemberStatus::Online, "v2")];
        probes.insert(p[0].name.clone(), PodProbe::Reachable(lone_view));
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::NoQuorum);
        assert_eq!(diag.quorum_candidates.first(), Some(&"mycluster-0".to_string()));
    }

    /// Scenario 6 (spec.md §8): a 3-pod cluster splits into pod-0 alone
    /// against {pod-1, pod-2}. Neither group is a majority of the 3-pod
    /// total, but each believes it has quorum relative to its own surviving
    /// view — that's split brain, not NO_QUORUM.
    #[test]
    fn two_disjoint_self_quorum_groups_is_split_brain() {
        let p = pods(3);
        let group_a = vec![member("m0", MemberRole::Primary, MemberStatus::Online, "v3")];
        let group_b = vec![
            member("m1", MemberRole::Primary, MemberStatus::Online, "v3"),
            member("m2", MemberRole::Secondary, MemberStatus::Online, "v3"),
        ];
        let mut probes = HashMap::new();
        probes.insert(p[0].name.clone(), PodProbe::Reachable(group_a));
        probes.insert(p[1].name.clone(), PodProbe::Reachable(group_b.clone()));
        probes.insert(p[2].name.clone(), PodProbe::Reachable(group_b));
        let diag = diagnose_cluster(&p, &probes, true, false);
        assert_eq!(diag.kind, ClusterDiagnosticKind::SplitBrain);
    }

    #[test]
    fn tie_break_equal_view_id_primaries_is_ambiguous() {
        let view = vec![
            member("m0", MemberRole::Primary, MemberStatus::Online, "v1"),
            member("m1", MemberRole::Primary, MemberStatus::Online, "v1"),
        ];
        assert!(infer_primary(&view).is_none());
    }

    #[test]
    fn tie_break_highest_view_id_wins() {
        let view = vec![
            member("m0", MemberRole::Primary, MemberStatus::Online, "v1"),
            member("m1", MemberRole::Primary, MemberStatus::Online, "v2"),
        ];
        assert_eq!(infer_primary(&view).unwrap().member_id, "m1");
    }

    #[test]
    fn candidate_joinable_with_no_prior_membership() {
        let kind = diagnose_cluster_candidate(true, None, &online_view());
        assert_eq!(kind, CandidateDiagnostic::Joinable);
    }

    #[test]
    fn candidate_member_when_online_in_view() {
        let self_report = member("m1", MemberRole::Secondary, MemberStatus::Online, "v1");
        let kind = diagnose_cluster_candidate(true, Some(&self_report), &online_view());
        assert_eq!(kind, CandidateDiagnostic::Member);
    }

    #[test]
    fn candidate_rejoinable_when_offline_in_view() {
        let self_report = member("m1", MemberRole::Secondary, MemberStatus::Offline, "v1");
        let mut view = online_view();
        view[1].status = MemberStatus::Offline;
        let kind = diagnose_cluster_candidate(true, Some(&self_report), &view);
        assert_eq!(kind, CandidateDiagnostic::Rejoinable);
    }

    #[test]
    fn candidate_broken_when_not_in_view_but_has_prior_membership() {
        let self_report = member("ghost", MemberRole::Secondary, MemberStatus::Error, "v0");
        let kind = diagnose_cluster_candidate(true, Some(&self_report), &online_view());
        assert_eq!(kind, CandidateDiagnostic::Broken);
    }

    #[test]
    fn candidate_unreachable_short_circuits_before_self_report() {
        let self_report = member("m1", MemberRole::Secondary, MemberStatus::Online, "v1");
        let kind = diagnose_cluster_candidate(false, Some(&self_report), &online_view());
        assert_eq!(kind, CandidateDiagnostic::Unreachable);
    }

    /// Idempotence property (spec.md §8): reconciling an already-ONLINE pod
    /// is a no-op regardless of how many times it's diagnosed.
    #[test]
    fn member_diagnosis_is_idempotent_across_repeated_calls() {
        let self_report = member("m0", MemberRole::Primary, MemberStatus::Online, "v1");
        let view = online_view();
        let first = diagnose_cluster_candidate(true, Some(&self_report), &view);
        let second = diagnose_cluster_candidate(true, Some(&self_report), &view);
        assert_eq!(first, CandidateDiagnostic::Member);
        assert_eq!(first, second);
    }
}

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Where a new cluster's data directory comes from.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum InitDb {
    Blank,
    Clone { uri: String },
}

impl Default for InitDb {
    fn default() -> Self {
        InitDb::Blank
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct RouterSpec {
    pub replicas: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct InnoDbClusterResources {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub storage: Option<String>,
}

fn default_instances() -> u32 {
    3
}

fn default_admin_port() -> u16 {
    33060
}

fn default_group_port() -> u16 {
    33061
}

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "mysql.oracle.com",
    version = "v2",
    kind = "InnoDbCluster",
    plural = "innodbclusters",
    derive = "PartialEq",
    status = "ClusterStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.diagnostic\", \"name\": \"DIAGNOSTIC\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.onlineInstances\", \"name\": \"ONLINE\", \"type\": \"integer\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.lastProbeTime\", \"name\": \"AGE\", \"type\": \"date\" }"
)]
pub struct ClusterSpec {
    #[serde(default = "default_instances")]
    pub instances: u32,
    pub image: String,
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    #[serde(default = "default_group_port")]
    pub group_port: u16,
    #[serde(default)]
    pub init_db: InitDb,
    pub router: Option<RouterSpec>,
    #[serde(default)]
    pub resources: InnoDbClusterResources,
    #[serde(default)]
    pub custom_config: std::collections::BTreeMap<String, String>,
}

/// Mirrors spec.md §3's "Cluster Diagnostic" tagged variant. Auxiliary data
/// (online member set, inferred PRIMARY, quorum candidates) lives alongside
/// the status, not inside the tag, since the status block must stay
/// JSON-schema-friendly for the CRD.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Default)]
pub enum ClusterDiagnosticKind {
    #[default]
    Initializing,
    Online,
    OnlinePartial,
    OnlineUncertain,
    Offline,
    OfflineUncertain,
    NoQuorum,
    NoQuorumUncertain,
    SplitBrain,
    SplitBrainUncertain,
    Unknown,
    Invalid,
    Finalizing,
}

impl ClusterDiagnosticKind {
    /// True for every "_UNCERTAIN" member of the family: one or more pods
    /// could not be reached, so the diagnosis might flip once they heal.
    pub fn is_uncertain(&self) -> bool {
        matches!(
            self,
            ClusterDiagnosticKind::OnlineUncertain
                | ClusterDiagnosticKind::OfflineUncertain
                | ClusterDiagnosticKind::NoQuorumUncertain
                | ClusterDiagnosticKind::SplitBrainUncertain
        )
    }

    pub fn is_online_family(&self) -> bool {
        matches!(
            self,
            ClusterDiagnosticKind::Online
                | ClusterDiagnosticKind::OnlinePartial
                | ClusterDiagnosticKind::OnlineUncertain
        )
    }
}

impl fmt::Display for ClusterDiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterDiagnosticKind::Initializing => "INITIALIZING",
            ClusterDiagnosticKind::Online => "ONLINE",
            ClusterDiagnosticKind::OnlinePartial => "ONLINE_PARTIAL",
            ClusterDiagnosticKind::OnlineUncertain => "ONLINE_UNCERTAIN",
            ClusterDiagnosticKind::Offline => "OFFLINE",
            ClusterDiagnosticKind::OfflineUncertain => "OFFLINE_UNCERTAIN",
            ClusterDiagnosticKind::NoQuorum => "NO_QUORUM",
            ClusterDiagnosticKind::NoQuorumUncertain => "NO_QUORUM_UNCERTAIN",
            ClusterDiagnosticKind::SplitBrain => "SPLIT_BRAIN",
            ClusterDiagnosticKind::SplitBrainUncertain => "SPLIT_BRAIN_UNCERTAIN",
            ClusterDiagnosticKind::Unknown => "UNKNOWN",
            ClusterDiagnosticKind::Invalid => "INVALID",
            ClusterDiagnosticKind::Finalizing => "FINALIZING",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ClusterDiagnosticKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "INITIALIZING" => ClusterDiagnosticKind::Initializing,
            "ONLINE" => ClusterDiagnosticKind::Online,
            "ONLINE_PARTIAL" => ClusterDiagnosticKind::OnlinePartial,
            "ONLINE_UNCERTAIN" => ClusterDiagnosticKind::OnlineUncertain,
            "OFFLINE" => ClusterDiagnosticKind::Offline,
            "OFFLINE_UNCERTAIN" => ClusterDiagnosticKind::OfflineUncertain,
            "NO_QUORUM" => ClusterDiagnosticKind::NoQuorum,
            "NO_QUORUM_UNCERTAIN" => ClusterDiagnosticKind::NoQuorumUncertain,
            "SPLIT_BRAIN" => ClusterDiagnosticKind::SplitBrain,
            "SPLIT_BRAIN_UNCERTAIN" => ClusterDiagnosticKind::SplitBrainUncertain,
            "UNKNOWN" => ClusterDiagnosticKind::Unknown,
            "INVALID" => ClusterDiagnosticKind::Invalid,
            "FINALIZING" => ClusterDiagnosticKind::Finalizing,
            _ => return Err(()),
        })
    }
}

/// Per-pod variant used when deciding what to do with one particular
/// instance (spec.md §3, "Candidate Diagnostic").
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum CandidateDiagnosticKind {
    Joinable,
    Rejoinable,
    Member,
    Unreachable,
    Broken,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Default)]
pub enum MemberRole {
    Primary,
    #[default]
    Secondary,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Default)]
pub enum MemberStatus {
    #[default]
    Offline,
    Recovering,
    Online,
    Error,
    Unreachable,
}

/// One row of `query_members` / the group view, cross-referenced against the
/// pod inventory by the Diagnostic Engine.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct MemberView {
    pub member_id: String,
    /// `MEMBER_HOST` as Group Replication reports it — the pod's DNS name
    /// when `group_replication_local_address` is set to the pod's FQDN,
    /// letting callers cross-reference a view entry back to a pod.
    pub host: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    pub view_id: String,
    pub server_version: String,
}

/// Observed membership fields mirrored onto a pod as a JSON annotation by
/// both the reconciliation domain and the Group Monitor (spec.md §3's "Pod"
/// mutable observed membership fields).
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct PodMembership {
    pub member_id: Option<String>,
    pub role: Option<MemberRole>,
    pub status: Option<MemberStatus>,
    pub view_id: Option<String>,
    pub server_version: Option<String>,
    pub last_transition_time: Option<Time>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct ClusterStatus {
    pub phase: ClusterPhase,
    pub diagnostic: ClusterDiagnosticKind,
    pub online_instances: u32,
    pub message: Option<String>,
    #[serde(rename = "lastProbeTime")]
    pub last_probe_time: Option<Time>,
    #[serde(rename = "createTime")]
    pub create_time: Option<Time>,
    /// Mirrors `spec.init_db`, fixed at cluster-creation time so later spec
    /// edits can't retroactively change how `gtidSetIsComplete` was decided.
    pub initial_data_source: Option<String>,
    #[serde(default)]
    pub incremental_recovery_allowed: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, JsonSchema, Default)]
pub enum ClusterPhase {
    #[default]
    Pending,
    Initializing,
    Online,
    Degraded,
    NoQuorum,
    Error,
    Finalizing,
}

impl FromStr for ClusterPhase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ClusterPhase::Pending),
            "Initializing" => Ok(ClusterPhase::Initializing),
            "Online" => Ok(ClusterPhase::Online),
            "Degraded" => Ok(ClusterPhase::Degraded),
            "NoQuorum" => Ok(ClusterPhase::NoQuorum),
            "Error" => Ok(ClusterPhase::Error),
            "Finalizing" => Ok(ClusterPhase::Finalizing),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Initializing => write!(f, "Initializing"),
            ClusterPhase::Online => write!(f, "Online"),
            ClusterPhase::Degraded => write!(f, "Degraded"),
            ClusterPhase::NoQuorum => write!(f, "NoQuorum"),
            ClusterPhase::Error => write!(f, "Error"),
            ClusterPhase::Finalizing => write!(f, "Finalizing"),
        }
    }
}

impl ClusterDiagnosticKind {
    /// The `ClusterPhase` a controller loop should publish for this
    /// diagnostic, independent of any particular reconciliation outcome.
    pub fn to_phase(self) -> ClusterPhase {
        match self {
            ClusterDiagnosticKind::Initializing => ClusterPhase::Initializing,
            ClusterDiagnosticKind::Online => ClusterPhase::Online,
            ClusterDiagnosticKind::OnlinePartial | ClusterDiagnosticKind::OnlineUncertain => {
                ClusterPhase::Degraded
            }
            ClusterDiagnosticKind::Offline | ClusterDiagnosticKind::OfflineUncertain => {
                ClusterPhase::Degraded
            }
            ClusterDiagnosticKind::NoQuorum | ClusterDiagnosticKind::NoQuorumUncertain => {
                ClusterPhase::NoQuorum
            }
            ClusterDiagnosticKind::SplitBrain | ClusterDiagnosticKind::SplitBrainUncertain => {
                ClusterPhase::Error
            }
            ClusterDiagnosticKind::Unknown => ClusterPhase::Degraded,
            ClusterDiagnosticKind::Invalid => ClusterPhase::Error,
            ClusterDiagnosticKind::Finalizing => ClusterPhase::Finalizing,
        }
    }
}

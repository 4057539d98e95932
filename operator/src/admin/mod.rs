//! Admin Client Interface (spec.md §4.1): abstracts every database-admin
//! operation the Cluster Controller and Monitored Cluster need. The
//! Diagnostic Engine and reconciliation code depend only on this trait,
//! never on a concrete driver, so the recovery logic is testable against a
//! fake implementation.

mod codes;
mod mysql;

pub use codes::*;
pub use mysql::MysqlAdminClient;

use async_trait::async_trait;
use mysql_operator_types::{MemberRole, MemberStatus, MemberView};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("transport error {code}: {message}")]
    Transport { code: i32, message: String },

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("option prevents statement: {0}")]
    OptionPreventsStatement(String),

    #[error("cluster metadata missing: {0}")]
    MetadataMissing(String),

    #[error("instance already a member of a group: {0}")]
    AlreadyInGroup(String),

    #[error("instance is not online: {0}")]
    InstanceNotOnline(String),

    #[error("grant does not exist: {0}")]
    NonExistingGrant(String),

    #[error("no reachable primary")]
    NoPrimary,

    #[error("{0}")]
    Other(String),
}

impl AdminError {
    /// Transient transport errors (spec.md §6/§7, `CR_MIN_ERROR..CR_MAX_ERROR`):
    /// safe to retry the same call immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, AdminError::Transport { code, .. } if (CR_MIN_ERROR..=CR_MAX_ERROR).contains(code))
    }
}

/// Options accepted by `create_cluster`, mirroring `cluster_controller.py`'s
/// `common_gr_options | create_options` merge.
#[derive(Debug, Clone)]
pub struct CreateClusterOptions {
    pub gtid_set_is_complete: bool,
    pub start_on_boot: bool,
    pub member_ssl_mode: &'static str,
    pub exit_state_action: &'static str,
}

impl Default for CreateClusterOptions {
    fn default() -> Self {
        CreateClusterOptions {
            gtid_set_is_complete: true,
            start_on_boot: false,
            member_ssl_mode: "REQUIRED",
            exit_state_action: "ABORT_SERVER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMethod {
    Clone,
    Incremental,
}

impl RecoveryMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryMethod::Clone => "clone",
            RecoveryMethod::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddInstanceOptions {
    pub recovery_method: RecoveryMethod,
}

#[derive(Debug, Clone, Default)]
pub struct RemoveInstanceOptions {
    pub force: bool,
}

#[async_trait]
pub trait AdminClient: Send + Sync {
    /// An open, authenticated admin connection. Implementations are free to
    /// choose their own representation; the trait never inspects it beyond
    /// passing it back in.
    type Session: Send;

    async fn connect(&self, endpoint: &str) -> Result<Self::Session, AdminError>;

    /// If `session` is not the PRIMARY, opens a new session to the current
    /// PRIMARY of the same group. Returns `Ok(None)` when no PRIMARY is
    /// reachable from the given view (spec.md §4.1).
    ///
    /// Takes `&mut Self::Session` (not `&Self::Session`): a connection is an
    /// exclusive session, not a value a concrete driver can clone to issue a
    /// query through a shared reference.
    async fn jump_to_primary(
        &self,
        session: &mut Self::Session,
    ) -> Result<Option<Self::Session>, AdminError>;

    async fn query_membership(
        &self,
        session: &mut Self::Session,
    ) -> Result<MemberView, AdminError>;

    async fn query_members(
        &self,
        session: &mut Self::Session,
    ) -> Result<Vec<MemberView>, AdminError>;

    async fn create_cluster(
        &self,
        seed: &mut Self::Session,
        name: &str,
        options: &CreateClusterOptions,
    ) -> Result<(), AdminError>;

    async fn add_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
        options: &AddInstanceOptions,
    ) -> Result<(), AdminError>;

    async fn rejoin_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
    ) -> Result<(), AdminError>;

    async fn remove_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
        options: &RemoveInstanceOptions,
    ) -> Result<(), AdminError>;

    async fn reboot_cluster_from_complete_outage(
        &self,
        seed: &mut Self::Session,
    ) -> Result<(), AdminError>;

    async fn force_quorum_using_partition_of(
        &self,
        seed: &mut Self::Session,
        own_endpoint: &str,
    ) -> Result<(), AdminError>;

    async fn stop_group_replication(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), AdminError>;

    /// Creates (or rotates the password of) the restricted account MySQL
    /// Router uses to read routing metadata, mirroring
    /// `post_create_actions`' router-account provisioning.
    async fn setup_router_account(
        &self,
        session: &mut Self::Session,
        user: &str,
        password: &str,
    ) -> Result<(), AdminError>;

    /// Creates (or rotates the password of) the backup account used for
    /// clone-based recovery donors, mirroring `post_create_actions`'
    /// backup-account provisioning.
    async fn setup_backup_account(
        &self,
        session: &mut Self::Session,
        user: &str,
        password: &str,
    ) -> Result<(), AdminError>;

    /// Parses `host:port` (or a full `mysql://` URI) into its host and port.
    fn parse_uri(&self, uri: &str) -> Result<(String, u16), AdminError>;
}

/// Role/status pair the Diagnostic Engine and Monitored Cluster read off a
/// `MemberView` without caring about the rest of the tuple.
pub fn member_is_online(view: &MemberView) -> bool {
    matches!(view.status, MemberStatus::Online)
}

pub fn member_is_primary(view: &MemberView) -> bool {
    matches!(view.role, MemberRole::Primary)
}

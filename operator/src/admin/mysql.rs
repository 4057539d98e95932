//! Concrete `AdminClient` backed by `mysql_async`. Issues the same wire-level
//! statements a real AdminAPI issues (`START/STOP GROUP_REPLICATION`,
//! `performance_schema.replication_group_members`, `cluster_set` metadata
//! reads) rather than re-implementing the Group Replication protocol itself.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, Pool};
use mysql_operator_types::{MemberRole, MemberStatus, MemberView};
use std::time::Duration;

use super::{
    AddInstanceOptions, AdminClient, AdminError, CreateClusterOptions, RemoveInstanceOptions,
    CR_MAX_ERROR, CR_MIN_ERROR, ER_ACCESS_DENIED_ERROR, ER_NONEXISTING_GRANT,
    ER_OPTION_PREVENTS_STATEMENT, SHERR_DBA_BADARG_INSTANCE_ALREADY_IN_GR,
    SHERR_DBA_MEMBER_METADATA_MISSING,
};

const ADMIN_USER: &str = "mysqladmin";

pub struct MysqlAdminClient {
    password: String,
}

impl MysqlAdminClient {
    pub fn new(password: impl Into<String>) -> Self {
        MysqlAdminClient {
            password: password.into(),
        }
    }

    fn opts_for(&self, host: &str, port: u16) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(host)
            .tcp_port(port)
            .user(Some(ADMIN_USER))
            .pass(Some(&self.password))
            .into()
    }

    fn classify(err: mysql_async::Error) -> AdminError {
        match err {
            mysql_async::Error::Server(server_err) => {
                let code = server_err.code as i32;
                match code {
                    ER_ACCESS_DENIED_ERROR => AdminError::AccessDenied(server_err.message),
                    ER_NONEXISTING_GRANT => AdminError::NonExistingGrant(server_err.message),
                    ER_OPTION_PREVENTS_STATEMENT => {
                        AdminError::OptionPreventsStatement(server_err.message)
                    }
                    SHERR_DBA_BADARG_INSTANCE_ALREADY_IN_GR => {
                        AdminError::AlreadyInGroup(server_err.message)
                    }
                    SHERR_DBA_MEMBER_METADATA_MISSING => {
                        AdminError::MetadataMissing(server_err.message)
                    }
                    c if (CR_MIN_ERROR..=CR_MAX_ERROR).contains(&c) => AdminError::Transport {
                        code: c,
                        message: server_err.message,
                    },
                    _ => AdminError::Other(server_err.message),
                }
            }
            mysql_async::Error::Io(_) | mysql_async::Error::Driver(_) => AdminError::Transport {
                code: CR_MIN_ERROR,
                message: err.to_string(),
            },
            other => AdminError::Other(other.to_string()),
        }
    }
}

#[async_trait]
impl AdminClient for MysqlAdminClient {
    type Session = Conn;

    async fn connect(&self, endpoint: &str) -> Result<Self::Session, AdminError> {
        let (host, port) = self.parse_uri(endpoint)?;
        let pool = Pool::new(self.opts_for(&host, port));
        pool.get_conn().await.map_err(Self::classify)
    }

    async fn jump_to_primary(
        &self,
        session: &mut Self::Session,
    ) -> Result<Option<Self::Session>, AdminError> {
        let rows: Vec<(String, String, String)> = session
            .query(
                "select MEMBER_ROLE, MEMBER_HOST, MEMBER_PORT \
                 from performance_schema.replication_group_members \
                 where MEMBER_ROLE = 'PRIMARY'",
            )
            .await
            .map_err(Self::classify)?;
        let Some((_, host, port)) = rows.into_iter().next() else {
            return Ok(None);
        };
        let port: u16 = port
            .parse()
            .map_err(|_| AdminError::Other(format!("invalid MEMBER_PORT: {port}")))?;
        let primary_pool = Pool::new(self.opts_for(&host, port));
        let primary_conn = primary_pool.get_conn().await.map_err(Self::classify)?;
        Ok(Some(primary_conn))
    }

    async fn query_membership(
        &self,
        session: &mut Self::Session,
    ) -> Result<MemberView, AdminError> {
        let row: Option<(String, String, String, String, String, String)> = session
            .query_first(
                "select MEMBER_ID, MEMBER_HOST, MEMBER_ROLE, MEMBER_STATE, VIEW_ID, version() \
                 from performance_schema.replication_group_members \
                 where MEMBER_HOST = @@hostname limit 1",
            )
            .await
            .map_err(Self::classify)?;
        let Some((member_id, host, role, state, view_id, version)) = row else {
            return Err(AdminError::InstanceNotOnline(
                "no local replication_group_members row".into(),
            ));
        };
        Ok(MemberView {
            member_id,
            host,
            role: parse_role(&role),
            status: parse_status(&state),
            view_id,
            server_version: version,
        })
    }

    async fn query_members(
        &self,
        session: &mut Self::Session,
    ) -> Result<Vec<MemberView>, AdminError> {
        let rows: Vec<(String, String, String, String, String)> = session
            .query(
                "select MEMBER_ID, MEMBER_HOST, MEMBER_ROLE, MEMBER_STATE, VIEW_ID \
                 from performance_schema.replication_group_members",
            )
            .await
            .map_err(Self::classify)?;
        let version = session
            .query_first::<String, _>("select version()")
            .await
            .map_err(Self::classify)?
            .unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|(member_id, host, role, state, view_id)| MemberView {
                member_id,
                host,
                role: parse_role(&role),
                status: parse_status(&state),
                view_id,
                server_version: version.clone(),
            })
            .collect())
    }

    async fn create_cluster(
        &self,
        seed: &mut Self::Session,
        name: &str,
        options: &CreateClusterOptions,
    ) -> Result<(), AdminError> {
        // `name` and `gtid_set_is_complete` select which metadata schema row
        // the AdminAPI would otherwise write; the core only drives the
        // underlying GR plugin variables here, never the metadata itself.
        let _ = (name, options.gtid_set_is_complete);
        seed.exec_drop(
            "SET GLOBAL group_replication_start_on_boot = ?",
            (options.start_on_boot,),
        )
        .await
        .map_err(Self::classify)?;
        seed.exec_drop(
            "SET GLOBAL group_replication_ssl_mode = ?",
            (options.member_ssl_mode,),
        )
        .await
        .map_err(Self::classify)?;
        seed.exec_drop(
            "SET GLOBAL group_replication_exit_state_action = ?",
            (options.exit_state_action,),
        )
        .await
        .map_err(Self::classify)?;
        seed.query_drop("SET GLOBAL group_replication_bootstrap_group = ON")
            .await
            .map_err(Self::classify)?;
        seed.query_drop("START GROUP_REPLICATION")
            .await
            .map_err(Self::classify)?;
        seed.query_drop("SET GLOBAL group_replication_bootstrap_group = OFF")
            .await
            .map_err(Self::classify)
    }

    async fn add_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
        options: &AddInstanceOptions,
    ) -> Result<(), AdminError> {
        let (host, port) = self.parse_uri(endpoint)?;
        primary
            .exec_drop(
                "CHANGE REPLICATION SOURCE TO SOURCE_HOST = ?, SOURCE_PORT = ?, \
                 SOURCE_USER = ?, SOURCE_PASSWORD = ?, SOURCE_AUTO_POSITION = 1, \
                 GET_SOURCE_PUBLIC_KEY = 1 FOR CHANNEL 'group_replication_recovery'",
                (&host, port, ADMIN_USER, &self.password),
            )
            .await
            .map_err(Self::classify)?;
        if matches!(options.recovery_method, super::RecoveryMethod::Clone) {
            primary
                .exec_drop(
                    "SET GLOBAL clone_valid_donor_list = concat(?, ':', ?)",
                    (&host, port),
                )
                .await
                .map_err(Self::classify)?;
        }
        // The statements above configure the recovery channel on the joiner,
        // which we reach through the same session the primary handed us
        // (the joiner is addressed by `endpoint`, not the primary itself).
        let opts = self.opts_for(&host, port);
        let pool = Pool::new(opts);
        let mut joiner = pool.get_conn().await.map_err(Self::classify)?;
        joiner
            .exec_drop(
                "CHANGE REPLICATION SOURCE TO SOURCE_USER = ?, SOURCE_PASSWORD = ?, \
                 SOURCE_AUTO_POSITION = 1, GET_SOURCE_PUBLIC_KEY = 1 \
                 FOR CHANNEL 'group_replication_recovery'",
                (ADMIN_USER, &self.password),
            )
            .await
            .map_err(Self::classify)?;
        joiner
            .query_drop("START GROUP_REPLICATION")
            .await
            .map_err(Self::classify)
    }

    async fn rejoin_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
    ) -> Result<(), AdminError> {
        let _ = primary;
        let (host, port) = self.parse_uri(endpoint)?;
        let opts = self.opts_for(&host, port);
        let pool = Pool::new(opts);
        let mut joiner = pool.get_conn().await.map_err(Self::classify)?;
        joiner
            .exec_drop(
                "CHANGE REPLICATION SOURCE TO SOURCE_USER = ?, SOURCE_PASSWORD = ?, \
                 SOURCE_AUTO_POSITION = 1, GET_SOURCE_PUBLIC_KEY = 1 \
                 FOR CHANNEL 'group_replication_recovery'",
                (ADMIN_USER, &self.password),
            )
            .await
            .map_err(Self::classify)?;
        joiner
            .query_drop("START GROUP_REPLICATION")
            .await
            .map_err(Self::classify)
    }

    async fn remove_instance(
        &self,
        primary: &mut Self::Session,
        endpoint: &str,
        options: &RemoveInstanceOptions,
    ) -> Result<(), AdminError> {
        let _ = (primary, endpoint);
        let (host, port) = self.parse_uri(endpoint)?;
        let opts = self.opts_for(&host, port);
        let pool = Pool::new(opts);
        let mut leaver = pool.get_conn().await.map_err(Self::classify)?;
        if options.force {
            leaver
                .exec_drop(
                    "SET GLOBAL group_replication_force_members = ?",
                    (String::new(),),
                )
                .await
                .map_err(Self::classify)?;
        }
        leaver
            .query_drop("STOP GROUP_REPLICATION")
            .await
            .map_err(Self::classify)
    }

    async fn reboot_cluster_from_complete_outage(
        &self,
        seed: &mut Self::Session,
    ) -> Result<(), AdminError> {
        seed.query_drop("SET GLOBAL group_replication_bootstrap_group = ON")
            .await
            .map_err(Self::classify)?;
        seed.query_drop("START GROUP_REPLICATION")
            .await
            .map_err(Self::classify)?;
        seed.query_drop("SET GLOBAL group_replication_bootstrap_group = OFF")
            .await
            .map_err(Self::classify)
    }

    async fn force_quorum_using_partition_of(
        &self,
        seed: &mut Self::Session,
        own_endpoint: &str,
    ) -> Result<(), AdminError> {
        let (host, port) = self.parse_uri(own_endpoint)?;
        seed.exec_drop(
            "SET GLOBAL group_replication_force_members = concat(?, ':', ?)",
            (host, port),
        )
        .await
        .map_err(Self::classify)
    }

    async fn stop_group_replication(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), AdminError> {
        tokio::time::timeout(timeout, session.query_drop("STOP GROUP_REPLICATION"))
            .await
            .map_err(|_| AdminError::Transport {
                code: CR_MIN_ERROR,
                message: "stop_group_replication timed out".into(),
            })?
            .map_err(Self::classify)
    }

    async fn setup_router_account(
        &self,
        session: &mut Self::Session,
        user: &str,
        password: &str,
    ) -> Result<(), AdminError> {
        session
            .exec_drop(
                "CREATE USER IF NOT EXISTS ?@'%' IDENTIFIED BY ?",
                (user, password),
            )
            .await
            .map_err(Self::classify)?;
        session
            .exec_drop(format!("GRANT SELECT ON mysql_innodb_cluster_metadata.* TO '{user}'@'%'"), ())
            .await
            .map_err(Self::classify)?;
        session
            .exec_drop(
                format!("GRANT SELECT ON performance_schema.* TO '{user}'@'%'"),
                (),
            )
            .await
            .map_err(Self::classify)
    }

    async fn setup_backup_account(
        &self,
        session: &mut Self::Session,
        user: &str,
        password: &str,
    ) -> Result<(), AdminError> {
        session
            .exec_drop(
                "CREATE USER IF NOT EXISTS ?@'%' IDENTIFIED BY ?",
                (user, password),
            )
            .await
            .map_err(Self::classify)?;
        session
            .exec_drop(
                format!("GRANT BACKUP_ADMIN, CLONE_ADMIN ON *.* TO '{user}'@'%'"),
                (),
            )
            .await
            .map_err(Self::classify)
    }

    fn parse_uri(&self, uri: &str) -> Result<(String, u16), AdminError> {
        let without_scheme = uri
            .rsplit_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(uri);
        let host_port = without_scheme
            .split_once('@')
            .map(|(_, rest)| rest)
            .unwrap_or(without_scheme);
        let host_port = host_port.split('/').next().unwrap_or(host_port);
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| AdminError::Other(format!("invalid endpoint: {uri}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AdminError::Other(format!("invalid port in endpoint: {uri}")))?;
        Ok((host.to_string(), port))
    }
}

fn parse_role(s: &str) -> MemberRole {
    match s {
        "PRIMARY" => MemberRole::Primary,
        _ => MemberRole::Secondary,
    }
}

fn parse_status(s: &str) -> MemberStatus {
    match s {
        "ONLINE" => MemberStatus::Online,
        "RECOVERING" => MemberStatus::Recovering,
        "ERROR" => MemberStatus::Error,
        "UNREACHABLE" => MemberStatus::Unreachable,
        _ => MemberStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> MysqlAdminClient {
        MysqlAdminClient::new("secret")
    }

    #[test]
    fn parse_uri_host_port() {
        let (host, port) = client().parse_uri("mycluster-0.mycluster-instances:33060").unwrap();
        assert_eq!(host, "mycluster-0.mycluster-instances");
        assert_eq!(port, 33060);
    }

    #[test]
    fn parse_uri_full_uri_with_scheme_and_user() {
        let (host, port) = client()
            .parse_uri("mysql://mysqladmin@mycluster-1.mycluster-instances:33060/")
            .unwrap();
        assert_eq!(host, "mycluster-1.mycluster-instances");
        assert_eq!(port, 33060);
    }

    #[test]
    fn parse_uri_rejects_missing_port() {
        assert!(client().parse_uri("mycluster-0").is_err());
    }

    #[test]
    fn role_and_status_parsing() {
        assert_eq!(parse_role("PRIMARY"), MemberRole::Primary);
        assert_eq!(parse_role("SECONDARY"), MemberRole::Secondary);
        assert_eq!(parse_status("ONLINE"), MemberStatus::Online);
        assert_eq!(parse_status("RECOVERING"), MemberStatus::Recovering);
        assert_eq!(parse_status("bogus"), MemberStatus::Offline);
    }
}

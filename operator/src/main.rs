//! Entrypoint for the `mysql-operator` binary: wires up the Kubernetes
//! client, the concrete `AdminClient`, and the Cluster Controller.

mod admin;
mod cluster;
mod diagnose;
mod monitor;
mod mutex;
mod util;

use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mysql_operator_common::init();
    mysql_operator_common::metrics::maybe_spawn_metrics_server();

    let client = kube::Client::try_default().await?;

    let admin_password = std::env::var("MYSQL_ADMIN_PASSWORD").expect(
        "MYSQL_ADMIN_PASSWORD must be set, mounted from the operator's admin account secret",
    );
    let admin = Arc::new(admin::MysqlAdminClient::new(admin_password));

    cluster::reconcile::run(client, admin).await?;
    Ok(())
}

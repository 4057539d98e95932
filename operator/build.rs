use kube::CustomResourceExt;
use mysql_operator_types::InnoDbCluster;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/mysql.oracle.com_innodbclusters_crd.yaml",
        serde_yaml::to_string(&InnoDbCluster::crd()).unwrap(),
    )
    .unwrap();
}

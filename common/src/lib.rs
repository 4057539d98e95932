pub mod metrics;
pub mod shutdown;
pub mod wait;

pub fn signal_ready() {
    std::fs::write("/etc/ready", "ready").expect("Failed to write readiness file");
}

pub mod annotations {
    pub const CREATED_BY: &str = "mysql.oracle.com/created-by";
    pub const SPEC_HASH: &str = "mysql.oracle.com/spec-hash";
    pub const CLUSTER_FINALIZER: &str = "mysql.oracle.com/cluster";
    pub const MEMBER_FINALIZER: &str = "mysql.oracle.com/membership";

    /// `PodMembership`'s fields, mirrored onto the pod by both the
    /// reconciliation domain and the Group Monitor, as one annotation key
    /// per field rather than a single JSON blob — spec.md §5 requires
    /// last-writer-wins on individual fields, which a merge patch only gives
    /// us if each field is its own key.
    pub const MEMBERSHIP_MEMBER_ID: &str = "mysql.oracle.com/membership-member-id";
    pub const MEMBERSHIP_ROLE: &str = "mysql.oracle.com/membership-role";
    pub const MEMBERSHIP_STATUS: &str = "mysql.oracle.com/membership-status";
    pub const MEMBERSHIP_VIEW_ID: &str = "mysql.oracle.com/membership-view-id";
    pub const MEMBERSHIP_SERVER_VERSION: &str = "mysql.oracle.com/membership-server-version";
    pub const MEMBERSHIP_LAST_TRANSITION_TIME: &str =
        "mysql.oracle.com/membership-last-transition-time";
}

pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);
}

pub mod log {
    use owo_colors::OwoColorize;
    use std::fmt::{Debug, Display};

    pub fn error<T: Display + Debug>(e: T) {
        eprintln!("🛑 {}", format!("{:?}", e).red());
    }

    pub fn warning<T: Display + Debug>(e: T) {
        eprintln!("⚠️  {}", format!("{}", e).yellow());
    }
}

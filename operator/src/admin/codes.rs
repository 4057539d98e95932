//! Opaque integer error-code constants the core interprets, transcribed from
//! `cluster_controller.py`'s references to `mysqlsh.globals.mysql.ErrorCode`
//! and the MySQL Shell `SHERR_*` domain (spec.md §6).

/// Transport-level errors in this range are safe to retry (`CR_MIN_ERROR`).
pub const CR_MIN_ERROR: i32 = 2000;
/// Upper bound of the transport-level error range (`CR_MAX_ERROR`).
pub const CR_MAX_ERROR: i32 = 2999;

pub const ER_ACCESS_DENIED_ERROR: i32 = 1045;
pub const ER_NONEXISTING_GRANT: i32 = 1141;
pub const ER_OPTION_PREVENTS_STATEMENT: i32 = 1290;

pub const SHERR_DBA_BADARG_INSTANCE_NOT_ONLINE: i32 = 51011;
pub const SHERR_DBA_BADARG_INSTANCE_ALREADY_IN_GR: i32 = 51017;
pub const SHERR_DBA_MEMBER_METADATA_MISSING: i32 = 51104;

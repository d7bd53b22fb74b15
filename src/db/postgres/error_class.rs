//! Maps database failures onto what the writer should do about them.

use sqlx::postgres::PgDatabaseError;

/// SQLSTATE raised when no partition accepts a row, shared with CHECK violations.
const CHECK_VIOLATION: &str = "23514";
/// Executor routine that reports a row with no matching partition.
const FIND_PARTITION_ROUTINE: &str = "ExecFindPartition";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The target month has no partition yet; create it and retry.
    MissingPartition,
    /// The record itself is rejected; retrying will not help.
    Integrity,
    /// Connection or server-side trouble.
    Transient,
}

pub fn classify_write_failure(err: &sqlx::Error) -> FailureKind {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            let routine = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.routine());
            classify_pg(code.as_deref(), routine, db_err.constraint())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => FailureKind::Transient,
        _ => FailureKind::Integrity,
    }
}

/// Classification from the server's error fields.
pub fn classify_pg(code: Option<&str>, routine: Option<&str>, constraint: Option<&str>) -> FailureKind {
    let Some(code) = code else {
        return FailureKind::Integrity;
    };

    if code == CHECK_VIOLATION && (routine == Some(FIND_PARTITION_ROUTINE) || constraint.is_none()) {
        return FailureKind::MissingPartition;
    }

    if code.starts_with("08")
        || code.starts_with("57P")
        || matches!(code, "40001" | "40P01" | "53300")
    {
        return FailureKind::Transient;
    }

    FailureKind::Integrity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_partition() {
        assert_eq!(
            classify_pg(Some("23514"), Some("ExecFindPartition"), None),
            FailureKind::MissingPartition
        );
        assert_eq!(classify_pg(Some("23514"), None, None), FailureKind::MissingPartition);
    }

    #[test]
    fn test_named_check_constraint_is_integrity() {
        assert_eq!(
            classify_pg(Some("23514"), Some("ExecConstraints"), Some("candles_volume_check")),
            FailureKind::Integrity
        );
    }

    #[test]
    fn test_transient_codes() {
        for code in ["08006", "08001", "40001", "40P01", "53300", "57P01", "57P03"] {
            assert_eq!(classify_pg(Some(code), None, None), FailureKind::Transient, "{}", code);
        }
    }

    #[test]
    fn test_other_codes_are_integrity() {
        assert_eq!(
            classify_pg(Some("23503"), None, Some("candles_figi_fkey")),
            FailureKind::Integrity
        );
        assert_eq!(classify_pg(Some("22P02"), None, None), FailureKind::Integrity);
        assert_eq!(classify_pg(None, None, None), FailureKind::Integrity);
    }

    #[test]
    fn test_driver_errors() {
        assert_eq!(classify_write_failure(&sqlx::Error::PoolTimedOut), FailureKind::Transient);
        assert_eq!(classify_write_failure(&sqlx::Error::RowNotFound), FailureKind::Integrity);
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(classify_write_failure(&sqlx::Error::Io(io)), FailureKind::Transient);
    }
}

use sqlx::error::ErrorKind;

use crate::application::repos::RepoError;

/// Collapse driver errors onto the repo error ladder.
///
/// Constraint violations map by error kind, not message text. The write
/// paths here absorb duplicates with `ON CONFLICT DO NOTHING`, so a unique
/// violation only surfaces from a schema the migrations did not create.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation => RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            },
            ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => RepoError::Integrity {
                message: db.message().to_string(),
            },
            // 57014: statement canceled, the shape a server-side timeout takes.
            _ if db.code().as_deref() == Some("57014") => RepoError::Timeout,
            _ => RepoError::Persistence(db.message().to_string()),
        },
        other => RepoError::from_persistence(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_collapse_onto_the_repo_ladder() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Timeout
        ));
    }
}

use crate::application::repos::RepoError;

/// SQLSTATE classes the API reports back to clients as bad input.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const INVALID_DATETIME_FORMAT: &str = "22007";
const DATETIME_FIELD_OVERFLOW: &str = "22008";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const UNDEFINED_COLUMN: &str = "42703";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";
const QUERY_CANCELED: &str = "57014";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                Some(
                    INVALID_TEXT_REPRESENTATION
                    | INVALID_DATETIME_FORMAT
                    | DATETIME_FIELD_OVERFLOW
                    | NUMERIC_VALUE_OUT_OF_RANGE
                    | UNDEFINED_COLUMN
                    | FOREIGN_KEY_VIOLATION,
                ) => RepoError::InvalidInput { message },
                Some(QUERY_CANCELED) => RepoError::Timeout,
                Some(code) if code.starts_with("23") => RepoError::Integrity { message },
                _ => RepoError::from_persistence(message),
            }
        }
        other => RepoError::from_persistence(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_are_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
    }

    #[test]
    fn pool_timeouts_are_reported_as_timeouts() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Timeout
        ));
    }

    #[test]
    fn other_failures_are_persistence_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            RepoError::Persistence(_)
        ));
    }
}

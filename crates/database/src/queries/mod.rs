use incidents::database::DatabaseError;

pub mod incident;
pub mod vote;

// postgres error codes
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub(crate) fn convert_error(why: sqlx::Error) -> DatabaseError {
    match why {
        sqlx::Error::RowNotFound => DatabaseError::NotFound,
        sqlx::Error::Database(ref db_error)
            if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) =>
        {
            DatabaseError::Conflict(db_error.message().to_owned())
        }
        sqlx::Error::Database(ref db_error)
            if db_error.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
        {
            DatabaseError::NotFound
        }
        _ => DatabaseError::Other(Box::new(why)),
    }
}

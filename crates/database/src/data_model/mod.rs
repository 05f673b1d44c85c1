use incidents::database::{DatabaseError, Result};
use model::WithId;
use utility::id::HasId;

pub mod incident;
pub mod vote;

pub trait DatabaseRow {
    type Model: HasId<IdType = i64>;

    fn into_model(self) -> Result<WithId<Self::Model>>;
}

/// Rows carry enum columns as text; anything unexpected is a corrupted row.
pub(crate) fn corrupted(column: &str, value: &str) -> DatabaseError {
    DatabaseError::Other(format!("unexpected value '{}' in column {}", value, column).into())
}

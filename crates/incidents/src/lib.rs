use std::{error::Error, fmt};

use model::ValidationError;

pub mod client;
pub mod database;
pub mod ledger;
pub mod memory;
pub mod moderation;

#[derive(Debug)]
pub enum RequestError {
    NotFound,
    Validation(ValidationError),
    Forbidden,
    Conflict(String),
    Other(Box<dyn Error + Send + Sync>),
}

impl RequestError {
    pub fn other<T: Error + Send + Sync + 'static>(why: T) -> Self {
        Self::Other(Box::new(why))
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "The requested incident does not exist."),
            Self::Validation(why) => write!(f, "{}", why),
            Self::Forbidden => write!(f, "This operation requires an administrator."),
            Self::Conflict(why) => write!(f, "Conflicting update: {}", why),
            Self::Other(why) => write!(f, "{}", why),
        }
    }
}

impl Error for RequestError {}

impl From<database::DatabaseError> for RequestError {
    fn from(value: database::DatabaseError) -> Self {
        match value {
            database::DatabaseError::NotFound => Self::NotFound,
            database::DatabaseError::Conflict(why) => Self::Conflict(why),
            database::DatabaseError::Other(why) => Self::Other(why),
        }
    }
}

impl From<ValidationError> for RequestError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type RequestResult<O> = Result<O, RequestError>;

pub fn not_found_to_none<O>(result: RequestResult<O>) -> RequestResult<Option<O>> {
    if let Err(RequestError::NotFound) = result {
        Ok(None)
    } else {
        result.map(Some)
    }
}

use std::{error, fmt, sync::Arc};

use incidents::RequestError;
use model::ValidationError;
use reqwest::StatusCode;

pub mod avoidance;
pub mod config;
pub mod geocoding;
pub mod itinerary;
pub mod retry;
pub mod routing;
pub mod window;

mod http;

#[derive(Debug, Clone)]
pub enum NavigationError {
    Validation(ValidationError),
    LocationNotFound(String),
    /// The collaborator was unreachable or answered with a non-success status.
    ExternalService {
        status_code: Option<StatusCode>,
        reason: String,
    },
    Serialization(Arc<serde_json::Error>),
    Routing(String),
    /// Any failure while computing an itinerary that is not the caller's fault.
    RouteCalculation(Box<NavigationError>),
    Cancelled,
    TimedOut,
}

impl NavigationError {
    /// Failures worth another attempt: connection problems, throttling and
    /// server side errors of a collaborator.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ExternalService {
                status_code: None, ..
            } => true,
            Self::ExternalService {
                status_code: Some(status),
                ..
            } => status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS,
            _ => false,
        }
    }

    /// Wraps everything except caller errors into `RouteCalculation`.
    pub fn into_route_calculation(self) -> Self {
        match self {
            Self::Validation(_) | Self::LocationNotFound(_) | Self::RouteCalculation(_) => self,
            other => Self::RouteCalculation(Box::new(other)),
        }
    }
}

impl error::Error for NavigationError {}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Validation(why) => write!(f, "{}", why),
            Self::LocationNotFound(location) => {
                write!(f, "Location not found: {}", location)
            }
            Self::ExternalService {
                status_code: Some(status),
                reason,
            } => write!(f, "External service answered {}: {}", status, reason),
            Self::ExternalService {
                status_code: None,
                reason,
            } => write!(f, "External service unreachable: {}", reason),
            Self::Serialization(why) => write!(f, "JSON parse error: {}", why),
            Self::Routing(why) => write!(f, "Routing engine error: {}", why),
            Self::RouteCalculation(why) => write!(f, "Route calculation failed: {}", why),
            Self::Cancelled => write!(f, "Route calculation was cancelled."),
            Self::TimedOut => write!(f, "Route calculation timed out."),
        }
    }
}

impl From<reqwest::Error> for NavigationError {
    fn from(e: reqwest::Error) -> Self {
        // the url carries the api key
        let e = e.without_url();
        Self::ExternalService {
            status_code: e.status(),
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for NavigationError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(e))
    }
}

impl From<ValidationError> for NavigationError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<RequestError> for NavigationError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Validation(why) => Self::Validation(why),
            other => Self::ExternalService {
                status_code: None,
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, NavigationError>;

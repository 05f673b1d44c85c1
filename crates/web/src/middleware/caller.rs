use std::sync::Arc;

use axum::{
    extract,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use incidents::{RequestError, RequestResult};
use model::vote::User;
use utility::id::Id;

use crate::common::RouteErrorResponse;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ADMIN_ROLE: &str = "admin";

/// Identity of the caller as forwarded by the authenticating gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    user_id: Option<String>,
    admin: bool,
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let admin = headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE));

        Caller { user_id, admin }
    }

    pub fn user_id(&self) -> Result<Id<User>, RouteErrorResponse> {
        self.user_id.clone().map(Id::new).ok_or_else(|| {
            RouteErrorResponse::new(StatusCode::UNAUTHORIZED)
                .with_message(format!("Missing caller identity ({}).", USER_ID_HEADER))
        })
    }

    pub fn require_admin(&self) -> RequestResult<()> {
        if self.admin {
            Ok(())
        } else {
            Err(RequestError::Forbidden)
        }
    }
}

pub async fn caller_middleware(req: extract::Request, next: Next) -> impl IntoResponse {
    let caller = Caller::from_headers(req.headers());

    let mut req = req;
    req.extensions_mut().insert(Arc::new(caller));

    next.run(req).await
}

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::incident::Incident;

/// Identity of a caller as forwarded by the authenticating gateway.
#[derive(Debug, Clone, JsonSchema)]
pub struct User;

impl HasId for User {
    type IdType = String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Reaction {
    Like,
    Dislike,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "Like",
            Self::Dislike => "Dislike",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Like" => Some(Self::Like),
            "Dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub incident_id: Id<Incident>,
    pub user_id: Id<User>,
    pub reaction: Reaction,
}

impl HasId for Vote {
    type IdType = i64;
}

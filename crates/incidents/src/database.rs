use std::{error, fmt, result};

use async_trait::async_trait;
use model::{
    geo::BoundingBox,
    incident::{Incident, IncidentStatus},
    vote::{Reaction, User, Vote},
    WithId,
};
use utility::id::Id;

#[derive(Debug)]
pub enum DatabaseError {
    NotFound,
    /// A uniqueness or state constraint rejected the write.
    Conflict(String),
    Other(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "row not found"),
            Self::Conflict(why) => write!(f, "conflict: {}", why),
            Self::Other(why) => write!(f, "{}", why),
        }
    }
}

impl error::Error for DatabaseError {}

pub type Result<T> = result::Result<T, DatabaseError>;

/// Incident snapshots returned by this repo always carry the current vote tally.
#[async_trait]
pub trait IncidentRepo {
    async fn get_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>>;

    /// Like `get_incident`, but additionally holds the incident exclusively until
    /// the surrounding transaction is committed or dropped. Concurrent lockers of
    /// the same incident wait; other incidents are unaffected.
    async fn lock_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>>;

    /// All incidents inside the box (inclusive), optionally restricted to a status.
    async fn incidents_in(
        &mut self,
        bounding_box: &BoundingBox,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<WithId<Incident>>>;

    async fn insert_incident(&mut self, incident: Incident) -> Result<WithId<Incident>>;

    async fn set_incident_status(
        &mut self,
        id: &Id<Incident>,
        status: IncidentStatus,
    ) -> Result<()>;

    /// Removes the incident together with its votes.
    async fn delete_incident(&mut self, id: &Id<Incident>) -> Result<()>;
}

#[async_trait]
pub trait VoteRepo {
    async fn vote_by_user(
        &mut self,
        incident_id: &Id<Incident>,
        user_id: &Id<User>,
    ) -> Result<Option<WithId<Vote>>>;

    /// Fails with `DatabaseError::Conflict` if the user already voted on the incident.
    async fn insert_vote(&mut self, vote: Vote) -> Result<WithId<Vote>>;

    async fn update_vote_reaction(
        &mut self,
        id: &Id<Vote>,
        reaction: Reaction,
    ) -> Result<WithId<Vote>>;

    async fn delete_vote(&mut self, id: &Id<Vote>) -> Result<()>;

    async fn votes_for(&mut self, incident_id: &Id<Incident>) -> Result<Vec<WithId<Vote>>>;
}

pub trait DatabaseOperations: IncidentRepo + VoteRepo + Send {}

impl<T> DatabaseOperations for T where T: IncidentRepo + VoteRepo + Send {}

#[async_trait]
pub trait DatabaseTransaction: DatabaseOperations {
    async fn commit(self) -> Result<()>;
}

pub trait DatabaseAutocommit: DatabaseOperations {}

/// trait to implement an incident store.
/// multiple concurrent accesses should be possible by e.g. cloning the database object.
/// Dropping a transaction without committing it must discard its writes.
#[async_trait]
pub trait Database: Clone + Send + Sync + Sized + 'static {
    type Transaction: DatabaseTransaction + Send;
    type Autocommit: DatabaseAutocommit + Send;

    async fn transaction(&self) -> Result<Self::Transaction>;

    fn auto(&self) -> Self::Autocommit;
}

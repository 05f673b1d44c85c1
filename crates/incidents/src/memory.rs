//! An incident store kept in process memory.
//!
//! Writes of a transaction are applied immediately and journaled; dropping the
//! transaction without `commit` replays the journal backwards. Locks are held per
//! incident, so reactions on different incidents never wait on each other.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use log::debug;
use model::{
    geo::BoundingBox,
    incident::{Incident, IncidentStatus, VoteTally},
    vote::{Reaction, User, Vote},
    WithId,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use utility::id::Id;

use crate::database::{
    Database, DatabaseAutocommit, DatabaseError, DatabaseTransaction, IncidentRepo,
    Result, VoteRepo,
};

#[derive(Debug, Default)]
struct Tables {
    incidents: BTreeMap<i64, Incident>,
    votes: BTreeMap<i64, Vote>,
    last_incident_id: i64,
    last_vote_id: i64,
}

impl Tables {
    fn tally(&self, incident_id: i64) -> VoteTally {
        VoteTally::from_reactions(
            self.votes
                .values()
                .filter(|vote| vote.incident_id.raw() == incident_id)
                .map(|vote| vote.reaction),
        )
    }

    fn snapshot(&self, id: i64) -> Option<WithId<Incident>> {
        self.incidents.get(&id).map(|incident| {
            let mut incident = incident.clone();
            incident.tally = self.tally(id);
            WithId::new(Id::new(id), incident)
        })
    }
}

#[derive(Debug)]
enum Undo {
    Incident(i64, Option<Incident>),
    Vote(i64, Option<Vote>),
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn locks(&self) -> MutexGuard<'_, HashMap<i64, Arc<AsyncMutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn incident_lock(&self, id: i64) -> Arc<AsyncMutex<()>> {
        self.locks().entry(id).or_default().clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A session on the memory database. Transactions journal their writes, autocommit
/// sessions do not.
pub struct MemorySession {
    shared: Arc<Shared>,
    held: HashSet<i64>,
    guards: Vec<OwnedMutexGuard<()>>,
    journal: Option<Vec<Undo>>,
}

impl MemorySession {
    fn new(shared: Arc<Shared>, transactional: bool) -> Self {
        Self {
            shared,
            held: HashSet::new(),
            guards: vec![],
            journal: transactional.then(Vec::new),
        }
    }

    fn record(&mut self, undo: Undo) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(undo);
        }
    }

    fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        if journal.is_empty() {
            return;
        }
        debug!("rolling back {} memory writes", journal.len());
        let mut tables = self.shared.tables();
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Incident(id, Some(previous)) => {
                    tables.incidents.insert(id, previous);
                }
                Undo::Incident(id, None) => {
                    tables.incidents.remove(&id);
                }
                Undo::Vote(id, Some(previous)) => {
                    tables.votes.insert(id, previous);
                }
                Undo::Vote(id, None) => {
                    tables.votes.remove(&id);
                }
            }
        }
    }

    /// Releases the held incident locks and forgets those of incidents that do
    /// not exist (anymore), unless another session is still waiting on them.
    fn release_locks(&mut self) {
        self.guards.clear();
        if self.held.is_empty() {
            return;
        }
        // lock order: tables, then locks
        let tables = self.shared.tables();
        let mut locks = self.shared.locks();
        for id in self.held.drain() {
            let unused = locks
                .get(&id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1);
            if unused && !tables.incidents.contains_key(&id) {
                locks.remove(&id);
            }
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.rollback();
        self.release_locks();
    }
}

#[async_trait]
impl DatabaseTransaction for MemorySession {
    async fn commit(mut self) -> Result<()> {
        self.journal = None;
        Ok(())
    }
}

impl DatabaseAutocommit for MemorySession {}

#[async_trait]
impl Database for MemoryDatabase {
    type Transaction = MemorySession;
    type Autocommit = MemorySession;

    async fn transaction(&self) -> Result<Self::Transaction> {
        Ok(MemorySession::new(self.shared.clone(), true))
    }

    fn auto(&self) -> Self::Autocommit {
        MemorySession::new(self.shared.clone(), false)
    }
}

#[async_trait]
impl IncidentRepo for MemorySession {
    async fn get_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        self.shared
            .tables()
            .snapshot(id.raw())
            .ok_or(DatabaseError::NotFound)
    }

    async fn lock_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        let raw = id.raw();
        if !self.held.contains(&raw) {
            let guard = self.shared.incident_lock(raw).lock_owned().await;
            self.guards.push(guard);
            self.held.insert(raw);
        }
        self.get_incident(id).await
    }

    async fn incidents_in(
        &mut self,
        bounding_box: &BoundingBox,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<WithId<Incident>>> {
        let tables = self.shared.tables();
        Ok(tables
            .incidents
            .iter()
            .filter(|(_, incident)| bounding_box.contains(&incident.coordinate))
            .filter(|(_, incident)| status.map_or(true, |s| incident.status == s))
            .filter_map(|(id, _)| tables.snapshot(*id))
            .collect())
    }

    async fn insert_incident(&mut self, incident: Incident) -> Result<WithId<Incident>> {
        let id = {
            let mut tables = self.shared.tables();
            tables.last_incident_id += 1;
            let id = tables.last_incident_id;
            tables.incidents.insert(
                id,
                Incident {
                    tally: VoteTally::default(),
                    ..incident
                },
            );
            id
        };
        self.record(Undo::Incident(id, None));
        self.get_incident(&Id::new(id)).await
    }

    async fn set_incident_status(
        &mut self,
        id: &Id<Incident>,
        status: IncidentStatus,
    ) -> Result<()> {
        let previous = {
            let mut tables = self.shared.tables();
            let incident = tables
                .incidents
                .get_mut(&id.raw())
                .ok_or(DatabaseError::NotFound)?;
            let previous = incident.clone();
            incident.status = status;
            previous
        };
        self.record(Undo::Incident(id.raw(), Some(previous)));
        Ok(())
    }

    async fn delete_incident(&mut self, id: &Id<Incident>) -> Result<()> {
        let (incident, votes) = {
            let mut tables = self.shared.tables();
            let incident = tables
                .incidents
                .remove(&id.raw())
                .ok_or(DatabaseError::NotFound)?;
            let vote_ids = tables
                .votes
                .iter()
                .filter(|(_, vote)| vote.incident_id == *id)
                .map(|(vote_id, _)| *vote_id)
                .collect::<Vec<_>>();
            let votes = vote_ids
                .into_iter()
                .filter_map(|vote_id| {
                    tables.votes.remove(&vote_id).map(|vote| (vote_id, vote))
                })
                .collect::<Vec<_>>();
            (incident, votes)
        };
        self.record(Undo::Incident(id.raw(), Some(incident)));
        for (vote_id, vote) in votes {
            self.record(Undo::Vote(vote_id, Some(vote)));
        }
        Ok(())
    }
}

#[async_trait]
impl VoteRepo for MemorySession {
    async fn vote_by_user(
        &mut self,
        incident_id: &Id<Incident>,
        user_id: &Id<User>,
    ) -> Result<Option<WithId<Vote>>> {
        Ok(self
            .shared
            .tables()
            .votes
            .iter()
            .find(|(_, vote)| vote.incident_id == *incident_id && vote.user_id == *user_id)
            .map(|(id, vote)| WithId::new(Id::new(*id), vote.clone())))
    }

    async fn insert_vote(&mut self, vote: Vote) -> Result<WithId<Vote>> {
        let id = {
            let mut tables = self.shared.tables();
            if !tables.incidents.contains_key(&vote.incident_id.raw()) {
                return Err(DatabaseError::NotFound);
            }
            if tables.votes.values().any(|existing| {
                existing.incident_id == vote.incident_id && existing.user_id == vote.user_id
            }) {
                return Err(DatabaseError::Conflict(format!(
                    "user {} already voted on incident {}",
                    vote.user_id, vote.incident_id
                )));
            }
            tables.last_vote_id += 1;
            let id = tables.last_vote_id;
            tables.votes.insert(id, vote.clone());
            id
        };
        self.record(Undo::Vote(id, None));
        Ok(WithId::new(Id::new(id), vote))
    }

    async fn update_vote_reaction(
        &mut self,
        id: &Id<Vote>,
        reaction: Reaction,
    ) -> Result<WithId<Vote>> {
        let (previous, updated) = {
            let mut tables = self.shared.tables();
            let vote = tables
                .votes
                .get_mut(&id.raw())
                .ok_or(DatabaseError::NotFound)?;
            let previous = vote.clone();
            vote.reaction = reaction;
            (previous, vote.clone())
        };
        self.record(Undo::Vote(id.raw(), Some(previous)));
        Ok(WithId::new(*id, updated))
    }

    async fn delete_vote(&mut self, id: &Id<Vote>) -> Result<()> {
        let previous = self
            .shared
            .tables()
            .votes
            .remove(&id.raw())
            .ok_or(DatabaseError::NotFound)?;
        self.record(Undo::Vote(id.raw(), Some(previous)));
        Ok(())
    }

    async fn votes_for(&mut self, incident_id: &Id<Incident>) -> Result<Vec<WithId<Vote>>> {
        Ok(self
            .shared
            .tables()
            .votes
            .iter()
            .filter(|(_, vote)| vote.incident_id == *incident_id)
            .map(|(id, vote)| WithId::new(Id::new(*id), vote.clone()))
            .collect())
    }
}

use async_trait::async_trait;
use incidents::database::{Result, VoteRepo};
use model::{
    incident::Incident,
    vote::{Reaction, User, Vote},
    WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{queries::vote, PgDatabaseAutocommit, PgDatabaseTransaction};

use super::{corrupted, DatabaseRow};

#[derive(Debug, Clone, FromRow)]
pub struct VoteRow {
    pub id: i64,
    pub incident_id: i64,
    pub user_id: String,
    pub reaction: String,
}

impl DatabaseRow for VoteRow {
    type Model = Vote;

    fn into_model(self) -> Result<WithId<Vote>> {
        let reaction =
            Reaction::parse(&self.reaction).ok_or_else(|| corrupted("reaction", &self.reaction))?;
        Ok(WithId::new(
            Id::new(self.id),
            Vote {
                incident_id: Id::new(self.incident_id),
                user_id: Id::new(self.user_id),
                reaction,
            },
        ))
    }
}

#[async_trait]
impl VoteRepo for PgDatabaseAutocommit {
    async fn vote_by_user(
        &mut self,
        incident_id: &Id<Incident>,
        user_id: &Id<User>,
    ) -> Result<Option<WithId<Vote>>> {
        vote::get_by_user(&self.pool, incident_id, user_id).await
    }

    async fn insert_vote(&mut self, vote: Vote) -> Result<WithId<Vote>> {
        vote::insert(&self.pool, vote).await
    }

    async fn update_vote_reaction(
        &mut self,
        id: &Id<Vote>,
        reaction: Reaction,
    ) -> Result<WithId<Vote>> {
        vote::update_reaction(&self.pool, id, reaction).await
    }

    async fn delete_vote(&mut self, id: &Id<Vote>) -> Result<()> {
        vote::delete(&self.pool, id).await
    }

    async fn votes_for(&mut self, incident_id: &Id<Incident>) -> Result<Vec<WithId<Vote>>> {
        vote::get_for_incident(&self.pool, incident_id).await
    }
}

#[async_trait]
impl<'a> VoteRepo for PgDatabaseTransaction<'a> {
    async fn vote_by_user(
        &mut self,
        incident_id: &Id<Incident>,
        user_id: &Id<User>,
    ) -> Result<Option<WithId<Vote>>> {
        vote::get_by_user(&mut *self.tx, incident_id, user_id).await
    }

    async fn insert_vote(&mut self, vote: Vote) -> Result<WithId<Vote>> {
        vote::insert(&mut *self.tx, vote).await
    }

    async fn update_vote_reaction(
        &mut self,
        id: &Id<Vote>,
        reaction: Reaction,
    ) -> Result<WithId<Vote>> {
        vote::update_reaction(&mut *self.tx, id, reaction).await
    }

    async fn delete_vote(&mut self, id: &Id<Vote>) -> Result<()> {
        vote::delete(&mut *self.tx, id).await
    }

    async fn votes_for(&mut self, incident_id: &Id<Incident>) -> Result<Vec<WithId<Vote>>> {
        vote::get_for_incident(&mut *self.tx, incident_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_vote() {
        let vote = VoteRow {
            id: 11,
            incident_id: 4,
            user_id: "alice".to_owned(),
            reaction: "Dislike".to_owned(),
        }
        .into_model()
        .unwrap();
        assert_eq!(vote.content.incident_id, Id::new(4));
        assert_eq!(vote.content.user_id, Id::new("alice".to_owned()));
        assert_eq!(vote.content.reaction, Reaction::Dislike);
    }
}

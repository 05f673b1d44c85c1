use model::{
    incident::{Incident, VoteTally},
    vote::{Reaction, User, Vote},
    WithId,
};
use utility::id::Id;

use crate::database::{DatabaseOperations, Result};

/// What to do with a user's vote given the vote they already cast, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteChange {
    Create(Reaction),
    /// Same reaction submitted twice: toggle it off.
    Delete(Id<Vote>),
    Update(Id<Vote>, Reaction),
}

impl VoteChange {
    pub fn decide(existing: Option<&WithId<Vote>>, requested: Reaction) -> Self {
        match existing {
            None => Self::Create(requested),
            Some(vote) if vote.content.reaction == requested => Self::Delete(vote.id),
            Some(vote) => Self::Update(vote.id, requested),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The user's vote after the change, `None` if it was toggled off.
    pub vote: Option<WithId<Vote>>,
    pub tally: VoteTally,
}

/// Applies a reaction of `user_id` to `incident_id` and recomputes the tally.
///
/// Must run inside a unit of work that already holds the incident lock, otherwise
/// concurrent reactions of the same user may violate the one-vote-per-user rule.
pub async fn record<T>(
    tx: &mut T,
    incident_id: &Id<Incident>,
    user_id: &Id<User>,
    reaction: Reaction,
) -> Result<LedgerEntry>
where
    T: DatabaseOperations,
{
    let existing = tx.vote_by_user(incident_id, user_id).await?;
    let vote = match VoteChange::decide(existing.as_ref(), reaction) {
        VoteChange::Create(reaction) => Some(
            tx.insert_vote(Vote {
                incident_id: *incident_id,
                user_id: user_id.clone(),
                reaction,
            })
            .await?,
        ),
        VoteChange::Delete(id) => {
            tx.delete_vote(&id).await?;
            None
        }
        VoteChange::Update(id, reaction) => {
            Some(tx.update_vote_reaction(&id, reaction).await?)
        }
    };

    let tally = VoteTally::from_reactions(
        tx.votes_for(incident_id)
            .await?
            .into_iter()
            .map(|vote| vote.content.reaction),
    );

    Ok(LedgerEntry { vote, tally })
}

use log::{debug, info};
use model::{
    geo::{BoundingBox, Coordinate},
    incident::{Incident, IncidentStatus, IncidentType},
    vote::{Reaction, User, Vote},
    WithDistance, WithId,
};
use utility::{id::Id, let_also::LetAlso};

use crate::{
    database::{Database, DatabaseTransaction, IncidentRepo},
    ledger,
    moderation::{ModerationCommand, ModerationConfig, Transition},
    not_found_to_none, RequestResult,
};

/// Margin in degrees around a point for proximity queries.
pub const DEFAULT_NEARBY_MARGIN: f64 = 0.002;

/// Result of a reaction: the user's vote after toggling and the updated incident.
#[derive(Debug, Clone, PartialEq)]
pub struct Reacted {
    pub vote: Option<WithId<Vote>>,
    pub incident: WithId<Incident>,
    pub transition: Option<Transition>,
}

#[derive(Debug, Clone)]
pub struct Client<D>
where
    D: Database,
{
    pub database: D,
    moderation: ModerationConfig,
    nearby_margin: f64,
}

impl<D> Client<D>
where
    D: Database,
{
    pub fn new(database: D, moderation: ModerationConfig) -> Self {
        Self {
            database,
            moderation,
            nearby_margin: DEFAULT_NEARBY_MARGIN,
        }
    }

    pub fn with_nearby_margin(mut self, margin: f64) -> Self {
        self.nearby_margin = margin.abs();
        self
    }

    pub fn moderation(&self) -> &ModerationConfig {
        &self.moderation
    }

    pub async fn report_incident(
        &self,
        incident_type: IncidentType,
        coordinate: Coordinate,
    ) -> RequestResult<WithId<Incident>> {
        let coordinate = coordinate.validated()?;
        let incident = self
            .database
            .auto()
            .insert_incident(Incident::report(incident_type, coordinate))
            .await?;
        info!(
            "incident {} reported: {} at {}",
            incident.id,
            incident.content.incident_type,
            incident.content.coordinate.lat_lon()
        );
        Ok(incident)
    }

    pub async fn get_incident(&self, id: &Id<Incident>) -> RequestResult<WithId<Incident>> {
        Ok(self.database.auto().get_incident(id).await?)
    }

    /// Active incidents inside the box.
    pub async fn incidents_in(
        &self,
        bounding_box: &BoundingBox,
    ) -> RequestResult<Vec<WithId<Incident>>> {
        let bounding_box = bounding_box.validated()?;
        self.database
            .auto()
            .incidents_in(&bounding_box, Some(IncidentStatus::Active))
            .await?
            .also(|incidents| {
                debug!("{} active incidents in {:?}", incidents.len(), bounding_box)
            })
            .let_owned(Ok)
    }

    /// Active incidents around a point, closest first.
    pub async fn nearby(
        &self,
        center: &Coordinate,
    ) -> RequestResult<Vec<WithDistance<WithId<Incident>>>> {
        let center = center.validated()?;
        let mut incidents = self
            .incidents_in(&BoundingBox::around(&center, self.nearby_margin))
            .await?
            .into_iter()
            .map(|incident| {
                WithDistance::new(
                    center.distance_km_to(&incident.content.coordinate),
                    incident,
                )
            })
            .collect::<Vec<_>>();
        incidents.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        Ok(incidents)
    }

    /// Records a reaction and re-evaluates moderation, all within one transaction
    /// holding the incident lock. Not to be retried by callers: a second attempt
    /// would toggle the vote back.
    pub async fn react(
        &self,
        user_id: &Id<User>,
        incident_id: &Id<Incident>,
        reaction: Reaction,
    ) -> RequestResult<Reacted> {
        let mut tx = self.database.transaction().await?;
        let locked = tx.lock_incident(incident_id).await?;

        let entry = ledger::record(&mut tx, incident_id, user_id, reaction).await?;

        let status = self.moderation.after_vote(locked.content.status, &entry.tally);
        let transition = Transition::between(locked.content.status, status);
        if transition.is_some() {
            tx.set_incident_status(incident_id, status).await?;
        }

        let incident = tx.get_incident(incident_id).await?;
        tx.commit().await?;

        debug!(
            "user {} reacted {} on incident {}: {} likes, {} dislikes",
            user_id, reaction, incident_id, entry.tally.likes, entry.tally.dislikes
        );
        if let Some(transition) = transition {
            info!(
                "incident {} moved from {} to {} after votes ({} likes, {} dislikes)",
                incident_id,
                transition.from,
                transition.to,
                entry.tally.likes,
                entry.tally.dislikes
            );
        }

        Ok(Reacted {
            vote: entry.vote,
            incident,
            transition,
        })
    }

    /// Manual enable/disable. Setting the current status again is a no-op.
    pub async fn moderate(
        &self,
        incident_id: &Id<Incident>,
        command: ModerationCommand,
    ) -> RequestResult<WithId<Incident>> {
        let mut tx = self.database.transaction().await?;
        let locked = tx.lock_incident(incident_id).await?;
        let target = command.target();
        if let Some(transition) = Transition::between(locked.content.status, target) {
            tx.set_incident_status(incident_id, target).await?;
            tx.commit().await?;
            info!(
                "incident {} manually moved from {} to {}",
                incident_id, transition.from, transition.to
            );
            Ok(WithId::new(
                locked.id,
                Incident {
                    status: target,
                    ..locked.content
                },
            ))
        } else {
            tx.commit().await?;
            Ok(locked)
        }
    }

    /// Administrative removal. Returns the removed incident, `None` if it did not
    /// exist.
    pub async fn delete_incident(
        &self,
        incident_id: &Id<Incident>,
    ) -> RequestResult<Option<WithId<Incident>>> {
        let mut tx = self.database.transaction().await?;
        let locked = match not_found_to_none(
            tx.lock_incident(incident_id).await.map_err(Into::into),
        )? {
            Some(locked) => locked,
            None => return Ok(None),
        };
        tx.delete_incident(incident_id).await?;
        tx.commit().await?;
        info!("incident {} deleted", incident_id);
        Ok(Some(locked))
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use model::incident::VoteTally;

    use crate::{database::VoteRepo, memory::MemoryDatabase, RequestError};

    use super::*;

    fn client() -> Client<MemoryDatabase> {
        Client::new(MemoryDatabase::new(), ModerationConfig::default())
    }

    fn user(name: &str) -> Id<User> {
        Id::new(name.to_owned())
    }

    async fn reported(client: &Client<MemoryDatabase>) -> WithId<Incident> {
        client
            .report_incident(
                IncidentType::Crash,
                Coordinate::new(48.855, 2.355).unwrap(),
            )
            .await
            .unwrap()
    }

    async fn votes_of(
        client: &Client<MemoryDatabase>,
        incident: &Id<Incident>,
        user_id: &Id<User>,
    ) -> Vec<WithId<Vote>> {
        client
            .database
            .auto()
            .votes_for(incident)
            .await
            .unwrap()
            .into_iter()
            .filter(|vote| vote.content.user_id == *user_id)
            .collect()
    }

    #[tokio::test]
    async fn like_twice_leaves_no_vote() {
        let client = client();
        let incident = reported(&client).await;
        let alice = user("alice");

        let first = client
            .react(&alice, &incident.id, Reaction::Like)
            .await
            .unwrap();
        assert!(first.vote.is_some());
        assert_eq!(first.incident.content.tally, VoteTally { likes: 1, dislikes: 0 });

        let second = client
            .react(&alice, &incident.id, Reaction::Like)
            .await
            .unwrap();
        assert!(second.vote.is_none());
        assert_eq!(second.incident.content.tally, VoteTally::default());
        assert!(votes_of(&client, &incident.id, &alice).await.is_empty());
    }

    #[tokio::test]
    async fn like_then_dislike_switches_the_vote() {
        let client = client();
        let incident = reported(&client).await;
        let alice = user("alice");

        client
            .react(&alice, &incident.id, Reaction::Like)
            .await
            .unwrap();
        let switched = client
            .react(&alice, &incident.id, Reaction::Dislike)
            .await
            .unwrap();

        let votes = votes_of(&client, &incident.id, &alice).await;
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].content.reaction, Reaction::Dislike);
        assert_eq!(switched.vote.map(|v| v.id), Some(votes[0].id));
        assert_eq!(
            switched.incident.content.tally,
            VoteTally { likes: 0, dislikes: 1 }
        );
    }

    #[tokio::test]
    async fn five_dislikes_deactivate_four_do_not() {
        let client = client();
        let incident = reported(&client).await;

        for name in ["a", "b", "c", "d"] {
            let reacted = client
                .react(&user(name), &incident.id, Reaction::Dislike)
                .await
                .unwrap();
            assert_eq!(reacted.incident.content.status, IncidentStatus::Active);
            assert!(reacted.transition.is_none());
        }

        let fifth = client
            .react(&user("e"), &incident.id, Reaction::Dislike)
            .await
            .unwrap();
        assert_eq!(fifth.incident.content.status, IncidentStatus::Inactive);
        assert_eq!(
            fifth.transition,
            Some(Transition {
                from: IncidentStatus::Active,
                to: IncidentStatus::Inactive
            })
        );
    }

    #[tokio::test]
    async fn deactivation_is_not_undone_by_votes() {
        let client = client();
        let incident = reported(&client).await;
        for name in ["a", "b", "c", "d", "e"] {
            client
                .react(&user(name), &incident.id, Reaction::Dislike)
                .await
                .unwrap();
        }
        // withdrawing a dislike drops below the threshold, status stays
        let withdrawn = client
            .react(&user("a"), &incident.id, Reaction::Dislike)
            .await
            .unwrap();
        assert_eq!(withdrawn.incident.content.tally.dislikes, 4);
        assert_eq!(withdrawn.incident.content.status, IncidentStatus::Inactive);
    }

    #[tokio::test]
    async fn reacting_to_unknown_incident_is_not_found() {
        let client = client();
        let result = client
            .react(&user("alice"), &Id::new(404), Reaction::Like)
            .await;
        assert!(matches!(result, Err(RequestError::NotFound)));
    }

    #[tokio::test]
    async fn concurrent_votes_are_not_lost() {
        let client = client();
        let incident = reported(&client).await;

        let reactions = (0..24).map(|i| {
            let client = client.clone();
            let incident_id = incident.id;
            tokio::spawn(async move {
                let reaction = if i % 3 == 0 {
                    Reaction::Like
                } else {
                    Reaction::Dislike
                };
                client
                    .react(&user(&format!("user-{i}")), &incident_id, reaction)
                    .await
            })
        });
        for result in join_all(reactions).await {
            result.unwrap().unwrap();
        }

        let stored = client.get_incident(&incident.id).await.unwrap();
        assert_eq!(stored.content.tally, VoteTally { likes: 8, dislikes: 16 });
        assert_eq!(stored.content.status, IncidentStatus::Inactive);
    }

    #[tokio::test]
    async fn manual_moderation_is_idempotent() {
        let client = client();
        let incident = reported(&client).await;

        let disabled = client
            .moderate(&incident.id, ModerationCommand::Disable)
            .await
            .unwrap();
        assert_eq!(disabled.content.status, IncidentStatus::Inactive);
        let again = client
            .moderate(&incident.id, ModerationCommand::Disable)
            .await
            .unwrap();
        assert_eq!(again.content.status, IncidentStatus::Inactive);

        let enabled = client
            .moderate(&incident.id, ModerationCommand::Enable)
            .await
            .unwrap();
        assert_eq!(enabled.content.status, IncidentStatus::Active);
        let again = client
            .moderate(&incident.id, ModerationCommand::Enable)
            .await
            .unwrap();
        assert_eq!(again.content.status, IncidentStatus::Active);
        assert_eq!(
            client.get_incident(&incident.id).await.unwrap().content.status,
            IncidentStatus::Active
        );
    }

    #[tokio::test]
    async fn window_hides_inactive_incidents() {
        let client = client();
        let incident = reported(&client).await;
        let bbox = BoundingBox::around(&incident.content.coordinate, 0.01);
        assert_eq!(client.incidents_in(&bbox).await.unwrap().len(), 1);

        client
            .moderate(&incident.id, ModerationCommand::Disable)
            .await
            .unwrap();
        assert!(client.incidents_in(&bbox).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn nearby_is_sorted_by_distance() {
        let client = client();
        let far = client
            .report_incident(
                IncidentType::Obstacle,
                Coordinate::new(48.8565, 2.3565).unwrap(),
            )
            .await
            .unwrap();
        let close = reported(&client).await;
        client
            .report_incident(IncidentType::Obstacle, Coordinate::new(48.9, 2.4).unwrap())
            .await
            .unwrap();

        let nearby = client
            .nearby(&Coordinate::new(48.8551, 2.3551).unwrap())
            .await
            .unwrap();
        let ids = nearby.iter().map(|n| n.content.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![close.id, far.id]);
    }

    #[tokio::test]
    async fn nearby_works_at_the_pole_and_antimeridian() {
        let client = client();
        let pole = client
            .report_incident(IncidentType::Obstacle, Coordinate::new(90.0, 0.0).unwrap())
            .await
            .unwrap();
        let east = client
            .report_incident(
                IncidentType::Obstacle,
                Coordinate::new(0.0, 179.9995).unwrap(),
            )
            .await
            .unwrap();

        let at_pole = client
            .nearby(&Coordinate::new(90.0, 0.0).unwrap())
            .await
            .unwrap();
        assert_eq!(at_pole.len(), 1);
        assert_eq!(at_pole[0].content.id, pole.id);

        let at_edge = client
            .nearby(&Coordinate::new(0.0, 179.9995).unwrap())
            .await
            .unwrap();
        assert_eq!(at_edge.len(), 1);
        assert_eq!(at_edge[0].content.id, east.id);
    }

    #[tokio::test]
    async fn delete_is_reported_once() {
        let client = client();
        let incident = reported(&client).await;
        assert!(client.delete_incident(&incident.id).await.unwrap().is_some());
        assert!(client.delete_incident(&incident.id).await.unwrap().is_none());
        assert!(matches!(
            client.get_incident(&incident.id).await,
            Err(RequestError::NotFound)
        ));
    }

    #[tokio::test]
    async fn invalid_bounding_box_is_rejected() {
        let client = client();
        let inverted = BoundingBox {
            min_lat: 49.0,
            max_lat: 48.0,
            min_lon: 2.0,
            max_lon: 3.0,
        };
        assert!(matches!(
            client.incidents_in(&inverted).await,
            Err(RequestError::Validation(_))
        ));
    }
}

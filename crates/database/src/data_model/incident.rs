use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incidents::database::{IncidentRepo, Result};
use model::{
    geo::{BoundingBox, Coordinate},
    incident::{Incident, IncidentStatus, VoteTally},
    WithId,
};
use sqlx::prelude::FromRow;
use utility::id::Id;

use crate::{queries::incident, PgDatabaseAutocommit, PgDatabaseTransaction};

use super::{corrupted, DatabaseRow};

#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub id: i64,
    pub incident_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub creation_timestamp: DateTime<Utc>,
    pub likes: i64,
    pub dislikes: i64,
}

impl DatabaseRow for IncidentRow {
    type Model = Incident;

    fn into_model(self) -> Result<WithId<Incident>> {
        let status = IncidentStatus::parse(&self.status)
            .ok_or_else(|| corrupted("status", &self.status))?;
        let tally = VoteTally {
            likes: u32::try_from(self.likes)
                .map_err(|_| corrupted("likes", &self.likes.to_string()))?,
            dislikes: u32::try_from(self.dislikes)
                .map_err(|_| corrupted("dislikes", &self.dislikes.to_string()))?,
        };
        Ok(WithId::new(
            Id::new(self.id),
            Incident {
                incident_type: self.incident_type.into(),
                coordinate: Coordinate {
                    latitude: self.latitude,
                    longitude: self.longitude,
                },
                status,
                creation_timestamp: self.creation_timestamp,
                tally,
            },
        ))
    }
}

#[async_trait]
impl IncidentRepo for PgDatabaseAutocommit {
    async fn get_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        incident::get(&self.pool, id).await
    }

    /// Without a surrounding transaction the row lock is released right away.
    async fn lock_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        incident::get(&self.pool, id).await
    }

    async fn incidents_in(
        &mut self,
        bounding_box: &BoundingBox,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<WithId<Incident>>> {
        incident::get_in_bounding_box(&self.pool, bounding_box, status).await
    }

    async fn insert_incident(&mut self, incident: Incident) -> Result<WithId<Incident>> {
        incident::insert(&self.pool, incident).await
    }

    async fn set_incident_status(
        &mut self,
        id: &Id<Incident>,
        status: IncidentStatus,
    ) -> Result<()> {
        incident::update_status(&self.pool, id, status).await
    }

    async fn delete_incident(&mut self, id: &Id<Incident>) -> Result<()> {
        incident::delete(&self.pool, id).await
    }
}

#[async_trait]
impl<'a> IncidentRepo for PgDatabaseTransaction<'a> {
    async fn get_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        incident::get(&mut *self.tx, id).await
    }

    async fn lock_incident(&mut self, id: &Id<Incident>) -> Result<WithId<Incident>> {
        incident::lock(&mut *self.tx, id).await?;
        incident::get(&mut *self.tx, id).await
    }

    async fn incidents_in(
        &mut self,
        bounding_box: &BoundingBox,
        status: Option<IncidentStatus>,
    ) -> Result<Vec<WithId<Incident>>> {
        incident::get_in_bounding_box(&mut *self.tx, bounding_box, status).await
    }

    async fn insert_incident(&mut self, incident: Incident) -> Result<WithId<Incident>> {
        incident::insert(&mut *self.tx, incident).await
    }

    async fn set_incident_status(
        &mut self,
        id: &Id<Incident>,
        status: IncidentStatus,
    ) -> Result<()> {
        incident::update_status(&mut *self.tx, id, status).await
    }

    async fn delete_incident(&mut self, id: &Id<Incident>) -> Result<()> {
        incident::delete(&mut *self.tx, id).await
    }
}

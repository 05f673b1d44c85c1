use incidents::database::{DatabaseError, Result};
use model::{
    geo::BoundingBox,
    incident::{Incident, IncidentStatus},
    WithId,
};
use sqlx::{Executor, Postgres};
use utility::{id::Id, let_also::LetAlso};

use crate::data_model::{incident::IncidentRow, DatabaseRow as _};

use super::convert_error;

const SELECT_WITH_TALLY: &str = "
    SELECT
        i.id, i.incident_type, i.latitude, i.longitude, i.status,
        i.creation_timestamp,
        COUNT(v.id) FILTER (WHERE v.reaction = 'Like') AS likes,
        COUNT(v.id) FILTER (WHERE v.reaction = 'Dislike') AS dislikes
    FROM
        incidents i
        LEFT JOIN votes v ON v.incident_id = i.id
";

pub async fn get<'c, E>(executor: E, id: &Id<Incident>) -> Result<WithId<Incident>>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = format!("{} WHERE i.id = $1 GROUP BY i.id;", SELECT_WITH_TALLY);
    sqlx::query_as::<_, IncidentRow>(&query)
        .bind(id.raw())
        .fetch_one(executor)
        .await
        .map_err(convert_error)?
        .let_owned(|row: IncidentRow| row.into_model())
}

/// Takes the row lock on an incident. Only meaningful inside a transaction.
pub async fn lock<'c, E>(executor: E, id: &Id<Incident>) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar("SELECT id FROM incidents WHERE id = $1 FOR UPDATE;")
        .bind(id.raw())
        .fetch_one(executor)
        .await
        .map_err(convert_error)
        .map(|_: i64| ())
}

pub async fn get_in_bounding_box<'c, E>(
    executor: E,
    bounding_box: &BoundingBox,
    status: Option<IncidentStatus>,
) -> Result<Vec<WithId<Incident>>>
where
    E: Executor<'c, Database = Postgres>,
{
    let query = format!(
        "{}
        WHERE
            i.latitude BETWEEN $1 AND $2
            AND i.longitude BETWEEN $3 AND $4
            AND ($5::TEXT IS NULL OR i.status = $5)
        GROUP BY i.id
        ORDER BY i.id;",
        SELECT_WITH_TALLY
    );
    sqlx::query_as::<_, IncidentRow>(&query)
        .bind(bounding_box.min_lat)
        .bind(bounding_box.max_lat)
        .bind(bounding_box.min_lon)
        .bind(bounding_box.max_lon)
        .bind(status.map(|status| status.as_str()))
        .fetch_all(executor)
        .await
        .map_err(convert_error)?
        .into_iter()
        .map(|row: IncidentRow| row.into_model())
        .collect()
}

pub async fn insert<'c, E>(executor: E, incident: Incident) -> Result<WithId<Incident>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar(
        "
        INSERT INTO incidents(
            incident_type,
            latitude,
            longitude,
            status,
            creation_timestamp
        )
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id;
        ",
    )
    .bind(incident.incident_type.name())
    .bind(incident.coordinate.latitude)
    .bind(incident.coordinate.longitude)
    .bind(incident.status.as_str())
    .bind(incident.creation_timestamp)
    .fetch_one(executor)
    .await
    .map_err(convert_error)
    .map(|id: i64| {
        WithId::new(
            Id::new(id),
            Incident {
                tally: Default::default(),
                ..incident
            },
        )
    })
}

pub async fn update_status<'c, E>(
    executor: E,
    id: &Id<Incident>,
    status: IncidentStatus,
) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query("UPDATE incidents SET status = $2 WHERE id = $1;")
        .bind(id.raw())
        .bind(status.as_str())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

pub async fn delete<'c, E>(executor: E, id: &Id<Incident>) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    // votes are removed by ON DELETE CASCADE
    let result = sqlx::query("DELETE FROM incidents WHERE id = $1;")
        .bind(id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

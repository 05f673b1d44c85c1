use incidents::database::{DatabaseError, Result};
use model::{
    incident::Incident,
    vote::{Reaction, User, Vote},
    WithId,
};
use sqlx::{Executor, Postgres};
use utility::id::Id;

use crate::data_model::{vote::VoteRow, DatabaseRow as _};

use super::convert_error;

pub async fn get_by_user<'c, E>(
    executor: E,
    incident_id: &Id<Incident>,
    user_id: &Id<User>,
) -> Result<Option<WithId<Vote>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, VoteRow>(
        "
        SELECT
            id, incident_id, user_id, reaction
        FROM
            votes
        WHERE
            incident_id = $1 AND user_id = $2;
        ",
    )
    .bind(incident_id.raw())
    .bind(user_id.raw_ref().as_str())
    .fetch_optional(executor)
    .await
    .map_err(convert_error)?
    .map(|row: VoteRow| row.into_model())
    .transpose()
}

pub async fn get_for_incident<'c, E>(
    executor: E,
    incident_id: &Id<Incident>,
) -> Result<Vec<WithId<Vote>>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, VoteRow>(
        "
        SELECT
            id, incident_id, user_id, reaction
        FROM
            votes
        WHERE
            incident_id = $1
        ORDER BY id;
        ",
    )
    .bind(incident_id.raw())
    .fetch_all(executor)
    .await
    .map_err(convert_error)?
    .into_iter()
    .map(|row: VoteRow| row.into_model())
    .collect()
}

pub async fn insert<'c, E>(executor: E, vote: Vote) -> Result<WithId<Vote>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_scalar(
        "
        INSERT INTO votes(
            incident_id,
            user_id,
            reaction
        )
        VALUES ($1, $2, $3)
        RETURNING id;
        ",
    )
    .bind(vote.incident_id.raw())
    .bind(vote.user_id.raw_ref().as_str())
    .bind(vote.reaction.as_str())
    .fetch_one(executor)
    .await
    .map_err(convert_error)
    .map(|id: i64| WithId::new(Id::new(id), vote))
}

pub async fn update_reaction<'c, E>(
    executor: E,
    id: &Id<Vote>,
    reaction: Reaction,
) -> Result<WithId<Vote>>
where
    E: Executor<'c, Database = Postgres>,
{
    sqlx::query_as::<_, VoteRow>(
        "
        UPDATE votes
        SET reaction = $2
        WHERE id = $1
        RETURNING id, incident_id, user_id, reaction;
        ",
    )
    .bind(id.raw())
    .bind(reaction.as_str())
    .fetch_one(executor)
    .await
    .map_err(convert_error)
    .and_then(|row: VoteRow| row.into_model())
}

pub async fn delete<'c, E>(executor: E, id: &Id<Vote>) -> Result<()>
where
    E: Executor<'c, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM votes WHERE id = $1;")
        .bind(id.raw())
        .execute(executor)
        .await
        .map_err(convert_error)?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound);
    }
    Ok(())
}

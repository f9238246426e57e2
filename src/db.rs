//! Read-only Postgres access to question, evaluation and group rows.
//!
//! Soft-deleted rows (`deleted_at IS NOT NULL`) are never returned.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{GroupSnapshot, Observation, StudentActivity};
use crate::source::ObservationSource;

const OBSERVATION_COLUMNS: &str = "\
    SELECT q.creator_id AS student_id, q.activity_id, q.group_id, q.created_at, \
           e.overall_score AS quality \
    FROM questions q \
    LEFT JOIN question_evaluations e ON e.question_id = q.id \
    WHERE q.deleted_at IS NULL";

pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}

fn observation(row: &PgRow) -> sqlx::Result<Observation> {
    Ok(Observation {
        student_id: row.try_get("student_id")?,
        activity_id: row.try_get("activity_id")?,
        group_id: row.try_get("group_id")?,
        created_at: row.try_get("created_at")?,
        quality: row.try_get("quality")?,
    })
}

fn observations(rows: &[PgRow]) -> sqlx::Result<Vec<Observation>> {
    rows.iter().map(observation).collect()
}

#[async_trait]
impl ObservationSource for PgSource {
    #[instrument(level = "debug", skip(self))]
    async fn student_observations(&self, student_id: &str) -> Result<Vec<Observation>> {
        let query = format!("{OBSERVATION_COLUMNS} AND q.creator_id = $1 ORDER BY q.created_at");
        let rows = sqlx::query(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(observations(&rows)?)
    }

    #[instrument(level = "debug", skip(self))]
    async fn activity_observations(
        &self,
        activity_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Vec<Observation>>> {
        let exists = sqlx::query("SELECT 1 FROM activities WHERE id = $1 AND deleted_at IS NULL")
            .bind(activity_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();
        if !exists {
            return Ok(None);
        }

        let query = format!(
            "{OBSERVATION_COLUMNS} AND q.activity_id = $1 AND q.created_at >= $2 \
             ORDER BY q.created_at"
        );
        let rows = sqlx::query(&query)
            .bind(activity_id)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(Some(observations(&rows)?))
    }

    #[instrument(level = "debug", skip(self))]
    async fn students(&self, group_id: Option<&str>) -> Result<Vec<StudentActivity>> {
        let mut roster_query = String::from(
            "SELECT gm.user_id, gm.group_id, u.name \
             FROM group_members gm \
             JOIN groups g ON g.id = gm.group_id AND g.deleted_at IS NULL \
             JOIN users u ON u.id = gm.user_id",
        );
        if group_id.is_some() {
            roster_query.push_str(" WHERE gm.group_id = $1");
        }

        let mut roster = sqlx::query(&roster_query);
        if let Some(group) = group_id {
            roster = roster.bind(group);
        }
        let rows = roster.fetch_all(&self.pool).await?;

        let mut students: BTreeMap<String, StudentActivity> = BTreeMap::new();
        for row in rows {
            let student_id: String = row.try_get("user_id")?;
            let name: Option<String> = row.try_get("name")?;
            let entry = students
                .entry(student_id.clone())
                .or_insert_with(|| StudentActivity {
                    student_id,
                    name,
                    group_ids: Vec::new(),
                    observations: Vec::new(),
                });
            entry.group_ids.push(row.try_get("group_id")?);
        }

        if students.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = students.keys().cloned().collect();
        let query =
            format!("{OBSERVATION_COLUMNS} AND q.creator_id = ANY($1) ORDER BY q.created_at");
        let rows = sqlx::query(&query).bind(&ids).fetch_all(&self.pool).await?;
        for row in &rows {
            let obs = observation(row)?;
            if let Some(student) = students.get_mut(&obs.student_id) {
                student.observations.push(obs);
            }
        }

        debug!(students = students.len(), questions = rows.len(), "loaded roster");
        Ok(students.into_values().collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn owned_groups(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<GroupSnapshot>> {
        let group_ids: Vec<String> = sqlx::query(
            "SELECT id FROM groups WHERE creator_id = $1 AND deleted_at IS NULL ORDER BY id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("id"))
        .collect::<sqlx::Result<_>>()?;

        if group_ids.is_empty() {
            return Ok(None);
        }

        let member_ids: Vec<String> = sqlx::query(
            "SELECT DISTINCT user_id FROM group_members WHERE group_id = ANY($1) ORDER BY user_id",
        )
        .bind(&group_ids)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| row.try_get("user_id"))
        .collect::<sqlx::Result<_>>()?;

        let query = format!(
            "{OBSERVATION_COLUMNS} AND q.group_id = ANY($1) AND q.created_at >= $2 \
             ORDER BY q.created_at"
        );
        let rows = sqlx::query(&query)
            .bind(&group_ids)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        let observations = observations(&rows)?;

        Ok(Some(GroupSnapshot {
            owner_id: owner_id.to_string(),
            group_ids,
            member_ids,
            observations,
        }))
    }
}

//! Where observations come from: the data-access boundary of the engine.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::{GroupSnapshot, Observation, StudentActivity};

#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Every question the student has posted, oldest first.
    async fn student_observations(&self, student_id: &str) -> Result<Vec<Observation>>;

    /// Questions posted to the activity since `since`; `None` when the activity does not exist.
    async fn activity_observations(
        &self,
        activity_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Vec<Observation>>>;

    /// Every group member with their questions, optionally limited to one group.
    async fn students(&self, group_id: Option<&str>) -> Result<Vec<StudentActivity>>;

    /// The teacher's owned groups since `since`; `None` when they own none.
    async fn owned_groups(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<GroupSnapshot>>;
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    student_id: String,
    #[serde(default)]
    student_name: Option<String>,
    #[serde(default)]
    group_id: Option<String>,
    #[serde(default)]
    owner_id: Option<String>,
    #[serde(default)]
    activity_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    quality: Option<f64>,
}

#[derive(Debug, Clone)]
struct Member {
    name: Option<String>,
    groups: BTreeSet<String>,
}

/// An in-memory source loaded from a CSV export.
///
/// Columns: `student_id, student_name, group_id, owner_id, activity_id, created_at, quality`.
/// A row with an empty `created_at` only records group membership.
#[derive(Debug, Clone, Default)]
pub struct CsvSource {
    observations: Vec<Observation>,
    members: BTreeMap<String, Member>,
    group_owners: BTreeMap<String, String>,
}

impl CsvSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let source = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            observations = source.observations.len(),
            students = source.members.len(),
            "loaded csv export"
        );
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut source = CsvSource::default();

        for result in reader.deserialize::<CsvRow>() {
            let row = result?;
            let member = source
                .members
                .entry(row.student_id.clone())
                .or_insert_with(|| Member {
                    name: None,
                    groups: BTreeSet::new(),
                });
            if row.student_name.is_some() {
                member.name = row.student_name.clone();
            }
            if let Some(group) = &row.group_id {
                member.groups.insert(group.clone());
                if let Some(owner) = &row.owner_id {
                    source.group_owners.insert(group.clone(), owner.clone());
                }
            }

            if let Some(created_at) = row.created_at {
                source.observations.push(Observation {
                    student_id: row.student_id,
                    activity_id: row.activity_id,
                    group_id: row.group_id,
                    created_at,
                    quality: row.quality,
                });
            }
        }

        source.observations.sort_by_key(|obs| obs.created_at);
        Ok(source)
    }
}

#[async_trait]
impl ObservationSource for CsvSource {
    async fn student_observations(&self, student_id: &str) -> Result<Vec<Observation>> {
        Ok(self
            .observations
            .iter()
            .filter(|obs| obs.student_id == student_id)
            .cloned()
            .collect())
    }

    #[instrument(level = "debug", skip(self))]
    async fn activity_observations(
        &self,
        activity_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Vec<Observation>>> {
        let mut known = false;
        let mut matching = Vec::new();
        for obs in &self.observations {
            if obs.activity_id.as_deref() == Some(activity_id) {
                known = true;
                if obs.created_at >= since {
                    matching.push(obs.clone());
                }
            }
        }
        Ok(known.then_some(matching))
    }

    async fn students(&self, group_id: Option<&str>) -> Result<Vec<StudentActivity>> {
        let students = self
            .members
            .iter()
            .filter(|(_, member)| match group_id {
                Some(group) => member.groups.contains(group),
                None => true,
            })
            .map(|(student_id, member)| StudentActivity {
                student_id: student_id.clone(),
                name: member.name.clone(),
                group_ids: member.groups.iter().cloned().collect(),
                observations: self
                    .observations
                    .iter()
                    .filter(|obs| &obs.student_id == student_id)
                    .cloned()
                    .collect(),
            })
            .collect();
        Ok(students)
    }

    async fn owned_groups(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<GroupSnapshot>> {
        let group_ids: Vec<String> = self
            .group_owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == owner_id)
            .map(|(group, _)| group.clone())
            .collect();
        if group_ids.is_empty() {
            return Ok(None);
        }

        let in_groups = |group: &str| group_ids.iter().any(|g| g == group);
        let member_ids = self
            .members
            .iter()
            .filter(|(_, member)| member.groups.iter().any(|g| in_groups(g)))
            .map(|(id, _)| id.clone())
            .collect();
        let observations = self
            .observations
            .iter()
            .filter(|obs| obs.created_at >= since)
            .filter(|obs| obs.group_id.as_deref().is_some_and(|g| in_groups(g)))
            .cloned()
            .collect();

        Ok(Some(GroupSnapshot {
            owner_id: owner_id.to_string(),
            group_ids,
            member_ids,
            observations,
        }))
    }
}

//! Drill-down from a chart element to the tasks behind it

use super::aggregator::{completed_day, ReportAggregator};
use super::filters::{ReportFilters, TaskBucket};
use chrono::{DateTime, NaiveDate, Utc};
use planeja_common::types::{ProjectId, TeamId};
use planeja_common::Result;
use planeja_storage::models::{Snapshot, Task};
use serde::{Deserialize, Serialize};

/// A clicked chart element or KPI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrillDownTarget {
    Status { bucket: TaskBucket },
    Project { id: ProjectId },
    Team { id: TeamId },
    /// Tasks created or completed on the day
    Day { date: NaiveDate },
}

impl<'a> ReportAggregator<'a> {
    /// Filtered tasks belonging to `target`
    pub fn drill_down(&self, target: &DrillDownTarget) -> Vec<&'a Task> {
        self.filtered_tasks()
            .into_iter()
            .filter(|task| match target {
                DrillDownTarget::Status { bucket } => self.bucket(task) == *bucket,
                DrillDownTarget::Project { id } => task.project_id == *id,
                DrillDownTarget::Team { id } => {
                    self.project(task.project_id).and_then(|p| p.team_id) == Some(*id)
                }
                DrillDownTarget::Day { date } => {
                    task.created_at.date_naive() == *date || completed_day(task) == Some(*date)
                }
            })
            .collect()
    }
}

/// Tasks behind a chart element, owned
pub fn drill_down(
    snapshot: &Snapshot,
    filters: &ReportFilters,
    target: &DrillDownTarget,
    now: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let aggregator = ReportAggregator::new(snapshot, filters, now)?;
    Ok(aggregator.drill_down(target).into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::aggregator::tests::fixture;
    use pretty_assertions::assert_eq;

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_status_drill_down_matches_distribution() {
        let f = fixture();
        let filters = ReportFilters::default();
        let report = ReportAggregator::compute(&f.snapshot, &filters, f.now).unwrap();

        for slice in &report.task_distribution_data {
            let tasks = drill_down(
                &f.snapshot,
                &filters,
                &DrillDownTarget::Status { bucket: slice.bucket },
                f.now,
            )
            .unwrap();
            assert_eq!(tasks.len() as u32, slice.count, "bucket {}", slice.bucket);
        }
    }

    #[test]
    fn test_project_team_and_day_drill_down() {
        let f = fixture();
        let filters = ReportFilters::default();

        let project = drill_down(&f.snapshot, &filters, &DrillDownTarget::Project { id: f.app }, f.now).unwrap();
        assert_eq!(titles(&project), vec!["Login screen", "Push setup"]);

        let team = drill_down(&f.snapshot, &filters, &DrillDownTarget::Team { id: f.design }, f.now).unwrap();
        assert_eq!(team.len(), 3);

        let date = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let day = drill_down(&f.snapshot, &filters, &DrillDownTarget::Day { date }, f.now).unwrap();
        assert_eq!(titles(&day), vec!["Login screen", "Push setup"]);
    }

    #[test]
    fn test_target_deserializes_from_tagged_json() {
        let target: DrillDownTarget =
            serde_json::from_str(r#"{"kind":"status","bucket":"overdue"}"#).unwrap();
        assert_eq!(
            target,
            DrillDownTarget::Status {
                bucket: TaskBucket::Overdue
            }
        );
    }
}

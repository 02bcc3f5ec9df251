//! Report filters and date ranges

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use planeja_common::types::{ProjectId, TeamId, UserId};
use planeja_common::{Error, Result};
use planeja_storage::models::{Project, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Longest custom range a report may span, in days
pub const MAX_RANGE_DAYS: i64 = 366 * 5;

/// Reporting period
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPeriod {
    Day,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
    Custom { start: NaiveDate, end: NaiveDate },
}

/// Status restriction applied to tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl StatusFilter {
    fn admits(&self, bucket: TaskBucket) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => bucket == TaskBucket::Pending,
            StatusFilter::InProgress => bucket == TaskBucket::InProgress,
            StatusFilter::Completed => bucket == TaskBucket::Completed,
            StatusFilter::Overdue => bucket == TaskBucket::Overdue,
        }
    }
}

/// Trend bucket size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    Week,
    Month,
}

/// Filters a report is computed under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub period: ReportPeriod,
    #[serde(default)]
    pub project_ids: BTreeSet<ProjectId>,
    #[serde(default)]
    pub team_ids: BTreeSet<TeamId>,
    #[serde(default)]
    pub member_ids: BTreeSet<UserId>,
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default)]
    pub granularity: Granularity,
}

/// Where a task falls in the distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBucket {
    Pending,
    InProgress,
    Completed,
    Overdue,
}

impl TaskBucket {
    pub const ALL: [TaskBucket; 4] = [
        TaskBucket::Pending,
        TaskBucket::InProgress,
        TaskBucket::Completed,
        TaskBucket::Overdue,
    ];

    /// Completed wins; an open task past its due date is overdue
    pub fn classify(task: &Task, now: DateTime<Utc>) -> Self {
        match task.status {
            TaskStatus::Completed => TaskBucket::Completed,
            _ if task.due_date.map(|due| due < now).unwrap_or(false) => TaskBucket::Overdue,
            TaskStatus::InProgress => TaskBucket::InProgress,
            TaskStatus::Pending => TaskBucket::Pending,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskBucket::Pending => "Pending",
            TaskBucket::InProgress => "In progress",
            TaskBucket::Completed => "Completed",
            TaskBucket::Overdue => "Overdue",
        }
    }
}

impl std::fmt::Display for TaskBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskBucket::Pending => write!(f, "pending"),
            TaskBucket::InProgress => write!(f, "in_progress"),
            TaskBucket::Completed => write!(f, "completed"),
            TaskBucket::Overdue => write!(f, "overdue"),
        }
    }
}

/// Inclusive instant range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Resolve a period against `now`
    pub fn resolve(period: &ReportPeriod, now: DateTime<Utc>) -> Result<Self> {
        let today = now.date_naive();
        let rolling = |days: i64| -> Result<Self> {
            Ok(Self {
                start: start_of_day(today - Duration::days(days - 1))?,
                end: end_of_day(today)?,
            })
        };

        match period {
            ReportPeriod::Day => rolling(1),
            ReportPeriod::Week => rolling(7),
            ReportPeriod::Month => rolling(30),
            ReportPeriod::Quarter => rolling(90),
            ReportPeriod::Year => rolling(365),
            ReportPeriod::Custom { start, end } => {
                if start > end {
                    return Err(Error::Validation(
                        "Start date must not be after end date".to_string(),
                    ));
                }
                if (*end - *start).num_days() >= MAX_RANGE_DAYS {
                    return Err(Error::Validation(format!(
                        "Date range must span at most {} days",
                        MAX_RANGE_DAYS
                    )));
                }
                Ok(Self {
                    start: start_of_day(*start)?,
                    end: end_of_day(*end)?,
                })
            }
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Every calendar day in the range, in order
    pub fn days(&self) -> Vec<NaiveDate> {
        let last = self.end.date_naive();
        let mut days = Vec::new();
        let mut day = self.start.date_naive();
        while day <= last {
            days.push(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        days
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::Internal("invalid start of day".to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

pub(crate) fn end_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    let time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| Error::Internal("invalid end of day".to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

impl ReportFilters {
    /// Whether a task passes every restriction.
    ///
    /// Each restriction is an independent predicate, so applying the filters
    /// in any order, or more than once, selects the same tasks.
    pub fn matches(
        &self,
        task: &Task,
        projects: &HashMap<ProjectId, &Project>,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> bool {
        if !range.contains(task.created_at) {
            return false;
        }
        if !self.project_ids.is_empty() && !self.project_ids.contains(&task.project_id) {
            return false;
        }
        if !self.team_ids.is_empty() {
            let team = projects.get(&task.project_id).and_then(|p| p.team_id);
            if !team.map(|t| self.team_ids.contains(&t)).unwrap_or(false) {
                return false;
            }
        }
        if !self.member_ids.is_empty()
            && !task.assignee_ids.iter().any(|id| self.member_ids.contains(id))
        {
            return false;
        }
        self.status.admits(TaskBucket::classify(task, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planeja_storage::models::TaskPriority;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn task(status: TaskStatus, due: Option<DateTime<Utc>>) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            title: "Task".to_string(),
            status,
            priority: TaskPriority::Medium,
            assignee_ids: vec![],
            due_date: due,
            created_at: at(2024, 6, 1, 8),
            completed_at: None,
        }
    }

    #[test]
    fn test_rolling_periods_end_at_end_of_today() {
        let now = at(2024, 6, 15, 14);

        let day = DateRange::resolve(&ReportPeriod::Day, now).unwrap();
        assert_eq!(day.start, at(2024, 6, 15, 0));
        assert_eq!(day.end, end_of_day(now.date_naive()).unwrap());
        assert_eq!(day.days().len(), 1);

        let week = DateRange::resolve(&ReportPeriod::Week, now).unwrap();
        assert_eq!(week.start, at(2024, 6, 9, 0));
        assert_eq!(week.days().len(), 7);

        assert_eq!(DateRange::resolve(&ReportPeriod::Month, now).unwrap().days().len(), 30);
        assert_eq!(DateRange::resolve(&ReportPeriod::Quarter, now).unwrap().days().len(), 90);
        assert_eq!(DateRange::resolve(&ReportPeriod::Year, now).unwrap().days().len(), 365);
    }

    #[test]
    fn test_custom_period() {
        let now = at(2024, 6, 15, 14);
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();

        let range = DateRange::resolve(&ReportPeriod::Custom { start, end }, now).unwrap();
        assert_eq!(range.start, at(2024, 5, 1, 0));
        assert!(range.contains(at(2024, 5, 3, 23)));
        assert!(!range.contains(at(2024, 5, 4, 0)));

        let backwards = ReportPeriod::Custom { start: end, end: start };
        assert!(matches!(
            DateRange::resolve(&backwards, now),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_classify_buckets() {
        let now = at(2024, 6, 15, 12);
        let past = Some(at(2024, 6, 10, 0));
        let future = Some(at(2024, 6, 20, 0));

        assert_eq!(TaskBucket::classify(&task(TaskStatus::Completed, past), now), TaskBucket::Completed);
        assert_eq!(TaskBucket::classify(&task(TaskStatus::InProgress, past), now), TaskBucket::Overdue);
        assert_eq!(TaskBucket::classify(&task(TaskStatus::Pending, past), now), TaskBucket::Overdue);
        assert_eq!(TaskBucket::classify(&task(TaskStatus::InProgress, future), now), TaskBucket::InProgress);
        assert_eq!(TaskBucket::classify(&task(TaskStatus::Pending, None), now), TaskBucket::Pending);
    }

    #[test]
    fn test_filters_deserialize_with_defaults() {
        let filters: ReportFilters = serde_json::from_str(r#"{"period":{"kind":"week"}}"#).unwrap();
        assert_eq!(filters.period, ReportPeriod::Week);
        assert_eq!(filters.status, StatusFilter::All);
        assert_eq!(filters.granularity, Granularity::Day);
        assert!(filters.project_ids.is_empty());

        let custom: ReportFilters = serde_json::from_str(
            r#"{"period":{"kind":"custom","start":"2024-01-01","end":"2024-01-31"},"status":"in_progress"}"#,
        )
        .unwrap();
        assert_eq!(custom.status, StatusFilter::InProgress);
        assert!(matches!(custom.period, ReportPeriod::Custom { .. }));
    }
}

//! Report Aggregator - Derives chart data and KPIs from a snapshot

use super::filters::{DateRange, Granularity, ReportFilters, TaskBucket};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use planeja_common::types::{ProjectId, TeamId};
use planeja_common::Result;
use planeja_storage::models::{Project, Snapshot, Task, TaskStatus, Team};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// One day on the timeline chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataPoint {
    pub date: NaiveDate,
    pub label: String,
    pub completed: u32,
    pub created: u32,
}

/// One bucket on the trend chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period_start: NaiveDate,
    pub label: String,
    pub completed: u32,
    pub created: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPerformanceData {
    pub project_id: ProjectId,
    pub name: String,
    pub total: u32,
    pub completed: u32,
    pub overdue: u32,
    /// Percentage, rounded to the nearest integer
    pub completion_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDistributionData {
    pub bucket: TaskBucket,
    pub label: String,
    pub count: u32,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProductivityData {
    pub team_id: TeamId,
    pub name: String,
    pub members: Vec<String>,
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub pending: u32,
    pub overdue: u32,
    /// One decimal place
    pub average_tasks_per_member: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportKpis {
    pub total_tasks: u32,
    pub completed_tasks: u32,
    pub in_progress_tasks: u32,
    pub pending_tasks: u32,
    pub overdue_tasks: u32,
    pub completion_rate: u32,
    pub active_projects: u32,
    /// Mean days from creation to completion, one decimal place
    pub average_completion_days: f64,
}

/// Everything the reports screen renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub date_range: DateRange,
    pub filtered_tasks: Vec<Task>,
    pub timeline_data: Vec<ChartDataPoint>,
    pub trend_data: Vec<TrendPoint>,
    pub project_performance_data: Vec<ProjectPerformanceData>,
    pub task_distribution_data: Vec<TaskDistributionData>,
    pub team_productivity_data: Vec<TeamProductivityData>,
    pub kpis: ReportKpis,
}

/// Aggregates one snapshot under one set of filters
pub struct ReportAggregator<'a> {
    snapshot: &'a Snapshot,
    filters: &'a ReportFilters,
    projects: HashMap<ProjectId, &'a Project>,
    range: DateRange,
    now: DateTime<Utc>,
}

impl<'a> ReportAggregator<'a> {
    /// Resolve the period and index the snapshot
    pub fn new(snapshot: &'a Snapshot, filters: &'a ReportFilters, now: DateTime<Utc>) -> Result<Self> {
        let range = DateRange::resolve(&filters.period, now)?;
        let projects = snapshot.projects.iter().map(|p| (p.id, p)).collect();

        Ok(Self {
            snapshot,
            filters,
            projects,
            range,
            now,
        })
    }

    /// Compute the full report in one call
    pub fn compute(snapshot: &Snapshot, filters: &ReportFilters, now: DateTime<Utc>) -> Result<ReportData> {
        Ok(ReportAggregator::new(snapshot, filters, now)?.report())
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn bucket(&self, task: &Task) -> TaskBucket {
        TaskBucket::classify(task, self.now)
    }

    pub fn project(&self, id: ProjectId) -> Option<&'a Project> {
        self.projects.get(&id).copied()
    }

    /// Keep only the tasks passing the filters
    pub fn filter<'t>(&self, tasks: impl IntoIterator<Item = &'t Task>) -> Vec<&'t Task> {
        tasks
            .into_iter()
            .filter(|task| {
                self.filters
                    .matches(task, &self.projects, &self.range, self.now)
            })
            .collect()
    }

    /// Snapshot tasks passing the filters, in snapshot order
    pub fn filtered_tasks(&self) -> Vec<&'a Task> {
        let snapshot = self.snapshot;
        self.filter(&snapshot.tasks)
    }

    fn projects_in_scope(&self) -> impl Iterator<Item = &'a Project> + '_ {
        self.snapshot.projects.iter().filter(|project| {
            let by_project = self.filters.project_ids.is_empty()
                || self.filters.project_ids.contains(&project.id);
            let by_team = self.filters.team_ids.is_empty()
                || project
                    .team_id
                    .map(|t| self.filters.team_ids.contains(&t))
                    .unwrap_or(false);
            by_project && by_team
        })
    }

    fn teams_in_scope(&self) -> impl Iterator<Item = &'a Team> + '_ {
        self.snapshot.teams.iter().filter(|team| {
            self.filters.team_ids.is_empty() || self.filters.team_ids.contains(&team.id)
        })
    }

    /// Build every chart and the KPIs
    pub fn report(&self) -> ReportData {
        let tasks = self.filtered_tasks();
        let timeline_data = self.timeline(&tasks);
        let trend_data = trend(&timeline_data, self.filters.granularity);

        debug!(
            tasks = tasks.len(),
            days = timeline_data.len(),
            start = %self.range.start,
            end = %self.range.end,
            "Computed report"
        );

        ReportData {
            date_range: self.range,
            project_performance_data: self.project_performance(&tasks),
            task_distribution_data: self.distribution(&tasks),
            team_productivity_data: self.team_productivity(&tasks),
            kpis: self.kpis(&tasks),
            filtered_tasks: tasks.into_iter().cloned().collect(),
            timeline_data,
            trend_data,
        }
    }

    /// Per-day created and completed counts, zero-filled over the range
    pub fn timeline(&self, tasks: &[&Task]) -> Vec<ChartDataPoint> {
        let mut created: HashMap<NaiveDate, u32> = HashMap::new();
        let mut completed: HashMap<NaiveDate, u32> = HashMap::new();

        for task in tasks {
            *created.entry(task.created_at.date_naive()).or_default() += 1;
            if let Some(day) = completed_day(task) {
                *completed.entry(day).or_default() += 1;
            }
        }

        self.range
            .days()
            .into_iter()
            .map(|date| ChartDataPoint {
                date,
                label: date.format("%d/%m").to_string(),
                completed: completed.get(&date).copied().unwrap_or(0),
                created: created.get(&date).copied().unwrap_or(0),
            })
            .collect()
    }

    pub fn project_performance(&self, tasks: &[&Task]) -> Vec<ProjectPerformanceData> {
        self.projects_in_scope()
            .map(|project| {
                let mut total = 0;
                let mut completed = 0;
                let mut overdue = 0;
                for task in tasks.iter().filter(|t| t.project_id == project.id) {
                    total += 1;
                    match self.bucket(task) {
                        TaskBucket::Completed => completed += 1,
                        TaskBucket::Overdue => overdue += 1,
                        _ => {}
                    }
                }
                ProjectPerformanceData {
                    project_id: project.id,
                    name: project.name.clone(),
                    total,
                    completed,
                    overdue,
                    completion_rate: percent(completed, total),
                }
            })
            .collect()
    }

    pub fn distribution(&self, tasks: &[&Task]) -> Vec<TaskDistributionData> {
        let total = tasks.len() as u32;
        TaskBucket::ALL
            .iter()
            .map(|bucket| {
                let count = tasks.iter().filter(|t| self.bucket(t) == *bucket).count() as u32;
                TaskDistributionData {
                    bucket: *bucket,
                    label: bucket.label().to_string(),
                    count,
                    percentage: percent(count, total),
                }
            })
            .collect()
    }

    pub fn team_productivity(&self, tasks: &[&Task]) -> Vec<TeamProductivityData> {
        self.teams_in_scope()
            .map(|team| {
                let mut row = TeamProductivityData {
                    team_id: team.id,
                    name: team.name.clone(),
                    members: team.members.iter().map(|m| m.name.clone()).collect(),
                    total: 0,
                    completed: 0,
                    in_progress: 0,
                    pending: 0,
                    overdue: 0,
                    average_tasks_per_member: 0.0,
                };

                let team_tasks = tasks.iter().filter(|task| {
                    self.project(task.project_id).and_then(|p| p.team_id) == Some(team.id)
                });
                for task in team_tasks {
                    row.total += 1;
                    match self.bucket(task) {
                        TaskBucket::Completed => row.completed += 1,
                        TaskBucket::InProgress => row.in_progress += 1,
                        TaskBucket::Pending => row.pending += 1,
                        TaskBucket::Overdue => row.overdue += 1,
                    }
                }

                if !team.members.is_empty() {
                    row.average_tasks_per_member =
                        round1(row.total as f64 / team.members.len() as f64);
                }
                row
            })
            .collect()
    }

    pub fn kpis(&self, tasks: &[&Task]) -> ReportKpis {
        let mut kpis = ReportKpis {
            total_tasks: tasks.len() as u32,
            ..ReportKpis::default()
        };

        let mut completion_days = Vec::new();
        for task in tasks {
            match self.bucket(task) {
                TaskBucket::Completed => {
                    kpis.completed_tasks += 1;
                    if let Some(done) = task.completed_at {
                        let secs = (done - task.created_at).num_seconds().max(0);
                        completion_days.push(secs as f64 / 86_400.0);
                    }
                }
                TaskBucket::InProgress => kpis.in_progress_tasks += 1,
                TaskBucket::Pending => kpis.pending_tasks += 1,
                TaskBucket::Overdue => kpis.overdue_tasks += 1,
            }
        }

        kpis.completion_rate = percent(kpis.completed_tasks, kpis.total_tasks);
        kpis.active_projects = self.projects_in_scope().filter(|p| p.is_active()).count() as u32;
        if !completion_days.is_empty() {
            kpis.average_completion_days =
                round1(completion_days.iter().sum::<f64>() / completion_days.len() as f64);
        }
        kpis
    }
}

/// Day a completed task was finished on
pub(crate) fn completed_day(task: &Task) -> Option<NaiveDate> {
    match task.status {
        TaskStatus::Completed => task.completed_at.map(|at| at.date_naive()),
        _ => None,
    }
}

/// Regroup a daily timeline by granularity, keeping chronological order
pub fn trend(timeline: &[ChartDataPoint], granularity: Granularity) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = Vec::new();

    for day in timeline {
        let period_start = period_start(day.date, granularity);
        match points.last_mut() {
            Some(last) if last.period_start == period_start => {
                last.completed += day.completed;
                last.created += day.created;
            }
            _ => points.push(TrendPoint {
                period_start,
                label: period_label(period_start, granularity),
                completed: day.completed,
                created: day.created,
            }),
        }
    }

    points
}

fn period_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Day => date,
        Granularity::Week => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        Granularity::Month => date.with_day(1).unwrap_or(date),
    }
}

fn period_label(start: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day | Granularity::Week => start.format("%d/%m").to_string(),
        Granularity::Month => start.format("%m/%Y").to_string(),
    }
}

/// `round(part / total * 100)`, 0 for an empty total
pub(crate) fn percent(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

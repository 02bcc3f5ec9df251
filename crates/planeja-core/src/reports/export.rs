//! CSV export of report tables

use super::aggregator::{ReportAggregator, TeamProductivityData};
use csv::Writer;
use planeja_common::{Error, Result};
use planeja_storage::models::Task;

const TASK_HEADERS: [&str; 6] = ["Title", "Project", "Status", "Priority", "Due date", "Created at"];
const TEAM_HEADERS: [&str; 6] = [
    "Team",
    "Members",
    "Completed",
    "In progress",
    "Overdue",
    "Average per member",
];

/// One row per task, header first
pub fn export_tasks_csv(aggregator: &ReportAggregator<'_>, tasks: &[&Task]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(TASK_HEADERS)
        .map_err(|e| Error::Internal(format!("Failed to write CSV headers: {}", e)))?;

    for task in tasks {
        let project = aggregator
            .project(task.project_id)
            .map(|p| p.name.as_str())
            .unwrap_or("");
        let due = task
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        let created = task.created_at.format("%Y-%m-%d %H:%M").to_string();
        let priority = task.priority.to_string();

        writer
            .write_record([
                task.title.as_str(),
                project,
                aggregator.bucket(task).label(),
                priority.as_str(),
                due.as_str(),
                created.as_str(),
            ])
            .map_err(|e| Error::Internal(format!("Failed to write CSV row: {}", e)))?;
    }

    finish(writer)
}

/// One row per team, header first
pub fn export_teams_csv(teams: &[TeamProductivityData]) -> Result<String> {
    let mut writer = Writer::from_writer(Vec::new());
    writer
        .write_record(TEAM_HEADERS)
        .map_err(|e| Error::Internal(format!("Failed to write CSV headers: {}", e)))?;

    for team in teams {
        writer
            .write_record([
                team.name.clone(),
                team.members.len().to_string(),
                team.completed.to_string(),
                team.in_progress.to_string(),
                team.overdue.to_string(),
                format!("{:.1}", team.average_tasks_per_member),
            ])
            .map_err(|e| Error::Internal(format!("Failed to write CSV row: {}", e)))?;
    }

    finish(writer)
}

fn finish(mut writer: Writer<Vec<u8>>) -> Result<String> {
    writer
        .flush()
        .map_err(|e| Error::Internal(format!("Failed to flush CSV writer: {}", e)))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("Failed to get CSV output: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(format!("CSV output is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::aggregator::tests::fixture;
    use crate::reports::filters::ReportFilters;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tasks_csv_has_header_and_one_row_per_task() {
        let f = fixture();
        let filters = ReportFilters::default();
        let aggregator = ReportAggregator::new(&f.snapshot, &filters, f.now).unwrap();
        let tasks = aggregator.filtered_tasks();

        let csv = export_tasks_csv(&aggregator, &tasks).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), tasks.len() + 1);
        assert_eq!(lines[0], "Title,Project,Status,Priority,Due date,Created at");
        assert_eq!(lines[1], "Wireframes,Site,Completed,medium,,2024-06-10 09:00");
        assert_eq!(lines[3], "Copy review,Site,Overdue,medium,2024-06-14,2024-06-12 09:00");
    }

    #[test]
    fn test_teams_csv() {
        let f = fixture();
        let filters = ReportFilters::default();
        let aggregator = ReportAggregator::new(&f.snapshot, &filters, f.now).unwrap();
        let teams = aggregator.team_productivity(&aggregator.filtered_tasks());

        let csv = export_teams_csv(&teams).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "Design,2,1,1,1,1.5");
        assert_eq!(lines[2], "Mobile,0,1,0,0,0.0");
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let teams = vec![TeamProductivityData {
            team_id: uuid::Uuid::new_v4(),
            name: "Ops, Infra".to_string(),
            members: vec![],
            total: 0,
            completed: 0,
            in_progress: 0,
            pending: 0,
            overdue: 0,
            average_tasks_per_member: 0.0,
        }];

        let csv = export_teams_csv(&teams).unwrap();
        assert!(csv.contains("\"Ops, Infra\",0,0,0,0,0.0"));
    }
}

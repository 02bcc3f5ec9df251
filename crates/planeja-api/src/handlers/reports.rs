//! Report handlers

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use planeja_core::{
    export_tasks_csv, export_teams_csv, DrillDownTarget, ReportAggregator, ReportData,
    ReportFilters,
};
use planeja_storage::models::Task;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::ApiResult;
use crate::auth::AppState;

/// Drill-down request
#[derive(Debug, Deserialize)]
pub struct DrillDownRequest {
    #[serde(default)]
    pub filters: ReportFilters,
    pub target: DrillDownTarget,
}

/// Tasks export request; without a target every filtered task is exported
#[derive(Debug, Deserialize)]
pub struct ExportTasksRequest {
    #[serde(default)]
    pub filters: ReportFilters,
    pub target: Option<DrillDownTarget>,
}

/// Drill-down response
#[derive(Debug, Serialize)]
pub struct DrillDownResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

fn csv_attachment(filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

/// Compute the full report
///
/// POST /api/v1/reports
pub async fn compute_report(
    State(state): State<Arc<AppState>>,
    Json(filters): Json<ReportFilters>,
) -> ApiResult<Json<ReportData>> {
    let snapshot = state.snapshots.load_snapshot().await?;
    let report = ReportAggregator::compute(&snapshot, &filters, state.clock.now())?;

    debug!(
        tasks = report.filtered_tasks.len(),
        "Report computed for {} - {}", report.date_range.start, report.date_range.end
    );

    Ok(Json(report))
}

/// Tasks behind a chart element
///
/// POST /api/v1/reports/drilldown
pub async fn drill_down(
    State(state): State<Arc<AppState>>,
    Json(input): Json<DrillDownRequest>,
) -> ApiResult<Json<DrillDownResponse>> {
    let snapshot = state.snapshots.load_snapshot().await?;
    let tasks = planeja_core::reports::drill_down(
        &snapshot,
        &input.filters,
        &input.target,
        state.clock.now(),
    )?;

    Ok(Json(DrillDownResponse {
        total: tasks.len(),
        tasks,
    }))
}

/// POST /api/v1/reports/export/tasks
pub async fn export_tasks(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ExportTasksRequest>,
) -> ApiResult<Response> {
    let snapshot = state.snapshots.load_snapshot().await?;
    let aggregator = ReportAggregator::new(&snapshot, &input.filters, state.clock.now())?;

    let tasks = match &input.target {
        Some(target) => aggregator.drill_down(target),
        None => aggregator.filtered_tasks(),
    };
    let csv = export_tasks_csv(&aggregator, &tasks)?;

    Ok(csv_attachment("tasks-report.csv", csv))
}

/// POST /api/v1/reports/export/teams
pub async fn export_teams(
    State(state): State<Arc<AppState>>,
    Json(filters): Json<ReportFilters>,
) -> ApiResult<Response> {
    let snapshot = state.snapshots.load_snapshot().await?;
    let aggregator = ReportAggregator::new(&snapshot, &filters, state.clock.now())?;

    let teams = aggregator.team_productivity(&aggregator.filtered_tasks());
    let csv = export_teams_csv(&teams)?;

    Ok(csv_attachment("teams-report.csv", csv))
}

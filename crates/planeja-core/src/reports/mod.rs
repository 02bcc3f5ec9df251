//! Reports Module - Analytics over projects, tasks and teams

mod aggregator;
mod drilldown;
mod export;
mod filters;

pub use aggregator::{
    trend, ChartDataPoint, ProjectPerformanceData, ReportAggregator, ReportData, ReportKpis,
    TaskDistributionData, TeamProductivityData, TrendPoint,
};
pub use drilldown::{drill_down, DrillDownTarget};
pub use export::{export_tasks_csv, export_teams_csv};
pub use filters::{DateRange, Granularity, ReportFilters, ReportPeriod, StatusFilter, TaskBucket};

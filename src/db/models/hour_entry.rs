//! Hour entry models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HourEntry {
    pub id: String,
    pub employee_id: String,
    /// ISO date (YYYY-MM-DD) the work was performed on.
    pub work_date: String,
    pub hours: f64,
    pub description: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogHoursRequest {
    pub date: Option<String>,
    /// Hours worked. Accepts `hours` as a legacy alias for clients that
    /// predate the normal/extra split naming.
    #[serde(alias = "hours")]
    pub hours_normal: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogHoursResponse {
    pub entry_id: String,
}

/// One row of the per-month aggregate: period is a "YYYY-MM" label.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: String,
    pub total_hours: f64,
    pub entry_count: i64,
}

//! The hours ledger: recording, listing, deleting, and summarizing
//! worked-hour entries for the authenticated employee.
//!
//! All state lives in the database; every operation is a fresh read/write.
//! The owning employee id is always taken from the verified identity
//! attached by the authorization gate, never from client input.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{DbPool, HourEntry, LogHoursRequest, LogHoursResponse, PeriodSummary};
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_hours, validate_work_date};

/// Status value used when the ledger table demands one on insert
const DEFAULT_ENTRY_STATUS: &str = "active";

#[derive(Debug, Serialize)]
pub struct DeleteHoursResponse {
    pub message: &'static str,
}

struct NewHourEntry {
    id: String,
    employee_id: String,
    work_date: String,
    hours: f64,
    description: String,
    project_id: Option<String>,
    task_id: Option<String>,
    created_at: String,
}

/// Whether a database failure was caused by the ledger's status column.
///
/// Older ledger tables carry a status column without a default, so an
/// insert that omits it fails with a constraint error naming the column.
/// That specific shape is the only failure the write path retries on.
fn is_status_column_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("status"),
        _ => false,
    }
}

/// Insert an hour entry, adapting to both ledger-table schema versions.
///
/// The first attempt omits the status column. If the database rejects it
/// because of that column, retry exactly once with the default status.
/// Any other failure, or a failure of the retry itself, is returned as-is;
/// there is no further retry.
async fn insert_entry(pool: &DbPool, entry: &NewHourEntry) -> Result<(), sqlx::Error> {
    let first = sqlx::query(
        "INSERT INTO hour_entries \
         (id, employee_id, work_date, hours, description, project_id, task_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id)
    .bind(&entry.employee_id)
    .bind(&entry.work_date)
    .bind(entry.hours)
    .bind(&entry.description)
    .bind(&entry.project_id)
    .bind(&entry.task_id)
    .bind(&entry.created_at)
    .execute(pool)
    .await;

    match first {
        Ok(_) => Ok(()),
        Err(err) if is_status_column_error(&err) => {
            tracing::warn!(
                "Insert without status column rejected ({}), retrying with default status",
                err
            );
            sqlx::query(
                "INSERT INTO hour_entries \
                 (id, employee_id, work_date, hours, description, project_id, task_id, \
                  created_at, status) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(&entry.employee_id)
            .bind(&entry.work_date)
            .bind(entry.hours)
            .bind(&entry.description)
            .bind(&entry.project_id)
            .bind(&entry.task_id)
            .bind(&entry.created_at)
            .bind(DEFAULT_ENTRY_STATUS)
            .execute(pool)
            .await
            .map(|_| ())
        }
        Err(err) => Err(err),
    }
}

fn validate_log_request(req: &LogHoursRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_work_date(req.date.as_deref()) {
        errors.add("date", e);
    }
    if let Err(e) = validate_hours(req.hours_normal) {
        errors.add("hoursNormal", e);
    }

    errors.finish()
}

/// Record worked hours for the authenticated employee
///
/// POST /api/hours/log
pub async fn log_hours(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<LogHoursRequest>,
) -> Result<(StatusCode, Json<LogHoursResponse>), ApiError> {
    validate_log_request(&request)?;

    let entry = NewHourEntry {
        id: Uuid::new_v4().to_string(),
        employee_id: user.id,
        // Both unwraps are guarded by validate_log_request above
        work_date: request.date.unwrap_or_default(),
        hours: request.hours_normal.unwrap_or_default(),
        description: request.description.unwrap_or_default(),
        project_id: request.project_id,
        task_id: request.task_id,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    insert_entry(&state.db, &entry).await.map_err(|err| {
        tracing::error!("Failed to record hours: {}", err);
        ApiError::database("Failed to record hours")
    })?;

    Ok((
        StatusCode::CREATED,
        Json(LogHoursResponse { entry_id: entry.id }),
    ))
}

/// List the caller's hour entries, newest first
///
/// GET /api/hours/my-hours
pub async fn my_hours(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<HourEntry>>, ApiError> {
    let entries: Vec<HourEntry> = sqlx::query_as(
        "SELECT id, employee_id, work_date, hours, description, project_id, task_id, \
                status, created_at \
         FROM hour_entries \
         WHERE employee_id = ? \
         ORDER BY work_date DESC, created_at DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}

/// Per-month totals for the caller, most recent period first
///
/// GET /api/hours/summary
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<PeriodSummary>>, ApiError> {
    let periods: Vec<PeriodSummary> = sqlx::query_as(
        "SELECT strftime('%Y-%m', work_date) AS period, \
                SUM(hours) AS total_hours, \
                COUNT(*) AS entry_count \
         FROM hour_entries \
         WHERE employee_id = ? \
         GROUP BY period \
         ORDER BY period DESC",
    )
    .bind(&user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(periods))
}

/// Delete one of the caller's hour entries
///
/// DELETE /api/hours/:id
///
/// The delete predicate is scoped to the caller, so an entry owned by
/// another employee is indistinguishable from a missing one.
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteHoursResponse>, ApiError> {
    let result = sqlx::query("DELETE FROM hour_entries WHERE id = ? AND employee_id = ?")
        .bind(&id)
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Hour entry not found"));
    }

    Ok(Json(DeleteHoursResponse {
        message: "Hour entry deleted",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use sqlx::sqlite::SqlitePoolOptions;

    // In-memory SQLite gives one database per connection, so the pool must
    // be capped at a single connection
    async fn memory_pool() -> DbPool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn migrated_state() -> Arc<AppState> {
        let pool = memory_pool().await;
        crate::db::run_migrations(&pool).await.unwrap();
        Arc::new(AppState::new(Config::default(), pool))
    }

    async fn seed_employee(pool: &DbPool, id: &str, email: &str) {
        sqlx::query(
            "INSERT INTO employees (id, name, email, password_hash, title, created_at) \
             VALUES (?, 'Test Employee', ?, 'x', 'Engineer', ?)",
        )
        .bind(id)
        .bind(email)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(pool)
        .await
        .unwrap();
    }

    fn caller(id: &str) -> AuthUser {
        AuthUser {
            id: id.to_string(),
            email: format!("{}@example.com", id),
        }
    }

    fn new_entry(employee_id: &str, work_date: &str, hours: f64) -> NewHourEntry {
        NewHourEntry {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            work_date: work_date.to_string(),
            hours,
            description: String::new(),
            project_id: None,
            task_id: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    async fn entry_count(pool: &DbPool) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM hour_entries")
            .fetch_one(pool)
            .await
            .unwrap();
        count.0
    }

    #[tokio::test]
    async fn test_insert_on_current_schema_succeeds_first_try() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;

        insert_entry(&state.db, &new_entry("emp-1", "2024-06-01", 5.0))
            .await
            .unwrap();

        let (status,): (String,) = sqlx::query_as("SELECT status FROM hour_entries")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(status, "active");
    }

    #[tokio::test]
    async fn test_adaptive_insert_retries_once_on_status_column_failure() {
        // Legacy schema shape: status column present but without a default,
        // so the first insert (which omits it) is rejected
        let pool = memory_pool().await;
        sqlx::query(
            "CREATE TABLE hour_entries (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                work_date TEXT NOT NULL,
                hours REAL NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                project_id TEXT,
                task_id TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        insert_entry(&pool, &new_entry("emp-1", "2024-06-01", 5.0))
            .await
            .unwrap();

        let (status,): (String,) = sqlx::query_as("SELECT status FROM hour_entries")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(status, DEFAULT_ENTRY_STATUS);
    }

    #[tokio::test]
    async fn test_adaptive_insert_does_not_retry_on_unrelated_failure() {
        // No ledger table at all: the failure does not name the status
        // column, so the original error surfaces without a retry
        let pool = memory_pool().await;

        let err = insert_entry(&pool, &new_entry("emp-1", "2024-06-01", 5.0))
            .await
            .unwrap_err();

        assert!(!is_status_column_error(&err));
        assert!(err.to_string().contains("hour_entries"));
    }

    #[tokio::test]
    async fn test_log_hours_rejects_negative_hours_without_writing() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;

        let request = LogHoursRequest {
            date: Some("2024-06-01".to_string()),
            hours_normal: Some(-1.0),
            description: None,
            project_id: None,
            task_id: None,
        };

        let err = log_hours(State(state.clone()), Extension(caller("emp-1")), Json(request))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(entry_count(&state.db).await, 0);
    }

    #[tokio::test]
    async fn test_log_hours_rejects_missing_date() {
        let state = migrated_state().await;

        let request = LogHoursRequest {
            date: None,
            hours_normal: Some(4.0),
            description: None,
            project_id: None,
            task_id: None,
        };

        let err = log_hours(State(state.clone()), Extension(caller("emp-1")), Json(request))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(entry_count(&state.db).await, 0);
    }

    #[tokio::test]
    async fn test_my_hours_ordered_newest_first() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;

        for (date, hours) in [("2024-06-01", 5.0), ("2024-07-01", 2.0), ("2024-06-15", 3.0)] {
            insert_entry(&state.db, &new_entry("emp-1", date, hours))
                .await
                .unwrap();
        }

        let Json(entries) = my_hours(State(state), Extension(caller("emp-1")))
            .await
            .unwrap();

        let dates: Vec<&str> = entries.iter().map(|e| e.work_date.as_str()).collect();
        assert_eq!(dates, vec!["2024-07-01", "2024-06-15", "2024-06-01"]);
    }

    #[tokio::test]
    async fn test_my_hours_only_returns_callers_entries() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;
        seed_employee(&state.db, "emp-2", "emp-2").await;

        insert_entry(&state.db, &new_entry("emp-1", "2024-06-01", 5.0))
            .await
            .unwrap();
        insert_entry(&state.db, &new_entry("emp-2", "2024-06-01", 8.0))
            .await
            .unwrap();

        let Json(entries) = my_hours(State(state), Extension(caller("emp-1")))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hours, 5.0);
    }

    #[tokio::test]
    async fn test_summary_groups_by_month_descending() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;

        for (date, hours) in [("2024-06-01", 5.0), ("2024-06-15", 3.0), ("2024-07-01", 2.0)] {
            insert_entry(&state.db, &new_entry("emp-1", date, hours))
                .await
                .unwrap();
        }

        let Json(periods) = summary(State(state), Extension(caller("emp-1")))
            .await
            .unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].period, "2024-07");
        assert_eq!(periods[0].total_hours, 2.0);
        assert_eq!(periods[0].entry_count, 1);
        assert_eq!(periods[1].period, "2024-06");
        assert_eq!(periods[1].total_hours, 8.0);
        assert_eq!(periods[1].entry_count, 2);
    }

    #[tokio::test]
    async fn test_summary_empty_history_yields_empty_list() {
        let state = migrated_state().await;

        let Json(periods) = summary(State(state), Extension(caller("emp-1")))
            .await
            .unwrap();
        assert!(periods.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_entry_is_not_found_and_ledger_unchanged() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;
        insert_entry(&state.db, &new_entry("emp-1", "2024-06-01", 5.0))
            .await
            .unwrap();

        let err = delete_entry(
            State(state.clone()),
            Extension(caller("emp-1")),
            Path("no-such-id".to_string()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(entry_count(&state.db).await, 1);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_owner() {
        let state = migrated_state().await;
        seed_employee(&state.db, "emp-1", "emp-1").await;
        seed_employee(&state.db, "emp-2", "emp-2").await;

        let entry = new_entry("emp-1", "2024-06-01", 5.0);
        let entry_id = entry.id.clone();
        insert_entry(&state.db, &entry).await.unwrap();

        // Another authenticated employee cannot delete it
        let err = delete_entry(
            State(state.clone()),
            Extension(caller("emp-2")),
            Path(entry_id.clone()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(entry_count(&state.db).await, 1);

        // The owner can
        delete_entry(State(state.clone()), Extension(caller("emp-1")), Path(entry_id))
            .await
            .unwrap();
        assert_eq!(entry_count(&state.db).await, 0);
    }
}

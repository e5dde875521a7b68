use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::face::{FaceVerifier, TempAsset, VerificationResult};
use crate::model::attendance::{
    AttendanceRecord, CheckInWrite, DayState, TransitionError, ensure_can_check_in,
    ensure_can_check_out, settle_check_in_write, status_for_check_in,
};
use crate::model::employee::Employee;
use crate::storage::AssetStore;
use crate::utils::upload::read_upload_form;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

const ATTENDANCE_COLUMNS: &str = "id, employee_id, employee_name, date, check_in_time, \
     check_out_time, check_in_image, check_out_image, status, is_manual, manual_note";

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AttendanceFilter {
    /// Filter by calendar date (YYYY-MM-DD)
    #[schema(example = "2026-08-26", value_type = String)]
    pub date: Option<NaiveDate>,
    /// Filter by employee ID
    #[schema(example = 42)]
    pub employee_id: Option<u64>,
    /// Filter by status (present | absent | late)
    #[schema(example = "present")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    /// Pagination per page number
    #[schema(example = 20)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceListResponse {
    pub data: Vec<AttendanceRecord>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 7)]
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
    Date(NaiveDate),
}

async fn fetch_employee(pool: &MySqlPool, id: u64) -> Result<Option<Employee>, sqlx::Error> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

async fn fetch_today_record(
    pool: &MySqlPool,
    employee_id: u64,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {} FROM attendance WHERE employee_id = ? AND date = CURDATE()",
        ATTENDANCE_COLUMNS
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await
}

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

fn transition_rejection(err: TransitionError) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "message": err.message(),
        "error": err.to_string(),
    }))
}

fn verification_rejection(result: &VerificationResult) -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({
        "message": result.message(),
        "error": result.reason.map(|r| r.to_string()),
        "similarity": result.similarity,
    }))
}

/// Runs the face verification chain for one live upload. The temp artifact
/// lives exactly as long as this call; every branch below releases it.
async fn verify_live_upload(
    employee: &Employee,
    bytes: &[u8],
    filename: &str,
    verifier: &FaceVerifier,
) -> Result<VerificationResult, actix_web::Error> {
    let mut candidate = TempAsset::create(bytes, filename).map_err(|e| {
        error!(error = %e, "Failed to stage uploaded image");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let result = verifier.verify_subject(employee, &candidate).await;
    candidate.release();
    Ok(result)
}

/// Check-in endpoint: face-gated, one open record per employee per day.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/check-in",
    request_body(content_type = "multipart/form-data", description = "Form with a `live_image` file part"),
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Check-in successful",
            "similarity": 94.2
        })),
        (status = 400, description = "Verification or transition rejected", body = Object, example = json!({
            "message": "Check-in already recorded for today",
            "error": "ALREADY_CHECKED_IN"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    payload: Multipart,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    verifier: web::Data<FaceVerifier>,
    assets: web::Data<dyn AssetStore>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let form = read_upload_form(payload).await?;
    let file = match form.file {
        Some(f) => f,
        None => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Live picture is required for check-in"
            })));
        }
    };

    let employee = match fetch_employee(pool.get_ref(), employee_id).await {
        Ok(Some(e)) => e,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "Employee not found"
            })));
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to fetch employee");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    // State precondition first: an illegal transition must not spend a face
    // service call.
    let today = fetch_today_record(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch today's attendance");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if let Err(err) = ensure_can_check_in(DayState::of(today.as_ref())) {
        return Ok(transition_rejection(err));
    }

    let result = verify_live_upload(&employee, &file.bytes, &file.filename, &verifier).await?;
    if !result.accepted {
        return Ok(verification_rejection(&result));
    }

    let now = Local::now().naive_local();
    let status = status_for_check_in(now.time(), config.workday_start).to_string();

    // Atomic find-or-create: INSERT wins the race outright; on a duplicate
    // key (sweep row or concurrent check-in) only a conditional UPDATE on a
    // row without a check-in may claim it.
    let insert = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, employee_name, date, check_in_time, status)
        VALUES (?, ?, CURDATE(), ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(&employee.name)
    .bind(now)
    .bind(&status)
    .execute(pool.get_ref())
    .await;

    let write = match insert {
        Ok(_) => CheckInWrite::Inserted,
        Err(e) if is_duplicate_key(&e) => {
            let updated = sqlx::query(
                r#"
                UPDATE attendance
                SET check_in_time = ?, status = ?
                WHERE employee_id = ? AND date = CURDATE() AND check_in_time IS NULL
                "#,
            )
            .bind(now)
            .bind(&status)
            .bind(employee_id)
            .execute(pool.get_ref())
            .await
            .map_err(|e| {
                error!(error = %e, employee_id, "Check-in update failed");
                ErrorInternalServerError("Internal Server Error")
            })?;

            CheckInWrite::DuplicateKey {
                upgraded_rows: updated.rows_affected(),
            }
        }
        Err(e) => {
            error!(error = %e, employee_id, "Check-in insert failed");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    if let Err(err) = settle_check_in_write(write) {
        // A concurrent attempt claimed the row between our precheck and now.
        return Ok(transition_rejection(err));
    }

    // The row is won; only now promote the image to durable storage, so a
    // losing attempt leaves no orphaned asset.
    let image_url = match assets.upload(file.bytes, "attendance", &file.filename).await {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, employee_id, "Failed to store check-in image");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    sqlx::query(
        "UPDATE attendance SET check_in_image = ? WHERE employee_id = ? AND date = CURDATE()",
    )
    .bind(&image_url)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to save check-in image URL");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let snapshot = fetch_today_record(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch attendance snapshot");
            ErrorInternalServerError("Internal Server Error")
        })?;

    info!(employee_id, similarity = result.similarity, "Check-in recorded");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Check-in successful",
        "similarity": result.similarity,
        "attendance": snapshot,
    })))
}

/// Check-out endpoint: requires today's open check-in and a fresh face
/// verification; check-in approval does not carry over.
#[utoipa::path(
    put,
    path = "/api/v1/attendance/check-out",
    request_body(content_type = "multipart/form-data", description = "Form with a `live_image` file part"),
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Check-out successful",
            "similarity": 93.0
        })),
        (status = 400, description = "Verification or transition rejected", body = Object, example = json!({
            "message": "No check-in record found for today",
            "error": "NO_CHECKIN_FOUND"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    payload: Multipart,
    pool: web::Data<MySqlPool>,
    verifier: web::Data<FaceVerifier>,
    assets: web::Data<dyn AssetStore>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    let form = read_upload_form(payload).await?;
    let file = match form.file {
        Some(f) => f,
        None => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Live picture is required for check-out"
            })));
        }
    };

    let employee = match fetch_employee(pool.get_ref(), employee_id).await {
        Ok(Some(e)) => e,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "Employee not found"
            })));
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to fetch employee");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    let today = fetch_today_record(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch today's attendance");
            ErrorInternalServerError("Internal Server Error")
        })?;

    if let Err(err) = ensure_can_check_out(DayState::of(today.as_ref())) {
        return Ok(transition_rejection(err));
    }

    let result = verify_live_upload(&employee, &file.bytes, &file.filename, &verifier).await?;
    if !result.accepted {
        return Ok(verification_rejection(&result));
    }

    // Write-once guard: the same predicate that the precheck tested, applied
    // atomically so a racing check-out cannot double-write.
    let updated = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out_time = ?
        WHERE employee_id = ? AND date = CURDATE()
          AND check_in_time IS NOT NULL AND check_out_time IS NULL
        "#,
    )
    .bind(Local::now().naive_local())
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Check-out update failed");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if updated.rows_affected() == 0 {
        let current = fetch_today_record(pool.get_ref(), employee_id)
            .await
            .map_err(|e| {
                error!(error = %e, employee_id, "Failed to fetch today's attendance");
                ErrorInternalServerError("Internal Server Error")
            })?;
        let err = match DayState::of(current.as_ref()) {
            DayState::CheckedOut => TransitionError::AlreadyCheckedOut,
            _ => TransitionError::NoCheckinFound,
        };
        return Ok(transition_rejection(err));
    }

    // The row is claimed; only now promote the image to durable storage, so
    // a losing attempt leaves no orphaned asset.
    let image_url = match assets.upload(file.bytes, "attendance", &file.filename).await {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, employee_id, "Failed to store check-out image");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    sqlx::query(
        "UPDATE attendance SET check_out_image = ? WHERE employee_id = ? AND date = CURDATE()",
    )
    .bind(&image_url)
    .bind(employee_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to save check-out image URL");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let snapshot = fetch_today_record(pool.get_ref(), employee_id)
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch attendance snapshot");
            ErrorInternalServerError("Internal Server Error")
        })?;

    info!(employee_id, similarity = result.similarity, "Check-out recorded");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Check-out successful",
        "similarity": result.similarity,
        "attendance": snapshot,
    })))
}

/// Paginated attendance listing with date/employee/status filters.
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceFilter),
    responses(
        (status = 200, description = "Paginated attendance list", body = AttendanceListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(date) = query.date {
        where_sql.push_str(" AND date = ?");
        args.push(FilterValue::Date(date));
    }

    if let Some(employee_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(employee_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    let count_sql = format!("SELECT COUNT(*) FROM attendance{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
            FilterValue::Date(d) => count_q.bind(*d),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to count attendance records");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        "SELECT {} FROM attendance{} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
        ATTENDANCE_COLUMNS, where_sql
    );

    let mut data_q = sqlx::query_as::<_, AttendanceRecord>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
            FilterValue::Date(d) => data_q.bind(d),
        };
    }

    let records = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch attendance list");
            ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(AttendanceListResponse {
        data: records,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/// Daily absence sweep: inserts `absent` rows for employees with no record
/// today. Idempotent and additive only; existing rows are never touched.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/absent-sweep",
    responses(
        (status = 200, description = "Absent employees marked", body = Object, example = json!({
            "message": "Absent employees marked successfully",
            "absent_count": 3
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn absent_sweep(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    // INSERT IGNORE + the (employee_id, date) unique key make the sweep
    // re-runnable without clobbering earlier check-ins.
    let result = sqlx::query(
        r#"
        INSERT IGNORE INTO attendance (employee_id, employee_name, date, status)
        SELECT e.id, e.name, CURDATE(), 'absent'
        FROM employees e
        WHERE e.status = 'active'
          AND NOT EXISTS (
              SELECT 1 FROM attendance a
              WHERE a.employee_id = e.id AND a.date = CURDATE()
          )
        "#,
    )
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Absence sweep failed");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let absent_count = result.rows_affected();
    if absent_count > 0 {
        warn!(absent_count, "Employees marked absent for today");
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Absent employees marked successfully",
        "absent_count": absent_count,
    })))
}

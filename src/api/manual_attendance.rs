use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::attendance::status_for_check_in;
use crate::model::manual_request::ManualAttendanceRequest;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

const REQUEST_COLUMNS: &str = "id, employee_id, employee_name, request_type, requested_time, \
     note, status, admin_notes, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreateManualRequest {
    /// "checkin" or "checkout".
    #[schema(example = "checkin")]
    pub request_type: String,
    #[schema(example = "2026-08-26T09:45:00", value_type = String)]
    pub requested_time: NaiveDateTime,
    #[schema(example = "Forgot my phone, front desk can confirm arrival")]
    pub note: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewManualRequest {
    #[schema(example = "Confirmed with front desk", nullable = true)]
    pub admin_notes: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ManualRequestFilter {
    /// pending | approved | declined (defaults to pending)
    #[schema(example = "pending")]
    pub status: Option<String>,
}

/// Submit a manual attendance correction. Available to any employee-linked
/// account; the record stays inert until an admin reviews it.
#[utoipa::path(
    post,
    path = "/api/v1/attendance/manual",
    request_body = CreateManualRequest,
    responses(
        (status = 201, description = "Request submitted", body = Object, example = json!({
            "message": "Manual attendance request submitted",
            "id": 11
        })),
        (status = 400, description = "Invalid request type or empty note"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Manual Attendance"
)]
pub async fn submit_manual_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateManualRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    if !matches!(payload.request_type.as_str(), "checkin" | "checkout") {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "request_type must be 'checkin' or 'checkout'"
        })));
    }

    if payload.note.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "A note explaining the correction is required"
        })));
    }

    let employee_name = sqlx::query_scalar::<_, String>("SELECT name FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            ErrorInternalServerError("Internal Server Error")
        })?;

    let employee_name = match employee_name {
        Some(n) => n,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Employee not found"
            })));
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO manual_attendance_requests
            (employee_id, employee_name, request_type, requested_time, note, status)
        VALUES (?, ?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(employee_id)
    .bind(&employee_name)
    .bind(&payload.request_type)
    .bind(payload.requested_time)
    .bind(payload.note.trim())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, employee_id, "Failed to submit manual attendance request");
        ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Manual attendance request submitted",
        "id": result.last_insert_id(),
    })))
}

/// List manual attendance requests, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/manual",
    params(ManualRequestFilter),
    responses(
        (status = 200, description = "Manual attendance requests", body = [ManualAttendanceRequest]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Manual Attendance"
)]
pub async fn list_manual_requests(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ManualRequestFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let status = query.status.as_deref().unwrap_or("pending");

    let requests = sqlx::query_as::<_, ManualAttendanceRequest>(&format!(
        "SELECT {} FROM manual_attendance_requests WHERE status = ? ORDER BY created_at DESC",
        REQUEST_COLUMNS
    ))
    .bind(status)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to fetch manual attendance requests");
        ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(requests))
}

async fn claim_pending_request(
    pool: &MySqlPool,
    request_id: u64,
    new_status: &str,
    admin_notes: Option<&str>,
) -> Result<Option<ManualAttendanceRequest>, sqlx::Error> {
    // Claim the row with a conditional UPDATE so two reviewers cannot both
    // process it.
    let claimed = sqlx::query(
        r#"
        UPDATE manual_attendance_requests
        SET status = ?, admin_notes = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(new_status)
    .bind(admin_notes)
    .bind(request_id)
    .execute(pool)
    .await?;

    if claimed.rows_affected() == 0 {
        return Ok(None);
    }

    sqlx::query_as::<_, ManualAttendanceRequest>(&format!(
        "SELECT {} FROM manual_attendance_requests WHERE id = ?",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await
}

/// Approve a manual request and write the requested time into that day's
/// attendance record. This bypasses face verification on purpose; the
/// override is logged with the reviewing admin.
#[utoipa::path(
    put,
    path = "/api/v1/attendance/manual/{request_id}/approve",
    params(
        ("request_id", Path, description = "Manual request ID")
    ),
    request_body = ReviewManualRequest,
    responses(
        (status = 200, description = "Request approved and attendance updated", body = Object, example = json!({
            "message": "Manual attendance request approved"
        })),
        (status = 400, description = "Request already processed or not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Manual Attendance"
)]
pub async fn approve_manual_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    payload: web::Json<ReviewManualRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let request_id = path.into_inner();

    let request = claim_pending_request(
        pool.get_ref(),
        request_id,
        "approved",
        payload.admin_notes.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(error = %e, request_id, "Failed to approve manual attendance request");
        ErrorInternalServerError("Internal Server Error")
    })?;

    let request = match request {
        Some(r) => r,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Request not found or already processed"
            })));
        }
    };

    let applied = match request.request_type.as_str() {
        "checkin" => {
            let status =
                status_for_check_in(request.requested_time.time(), config.workday_start).to_string();

            sqlx::query(
                r#"
                INSERT INTO attendance
                    (employee_id, employee_name, date, check_in_time, status, is_manual, manual_note)
                VALUES (?, ?, DATE(?), ?, ?, TRUE, ?)
                ON DUPLICATE KEY UPDATE
                    check_in_time = VALUES(check_in_time),
                    status = VALUES(status),
                    is_manual = TRUE,
                    manual_note = VALUES(manual_note)
                "#,
            )
            .bind(request.employee_id)
            .bind(&request.employee_name)
            .bind(request.requested_time)
            .bind(request.requested_time)
            .bind(&status)
            .bind(&request.note)
            .execute(pool.get_ref())
            .await
        }
        _ => {
            sqlx::query(
                r#"
                INSERT INTO attendance
                    (employee_id, employee_name, date, check_out_time, status, is_manual, manual_note)
                VALUES (?, ?, DATE(?), ?, 'present', TRUE, ?)
                ON DUPLICATE KEY UPDATE
                    check_out_time = VALUES(check_out_time),
                    is_manual = TRUE,
                    manual_note = VALUES(manual_note)
                "#,
            )
            .bind(request.employee_id)
            .bind(&request.employee_name)
            .bind(request.requested_time)
            .bind(request.requested_time)
            .bind(&request.note)
            .execute(pool.get_ref())
            .await
        }
    };

    if let Err(e) = applied {
        error!(error = %e, request_id, "Failed to apply approved manual attendance");
        return Err(ErrorInternalServerError("Internal Server Error"));
    }

    warn!(
        admin_id = auth.user_id,
        request_id,
        employee_id = request.employee_id,
        request_type = %request.request_type,
        "Manual attendance override applied without face verification"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Manual attendance request approved"
    })))
}

/// Decline a manual request. The attendance table is never touched.
#[utoipa::path(
    put,
    path = "/api/v1/attendance/manual/{request_id}/decline",
    params(
        ("request_id", Path, description = "Manual request ID")
    ),
    request_body = ReviewManualRequest,
    responses(
        (status = 200, description = "Request declined", body = Object, example = json!({
            "message": "Manual attendance request declined"
        })),
        (status = 400, description = "Request already processed or not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Manual Attendance"
)]
pub async fn decline_manual_request(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReviewManualRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let request_id = path.into_inner();

    let request = claim_pending_request(
        pool.get_ref(),
        request_id,
        "declined",
        payload.admin_notes.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(error = %e, request_id, "Failed to decline manual attendance request");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if request.is_none() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Request not found or already processed"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Manual attendance request declined"
    })))
}

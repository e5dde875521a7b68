use crate::auth::auth::AuthUser;
use crate::face::{RejectReason, TempAsset, image_check};
use crate::model::employee::Employee;
use crate::storage::AssetStore;
use crate::utils::db_utils::{build_patch, execute_patch};
use crate::utils::reference_cache;
use crate::utils::upload::read_upload_form;
use crate::vision::FaceScan;
use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "Rina Akter")]
    pub name: String,
    #[schema(example = "rina@salon.example", format = "email", nullable = true)]
    pub email: Option<String>,
    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,
    #[schema(example = "NID-4455", nullable = true)]
    pub id_card_number: Option<String>,
    #[schema(example = 18000.0, nullable = true)]
    pub monthly_salary: Option<f64>,
    #[schema(example = "2024-01-01", format = "date", value_type = String)]
    pub hired_on: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Filter by status (active | inactive)
    pub status: Option<String>,
    /// Search by name, email, or phone
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 12)]
    pub total: i64,
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 7
        })),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Duplicate email or ID card number"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    if payload.name.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Employee name must not be empty"
        })));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (name, email, phone, id_card_number, monthly_salary, hired_on, status)
        VALUES (?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(payload.name.trim())
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(&payload.id_card_number)
    .bind(payload.monthly_salary)
    .bind(payload.hired_on)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(res) => Ok(HttpResponse::Created().json(json!({
            "message": "Employee created successfully",
            "id": res.last_insert_id(),
        }))),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Ok(HttpResponse::Conflict().json(json!({
                        "message": "An employee with this email or ID card number already exists"
                    })));
                }
            }

            error!(error = %e, "Failed to create employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }

    if let Some(search) = &query.search {
        conditions.push("(name LIKE ? OR email LIKE ? OR phone LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query.fetch_one(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %count_sql, "Failed to count employees");
        ErrorInternalServerError("Database error")
    })?;

    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = data_query.bind(b);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await.map_err(|e| {
        error!(error = %e, sql = %data_sql, "Failed to fetch employees");
        ErrorInternalServerError("Database error")
    })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let employee_id = path.into_inner();

    let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            ErrorInternalServerError("Internal Server Error")
        })?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Unknown or empty fields"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let employee_id = path.into_inner();

    // face_image_url is deliberately absent: the reference image only changes
    // through the registration endpoint, which screens the image first.
    let patch = build_patch(
        "employees",
        &body,
        &[
            "name",
            "email",
            "phone",
            "id_card_number",
            "monthly_salary",
            "hired_on",
            "status",
        ],
        employee_id,
    )?;

    let affected = execute_patch(pool.get_ref(), patch).await.map_err(|e| {
        error!(error = %e, employee_id, "Failed to update employee");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let result = sqlx::query("DELETE FROM employees WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(res) => {
            if res.rows_affected() == 0 {
                return Ok(HttpResponse::NotFound().json(json!({
                    "message": "Employee not found"
                })));
            }

            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }
        Err(e) => {
            error!(error = %e, employee_id, "Failed to delete employee");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Internal Server Error"
            })))
        }
    }
}

fn registration_rejection(reason: RejectReason) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "message": reason.message(),
        "error": reason.to_string(),
    }))
}

/// Register (or replace) an employee's reference face image. The upload is
/// screened with the same quality bounds as the verification path, then the
/// detector must find exactly one face before the image is stored.
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}/face",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content_type = "multipart/form-data", description = "Form with a `face_image` file part"),
    responses(
        (status = 200, description = "Reference face registered", body = Object, example = json!({
            "message": "Face registered successfully",
            "face_image_url": "https://assets.example/faces/rina.jpg"
        })),
        (status = 400, description = "Image rejected", body = Object, example = json!({
            "message": "No face detected in image",
            "error": "NO_FACE_DETECTED"
        })),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn register_face(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Multipart,
    vision: web::Data<dyn FaceScan>,
    assets: web::Data<dyn AssetStore>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager_or_admin()?;

    let employee_id = path.into_inner();

    let form = read_upload_form(payload).await?;
    let file = match form.file {
        Some(f) => f,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Face image is required"
            })));
        }
    };

    let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            ErrorInternalServerError("Internal Server Error")
        })?;

    let employee = match employee {
        Some(e) => e,
        None => {
            return Ok(HttpResponse::NotFound().json(json!({
                "message": "Employee not found"
            })));
        }
    };

    let mut candidate = TempAsset::create(&file.bytes, &file.filename).map_err(|e| {
        error!(error = %e, "Failed to stage uploaded image");
        ErrorInternalServerError("Internal Server Error")
    })?;

    if let Err(reason) = image_check::check_image(candidate.path()) {
        candidate.release();
        return Ok(registration_rejection(reason));
    }

    let detection = vision.detect_faces(&file.bytes).await;
    candidate.release();

    let detection = match detection {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, employee_id, "Face detection failed during registration");
            return Ok(registration_rejection(RejectReason::ComparisonFailed));
        }
    };

    match detection.face_count {
        0 => return Ok(registration_rejection(RejectReason::NoFaceDetected)),
        1 => {}
        _ => return Ok(registration_rejection(RejectReason::MultipleFaces)),
    }

    let face_image_url = match assets.upload(file.bytes, "faces", &file.filename).await {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, employee_id, "Failed to store reference image");
            return Err(ErrorInternalServerError("Internal Server Error"));
        }
    };

    sqlx::query("UPDATE employees SET face_image_url = ? WHERE id = ?")
        .bind(&face_image_url)
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to save reference image URL");
            ErrorInternalServerError("Internal Server Error")
        })?;

    // Stale cached bytes for the previous reference must not outlive it.
    if let Some(old_url) = employee.face_image_url.as_deref() {
        reference_cache::invalidate(old_url).await;
    }

    info!(employee_id, "Reference face registered");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Face registered successfully",
        "face_image_url": face_image_url,
    })))
}

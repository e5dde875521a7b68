use crate::api::attendance::{AttendanceFilter, AttendanceListResponse};
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::manual_attendance::{
    CreateManualRequest, ManualRequestFilter, ReviewManualRequest,
};
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::Employee;
use crate::model::manual_request::ManualAttendanceRequest;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Salon Management API",
        version = "1.0.0",
        description = r#"
## Salon Management System

Backend for a salon's staff operations, built around face-verified
attendance.

### 🔹 Key Features
- **Employee Management**
  - Create, update, list, and view staff profiles
  - Register a reference face image per employee
- **Face-Verified Attendance**
  - Daily check-in and check-out gated by face comparison
  - Absence sweep for employees with no record on a given day
- **Manual Attendance Corrections**
  - Employees file correction requests; admins approve or decline
- **Face Login**
  - Token issuance from a live picture for registered accounts

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Attendance review and employee administration require the **Admin** or
**Manager** role.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints
- Rejections carry a stable `error` code next to the human-readable message

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::face_login,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::list_attendance,
        crate::api::attendance::absent_sweep,

        crate::api::manual_attendance::submit_manual_request,
        crate::api::manual_attendance::list_manual_requests,
        crate::api::manual_attendance::approve_manual_request,
        crate::api::manual_attendance::decline_manual_request,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::register_face,
    ),
    components(
        schemas(
            Employee,
            CreateEmployee,
            EmployeeQuery,
            EmployeeListResponse,
            AttendanceRecord,
            AttendanceFilter,
            AttendanceListResponse,
            ManualAttendanceRequest,
            CreateManualRequest,
            ReviewManualRequest,
            ManualRequestFilter
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication APIs"),
        (name = "Attendance", description = "Face-verified attendance APIs"),
        (name = "Manual Attendance", description = "Attendance correction review APIs"),
        (name = "Employee", description = "Employee management APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

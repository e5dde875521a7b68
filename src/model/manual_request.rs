use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Out-of-band attendance correction awaiting admin review. Approval injects
/// the requested time into the day's attendance record without face
/// verification; that path is an explicit, logged override.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ManualAttendanceRequest {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 42)]
    pub employee_id: u64,

    #[schema(example = "Rina Akter")]
    pub employee_name: String,

    /// "checkin" or "checkout".
    #[schema(example = "checkin")]
    pub request_type: String,

    #[schema(example = "2026-08-26T09:45:00", value_type = String)]
    pub requested_time: NaiveDateTime,

    #[schema(example = "Forgot my phone, front desk can confirm arrival")]
    pub note: String,

    /// pending | approved | declined
    #[schema(example = "pending")]
    pub status: String,

    #[schema(nullable = true)]
    pub admin_notes: Option<String>,

    #[schema(example = "2026-08-26T09:50:00Z", value_type = String, nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::subject::FaceSubject;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Rina Akter",
        "email": "rina@salon.example",
        "phone": "+8801712345678",
        "id_card_number": "NID-4455",
        "monthly_salary": 18000.0,
        "face_image_url": "https://assets.example/faces/rina.jpg",
        "hired_on": "2024-01-01",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "Rina Akter")]
    pub name: String,

    #[schema(example = "rina@salon.example", nullable = true)]
    pub email: Option<String>,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "NID-4455", nullable = true)]
    pub id_card_number: Option<String>,

    #[schema(example = 18000.0, nullable = true)]
    pub monthly_salary: Option<f64>,

    /// Asset-store URL of the registered reference face, if any.
    #[schema(example = "https://assets.example/faces/rina.jpg", nullable = true)]
    pub face_image_url: Option<String>,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub hired_on: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

impl FaceSubject for Employee {
    fn subject_id(&self) -> u64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn reference_image(&self) -> Option<&str> {
        self.face_image_url.as_deref()
    }
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::model::subject::FaceSubject;

#[derive(Deserialize)]
pub struct UserReq {
    pub username: String,
    pub password: String,
    pub role_id: u8,
    /// Links the account to an employee profile (required for attendance).
    pub employee_id: Option<u64>,
    /// Pre-registered reference face for face login.
    pub face_image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginReqDto {
    pub username: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64, // matches BIGINT UNSIGNED
    pub username: String,
    pub password: String,
    pub role_id: u8,
    pub employee_id: Option<u64>,
    /// Reference face for face login; admins/managers register one too.
    pub face_image_url: Option<String>,
}

impl FaceSubject for UserSql {
    fn subject_id(&self) -> u64 {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.username
    }

    fn reference_image(&self) -> Option<&str> {
        self.face_image_url.as_deref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    pub role: u8, // role id
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

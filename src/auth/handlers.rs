use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    face::{FaceVerifier, TempAsset},
    models::{LoginReqDto, TokenType, UserReq, UserSql},
    utils::upload::read_upload_form,
};
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

const USER_COLUMNS: &str = "id, username, password, role_id, employee_id, face_image_url";

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
}

/// Issues the access/refresh pair and persists the refresh token. Shared by
/// the password and face login paths.
async fn create_session(
    db_user: &UserSql,
    pool: &MySqlPool,
    config: &Config,
) -> Result<LoginResponse, HttpResponse> {
    let access_token = generate_access_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    let (refresh_token, refresh_claims) = generate_refresh_token(
        db_user.id,
        db_user.username.clone(),
        db_user.role_id,
        db_user.employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(db_user.id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    {
        error!(error = %e, "Failed to store refresh token");
        return Err(HttpResponse::InternalServerError().finish());
    }

    // Non-fatal: a missing last_login_at update must not fail the login.
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool)
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    Ok(LoginResponse {
        access_token,
        refresh_token,
    })
}

async fn fetch_user_by_username(
    username: &str,
    pool: &MySqlPool,
) -> Result<Option<UserSql>, sqlx::Error> {
    sqlx::query_as::<_, UserSql>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// User registration handler
pub async fn register(user: web::Json<UserReq>, pool: web::Data<MySqlPool>) -> impl Responder {
    let username = user.username.trim().to_lowercase();
    let password = &user.password;

    if username.is_empty() || password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Username and password must not be empty"
        }));
    }

    let hashed = hash_password(password);

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, role_id, employee_id, face_image_url)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&username)
    .bind(&hashed)
    .bind(user.role_id)
    .bind(user.employee_id)
    .bind(&user.face_image_url)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => HttpResponse::Created().json(json!({
            "message": "User registered successfully"
        })),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return HttpResponse::Conflict().json(json!({
                        "error": "Username already exists"
                    }));
                }
            }

            error!(error = %e, "Failed to register user");
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to register user"
            }))
        }
    }
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    debug!("Fetching user from database");

    let db_user = match fetch_user_by_username(&user.username, pool.get_ref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    match create_session(&db_user, pool.get_ref(), config.get_ref()).await {
        Ok(tokens) => {
            info!("Login successful");
            HttpResponse::Ok().json(tokens)
        }
        Err(resp) => resp,
    }
}

/// Face-based login: multipart form with `username` and a live picture. The
/// candidate is parked as a temp asset, verified against the registered
/// reference, and released whatever the outcome.
#[utoipa::path(
    post,
    path = "/auth/face-login",
    request_body(content_type = "multipart/form-data", description = "Form with a `username` field and a live picture file part"),
    responses(
        (status = 200, description = "Face verified; tokens issued", body = Object, example = json!({
            "access_token": "eyJhbGciOi...",
            "refresh_token": "eyJhbGciOi...",
            "similarity": 94.2
        })),
        (status = 400, description = "Missing username or picture"),
        (status = 401, description = "Verification rejected", body = Object, example = json!({
            "message": "Face verification failed. Similarity: 72.50%",
            "error": "LOW_SIMILARITY",
            "similarity": 72.5
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_face_login", skip_all)]
pub async fn face_login(
    payload: Multipart,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    verifier: web::Data<FaceVerifier>,
) -> actix_web::Result<impl Responder> {
    let form = read_upload_form(payload).await?;

    let username = match form.fields.get("username") {
        Some(u) if !u.trim().is_empty() => u.trim().to_string(),
        _ => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Username is required"
            })));
        }
    };

    let file = match form.file {
        Some(f) => f,
        None => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "Live picture is required for face login"
            })));
        }
    };

    let db_user = match fetch_user_by_username(&username, pool.get_ref()).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!(username, "Face login refused: unknown user");
            return Ok(HttpResponse::Unauthorized().json(json!({
                "message": "Invalid credentials"
            })));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    let mut candidate = TempAsset::create(&file.bytes, &file.filename)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let result = verifier.verify_subject(&db_user, &candidate).await;
    candidate.release();

    if !result.accepted {
        return Ok(HttpResponse::Unauthorized().json(json!({
            "message": result.message(),
            "error": result.reason.map(|r| r.to_string()),
            "similarity": result.similarity,
        })));
    }

    match create_session(&db_user, pool.get_ref(), config.get_ref()).await {
        Ok(tokens) => {
            info!(user_id = db_user.id, similarity = result.similarity, "Face login successful");
            Ok(HttpResponse::Ok().json(json!({
                "access_token": tokens.access_token,
                "refresh_token": tokens.refresh_token,
                "similarity": result.similarity,
            })))
        }
        Err(resp) => Ok(resp),
    }
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::Unauthorized().body("No token"),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::Unauthorized().body("Invalid token"),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::Unauthorized().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::Unauthorized().finish();
    }

    let record = match sqlx::query_as::<_, (u64, u64, bool)>(
        "SELECT id, user_id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some((id, user_id, false))) => (id, user_id),
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // Rotate: revoke the old refresh token before issuing a new one.
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.0)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let (new_refresh_token, new_claims) = generate_refresh_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.employee_id,
        &config.jwt_secret,
        config.refresh_token_ttl,
    );

    if let Err(e) = sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(record.1)
    .bind(&new_claims.jti)
    .bind(new_claims.exp as i64)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store rotated refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    let access_token = generate_access_token(
        claims.user_id,
        claims.sub.clone(),
        claims.role,
        claims.employee_id,
        &config.jwt_secret,
        config.access_token_ttl,
    );

    HttpResponse::Ok().json(json!({
        "access_token": access_token,
        "refresh_token": new_refresh_token
    }))
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let header = match req.headers().get("Authorization") {
        Some(h) => h.to_str().unwrap_or(""),
        None => return HttpResponse::NoContent().finish(),
    };

    let token = match header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return HttpResponse::NoContent().finish(),
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    if claims.token_type != TokenType::Refresh {
        return HttpResponse::NoContent().finish();
    }

    // Revoke is idempotent: success even if the token never existed.
    let _ = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await;

    HttpResponse::NoContent().finish()
}

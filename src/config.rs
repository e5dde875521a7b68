use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Face service
    pub vision_api_url: String,
    pub vision_api_key: String,
    pub vision_timeout_secs: u64,
    /// Canonical similarity threshold (0-100) for every verification
    /// context. Inclusive: a score equal to it matches.
    pub face_match_threshold: f32,

    // Durable asset host
    pub asset_store_url: String,
    pub asset_store_key: String,

    /// Check-ins after this local time are recorded as `late`.
    pub workday_start: NaiveTime,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            access_token_ttl: env::var("ACCESS_TOKEN_TTL")
                .unwrap_or_else(|_| "900".to_string()) // default 15 min
                .parse()
                .unwrap(),
            refresh_token_ttl: env::var("REFRESH_TOKEN_TTL")
                .unwrap_or_else(|_| "604800".to_string()) // default 7 days
                .parse()
                .unwrap(),

            rate_login_per_min: env::var("RATE_LOGIN_PER_MIN")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap(),
            rate_register_per_min: env::var("RATE_REGISTER_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_refresh_per_min: env::var("RATE_REFRESH_PER_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            rate_protected_per_min: env::var("RATE_PROTECTED_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            vision_api_url: env::var("VISION_API_URL").expect("VISION_API_URL must be set"),
            vision_api_key: env::var("VISION_API_KEY").expect("VISION_API_KEY must be set"),
            vision_timeout_secs: env::var("VISION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap(),
            face_match_threshold: env::var("FACE_MATCH_THRESHOLD")
                .unwrap_or_else(|_| "90.0".to_string())
                .parse()
                .unwrap(),

            asset_store_url: env::var("ASSET_STORE_URL").expect("ASSET_STORE_URL must be set"),
            asset_store_key: env::var("ASSET_STORE_KEY").expect("ASSET_STORE_KEY must be set"),

            workday_start: NaiveTime::parse_from_str(
                &env::var("WORKDAY_START").unwrap_or_else(|_| "10:00".to_string()),
                "%H:%M",
            )
            .expect("WORKDAY_START must be HH:MM"),
        }
    }
}

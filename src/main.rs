use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod face;
mod model;
mod models;
mod routes;
mod storage;
mod utils;
mod vision;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::face::FaceVerifier;
use crate::storage::{AssetStore, HttpAssetStore};
use crate::utils::reference_cache;
use crate::vision::{FaceScan, HttpVisionClient};
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Salon Management API"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    // One HTTP client for every outbound call: face service, asset store,
    // reference fetches. The timeout keeps a stalled vision call from
    // hanging a check-in indefinitely.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.vision_timeout_secs))
        .build()
        .expect("failed to build HTTP client");

    let vision: Arc<dyn FaceScan> = Arc::new(HttpVisionClient::new(
        http.clone(),
        &config.vision_api_url,
        &config.vision_api_key,
    ));
    let assets: Arc<dyn AssetStore> = Arc::new(HttpAssetStore::new(
        http.clone(),
        &config.asset_store_url,
        &config.asset_store_key,
    ));

    let vision_data: Data<dyn FaceScan> = Data::from(vision.clone());
    let assets_data: Data<dyn AssetStore> = Data::from(assets);
    let verifier_data = Data::new(FaceVerifier::new(
        vision,
        http.clone(),
        config.face_match_threshold,
    ));

    let pool_for_cache_warmup = pool.clone();
    let http_for_cache_warmup = http.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    actix_web::rt::spawn(async move {
        // Pre-fetch reference faces in batches of 100 so the first check-ins
        // of the day skip the asset-host round trip.
        if let Err(e) =
            reference_cache::warmup_reference_cache(&pool_for_cache_warmup, &http_for_cache_warmup, 100)
                .await
        {
            eprintln!("Failed to warmup reference cache: {:?}", e);
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(vision_data.clone())
            .app_data(assets_data.clone())
            .app_data(verifier_data.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}

mod handlers;
mod middleware;
mod models;
mod routes;

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::{Key, SameSite},
    middleware::Logger,
    web, HttpResponse,
};
use anyhow;
use handlers::ai::AiClient;
use handlers::storage::StorageClient;
use handlers::ws::init_ws_routes;
use log::{error, info, warn};
use middleware::{
    auth_middleware::AuthMiddleware, request_logger::RequestLogger,
    session_refresh_middleware::SessionRefreshMiddleware,
};
use routes::{
    admin::config_admin_routes,
    ai::config_ai_routes,
    captcha::{config_captcha_routes, TurnstileConfig},
    chats::config_chat_routes,
    complaints::config_complaint_routes,
    donations::config_donation_routes,
    inventory::config_inventory_routes,
    matching::config_matching_routes,
    notifications::config_notification_routes,
    user_auth::{config_protected_auth_routes, config_user_auth_routes},
    user_data::config_user_data_routes,
};
use shuttle_actix_web::ShuttleActixWeb;
use shuttle_runtime::SecretStore;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

#[shuttle_runtime::main]
async fn main(
    #[shuttle_runtime::Secrets] secrets: SecretStore,
) -> ShuttleActixWeb<impl FnOnce(&mut web::ServiceConfig) + Send + Clone + 'static> {
    info!("=== FoodShare API Server Starting ===");

    let session_secret = match secrets.get("SESSION_SECRET") {
        Some(secret) => secret,
        None => {
            error!("SESSION_SECRET not found in secrets");
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "Session secret not found"
            )));
        }
    };

    // Create a secret key for cookies
    let secret_key = Key::from(session_secret.as_bytes());

    let database_url = match secrets.get("DATABASE_URL") {
        Some(url) => url,
        None => {
            error!("DATABASE_URL not found in secrets");
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "Database connection failed"
            )));
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to Postgres: {}", e);
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "Database connection failed"
            )));
        }
    };

    if handlers::db::check_db_connection(&pool).await {
        info!("Database connection established and verified");
    } else {
        info!("Database connection established but verification failed");
    }

    // Object storage for donation images and avatars
    let storage_client = match StorageClient::from_secrets(&secrets) {
        Ok(client) => {
            info!("B2 storage client initialized successfully");
            client
        }
        Err(e) => {
            error!("Failed to initialize B2 storage client: {}", e);
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "B2 storage initialization failed: {}",
                e
            )));
        }
    };

    // AI providers are optional: a missing key degrades to the fallback path
    let ai_client = match AiClient::from_secrets(&secrets) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize AI client: {}", e);
            return Err(shuttle_runtime::Error::Custom(anyhow::anyhow!(
                "AI client initialization failed: {}",
                e
            )));
        }
    };

    let turnstile_config = TurnstileConfig {
        secret: secrets.get("TURNSTILE_SECRET_KEY"),
    };
    if turnstile_config.secret.is_none() {
        warn!("TURNSTILE_SECRET_KEY not set; captcha verification will report a server error");
    }

    info!("Starting FoodShare API Server with Shuttle...");

    let config = move |cfg: &mut web::ServiceConfig| {
        let cors = Cors::default()
            .allowed_origin_fn(|_origin, _req_head| true)
            .allow_any_method()
            .allow_any_header()
            .expose_any_header()
            .supports_credentials()
            .max_age(3600);

        cfg.app_data(web::Data::new(pool.clone()));
        cfg.app_data(web::Data::new(storage_client));
        cfg.app_data(web::Data::new(ai_client));
        cfg.app_data(web::Data::new(turnstile_config));
        cfg.service(
            web::scope("")
                .wrap(Logger::new(
                    "%t [%s] \"%r\" %b %D ms \"%{Referer}i\" \"%{User-Agent}i\" %a",
                ))
                .wrap(RequestLogger)
                .wrap(cors)
                .wrap(IdentityMiddleware::default())
                .wrap(
                    SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                        .cookie_secure(true)
                        .cookie_http_only(true)
                        .cookie_same_site(SameSite::None)
                        .cookie_name("foodshare_session".to_string())
                        .cookie_path("/".to_string())
                        .build(),
                )
                .wrap(SessionRefreshMiddleware::new(30 * 60))
                .service(
                    web::scope("/api")
                        .service(
                            web::scope("/public")
                                .configure(config_user_auth_routes)
                                .configure(config_captcha_routes),
                        )
                        .service(
                            web::scope("/protected")
                                .wrap(AuthMiddleware)
                                .configure(config_protected_auth_routes)
                                .configure(config_user_data_routes)
                                .configure(config_donation_routes)
                                .configure(config_matching_routes)
                                .configure(config_chat_routes)
                                .configure(config_complaint_routes)
                                .configure(config_inventory_routes)
                                .configure(config_notification_routes)
                                .configure(config_ai_routes)
                                .configure(init_ws_routes)
                                .configure(config_admin_routes),
                        ),
                )
                .route(
                    "/",
                    web::get().to(|| async {
                        HttpResponse::Ok().body("Welcome to the FoodShare API")
                    }),
                ),
        );
    };

    Ok(config.into())
}

use crate::handlers::auth::Claims;
use crate::models::all_models::Notification;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

//Get Notifications
//Get Notifications Input: HttpRequest(Session)
//Get Notifications Output: Vec<Notification> (most recent 50)
pub async fn get_notifications(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = "
            SELECT notification_id, user_id, title, message, kind, read, link, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 50
        ";
        match sqlx::query_as::<_, Notification>(query)
            .bind(claims.id)
            .fetch_all(pool.get_ref())
            .await
        {
            Ok(notifications) => HttpResponse::Ok().json(notifications),
            Err(e) => {
                eprintln!("Failed to fetch notifications: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to fetch notifications")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Mark Notification Read
//Mark Notification Read Input: HttpRequest(Session), Path (/notifications/{notification_id}/read)
//Mark Notification Read Output: Notification
pub async fn mark_notification_read(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = "
            UPDATE notifications
            SET read = true
            WHERE notification_id = $1 AND user_id = $2
            RETURNING notification_id, user_id, title, message, kind, read, link, created_at
        ";
        match sqlx::query_as::<_, Notification>(query)
            .bind(path.into_inner())
            .bind(claims.id)
            .fetch_optional(pool.get_ref())
            .await
        {
            Ok(Some(notification)) => HttpResponse::Ok().json(notification),
            Ok(None) => HttpResponse::NotFound().body("Notification not found"),
            Err(e) => {
                eprintln!("Failed to mark notification read: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to mark notification read")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Mark All Read
//Mark All Read Input: HttpRequest(Session)
//Mark All Read Output: { updated }
pub async fn mark_all_read(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = "UPDATE notifications SET read = true WHERE user_id = $1 AND read = false";
        match sqlx::query(query).bind(claims.id).execute(pool.get_ref()).await {
            Ok(result) => HttpResponse::Ok().json(json!({ "updated": result.rows_affected() })),
            Err(e) => {
                eprintln!("Failed to mark notifications read: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to mark notifications read")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Config Notification Routes
// GET /notifications
// PUT /notifications/read-all
// PUT /notifications/{notification_id}/read
pub fn config_notification_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(get_notifications))
            .route("/read-all", web::put().to(mark_all_read))
            .route(
                "/{notification_id}/read",
                web::put().to(mark_notification_read),
            ),
    );
}

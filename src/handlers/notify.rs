use crate::handlers::ws;
use crate::models::all_models::NotificationKind;
use log::warn;
use sqlx::PgPool;
use uuid::Uuid;

//Notify
//Fire-and-forget fan-out for lifecycle events: persist a notification row
//and push it to the user's live socket if one is connected. Failures on
//either leg are logged and swallowed; the calling workflow never fails
//because a notification did not land.
pub async fn notify(pool: &PgPool, user_id: Uuid, title: &str, message: &str, kind: NotificationKind) {
    let query = "
        INSERT INTO notifications (user_id, title, message, kind)
        VALUES ($1, $2, $3, $4)
    ";

    if let Err(e) = sqlx::query(query)
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(kind)
        .execute(pool)
        .await
    {
        warn!("Failed to store notification for {}: {:?}", user_id, e);
    }

    let payload = serde_json::json!({
        "type": "notification",
        "payload": {
            "title": title,
            "message": message,
            "kind": kind
        }
    });

    let _ = ws::send_to_user(&user_id, payload).await;
}

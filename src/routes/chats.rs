use crate::handlers::auth::Claims;
use crate::handlers::moderation::ensure_account_active;
use crate::handlers::ws;
use crate::models::all_models::{Chat, ChatMessage};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

//Derive Chat Id
//Chat identity is a function of the unordered participant pair plus the
//optional donation scope. Both sides of a conversation derive the same id,
//so "find or create" becomes an idempotent upsert with no duplicate-chat
//race, and conversations about different donations never bleed into each
//other.
pub fn derive_chat_id(user_a: Uuid, user_b: Uuid, donation_id: Option<Uuid>) -> Uuid {
    let (first, second) = if user_a <= user_b {
        (user_a, user_b)
    } else {
        (user_b, user_a)
    };
    let name = match donation_id {
        Some(donation_id) => format!("chat:{}:{}:{}", first, second, donation_id),
        None => format!("chat:{}:{}", first, second),
    };
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

//Ensure Participant Helper Function
async fn ensure_participant(
    pool: &PgPool,
    chat_id: Uuid,
    user_id: Uuid,
) -> Result<(), HttpResponse> {
    let query =
        "SELECT EXISTS(SELECT 1 FROM chat_participants WHERE chat_id = $1 AND user_id = $2)";
    match sqlx::query_scalar::<_, bool>(query)
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    {
        Ok(true) => Ok(()),
        Ok(false) => Err(HttpResponse::Forbidden().body("Not a participant of this chat")),
        Err(e) => {
            eprintln!("Failed to check chat membership: {:?}", e);
            Err(HttpResponse::InternalServerError().body("Database error"))
        }
    }
}

//Open Chat Request
#[derive(Debug, Deserialize, Serialize)]
pub struct OpenChatRequest {
    pub other_user_id: Uuid,
    pub donation_id: Option<Uuid>,
}

//Open Chat
//Open Chat Input: HttpRequest(Session), OpenChatRequest
//Open Chat Output: Chat + unread count for the caller
//Upserts the deterministic chat, so concurrent opens from both sides land on
//the same conversation.
pub async fn open_chat(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<OpenChatRequest>,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };

    if payload.other_user_id == claims.id {
        return HttpResponse::BadRequest().body("Cannot open a chat with yourself");
    }

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let other_exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)",
    )
    .bind(payload.other_user_id)
    .fetch_one(pool.get_ref())
    .await;

    match other_exists {
        Ok(true) => {}
        Ok(false) => return HttpResponse::NotFound().body("User not found"),
        Err(e) => {
            eprintln!("Failed to check user: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    }

    if let Some(donation_id) = payload.donation_id {
        let donation_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM donations WHERE donation_id = $1)",
        )
        .bind(donation_id)
        .fetch_one(pool.get_ref())
        .await;

        match donation_exists {
            Ok(true) => {}
            Ok(false) => return HttpResponse::NotFound().body("Donation not found"),
            Err(e) => {
                eprintln!("Failed to check donation: {:?}", e);
                return HttpResponse::InternalServerError().body("Database error");
            }
        }
    }

    let chat_id = derive_chat_id(claims.id, payload.other_user_id, payload.donation_id);

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let upsert_chat = "
        INSERT INTO chats (chat_id, donation_id)
        VALUES ($1, $2)
        ON CONFLICT (chat_id) DO NOTHING
    ";
    if let Err(e) = sqlx::query(upsert_chat)
        .bind(chat_id)
        .bind(payload.donation_id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to upsert chat: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to open chat");
    }

    let upsert_participants = "
        INSERT INTO chat_participants (chat_id, user_id)
        VALUES ($1, $2), ($1, $3)
        ON CONFLICT (chat_id, user_id) DO NOTHING
    ";
    if let Err(e) = sqlx::query(upsert_participants)
        .bind(chat_id)
        .bind(claims.id)
        .bind(payload.other_user_id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to upsert chat participants: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to open chat");
    }

    let chat = match sqlx::query_as::<_, Chat>(
        "SELECT chat_id, donation_id, last_message, last_message_time, created_at
         FROM chats WHERE chat_id = $1",
    )
    .bind(chat_id)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("Failed to fetch chat: {:?}", e);
            let _ = tx.rollback().await;
            return HttpResponse::InternalServerError().body("Failed to open chat");
        }
    };

    let unread_count = match sqlx::query_scalar::<_, i32>(
        "SELECT unread_count FROM chat_participants WHERE chat_id = $1 AND user_id = $2",
    )
    .bind(chat_id)
    .bind(claims.id)
    .fetch_one(&mut *tx)
    .await
    {
        Ok(count) => count,
        Err(e) => {
            eprintln!("Failed to fetch unread count: {:?}", e);
            let _ = tx.rollback().await;
            return HttpResponse::InternalServerError().body("Failed to open chat");
        }
    };

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    HttpResponse::Ok().json(json!({
        "chat": chat,
        "unread_count": unread_count
    }))
}

//Send Message Request
#[derive(Debug, Deserialize, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
}

//Send Message
//Send Message Input: HttpRequest(Session), Path (/chats/{chat_id}/messages), SendMessageRequest
//Send Message Output: ChatMessage
//Recipient unread counters move by atomic increment in the store, never by a
//client-computed value, so concurrent senders cannot clobber each other.
pub async fn send_message(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<SendMessageRequest>,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };
    let chat_id = path.into_inner();

    if payload.content.trim().is_empty() {
        return HttpResponse::BadRequest().body("Message cannot be empty");
    }

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    if let Err(response) = ensure_participant(pool.get_ref(), chat_id, claims.id).await {
        return response;
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let update_chat = "
        UPDATE chats
        SET last_message = $2, last_message_time = NOW()
        WHERE chat_id = $1
    ";
    if let Err(e) = sqlx::query(update_chat)
        .bind(chat_id)
        .bind(&payload.content)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to update chat: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to send message");
    }

    // Atomic increment, not a read-modify-write
    let bump_unread = "
        UPDATE chat_participants
        SET unread_count = unread_count + 1
        WHERE chat_id = $1 AND user_id <> $2
    ";
    if let Err(e) = sqlx::query(bump_unread)
        .bind(chat_id)
        .bind(claims.id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to bump unread counters: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to send message");
    }

    let insert_message = "
        INSERT INTO chat_messages (chat_id, sender_id, content, read_by)
        VALUES ($1, $2, $3, ARRAY[$2]::uuid[])
        RETURNING message_id, chat_id, sender_id, content, seq, read_by, created_at
    ";
    let message = match sqlx::query_as::<_, ChatMessage>(insert_message)
        .bind(chat_id)
        .bind(claims.id)
        .bind(&payload.content)
        .fetch_one(&mut *tx)
        .await
    {
        Ok(message) => message,
        Err(e) => {
            eprintln!("Failed to insert message: {:?}", e);
            let _ = tx.rollback().await;
            return HttpResponse::InternalServerError().body("Failed to send message");
        }
    };

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    // Push the message to the other participant if they are connected
    let recipients: Vec<Uuid> = sqlx::query_scalar(
        "SELECT user_id FROM chat_participants WHERE chat_id = $1 AND user_id <> $2",
    )
    .bind(chat_id)
    .bind(claims.id)
    .fetch_all(pool.get_ref())
    .await
    .unwrap_or_default();

    let event = json!({
        "type": "chat_message",
        "payload": message
    });
    for recipient in recipients {
        let _ = ws::send_to_user(&recipient, event.clone()).await;
    }

    HttpResponse::Ok().json(message)
}

//Get Messages
//Get Messages Input: HttpRequest(Session), Path (/chats/{chat_id}/messages)
//Get Messages Output: Vec<ChatMessage> in creation order
pub async fn get_messages(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };
    let chat_id = path.into_inner();

    if let Err(response) = ensure_participant(pool.get_ref(), chat_id, claims.id).await {
        return response;
    }

    let query = "
        SELECT message_id, chat_id, sender_id, content, seq, read_by, created_at
        FROM chat_messages
        WHERE chat_id = $1
        ORDER BY seq ASC
    ";
    match sqlx::query_as::<_, ChatMessage>(query)
        .bind(chat_id)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(messages) => HttpResponse::Ok().json(messages),
        Err(e) => {
            eprintln!("Failed to fetch messages: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch messages")
        }
    }
}

//Mark Read
//Mark Read Input: HttpRequest(Session), Path (/chats/{chat_id}/read)
//Mark Read Output: Success message
//Zeroes the caller's unread counter and stamps the caller into read_by of
//the messages they have now observed.
pub async fn mark_read(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };
    let chat_id = path.into_inner();

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    if let Err(response) = ensure_participant(pool.get_ref(), chat_id, claims.id).await {
        return response;
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let reset_unread = "
        UPDATE chat_participants
        SET unread_count = 0
        WHERE chat_id = $1 AND user_id = $2
    ";
    if let Err(e) = sqlx::query(reset_unread)
        .bind(chat_id)
        .bind(claims.id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to reset unread count: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to mark chat read");
    }

    let stamp_read = "
        UPDATE chat_messages
        SET read_by = array_append(read_by, $2)
        WHERE chat_id = $1 AND NOT ($2 = ANY(read_by))
    ";
    if let Err(e) = sqlx::query(stamp_read)
        .bind(chat_id)
        .bind(claims.id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to stamp read_by: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to mark chat read");
    }

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    HttpResponse::Ok().json(json!({ "chat_id": chat_id, "unread_count": 0 }))
}

//Chat Summary
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub donation_id: Option<Uuid>,
    pub last_message: String,
    pub last_message_time: NaiveDateTime,
    pub unread_count: i32,
    pub other_user_id: Uuid,
    pub other_display_name: String,
    pub other_avatar_url: String,
}

//Get My Chats
//Get My Chats Input: HttpRequest(Session)
//Get My Chats Output: Vec<ChatSummary>, most recent first
pub async fn get_my_chats(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = "
            SELECT c.chat_id, c.donation_id, c.last_message, c.last_message_time,
                   me.unread_count,
                   other.user_id AS other_user_id,
                   u.display_name AS other_display_name,
                   u.avatar_url AS other_avatar_url
            FROM chats c
            JOIN chat_participants me ON me.chat_id = c.chat_id AND me.user_id = $1
            JOIN chat_participants other ON other.chat_id = c.chat_id AND other.user_id <> $1
            JOIN users u ON u.user_id = other.user_id
            ORDER BY c.last_message_time DESC
        ";
        match sqlx::query_as::<_, ChatSummary>(query)
            .bind(claims.id)
            .fetch_all(pool.get_ref())
            .await
        {
            Ok(chats) => HttpResponse::Ok().json(chats),
            Err(e) => {
                eprintln!("Failed to fetch chats: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to fetch chats")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Config Chat Routes
// GET /chats
// POST /chats/open
// POST /chats/{chat_id}/messages
// GET /chats/{chat_id}/messages
// PUT /chats/{chat_id}/read
pub fn config_chat_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chats")
            .route("", web::get().to(get_my_chats))
            .route("/open", web::post().to(open_chat))
            .route("/{chat_id}/messages", web::post().to(send_message))
            .route("/{chat_id}/messages", web::get().to(get_messages))
            .route("/{chat_id}/read", web::put().to(mark_read)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_id_is_symmetric_in_participants() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(derive_chat_id(a, b, None), derive_chat_id(b, a, None));

        let donation = Uuid::new_v4();
        assert_eq!(
            derive_chat_id(a, b, Some(donation)),
            derive_chat_id(b, a, Some(donation))
        );
    }

    #[test]
    fn donation_scope_separates_conversations() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();

        let unscoped = derive_chat_id(a, b, None);
        let scoped1 = derive_chat_id(a, b, Some(d1));
        let scoped2 = derive_chat_id(a, b, Some(d2));

        assert_ne!(unscoped, scoped1);
        assert_ne!(scoped1, scoped2);
    }

    #[test]
    fn different_pairs_never_collide() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_ne!(derive_chat_id(a, b, None), derive_chat_id(a, c, None));
    }

    #[test]
    fn chat_id_is_stable_across_calls() {
        let a = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
        let b = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();
        assert_eq!(derive_chat_id(a, b, None), derive_chat_id(a, b, None));
    }
}

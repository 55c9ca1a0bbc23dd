use crate::handlers::auth::Claims;
use crate::handlers::storage::{self, StorageClient};
use crate::models::all_models::{AccountStatus, Location, UserRole};
use actix_multipart::Multipart;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDateTime;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

//User Profile
//The caller's own profile, password hash excluded.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub organization_name: Option<String>,
    pub address: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub location: Option<Json<Location>>,
    pub account_status: AccountStatus,
    pub suspended_until: Option<NaiveDateTime>,
    pub warning_count: i32,
    pub email_verified: bool,
    pub created_at: NaiveDateTime,
}

const PROFILE_COLUMNS: &str = "
    user_id, email, display_name, role, phone, organization_name, address, avatar_url,
    bio, location, account_status, suspended_until, warning_count, email_verified, created_at
";

//Get My Profile
//Get My Profile Input: HttpRequest(Session)
//Get My Profile Output: UserProfile
pub async fn get_my_profile(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = format!("SELECT {} FROM users WHERE user_id = $1", PROFILE_COLUMNS);
        match sqlx::query_as::<_, UserProfile>(&query)
            .bind(claims.id)
            .fetch_optional(pool.get_ref())
            .await
        {
            Ok(Some(profile)) => HttpResponse::Ok().json(profile),
            Ok(None) => HttpResponse::NotFound().body("Account not found"),
            Err(e) => {
                eprintln!("Failed to fetch profile: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to fetch profile")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Update Profile Request
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub organization_name: Option<String>,
    pub address: Option<String>,
    pub bio: Option<String>,
    pub location: Option<Location>,
}

//Update My Profile
//Update My Profile Input: HttpRequest(Session), UpdateProfileRequest
//Update My Profile Output: UserProfile
pub async fn update_my_profile(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        if let Some(display_name) = &payload.display_name {
            if display_name.trim().is_empty() {
                return HttpResponse::BadRequest().body("Display name cannot be empty");
            }
        }

        let query = format!(
            "
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                phone = COALESCE($3, phone),
                organization_name = COALESCE($4, organization_name),
                address = COALESCE($5, address),
                bio = COALESCE($6, bio),
                location = COALESCE($7, location)
            WHERE user_id = $1
            RETURNING {}",
            PROFILE_COLUMNS
        );

        let result = sqlx::query_as::<_, UserProfile>(&query)
            .bind(claims.id)
            .bind(&payload.display_name)
            .bind(&payload.phone)
            .bind(&payload.organization_name)
            .bind(&payload.address)
            .bind(&payload.bio)
            .bind(payload.location.clone().map(Json))
            .fetch_one(pool.get_ref())
            .await;

        match result {
            Ok(profile) => HttpResponse::Ok().json(profile),
            Err(e) => {
                eprintln!("Failed to update profile: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to update profile")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Upload Avatar
//Upload Avatar Input: HttpRequest(Session), Multipart (single image)
//Upload Avatar Output: { avatar_url }
pub async fn upload_avatar(
    pool: web::Data<PgPool>,
    storage: web::Data<StorageClient>,
    req: HttpRequest,
    mut payload: Multipart,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };

    let mut field = match payload.next().await {
        Some(Ok(field)) => field,
        Some(Err(e)) => {
            eprintln!("Malformed multipart field: {:?}", e);
            return HttpResponse::BadRequest().body("Malformed upload");
        }
        None => return HttpResponse::BadRequest().body("No file provided"),
    };

    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or("avatar")
        .to_string();

    let mut data: Vec<u8> = Vec::new();
    while let Some(chunk) = field.next().await {
        match chunk {
            Ok(bytes) => data.extend_from_slice(&bytes),
            Err(e) => {
                eprintln!("Failed to read avatar upload: {:?}", e);
                return HttpResponse::BadRequest().body("Malformed upload");
            }
        }
    }
    if data.is_empty() {
        return HttpResponse::BadRequest().body("No file provided");
    }

    let content_type = mime_guess::from_path(&file_name)
        .first_or(mime::IMAGE_PNG)
        .to_string();
    let object_name = storage::avatar_path(&claims.id, &file_name);

    let avatar_url = match storage.upload_file(&data, &object_name, &content_type).await {
        Ok(url) => url,
        Err(e) => {
            eprintln!("Failed to upload avatar: {:?}", e);
            return HttpResponse::InternalServerError().body("Failed to upload avatar");
        }
    };

    // Replace the previous avatar object if the file name changed
    let old_url: Option<String> =
        sqlx::query_scalar("SELECT avatar_url FROM users WHERE user_id = $1")
            .bind(claims.id)
            .fetch_optional(pool.get_ref())
            .await
            .unwrap_or(None);

    if let Err(e) = sqlx::query("UPDATE users SET avatar_url = $2 WHERE user_id = $1")
        .bind(claims.id)
        .bind(&avatar_url)
        .execute(pool.get_ref())
        .await
    {
        eprintln!("Failed to store avatar url: {:?}", e);
        return HttpResponse::InternalServerError().body("Failed to update avatar");
    }

    if let Some(old_url) = old_url {
        if old_url != avatar_url {
            if let Some(old_object) = storage::object_name_from_url(&old_url) {
                if let Err(e) = storage.delete_file(old_object).await {
                    eprintln!("Failed to delete old avatar {}: {:?}", old_object, e);
                }
            }
        }
    }

    HttpResponse::Ok().json(serde_json::json!({ "avatar_url": avatar_url }))
}

//Public User
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PublicUser {
    pub user_id: Uuid,
    pub display_name: String,
    pub role: UserRole,
    pub organization_name: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
}

//Get User
//Get User Input: HttpRequest(Session), Path (/users/{user_id})
//Get User Output: PublicUser
pub async fn get_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    if req.extensions().get::<Claims>().is_none() {
        return HttpResponse::Unauthorized().body("Authentication required");
    }

    let query = "
        SELECT user_id, display_name, role, organization_name, avatar_url, bio
        FROM users WHERE user_id = $1
    ";
    match sqlx::query_as::<_, PublicUser>(query)
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(user),
        Ok(None) => HttpResponse::NotFound().body("User not found"),
        Err(e) => {
            eprintln!("Failed to fetch user: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch user")
        }
    }
}

//Config User Data Routes
// GET /users/me
// PUT /users/me
// POST /users/me/avatar
// GET /users/{user_id}
pub fn config_user_data_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/me", web::get().to(get_my_profile))
            .route("/me", web::put().to(update_my_profile))
            .route("/me/avatar", web::post().to(upload_avatar))
            .route("/{user_id}", web::get().to(get_user)),
    );
}

use crate::handlers::auth::{generate_jwt, Claims};
use crate::handlers::password::{hash_password, verify_password};
use crate::models::all_models::{AccountStatus, UserRole};
use actix_identity::Identity;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::to_string;
use sqlx::PgPool;
use uuid::Uuid;

//Register Request
#[derive(Deserialize, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub organization_name: Option<String>,
    pub address: Option<String>,
}

//Registered User Response
#[derive(sqlx::FromRow, Serialize)]
pub struct RegisteredUserResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: String,
    pub email_verification_token: Option<Uuid>,
}

//Register
//Register Input: RegisterRequest
//Register Output: RegisteredUserResponse
//Accounts start unverified; the admin role is never self-assignable.
pub async fn register(
    pool: web::Data<PgPool>,
    payload: web::Json<RegisterRequest>,
) -> impl Responder {
    if payload.role == UserRole::Admin {
        return HttpResponse::BadRequest().body("Cannot register an admin account");
    }
    if payload.display_name.trim().is_empty() {
        return HttpResponse::BadRequest().body("Display name is required");
    }
    if !payload.email.contains('@') {
        return HttpResponse::BadRequest().body("A valid email is required");
    }
    if payload.password.len() < 8 {
        return HttpResponse::BadRequest().body("Password must be at least 8 characters");
    }

    let email_taken =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&payload.email)
            .fetch_one(pool.get_ref())
            .await;

    match email_taken {
        Ok(true) => return HttpResponse::Conflict().body("Email is already registered"),
        Ok(false) => {}
        Err(e) => {
            eprintln!("Failed to check email: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(_) => return HttpResponse::InternalServerError().body("Failed to hash password"),
    };

    let avatar_url = format!(
        "https://ui-avatars.com/api/?name={}&background={:06x}",
        payload.display_name.replace(' ', "+"),
        rand::random::<u32>() & 0xFFFFFF
    );

    let query = "
        INSERT INTO users
            (email, password_hash, display_name, role, phone, organization_name, address,
             avatar_url, email_verified, email_verification_token)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false, $9)
        RETURNING user_id, display_name, avatar_url, email_verification_token
    ";

    let result = sqlx::query_as::<_, RegisteredUserResponse>(query)
        .bind(&payload.email)
        .bind(password_hash)
        .bind(&payload.display_name)
        .bind(payload.role)
        .bind(&payload.phone)
        .bind(&payload.organization_name)
        .bind(&payload.address)
        .bind(&avatar_url)
        .bind(Uuid::new_v4())
        .fetch_one(pool.get_ref())
        .await;

    match result {
        Ok(record) => HttpResponse::Created().json(record),
        Err(e) => {
            eprintln!("Database error: {:?}", e);
            HttpResponse::InternalServerError().body("Error creating user")
        }
    }
}

//Verify Email
//Verify Email Input: Path (/verify-email/{token})
//Verify Email Output: Success message
pub async fn verify_email(pool: web::Data<PgPool>, path: web::Path<Uuid>) -> impl Responder {
    let token = path.into_inner();
    let query = "
        UPDATE users
        SET email_verified = true, email_verification_token = NULL
        WHERE email_verification_token = $1
        RETURNING user_id
    ";

    match sqlx::query_scalar::<_, Uuid>(query)
        .bind(token)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(_)) => HttpResponse::Ok().body("Email verified. You can sign in now."),
        Ok(None) => HttpResponse::BadRequest().body("Invalid or expired verification token"),
        Err(e) => {
            eprintln!("Failed to verify email: {:?}", e);
            HttpResponse::InternalServerError().body("Database error")
        }
    }
}

//Login Request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

//User Auth
#[derive(sqlx::FromRow)]
struct UserAuth {
    pub user_id: Uuid,
    pub display_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub role: UserRole,
    pub account_status: AccountStatus,
    pub email_verified: bool,
}

//Login Response
#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: String,
    pub role: UserRole,
    pub token: String,
}

//Login
//Login Input: LoginRequest
//Login Output: LoginResponse (session cookie + JWT for the websocket)
pub async fn login(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    let query = "
        SELECT user_id, display_name, password_hash, avatar_url, role, account_status, email_verified
        FROM users WHERE email = $1
    ";

    let user = match sqlx::query_as::<_, UserAuth>(query)
        .bind(&payload.email)
        .fetch_optional(pool.get_ref())
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::Unauthorized().body("Invalid email or password"),
        Err(e) => {
            eprintln!("Database error: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        return HttpResponse::Unauthorized().body("Invalid email or password");
    }

    if user.account_status == AccountStatus::Banned {
        return HttpResponse::Forbidden().body("Account is banned");
    }

    if !user.email_verified {
        return HttpResponse::Forbidden().body("Email not verified");
    }

    let claims = Claims {
        id: user.user_id,
        display_name: user.display_name.clone(),
        role: user.role,
        exp: (Utc::now().timestamp() as usize) + 8 * 60 * 60,
    };

    let claims_str = match to_string(&claims) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to serialize claims: {:?}", e);
            return HttpResponse::InternalServerError().body("Login failed");
        }
    };

    if let Err(e) = Identity::login(&req.extensions(), claims_str) {
        eprintln!("Failed to create session: {:?}", e);
        return HttpResponse::InternalServerError().body("Login failed");
    }

    let token = match generate_jwt(user.user_id, user.display_name.clone(), user.role) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Failed to generate token: {:?}", e);
            return HttpResponse::InternalServerError().body("Login failed");
        }
    };

    HttpResponse::Ok().json(LoginResponse {
        user_id: user.user_id,
        display_name: user.display_name,
        avatar_url: user.avatar_url,
        role: user.role,
        token,
    })
}

//Logout
//Logout Input: HttpRequest(Session)
//Logout Output: Success message
pub async fn logout(identity: Identity) -> impl Responder {
    identity.logout();
    HttpResponse::Ok().body("Logged out")
}

//Current User
//Current User Input: HttpRequest(Session)
//Current User Output: Claims
pub async fn current_user(req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        HttpResponse::Ok().json(claims.clone())
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Config User Auth Routes (public)
// POST /auth/register
// GET /auth/verify-email/{token}
// POST /auth/login
pub fn config_user_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/verify-email/{token}", web::get().to(verify_email))
            .route("/login", web::post().to(login)),
    );
}

//Config Protected Auth Routes
// POST /auth/logout
// GET /auth/me
pub fn config_protected_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(current_user)),
    );
}

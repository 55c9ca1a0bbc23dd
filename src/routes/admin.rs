use crate::handlers::auth::Claims;
use crate::handlers::moderation;
use crate::handlers::notify::notify;
use crate::models::all_models::{AccountStatus, Complaint, NotificationKind, UserRole};
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

//Admin Action Response
#[derive(Debug, Deserialize, Serialize)]
pub struct AdminActionResponse {
    pub success: bool,
    pub message: String,
}

//Suspend User Request
#[derive(Debug, Deserialize, Serialize)]
pub struct SuspendUserRequest {
    pub user_id: Uuid,
    pub suspension_days: i32,
    pub reason: String,
}

//Ban User Request
#[derive(Debug, Deserialize, Serialize)]
pub struct BanUserRequest {
    pub user_id: Uuid,
    pub reason: String,
}

//Reactivate User Request
#[derive(Debug, Deserialize, Serialize)]
pub struct ReactivateUserRequest {
    pub user_id: Uuid,
}

//Warn User Request
#[derive(Debug, Deserialize, Serialize)]
pub struct WarnUserRequest {
    pub user_id: Uuid,
    pub reason: String,
}

//Resolve Complaint Request
#[derive(Debug, Deserialize, Serialize)]
pub struct ResolveComplaintRequest {
    pub complaint_id: Uuid,
}

//Get Admin Stats Response
#[derive(Debug, Serialize)]
pub struct GetAdminStatsResponse {
    pub total_users: i64,
    pub pending_donations: i64,
    pub completed_donations: i64,
    pub pending_complaints: i64,
    pub suspended_users: i64,
    pub banned_users: i64,
}

//Ensure Admin Helper Function
//The admin check is a server-verified role claim, never a client-supplied
//flag or allow-list.
async fn ensure_admin(req: &HttpRequest) -> Result<Claims, HttpResponse> {
    if let Some(claims) = req.extensions().get::<Claims>() {
        if claims.role == UserRole::Admin {
            Ok(claims.clone())
        } else {
            Err(HttpResponse::Forbidden().body("Admin access required"))
        }
    } else {
        Err(HttpResponse::Unauthorized().body("Authentication required"))
    }
}

//Fetch Account Status Helper Function
async fn fetch_account_status(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(String, AccountStatus), HttpResponse> {
    let query = "SELECT display_name, account_status FROM users WHERE user_id = $1";
    match sqlx::query_as::<_, (String, AccountStatus)>(query)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
    {
        Ok(Some(row)) => Ok(row),
        Ok(None) => Err(HttpResponse::NotFound().body("User not found")),
        Err(e) => {
            eprintln!("Failed to fetch account status: {:?}", e);
            Err(HttpResponse::InternalServerError().body("Database error"))
        }
    }
}

//Log Admin Action Helper Function
//The audit trail is best-effort: a failed insert never aborts the action.
async fn log_admin_action(
    tx: &mut Transaction<'_, Postgres>,
    admin_id: Uuid,
    user_id: Uuid,
    action_type: &str,
    reason: &str,
) {
    let query = "
        INSERT INTO admin_actions (action_id, admin_id, user_id, action_type, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
    ";
    if let Err(e) = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(admin_id)
        .bind(user_id)
        .bind(action_type)
        .bind(reason)
        .bind(Utc::now().naive_utc())
        .execute(&mut **tx)
        .await
    {
        eprintln!("Failed to log admin action: {:?}", e);
        // Continue even if logging fails
    }
}

//Suspend User
//Suspend User Input: HttpRequest(Session), SuspendUserRequest
//Suspend User Output: AdminActionResponse
//Suspension always carries a deadline in the future; banned accounts cannot
//be suspended (banned is terminal).
pub async fn suspend_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<SuspendUserRequest>,
) -> impl Responder {
    let admin = match ensure_admin(&req).await {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if payload.reason.trim().is_empty() {
        return HttpResponse::BadRequest().body("Reason cannot be empty");
    }
    if payload.suspension_days < 1 {
        return HttpResponse::BadRequest().body("Suspension must be at least one day");
    }

    let suspended_until: NaiveDateTime = (Utc::now()
        + chrono::Duration::days(payload.suspension_days as i64))
    .naive_utc();

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let (display_name, current) = match fetch_account_status(&mut tx, payload.user_id).await {
        Ok(row) => row,
        Err(response) => {
            let _ = tx.rollback().await;
            return response;
        }
    };

    if !moderation::admin_transition_allowed(current, AccountStatus::Suspended) {
        let _ = tx.rollback().await;
        return HttpResponse::BadRequest()
            .body(format!("Cannot suspend an account that is {}", current));
    }

    let update_query = "
        UPDATE users
        SET account_status = 'suspended', suspended_until = $2
        WHERE user_id = $1
    ";
    if let Err(e) = sqlx::query(update_query)
        .bind(payload.user_id)
        .bind(suspended_until)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to suspend user: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to suspend user");
    }

    log_admin_action(&mut tx, admin.id, payload.user_id, "suspend", &payload.reason).await;

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    notify(
        pool.get_ref(),
        payload.user_id,
        "Account suspended",
        &format!(
            "Your account is suspended until {}. Reason: {}",
            suspended_until.format("%Y-%m-%d %H:%M"),
            payload.reason
        ),
        NotificationKind::Warning,
    )
    .await;

    HttpResponse::Ok().json(AdminActionResponse {
        success: true,
        message: format!("User {} suspended until {}", display_name, suspended_until),
    })
}

//Ban User
//Ban User Input: HttpRequest(Session), BanUserRequest
//Ban User Output: AdminActionResponse
pub async fn ban_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<BanUserRequest>,
) -> impl Responder {
    let admin = match ensure_admin(&req).await {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if payload.reason.trim().is_empty() {
        return HttpResponse::BadRequest().body("Reason cannot be empty");
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let (display_name, current) = match fetch_account_status(&mut tx, payload.user_id).await {
        Ok(row) => row,
        Err(response) => {
            let _ = tx.rollback().await;
            return response;
        }
    };

    if !moderation::admin_transition_allowed(current, AccountStatus::Banned) {
        let _ = tx.rollback().await;
        return HttpResponse::BadRequest().body("User is already banned");
    }

    let update_query = "
        UPDATE users
        SET account_status = 'banned', suspended_until = NULL
        WHERE user_id = $1
    ";
    if let Err(e) = sqlx::query(update_query)
        .bind(payload.user_id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to ban user: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to ban user");
    }

    log_admin_action(&mut tx, admin.id, payload.user_id, "ban", &payload.reason).await;

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    notify(
        pool.get_ref(),
        payload.user_id,
        "Account banned",
        &format!("Your account has been banned. Reason: {}", payload.reason),
        NotificationKind::Error,
    )
    .await;

    HttpResponse::Ok().json(AdminActionResponse {
        success: true,
        message: format!("User {} banned permanently", display_name),
    })
}

//Reactivate User
//Reactivate User Input: HttpRequest(Session), ReactivateUserRequest
//Reactivate User Output: AdminActionResponse
//Only suspended accounts can be reactivated; lifting a ban is out-of-band.
pub async fn reactivate_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<ReactivateUserRequest>,
) -> impl Responder {
    let admin = match ensure_admin(&req).await {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let (display_name, current) = match fetch_account_status(&mut tx, payload.user_id).await {
        Ok(row) => row,
        Err(response) => {
            let _ = tx.rollback().await;
            return response;
        }
    };

    if !moderation::admin_transition_allowed(current, AccountStatus::Active) {
        let _ = tx.rollback().await;
        let message = if current == AccountStatus::Banned {
            "Banned accounts cannot be reactivated"
        } else {
            "User is already active"
        };
        return HttpResponse::BadRequest().body(message);
    }

    let update_query = "
        UPDATE users
        SET account_status = 'active', suspended_until = NULL
        WHERE user_id = $1
    ";
    if let Err(e) = sqlx::query(update_query)
        .bind(payload.user_id)
        .execute(&mut *tx)
        .await
    {
        eprintln!("Failed to reactivate user: {:?}", e);
        let _ = tx.rollback().await;
        return HttpResponse::InternalServerError().body("Failed to reactivate user");
    }

    log_admin_action(&mut tx, admin.id, payload.user_id, "reactivate", "Suspension lifted").await;

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    notify(
        pool.get_ref(),
        payload.user_id,
        "Account reactivated",
        "Your account is active again.",
        NotificationKind::Success,
    )
    .await;

    HttpResponse::Ok().json(AdminActionResponse {
        success: true,
        message: format!("User {} reactivated", display_name),
    })
}

//Warn User
//Warn User Input: HttpRequest(Session), WarnUserRequest
//Warn User Output: AdminActionResponse (includes new warning count)
pub async fn warn_user(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<WarnUserRequest>,
) -> impl Responder {
    let admin = match ensure_admin(&req).await {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if payload.reason.trim().is_empty() {
        return HttpResponse::BadRequest().body("Reason cannot be empty");
    }

    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            eprintln!("Failed to start transaction: {:?}", e);
            return HttpResponse::InternalServerError().body("Database error");
        }
    };

    let update_query = "
        UPDATE users
        SET warning_count = warning_count + 1
        WHERE user_id = $1
        RETURNING warning_count
    ";
    let warning_count = match sqlx::query_scalar::<_, i32>(update_query)
        .bind(payload.user_id)
        .fetch_optional(&mut *tx)
        .await
    {
        Ok(Some(count)) => count,
        Ok(None) => {
            let _ = tx.rollback().await;
            return HttpResponse::NotFound().body("User not found");
        }
        Err(e) => {
            eprintln!("Failed to warn user: {:?}", e);
            let _ = tx.rollback().await;
            return HttpResponse::InternalServerError().body("Failed to warn user");
        }
    };

    log_admin_action(&mut tx, admin.id, payload.user_id, "warn", &payload.reason).await;

    if let Err(e) = tx.commit().await {
        eprintln!("Failed to commit transaction: {:?}", e);
        return HttpResponse::InternalServerError().body("Database error");
    }

    notify(
        pool.get_ref(),
        payload.user_id,
        "Warning issued",
        &format!("You have received a warning: {}", payload.reason),
        NotificationKind::Warning,
    )
    .await;

    HttpResponse::Ok().json(AdminActionResponse {
        success: true,
        message: format!("Warning recorded ({} total)", warning_count),
    })
}

//Get Pending Complaints
//Get Pending Complaints Input: HttpRequest(Session)
//Get Pending Complaints Output: Vec<Complaint>
pub async fn get_pending_complaints(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Err(response) = ensure_admin(&req).await {
        return response;
    }

    let query = "
        SELECT complaint_id, ngo_id, volunteer_id, volunteer_name, donation_id, reason,
               status, resolved_by, resolved_at, created_at
        FROM complaints
        WHERE status = 'pending'
        ORDER BY created_at DESC
    ";
    match sqlx::query_as::<_, Complaint>(query)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(complaints) => HttpResponse::Ok().json(complaints),
        Err(e) => {
            eprintln!("Failed to fetch complaints: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch complaints")
        }
    }
}

//Resolve Complaint
//Resolve Complaint Input: HttpRequest(Session), ResolveComplaintRequest
//Resolve Complaint Output: Complaint
pub async fn resolve_complaint(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<ResolveComplaintRequest>,
) -> impl Responder {
    let admin = match ensure_admin(&req).await {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = "
        UPDATE complaints
        SET status = 'resolved', resolved_by = $2, resolved_at = NOW()
        WHERE complaint_id = $1 AND status = 'pending'
        RETURNING complaint_id, ngo_id, volunteer_id, volunteer_name, donation_id, reason,
                  status, resolved_by, resolved_at, created_at
    ";
    let result = sqlx::query_as::<_, Complaint>(query)
        .bind(payload.complaint_id)
        .bind(admin.id)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(complaint)) => {
            notify(
                pool.get_ref(),
                complaint.ngo_id,
                "Complaint resolved",
                &format!(
                    "Your complaint about {} has been reviewed and resolved.",
                    complaint.volunteer_name
                ),
                NotificationKind::Info,
            )
            .await;
            HttpResponse::Ok().json(complaint)
        }
        Ok(None) => HttpResponse::Conflict().body("Complaint not found or already resolved"),
        Err(e) => {
            eprintln!("Failed to resolve complaint: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to resolve complaint")
        }
    }
}

//Moderated User
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ModeratedUser {
    pub user_id: Uuid,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    pub account_status: AccountStatus,
    pub suspended_until: Option<NaiveDateTime>,
    pub warning_count: i32,
    pub created_at: NaiveDateTime,
}

//Get Users By Role
//Get Users By Role Input: HttpRequest(Session), Path (/admin/users/{role})
//Get Users By Role Output: Vec<ModeratedUser>
pub async fn get_users_by_role(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<UserRole>,
) -> impl Responder {
    if let Err(response) = ensure_admin(&req).await {
        return response;
    }

    let query = "
        SELECT user_id, display_name, email, role, account_status, suspended_until,
               warning_count, created_at
        FROM users
        WHERE role = $1
        ORDER BY created_at DESC
    ";
    match sqlx::query_as::<_, ModeratedUser>(query)
        .bind(path.into_inner())
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => {
            eprintln!("Failed to fetch users: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch users")
        }
    }
}

//Get Admin Stats
//Get Admin Stats Input: HttpRequest(Session)
//Get Admin Stats Output: GetAdminStatsResponse
pub async fn get_admin_stats(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Err(response) = ensure_admin(&req).await {
        return response;
    }

    let counts: Result<(i64, i64, i64, i64, i64, i64), sqlx::Error> = sqlx::query_as(
        "
        SELECT
            (SELECT COUNT(*) FROM users),
            (SELECT COUNT(*) FROM donations WHERE status = 'pending'),
            (SELECT COUNT(*) FROM donations WHERE status = 'completed'),
            (SELECT COUNT(*) FROM complaints WHERE status = 'pending'),
            (SELECT COUNT(*) FROM users WHERE account_status = 'suspended'),
            (SELECT COUNT(*) FROM users WHERE account_status = 'banned')
        ",
    )
    .fetch_one(pool.get_ref())
    .await;

    match counts {
        Ok((
            total_users,
            pending_donations,
            completed_donations,
            pending_complaints,
            suspended_users,
            banned_users,
        )) => HttpResponse::Ok().json(GetAdminStatsResponse {
            total_users,
            pending_donations,
            completed_donations,
            pending_complaints,
            suspended_users,
            banned_users,
        }),
        Err(e) => {
            eprintln!("Failed to fetch admin stats: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch admin stats")
        }
    }
}

//Config Admin Routes
// GET /admin/complaints/pending
// POST /admin/complaints/resolve
// POST /admin/users/suspend
// POST /admin/users/ban
// POST /admin/users/reactivate
// POST /admin/users/warn
// GET /admin/users/{role}
// GET /admin/stats
pub fn config_admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            // Complaint routes
            .route("/complaints/pending", web::get().to(get_pending_complaints))
            .route("/complaints/resolve", web::post().to(resolve_complaint))
            // User management routes
            .route("/users/suspend", web::post().to(suspend_user))
            .route("/users/ban", web::post().to(ban_user))
            .route("/users/reactivate", web::post().to(reactivate_user))
            .route("/users/warn", web::post().to(warn_user))
            .route("/users/{role}", web::get().to(get_users_by_role))
            // Admin dashboard routes
            .route("/stats", web::get().to(get_admin_stats)),
    );
}

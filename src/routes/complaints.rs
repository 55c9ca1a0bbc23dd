use crate::handlers::moderation::ensure_account_active;
use crate::handlers::ws;
use crate::models::all_models::{Complaint, UserRole};
use crate::routes::donations::ensure_role;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

//Create Complaint Request
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateComplaintRequest {
    pub volunteer_id: Uuid,
    pub donation_id: Uuid,
    pub reason: String,
}

//Create Complaint
//Create Complaint Input: HttpRequest(Session), CreateComplaintRequest
//Create Complaint Output: Complaint
//An NGO reports a volunteer over a donation it accepted. Only an
//administrator can resolve the complaint afterwards.
pub async fn create_complaint(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<CreateComplaintRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    if payload.reason.trim().is_empty() {
        return HttpResponse::BadRequest().body("Reason cannot be empty");
    }

    // The reported user must be a volunteer
    let volunteer_name: Option<String> = match sqlx::query_scalar(
        "SELECT display_name FROM users WHERE user_id = $1 AND role = 'volunteer'",
    )
    .bind(payload.volunteer_id)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(name) => name,
        Err(e) => {
            eprintln!("Error checking volunteer: {:?}", e);
            return HttpResponse::InternalServerError().body("Error validating volunteer");
        }
    };

    let volunteer_name = match volunteer_name {
        Some(name) => name,
        None => return HttpResponse::BadRequest().body("Reported volunteer does not exist"),
    };

    // The complaint must reference a donation this NGO accepted
    let donation_ok = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM donations WHERE donation_id = $1 AND accepted_by = $2)",
    )
    .bind(payload.donation_id)
    .bind(claims.id)
    .fetch_one(pool.get_ref())
    .await;

    match donation_ok {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::BadRequest()
                .body("Complaint must reference a donation accepted by this NGO");
        }
        Err(e) => {
            eprintln!("Error checking donation: {:?}", e);
            return HttpResponse::InternalServerError().body("Error validating donation");
        }
    }

    let query = "
        INSERT INTO complaints (ngo_id, volunteer_id, volunteer_name, donation_id, reason, status)
        VALUES ($1, $2, $3, $4, $5, 'pending')
        RETURNING complaint_id, ngo_id, volunteer_id, volunteer_name, donation_id, reason,
                  status, resolved_by, resolved_at, created_at
    ";

    let result = sqlx::query_as::<_, Complaint>(query)
        .bind(claims.id)
        .bind(payload.volunteer_id)
        .bind(&volunteer_name)
        .bind(payload.donation_id)
        .bind(&payload.reason)
        .fetch_one(pool.get_ref())
        .await;

    match result {
        Ok(complaint) => {
            let event = json!({
                "type": "complaint_filed",
                "payload": { "complaint_id": complaint.complaint_id }
            });
            let _ = ws::send_to_role(&UserRole::Admin, event).await;

            HttpResponse::Created().json(complaint)
        }
        Err(e) => {
            eprintln!("Error creating complaint: {:?}", e);
            HttpResponse::InternalServerError().body("Error creating complaint")
        }
    }
}

//Get My Complaints
//Get My Complaints Input: HttpRequest(Session)
//Get My Complaints Output: Vec<Complaint>
pub async fn get_my_complaints(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = "
        SELECT complaint_id, ngo_id, volunteer_id, volunteer_name, donation_id, reason,
               status, resolved_by, resolved_at, created_at
        FROM complaints
        WHERE ngo_id = $1
        ORDER BY created_at DESC
    ";
    match sqlx::query_as::<_, Complaint>(query)
        .bind(claims.id)
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

//Config Complaint Routes
// POST /complaints/new
// GET /complaints/mine
pub fn config_complaint_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/complaints")
            .route("/new", web::post().to(create_complaint))
            .route("/mine", web::get().to(get_my_complaints)),
    );
}

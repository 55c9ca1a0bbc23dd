use crate::handlers::geo;
use crate::handlers::lifecycle::{self, LifecycleError};
use crate::handlers::moderation::ensure_account_active;
use crate::handlers::notify::notify;
use crate::handlers::ws;
use crate::models::all_models::{
    DeliveryStatus, Donation, Location, NotificationKind, UserRole,
};
use crate::routes::donations::{
    ensure_role, fetch_donation, lifecycle_error_response, DONATION_COLUMNS,
};
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

//State Conflict Response
//A lost race or stale view: answer with the refetched row so the client
//refreshes instead of blindly retrying an operation that can never succeed.
fn state_conflict_response(err: &LifecycleError, current: &Donation) -> HttpResponse {
    match err {
        LifecycleError::AlreadyAccepted
        | LifecycleError::AlreadyAssigned
        | LifecycleError::IllegalTransition { .. }
        | LifecycleError::IllegalDeliveryTransition { .. } => HttpResponse::Conflict().json(json!({
            "error": err.to_string(),
            "donation": current
        })),
        _ => lifecycle_error_response(err),
    }
}

//Get Available Donations
//Get Available Donations Input: HttpRequest(Session)
//Get Available Donations Output: Vec<Donation> (pending, nearest first when
//the NGO has a stored location)
pub async fn get_available_donations(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = format!(
        "SELECT {} FROM donations WHERE status = 'pending' ORDER BY created_at DESC",
        DONATION_COLUMNS
    );
    let mut donations = match sqlx::query_as::<_, Donation>(&query)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(donations) => donations,
        Err(e) => {
            eprintln!("Failed to fetch available donations: {:?}", e);
            return HttpResponse::InternalServerError().body("Failed to fetch donations");
        }
    };

    let ngo_location: Option<Json<Location>> =
        match sqlx::query_scalar("SELECT location FROM users WHERE user_id = $1")
            .bind(claims.id)
            .fetch_one(pool.get_ref())
            .await
        {
            Ok(location) => location,
            Err(e) => {
                eprintln!("Failed to fetch NGO location: {:?}", e);
                None
            }
        };

    if let Some(Json(ngo_location)) = ngo_location {
        donations.sort_by(|a, b| {
            let da = geo::distance_meters(&ngo_location, &a.location);
            let db = geo::distance_meters(&ngo_location, &b.location);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    HttpResponse::Ok().json(donations)
}

//Accept Donation Request
#[derive(Debug, Deserialize, Serialize)]
pub struct AcceptDonationRequest {
    pub donation_id: Uuid,
}

//Accept Donation
//Accept Donation Input: HttpRequest(Session), AcceptDonationRequest
//Accept Donation Output: Donation
//The accept is a single conditional update keyed on status='pending': among
//concurrent acceptors exactly one row-updating winner exists, everyone else
//observes zero rows and loses the race.
pub async fn accept_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<AcceptDonationRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    // NGO contact details are stamped onto the donation for the donor
    let profile: Option<(String, Option<String>, Option<String>, Option<String>)> =
        match sqlx::query_as(
            "SELECT display_name, organization_name, phone, address FROM users WHERE user_id = $1",
        )
        .bind(claims.id)
        .fetch_optional(pool.get_ref())
        .await
        {
            Ok(row) => row,
            Err(e) => {
                eprintln!("Failed to fetch NGO profile: {:?}", e);
                return HttpResponse::InternalServerError().body("Database error");
            }
        };

    let (display_name, organization_name, phone, address) = match profile {
        Some(row) => row,
        None => return HttpResponse::Unauthorized().body("Account not found"),
    };
    let ngo_name = organization_name.unwrap_or(display_name);

    let update_query = format!(
        "
        UPDATE donations
        SET status = 'accepted',
            accepted_by = $2,
            accepted_by_name = $3,
            accepted_by_phone = $4,
            accepted_by_address = $5,
            delivery_status = 'none',
            updated_at = NOW()
        WHERE donation_id = $1 AND status = 'pending'
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(payload.donation_id)
        .bind(claims.id)
        .bind(&ngo_name)
        .bind(&phone)
        .bind(&address)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            notify(
                pool.get_ref(),
                donation.donor_id,
                "Donation accepted",
                &format!("\"{}\" was accepted by {}.", donation.title, ngo_name),
                NotificationKind::Success,
            )
            .await;
            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            // Lost the race or the donation left pending some other way
            let current = match fetch_donation(pool.get_ref(), payload.donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            state_conflict_response(&lifecycle::accept_conflict(current.status), &current)
        }
        Err(e) => {
            eprintln!("Failed to accept donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to accept donation")
        }
    }
}

//Request Pickup Request
#[derive(Debug, Deserialize, Serialize)]
pub struct RequestPickupRequest {
    pub donation_id: Uuid,
}

//Request Pickup
//Request Pickup Input: HttpRequest(Session), RequestPickupRequest
//Request Pickup Output: Donation
//Moves the delivery sub-state from none to available_for_pickup, putting the
//donation in front of the volunteer pool.
pub async fn request_pickup(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<RequestPickupRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let update_query = format!(
        "
        UPDATE donations
        SET delivery_status = 'available_for_pickup', updated_at = NOW()
        WHERE donation_id = $1
          AND accepted_by = $2
          AND status = 'accepted'
          AND delivery_status = 'none'
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(payload.donation_id)
        .bind(claims.id)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            let event = json!({
                "type": "delivery_available",
                "payload": {
                    "donation_id": donation.donation_id,
                    "title": donation.title,
                    "pickup_address": donation.location.address
                }
            });
            let _ = ws::send_to_role(&UserRole::Volunteer, event).await;

            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), payload.donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.accepted_by != Some(claims.id) {
                return HttpResponse::Forbidden()
                    .body("Only the accepting NGO can request a pickup");
            }
            let err = lifecycle::check_delivery_transition(
                current.delivery_status,
                DeliveryStatus::AvailableForPickup,
            )
            .unwrap_err();
            state_conflict_response(&err, &current)
        }
        Err(e) => {
            eprintln!("Failed to request pickup: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to request pickup")
        }
    }
}

//Get Available Deliveries
//Get Available Deliveries Input: HttpRequest(Session)
//Get Available Deliveries Output: Vec<Donation> (awaiting a volunteer)
pub async fn get_available_deliveries(
    pool: web::Data<PgPool>,
    req: HttpRequest,
) -> impl Responder {
    if let Err(response) = ensure_role(&req, UserRole::Volunteer) {
        return response;
    }

    let query = format!(
        "
        SELECT {} FROM donations
        WHERE status = 'accepted' AND delivery_status = 'available_for_pickup'
        ORDER BY updated_at DESC",
        DONATION_COLUMNS
    );
    match sqlx::query_as::<_, Donation>(&query)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(donations) => HttpResponse::Ok().json(donations),
        Err(e) => {
            eprintln!("Failed to fetch available deliveries: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch deliveries")
        }
    }
}

//Get My Deliveries
//Get My Deliveries Input: HttpRequest(Session)
//Get My Deliveries Output: Vec<Donation> (assigned to the caller)
pub async fn get_my_deliveries(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Volunteer) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = format!(
        "SELECT {} FROM donations WHERE volunteer_id = $1 ORDER BY updated_at DESC",
        DONATION_COLUMNS
    );
    match sqlx::query_as::<_, Donation>(&query)
        .bind(claims.id)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(donations) => HttpResponse::Ok().json(donations),
        Err(e) => {
            eprintln!("Failed to fetch volunteer deliveries: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch deliveries")
        }
    }
}

//Claim Delivery Request
#[derive(Debug, Deserialize, Serialize)]
pub struct ClaimDeliveryRequest {
    pub donation_id: Uuid,
}

//Claim Delivery
//Claim Delivery Input: HttpRequest(Session), ClaimDeliveryRequest
//Claim Delivery Output: Donation
//Exactly-one-volunteer: the update is conditioned on the pickup still being
//open and no volunteer being set, so concurrent claims produce one winner.
pub async fn claim_delivery(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<ClaimDeliveryRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Volunteer) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let profile: Option<(String, Option<String>)> =
        match sqlx::query_as("SELECT display_name, phone FROM users WHERE user_id = $1")
            .bind(claims.id)
            .fetch_optional(pool.get_ref())
            .await
        {
            Ok(row) => row,
            Err(e) => {
                eprintln!("Failed to fetch volunteer profile: {:?}", e);
                return HttpResponse::InternalServerError().body("Database error");
            }
        };

    let (volunteer_name, volunteer_phone) = match profile {
        Some(row) => row,
        None => return HttpResponse::Unauthorized().body("Account not found"),
    };

    let update_query = format!(
        "
        UPDATE donations
        SET delivery_status = 'assigned',
            volunteer_id = $2,
            volunteer_name = $3,
            volunteer_phone = $4,
            updated_at = NOW()
        WHERE donation_id = $1
          AND status = 'accepted'
          AND delivery_status = 'available_for_pickup'
          AND volunteer_id IS NULL
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(payload.donation_id)
        .bind(claims.id)
        .bind(&volunteer_name)
        .bind(&volunteer_phone)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            if let Some(ngo_id) = donation.accepted_by {
                notify(
                    pool.get_ref(),
                    ngo_id,
                    "Delivery assigned",
                    &format!("{} will deliver \"{}\".", volunteer_name, donation.title),
                    NotificationKind::Info,
                )
                .await;
            }
            notify(
                pool.get_ref(),
                donation.donor_id,
                "Delivery assigned",
                &format!("{} will pick up \"{}\".", volunteer_name, donation.title),
                NotificationKind::Info,
            )
            .await;
            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), payload.donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            state_conflict_response(&lifecycle::claim_conflict(current.delivery_status), &current)
        }
        Err(e) => {
            eprintln!("Failed to claim delivery: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to claim delivery")
        }
    }
}

//Update Delivery Status Request
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateDeliveryStatusRequest {
    pub donation_id: Uuid,
    pub status: DeliveryStatus,
}

//Update Delivery Status
//Update Delivery Status Input: HttpRequest(Session), UpdateDeliveryStatusRequest
//Update Delivery Status Output: Donation
//The assigned volunteer advances the chain one step at a time:
//assigned -> picked_up -> delivered.
pub async fn update_delivery_status(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<UpdateDeliveryStatusRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Volunteer) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let previous = match payload.status {
        DeliveryStatus::PickedUp => DeliveryStatus::Assigned,
        DeliveryStatus::Delivered => DeliveryStatus::PickedUp,
        other => {
            return HttpResponse::BadRequest()
                .body(format!("Volunteers cannot set delivery status to {}", other));
        }
    };

    let update_query = format!(
        "
        UPDATE donations
        SET delivery_status = $2, updated_at = NOW()
        WHERE donation_id = $1
          AND volunteer_id = $3
          AND status = 'accepted'
          AND delivery_status = $4
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(payload.donation_id)
        .bind(payload.status)
        .bind(claims.id)
        .bind(previous)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            let (title, message) = match payload.status {
                DeliveryStatus::PickedUp => (
                    "Donation picked up",
                    format!("\"{}\" has been picked up.", donation.title),
                ),
                _ => (
                    "Donation delivered",
                    format!("\"{}\" has been delivered.", donation.title),
                ),
            };
            if let Some(ngo_id) = donation.accepted_by {
                notify(pool.get_ref(), ngo_id, title, &message, NotificationKind::Info).await;
            }
            notify(
                pool.get_ref(),
                donation.donor_id,
                title,
                &message,
                NotificationKind::Info,
            )
            .await;
            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), payload.donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.volunteer_id != Some(claims.id) {
                return HttpResponse::Forbidden()
                    .body("Only the assigned volunteer can update this delivery");
            }
            let err =
                lifecycle::check_delivery_transition(current.delivery_status, payload.status)
                    .unwrap_err();
            state_conflict_response(&err, &current)
        }
        Err(e) => {
            eprintln!("Failed to update delivery status: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to update delivery status")
        }
    }
}

//Config Matching Routes
// GET /matching/available
// POST /matching/accept
// POST /matching/request-pickup
// GET /matching/deliveries/available
// GET /matching/deliveries/mine
// POST /matching/claim
// PUT /matching/delivery-status
pub fn config_matching_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/matching")
            .route("/available", web::get().to(get_available_donations))
            .route("/accept", web::post().to(accept_donation))
            .route("/request-pickup", web::post().to(request_pickup))
            .route(
                "/deliveries/available",
                web::get().to(get_available_deliveries),
            )
            .route("/deliveries/mine", web::get().to(get_my_deliveries))
            .route("/claim", web::post().to(claim_delivery))
            .route("/delivery-status", web::put().to(update_delivery_status)),
    );
}

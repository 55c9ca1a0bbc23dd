use crate::handlers::auth::Claims;
use crate::handlers::lifecycle::{self, DonationDraft, LifecycleError};
use crate::handlers::moderation::ensure_account_active;
use crate::handlers::notify::notify;
use crate::handlers::storage::{self, StorageClient};
use crate::handlers::ws;
use crate::models::all_models::{
    Donation, DonationStatus, Location, NotificationKind, UserRole,
};
use actix_multipart::Multipart;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDateTime;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub const DONATION_COLUMNS: &str = "
    donation_id, donor_id, donor_name, donor_phone, title, description, food_type,
    quantity, expiry_time, location, image_urls, contact_phone, country_code, status,
    accepted_by, accepted_by_name, accepted_by_phone, accepted_by_address,
    volunteer_id, volunteer_name, volunteer_phone, delivery_status, created_at, updated_at
";

//Lifecycle Error Response
//Maps the typed core errors onto HTTP statuses: validation failures are
//user-correctable (400), everything else is a state conflict (409).
pub fn lifecycle_error_response(err: &LifecycleError) -> HttpResponse {
    match err {
        LifecycleError::MissingField(_) | LifecycleError::TooManyImages => {
            HttpResponse::BadRequest().body(err.to_string())
        }
        _ => HttpResponse::Conflict().body(err.to_string()),
    }
}

//Ensure Role Helper Function
pub fn ensure_role(req: &HttpRequest, role: UserRole) -> Result<Claims, HttpResponse> {
    if let Some(claims) = req.extensions().get::<Claims>() {
        if claims.role == role {
            Ok(claims.clone())
        } else {
            Err(HttpResponse::Forbidden().body(format!("{} access required", role)))
        }
    } else {
        Err(HttpResponse::Unauthorized().body("Authentication required"))
    }
}

//Fetch Donation Helper Function
pub async fn fetch_donation(pool: &PgPool, donation_id: Uuid) -> Result<Donation, HttpResponse> {
    let query = format!("SELECT {} FROM donations WHERE donation_id = $1", DONATION_COLUMNS);
    match sqlx::query_as::<_, Donation>(&query)
        .bind(donation_id)
        .fetch_optional(pool)
        .await
    {
        Ok(Some(donation)) => Ok(donation),
        Ok(None) => Err(HttpResponse::NotFound().body("Donation not found")),
        Err(e) => {
            eprintln!("Failed to fetch donation: {:?}", e);
            Err(HttpResponse::InternalServerError().body("Database error"))
        }
    }
}

//Create Donation Request
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateDonationRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: NaiveDateTime,
    pub location: Location,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub contact_phone: String,
    #[serde(default)]
    pub country_code: String,
}

//Create Donation
//Create Donation Input: HttpRequest(Session), CreateDonationRequest
//Create Donation Output: Donation (status=pending)
pub async fn create_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<CreateDonationRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Donor) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let draft = DonationDraft {
        title: &payload.title,
        food_type: &payload.food_type,
        quantity: &payload.quantity,
        location_address: &payload.location.address,
        contact_phone: &payload.contact_phone,
        image_count: payload.image_urls.len(),
    };
    if let Err(err) = lifecycle::validate_draft(&draft) {
        return lifecycle_error_response(&err);
    }

    // Donor contact details come from the profile, not the client payload
    let donor: Option<(String, Option<String>)> =
        match sqlx::query_as("SELECT display_name, phone FROM users WHERE user_id = $1")
            .bind(claims.id)
            .fetch_optional(pool.get_ref())
            .await
        {
            Ok(row) => row,
            Err(e) => {
                eprintln!("Failed to fetch donor profile: {:?}", e);
                return HttpResponse::InternalServerError().body("Database error");
            }
        };

    let (donor_name, donor_phone) = match donor {
        Some(row) => row,
        None => return HttpResponse::Unauthorized().body("Account not found"),
    };

    let insert_query = format!(
        "
        INSERT INTO donations
            (donor_id, donor_name, donor_phone, title, description, food_type, quantity,
             expiry_time, location, image_urls, contact_phone, country_code, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 'pending')
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&insert_query)
        .bind(claims.id)
        .bind(&donor_name)
        .bind(&donor_phone)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.food_type)
        .bind(&payload.quantity)
        .bind(payload.expiry_time)
        .bind(Json(payload.location.clone()))
        .bind(&payload.image_urls)
        .bind(&payload.contact_phone)
        .bind(&payload.country_code)
        .fetch_one(pool.get_ref())
        .await;

    match result {
        Ok(donation) => {
            // Make the new offer visible to connected NGOs right away
            let event = json!({
                "type": "donation_posted",
                "payload": { "donation_id": donation.donation_id, "title": donation.title }
            });
            let _ = ws::send_to_role(&UserRole::Ngo, event).await;

            HttpResponse::Created().json(donation)
        }
        Err(e) => {
            eprintln!("Failed to create donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to create donation")
        }
    }
}

//Update Donation Request
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateDonationRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub food_type: Option<String>,
    pub quantity: Option<String>,
    pub expiry_time: Option<NaiveDateTime>,
    pub location: Option<Location>,
    pub image_urls: Option<Vec<String>>,
    pub contact_phone: Option<String>,
    pub country_code: Option<String>,
}

//Update Donation
//Update Donation Input: HttpRequest(Session), Path (/donations/{donation_id}), UpdateDonationRequest
//Update Donation Output: Donation
//Edits are only legal while the donation is still pending.
pub async fn update_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateDonationRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Donor) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let donation_id = path.into_inner();

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    if let Some(image_urls) = &payload.image_urls {
        if image_urls.len() > lifecycle::MAX_IMAGES {
            return lifecycle_error_response(&LifecycleError::TooManyImages);
        }
    }

    let update_query = format!(
        "
        UPDATE donations
        SET title = COALESCE($3, title),
            description = COALESCE($4, description),
            food_type = COALESCE($5, food_type),
            quantity = COALESCE($6, quantity),
            expiry_time = COALESCE($7, expiry_time),
            location = COALESCE($8, location),
            image_urls = COALESCE($9, image_urls),
            contact_phone = COALESCE($10, contact_phone),
            country_code = COALESCE($11, country_code),
            updated_at = NOW()
        WHERE donation_id = $1 AND donor_id = $2 AND status = 'pending'
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(donation_id)
        .bind(claims.id)
        .bind(&payload.title)
        .bind(&payload.description)
        .bind(&payload.food_type)
        .bind(&payload.quantity)
        .bind(payload.expiry_time)
        .bind(payload.location.clone().map(Json))
        .bind(&payload.image_urls)
        .bind(&payload.contact_phone)
        .bind(&payload.country_code)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => HttpResponse::Ok().json(donation),
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.donor_id != claims.id {
                return HttpResponse::Forbidden().body("Only the donor can edit this donation");
            }
            HttpResponse::Conflict().body("Donation can only be edited while it is pending")
        }
        Err(e) => {
            eprintln!("Failed to update donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to update donation")
        }
    }
}

//Delete Donation
//Delete Donation Input: HttpRequest(Session), Path (/donations/{donation_id})
//Delete Donation Output: Success message
//Deletion is enforced server-side: once a donation has been accepted it is
//never hard-deleted.
pub async fn delete_donation(
    pool: web::Data<PgPool>,
    storage: web::Data<StorageClient>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Donor) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let donation_id = path.into_inner();

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let delete_query = "
        DELETE FROM donations
        WHERE donation_id = $1 AND donor_id = $2 AND status = 'pending'
        RETURNING image_urls
    ";

    let result = sqlx::query_scalar::<_, Vec<String>>(delete_query)
        .bind(donation_id)
        .bind(claims.id)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(image_urls)) => {
            // Best-effort cleanup of the stored images
            for url in &image_urls {
                if let Some(object_name) = storage::object_name_from_url(url) {
                    if let Err(e) = storage.delete_file(object_name).await {
                        eprintln!("Failed to delete donation image {}: {:?}", object_name, e);
                    }
                }
            }
            HttpResponse::Ok().json(json!({ "deleted": donation_id }))
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.donor_id != claims.id {
                return HttpResponse::Forbidden().body("Only the donor can delete this donation");
            }
            HttpResponse::Conflict().body("Donation can only be deleted while it is pending")
        }
        Err(e) => {
            eprintln!("Failed to delete donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to delete donation")
        }
    }
}

//Complete Donation
//Complete Donation Input: HttpRequest(Session), Path (/donations/{donation_id}/complete)
//Complete Donation Output: Donation
//Reachable from accepted regardless of the delivery sub-state: an NGO that
//self-delivers never runs the volunteer flow.
pub async fn complete_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };
    let donation_id = path.into_inner();

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let update_query = format!(
        "
        UPDATE donations
        SET status = 'completed', updated_at = NOW()
        WHERE donation_id = $1 AND accepted_by = $2 AND status = 'accepted'
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(donation_id)
        .bind(claims.id)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            notify(
                pool.get_ref(),
                donation.donor_id,
                "Donation completed",
                &format!("\"{}\" has been marked completed. Thank you!", donation.title),
                NotificationKind::Success,
            )
            .await;
            if let Some(volunteer_id) = donation.volunteer_id {
                notify(
                    pool.get_ref(),
                    volunteer_id,
                    "Delivery confirmed",
                    &format!("The NGO confirmed the delivery of \"{}\".", donation.title),
                    NotificationKind::Success,
                )
                .await;
            }
            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.accepted_by != Some(claims.id) {
                return HttpResponse::Forbidden()
                    .body("Only the accepting NGO can complete this donation");
            }
            let err = lifecycle::check_status_transition(current.status, DonationStatus::Completed)
                .unwrap_err();
            lifecycle_error_response(&err)
        }
        Err(e) => {
            eprintln!("Failed to complete donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to complete donation")
        }
    }
}

//Cancel Donation
//Cancel Donation Input: HttpRequest(Session), Path (/donations/{donation_id}/cancel)
//Cancel Donation Output: Donation
//Cancellation is legal from pending or accepted, for the donor or the
//accepting NGO. Cancelling twice reports a state conflict, it never crashes.
pub async fn cancel_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };
    let donation_id = path.into_inner();

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let update_query = format!(
        "
        UPDATE donations
        SET status = 'cancelled', updated_at = NOW()
        WHERE donation_id = $1
          AND (donor_id = $2 OR accepted_by = $2)
          AND (status = 'pending' OR status = 'accepted')
        RETURNING {}",
        DONATION_COLUMNS
    );

    let result = sqlx::query_as::<_, Donation>(&update_query)
        .bind(donation_id)
        .bind(claims.id)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(donation)) => {
            // Tell the other side of the match, whichever side cancelled
            let message = format!("\"{}\" has been cancelled.", donation.title);
            if donation.donor_id != claims.id {
                notify(
                    pool.get_ref(),
                    donation.donor_id,
                    "Donation cancelled",
                    &message,
                    NotificationKind::Warning,
                )
                .await;
            }
            if let Some(ngo_id) = donation.accepted_by {
                if ngo_id != claims.id {
                    notify(
                        pool.get_ref(),
                        ngo_id,
                        "Donation cancelled",
                        &message,
                        NotificationKind::Warning,
                    )
                    .await;
                }
            }
            HttpResponse::Ok().json(donation)
        }
        Ok(None) => {
            let current = match fetch_donation(pool.get_ref(), donation_id).await {
                Ok(donation) => donation,
                Err(response) => return response,
            };
            if current.donor_id != claims.id && current.accepted_by != Some(claims.id) {
                return HttpResponse::Forbidden()
                    .body("Only the donor or the accepting NGO can cancel this donation");
            }
            let err = lifecycle::check_status_transition(current.status, DonationStatus::Cancelled)
                .unwrap_err();
            lifecycle_error_response(&err)
        }
        Err(e) => {
            eprintln!("Failed to cancel donation: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to cancel donation")
        }
    }
}

//Get My Donations
//Get My Donations Input: HttpRequest(Session)
//Get My Donations Output: Vec<Donation>
pub async fn get_my_donations(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = format!(
            "SELECT {} FROM donations WHERE donor_id = $1 ORDER BY created_at DESC",
            DONATION_COLUMNS
        );
        match sqlx::query_as::<_, Donation>(&query)
            .bind(claims.id)
            .fetch_all(pool.get_ref())
            .await
        {
            Ok(donations) => HttpResponse::Ok().json(donations),
            Err(e) => {
                eprintln!("Failed to fetch donor donations: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to fetch donations")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Get Accepted Donations
//Get Accepted Donations Input: HttpRequest(Session)
//Get Accepted Donations Output: Vec<Donation> (the caller's pickups)
pub async fn get_accepted_donations(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    if let Some(claims) = req.extensions().get::<Claims>() {
        let query = format!(
            "SELECT {} FROM donations WHERE accepted_by = $1 ORDER BY updated_at DESC",
            DONATION_COLUMNS
        );
        match sqlx::query_as::<_, Donation>(&query)
            .bind(claims.id)
            .fetch_all(pool.get_ref())
            .await
        {
            Ok(donations) => HttpResponse::Ok().json(donations),
            Err(e) => {
                eprintln!("Failed to fetch accepted donations: {:?}", e);
                HttpResponse::InternalServerError().body("Failed to fetch donations")
            }
        }
    } else {
        HttpResponse::Unauthorized().body("Authentication required")
    }
}

//Get Donation
//Get Donation Input: HttpRequest(Session), Path (/donations/{donation_id})
//Get Donation Output: Donation
pub async fn get_donation(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    if req.extensions().get::<Claims>().is_none() {
        return HttpResponse::Unauthorized().body("Authentication required");
    }
    match fetch_donation(pool.get_ref(), path.into_inner()).await {
        Ok(donation) => HttpResponse::Ok().json(donation),
        Err(response) => response,
    }
}

//Upload Donation Images
//Upload Donation Images Input: HttpRequest(Session), Multipart (≤7 image files)
//Upload Donation Images Output: { image_urls, failed }
//Uploads are best-effort per file: a failed image never sinks the batch, the
//caller proceeds with whatever succeeded.
pub async fn upload_donation_images(
    storage: web::Data<StorageClient>,
    req: HttpRequest,
    mut payload: Multipart,
) -> impl Responder {
    let claims = if let Some(claims) = req.extensions().get::<Claims>() {
        claims.clone()
    } else {
        return HttpResponse::Unauthorized().body("Authentication required");
    };

    let mut image_urls: Vec<String> = Vec::new();
    let mut failed: Vec<String> = Vec::new();
    let mut file_count = 0usize;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                eprintln!("Malformed multipart field: {:?}", e);
                return HttpResponse::BadRequest().body("Malformed upload");
            }
        };

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("image")
            .to_string();

        file_count += 1;
        if file_count > lifecycle::MAX_IMAGES {
            return lifecycle_error_response(&LifecycleError::TooManyImages);
        }

        let mut data: Vec<u8> = Vec::new();
        let mut read_error = false;
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) => {
                    eprintln!("Failed to read upload chunk for {}: {:?}", file_name, e);
                    read_error = true;
                    break;
                }
            }
        }
        if read_error || data.is_empty() {
            failed.push(file_name);
            continue;
        }

        let content_type = mime_guess::from_path(&file_name)
            .first_or(mime::IMAGE_JPEG)
            .to_string();
        let object_name = storage::donation_image_path(&claims.id, &file_name);

        match storage.upload_file(&data, &object_name, &content_type).await {
            Ok(url) => image_urls.push(url),
            Err(e) => {
                eprintln!("Failed to upload {}: {:?}", file_name, e);
                failed.push(file_name);
            }
        }
    }

    if image_urls.is_empty() && !failed.is_empty() {
        return HttpResponse::InternalServerError().json(json!({
            "image_urls": image_urls,
            "failed": failed
        }));
    }

    HttpResponse::Ok().json(json!({
        "image_urls": image_urls,
        "failed": failed
    }))
}

//Config Donation Routes
// POST /donations/new
// POST /donations/upload-images
// GET /donations/mine
// GET /donations/accepted
// GET /donations/{donation_id}
// PUT /donations/{donation_id}
// DELETE /donations/{donation_id}
// POST /donations/{donation_id}/complete
// POST /donations/{donation_id}/cancel
pub fn config_donation_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/donations")
            .route("/new", web::post().to(create_donation))
            .route("/upload-images", web::post().to(upload_donation_images))
            .route("/mine", web::get().to(get_my_donations))
            .route("/accepted", web::get().to(get_accepted_donations))
            .route("/{donation_id}/complete", web::post().to(complete_donation))
            .route("/{donation_id}/cancel", web::post().to(cancel_donation))
            .route("/{donation_id}", web::get().to(get_donation))
            .route("/{donation_id}", web::put().to(update_donation))
            .route("/{donation_id}", web::delete().to(delete_donation)),
    );
}

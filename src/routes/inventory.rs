use crate::handlers::moderation::ensure_account_active;
use crate::models::all_models::{InventoryItem, UserRole};
use crate::routes::donations::ensure_role;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

const ITEM_COLUMNS: &str = "
    item_id, ngo_id, name, quantity, unit, category, expiry_date, low_stock_threshold, last_updated
";

//Get Inventory
//Get Inventory Input: HttpRequest(Session)
//Get Inventory Output: Vec<InventoryItem>, soonest expiry first
pub async fn get_inventory(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = format!(
        "SELECT {} FROM inventory_items WHERE ngo_id = $1
         ORDER BY expiry_date ASC NULLS LAST, last_updated DESC",
        ITEM_COLUMNS
    );
    match sqlx::query_as::<_, InventoryItem>(&query)
        .bind(claims.id)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => {
            eprintln!("Failed to fetch inventory: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch inventory")
        }
    }
}

//Get Expiring Items
//Get Expiring Items Input: HttpRequest(Session)
//Get Expiring Items Output: Vec<InventoryItem> expiring within 3 days
pub async fn get_expiring_items(pool: web::Data<PgPool>, req: HttpRequest) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let query = format!(
        "SELECT {} FROM inventory_items
         WHERE ngo_id = $1 AND expiry_date IS NOT NULL AND expiry_date <= NOW() + INTERVAL '3 days'
         ORDER BY expiry_date ASC",
        ITEM_COLUMNS
    );
    match sqlx::query_as::<_, InventoryItem>(&query)
        .bind(claims.id)
        .fetch_all(pool.get_ref())
        .await
    {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => {
            eprintln!("Failed to fetch expiring items: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to fetch expiring items")
        }
    }
}

//Create Item Request
#[derive(Debug, Deserialize, Serialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub category: String,
    pub expiry_date: Option<NaiveDateTime>,
    pub low_stock_threshold: Option<i32>,
}

//Create Item
//Create Item Input: HttpRequest(Session), CreateItemRequest
//Create Item Output: InventoryItem
pub async fn create_item(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    payload: web::Json<CreateItemRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    for (field, value) in [
        ("name", &payload.name),
        ("quantity", &payload.quantity),
        ("unit", &payload.unit),
        ("category", &payload.category),
    ] {
        if value.trim().is_empty() {
            return HttpResponse::BadRequest().body(format!("Missing required field: {}", field));
        }
    }

    let query = format!(
        "
        INSERT INTO inventory_items (ngo_id, name, quantity, unit, category, expiry_date, low_stock_threshold)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}",
        ITEM_COLUMNS
    );

    let result = sqlx::query_as::<_, InventoryItem>(&query)
        .bind(claims.id)
        .bind(&payload.name)
        .bind(&payload.quantity)
        .bind(&payload.unit)
        .bind(&payload.category)
        .bind(payload.expiry_date)
        .bind(payload.low_stock_threshold)
        .fetch_one(pool.get_ref())
        .await;

    match result {
        Ok(item) => HttpResponse::Created().json(item),
        Err(e) => {
            eprintln!("Failed to create inventory item: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to create inventory item")
        }
    }
}

//Update Item Request
#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub expiry_date: Option<NaiveDateTime>,
    pub low_stock_threshold: Option<i32>,
}

//Update Item
//Update Item Input: HttpRequest(Session), Path (/inventory/{item_id}), UpdateItemRequest
//Update Item Output: InventoryItem
pub async fn update_item(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateItemRequest>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let query = format!(
        "
        UPDATE inventory_items
        SET name = COALESCE($3, name),
            quantity = COALESCE($4, quantity),
            unit = COALESCE($5, unit),
            category = COALESCE($6, category),
            expiry_date = COALESCE($7, expiry_date),
            low_stock_threshold = COALESCE($8, low_stock_threshold),
            last_updated = NOW()
        WHERE item_id = $1 AND ngo_id = $2
        RETURNING {}",
        ITEM_COLUMNS
    );

    let result = sqlx::query_as::<_, InventoryItem>(&query)
        .bind(path.into_inner())
        .bind(claims.id)
        .bind(&payload.name)
        .bind(&payload.quantity)
        .bind(&payload.unit)
        .bind(&payload.category)
        .bind(payload.expiry_date)
        .bind(payload.low_stock_threshold)
        .fetch_optional(pool.get_ref())
        .await;

    match result {
        Ok(Some(item)) => HttpResponse::Ok().json(item),
        Ok(None) => HttpResponse::NotFound().body("Inventory item not found"),
        Err(e) => {
            eprintln!("Failed to update inventory item: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to update inventory item")
        }
    }
}

//Delete Item
//Delete Item Input: HttpRequest(Session), Path (/inventory/{item_id})
//Delete Item Output: Success message
pub async fn delete_item(
    pool: web::Data<PgPool>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> impl Responder {
    let claims = match ensure_role(&req, UserRole::Ngo) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    if let Err(response) = ensure_account_active(pool.get_ref(), claims.id).await {
        return response;
    }

    let item_id = path.into_inner();
    let query = "DELETE FROM inventory_items WHERE item_id = $1 AND ngo_id = $2";
    match sqlx::query(query)
        .bind(item_id)
        .bind(claims.id)
        .execute(pool.get_ref())
        .await
    {
        Ok(result) if result.rows_affected() > 0 => {
            HttpResponse::Ok().json(json!({ "deleted": item_id }))
        }
        Ok(_) => HttpResponse::NotFound().body("Inventory item not found"),
        Err(e) => {
            eprintln!("Failed to delete inventory item: {:?}", e);
            HttpResponse::InternalServerError().body("Failed to delete inventory item")
        }
    }
}

//Config Inventory Routes
// GET /inventory
// GET /inventory/expiring
// POST /inventory/new
// PUT /inventory/{item_id}
// DELETE /inventory/{item_id}
pub fn config_inventory_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/inventory")
            .route("", web::get().to(get_inventory))
            .route("/expiring", web::get().to(get_expiring_items))
            .route("/new", web::post().to(create_item))
            .route("/{item_id}", web::put().to(update_item))
            .route("/{item_id}", web::delete().to(delete_item)),
    );
}

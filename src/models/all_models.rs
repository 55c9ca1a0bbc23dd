use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use strum_macros::{Display, EnumString};
use uuid::Uuid;

//  USER & ACCOUNT STRUCTS

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Donor,
    Ngo,
    Volunteer,
    Admin,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "account_status", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Banned,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
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
    pub email_verification_token: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

//  LOCATION STRUCT (stored as jsonb on users and donations)

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub address: String,
}

//  DONATIONS

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "donation_status", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Accepted,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "delivery_status", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    None,
    AvailableForPickup,
    Assigned,
    PickedUp,
    Delivered,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Donation {
    pub donation_id: Uuid,
    pub donor_id: Uuid,
    pub donor_name: String,
    pub donor_phone: Option<String>,
    pub title: String,
    pub description: String,
    pub food_type: String,
    pub quantity: String,
    pub expiry_time: NaiveDateTime,
    pub location: Json<Location>,
    pub image_urls: Vec<String>,
    pub contact_phone: String,
    pub country_code: String,
    pub status: DonationStatus,
    pub accepted_by: Option<Uuid>,
    pub accepted_by_name: Option<String>,
    pub accepted_by_phone: Option<String>,
    pub accepted_by_address: Option<String>,
    pub volunteer_id: Option<Uuid>,
    pub volunteer_name: Option<String>,
    pub volunteer_phone: Option<String>,
    // NULL while the donation is pending; 'none' once accepted
    pub delivery_status: Option<DeliveryStatus>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

//  CHATS & MESSAGES

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub chat_id: Uuid,
    pub donation_id: Option<Uuid>,
    pub last_message: String,
    pub last_message_time: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChatParticipant {
    pub chat_id: Uuid,
    pub user_id: Uuid,
    pub unread_count: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub seq: i64,
    pub read_by: Vec<Uuid>,
    pub created_at: NaiveDateTime,
}

//  COMPLAINTS

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "complaint_status", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Complaint {
    pub complaint_id: Uuid,
    pub ngo_id: Uuid,
    pub volunteer_id: Uuid,
    pub volunteer_name: String,
    pub donation_id: Uuid,
    pub reason: String,
    pub status: ComplaintStatus,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

//  NGO INVENTORY

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub item_id: Uuid,
    pub ngo_id: Uuid,
    pub name: String,
    pub quantity: String,
    pub unit: String,
    pub category: String,
    pub expiry_date: Option<NaiveDateTime>,
    pub low_stock_threshold: Option<i32>,
    pub last_updated: NaiveDateTime,
}

//  NOTIFICATIONS

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Display, EnumString, PartialEq, Clone, Copy)]
#[sqlx(type_name = "notification_kind", rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: NaiveDateTime,
}

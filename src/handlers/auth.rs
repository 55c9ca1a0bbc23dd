use crate::models::all_models::UserRole;
use chrono::{Duration, Utc};
use dotenvy::dotenv;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

/// Structure representing JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: Uuid,
    pub display_name: String,
    pub role: UserRole,
    pub exp: usize, // Expiration timestamp
}

/// Generates a JWT token for a given user
pub fn generate_jwt(
    user_id: Uuid,
    display_name: String,
    role: UserRole,
) -> Result<String, jsonwebtoken::errors::Error> {
    dotenv().ok();
    let secret_key = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let expiration = Utc::now() + Duration::hours(8);
    let claims = Claims {
        id: user_id,
        display_name,
        role,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret_key.as_ref()),
    )
}

/// Validates a JWT token and extracts the user information
pub fn validate_jwt(token: &str) -> Result<Claims, Box<dyn std::error::Error>> {
    dotenv().ok();

    let secret_key = env::var("JWT_SECRET").map_err(|e| -> Box<dyn std::error::Error> {
        format!("Failed to retrieve JWT_SECRET: {}", e).into()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret_key.as_ref()),
        &Validation::new(jsonwebtoken::Algorithm::HS256),
    )
    .map_err(|e| -> Box<dyn std::error::Error> {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                format!("Token has expired: {}", e).into()
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                format!("Invalid token signature: {}", e).into()
            }
            _ => format!("Token validation failed: {}", e).into(),
        }
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips_claims() {
        std::env::set_var("JWT_SECRET", "test-secret");
        let user_id = Uuid::new_v4();
        let token = generate_jwt(user_id, "Helping Hands".to_string(), UserRole::Ngo)
            .expect("generate token");
        let claims = validate_jwt(&token).expect("validate token");
        assert_eq!(claims.id, user_id);
        assert_eq!(claims.display_name, "Helping Hands");
        assert_eq!(claims.role, UserRole::Ngo);
    }
}

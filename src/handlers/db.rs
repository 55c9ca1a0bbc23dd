use log::error;
use sqlx::PgPool;

/// Runs a trivial query to verify the database connection is usable.
pub async fn check_db_connection(pool: &PgPool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Database connection check failed: {:?}", e);
            false
        }
    }
}

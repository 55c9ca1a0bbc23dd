use crate::models::all_models::AccountStatus;
use actix_web::HttpResponse;
use chrono::{NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

//Gate Decision
//Outcome of evaluating an account against the moderation gate at call time.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum GateDecision {
    Allow,
    // suspension deadline has passed; act as active and clean up lazily
    SuspensionExpired,
    Deny(&'static str),
}

//Gate Status
//What a route learns about the caller after the gate let the call through.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum GateStatus {
    Active,
    SuspensionExpired,
}

//Evaluate
//Pure gate decision. Suspension is re-validated against the clock on every
//check rather than trusting the stored state.
pub fn evaluate(
    status: AccountStatus,
    suspended_until: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> GateDecision {
    match status {
        AccountStatus::Active => GateDecision::Allow,
        AccountStatus::Banned => GateDecision::Deny("Account is banned"),
        AccountStatus::Suspended => match suspended_until {
            Some(until) if until <= now => GateDecision::SuspensionExpired,
            _ => GateDecision::Deny("Account is suspended"),
        },
    }
}

//Admin Transition Allowed
//Account-status moves an administrator may make. Banned is terminal; lifting
//a ban is an out-of-band operation and is rejected here.
pub fn admin_transition_allowed(from: AccountStatus, to: AccountStatus) -> bool {
    use AccountStatus::*;
    matches!(
        (from, to),
        (Active, Suspended) | (Active, Banned) | (Suspended, Active) | (Suspended, Banned)
    )
}

//Ensure Account Active
//Route-side gate check, in the style of ensure_admin: Err carries the HTTP
//response to return. Reads the caller's current row, never a cached state.
pub async fn ensure_account_active(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<GateStatus, HttpResponse> {
    let query = "SELECT account_status, suspended_until FROM users WHERE user_id = $1";

    let row: Option<(AccountStatus, Option<NaiveDateTime>)> = match sqlx::query_as(query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    {
        Ok(row) => row,
        Err(e) => {
            eprintln!("Failed to read account status: {:?}", e);
            return Err(HttpResponse::InternalServerError().body("Database error"));
        }
    };

    let (status, suspended_until) = match row {
        Some(row) => row,
        None => return Err(HttpResponse::Unauthorized().body("Account not found")),
    };

    match evaluate(status, suspended_until, Utc::now().naive_utc()) {
        GateDecision::Allow => Ok(GateStatus::Active),
        GateDecision::SuspensionExpired => {
            // Lazy cleanup: flip the row back to active. Conditional on the
            // deadline so a concurrent re-suspension is not clobbered.
            let cleanup = "
                UPDATE users
                SET account_status = 'active', suspended_until = NULL
                WHERE user_id = $1 AND account_status = 'suspended' AND suspended_until <= NOW()
            ";
            match sqlx::query(cleanup).bind(user_id).execute(pool).await {
                Ok(result) if result.rows_affected() > 0 => {
                    crate::handlers::notify::notify(
                        pool,
                        user_id,
                        "Suspension expired",
                        "Your suspension has ended and your account is active again.",
                        crate::models::all_models::NotificationKind::Info,
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Failed to clear expired suspension: {:?}", e);
                    // the action still proceeds; the next check retries the cleanup
                }
            }
            Ok(GateStatus::SuspensionExpired)
        }
        GateDecision::Deny(reason) => Err(HttpResponse::Forbidden().body(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn active_accounts_pass() {
        assert_eq!(evaluate(AccountStatus::Active, None, now()), GateDecision::Allow);
    }

    #[test]
    fn banned_accounts_are_always_denied() {
        assert_eq!(
            evaluate(AccountStatus::Banned, None, now()),
            GateDecision::Deny("Account is banned")
        );
    }

    #[test]
    fn suspension_in_the_future_denies() {
        let until = now() + Duration::days(3);
        assert_eq!(
            evaluate(AccountStatus::Suspended, Some(until), now()),
            GateDecision::Deny("Account is suspended")
        );
    }

    #[test]
    fn elapsed_suspension_allows_and_signals_expiry() {
        let until = now() - Duration::hours(1);
        assert_eq!(
            evaluate(AccountStatus::Suspended, Some(until), now()),
            GateDecision::SuspensionExpired
        );
    }

    #[test]
    fn suspension_without_deadline_stays_denied() {
        assert_eq!(
            evaluate(AccountStatus::Suspended, None, now()),
            GateDecision::Deny("Account is suspended")
        );
    }

    #[test]
    fn banned_is_terminal_for_admin_moves() {
        use AccountStatus::*;
        assert!(!admin_transition_allowed(Banned, Active));
        assert!(!admin_transition_allowed(Banned, Suspended));
        assert!(admin_transition_allowed(Active, Suspended));
        assert!(admin_transition_allowed(Active, Banned));
        assert!(admin_transition_allowed(Suspended, Active));
        assert!(admin_transition_allowed(Suspended, Banned));
    }
}

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

//Turnstile Config
//The server-held secret. Missing configuration is a server error at request
//time, never a silent pass.
#[derive(Clone)]
pub struct TurnstileConfig {
    pub secret: Option<String>,
}

//Verify Captcha Request
#[derive(Debug, Deserialize, Serialize)]
pub struct VerifyCaptchaRequest {
    pub token: Option<String>,
}

//Verify Captcha
//Verify Captcha Input: VerifyCaptchaRequest
//Verify Captcha Output: { success, message, errors? }
//Non-POST methods are answered with 405 by the resource itself.
pub async fn verify_captcha(
    config: web::Data<TurnstileConfig>,
    req: HttpRequest,
    payload: web::Json<VerifyCaptchaRequest>,
) -> impl Responder {
    let token = match payload.token.as_deref() {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "message": "Token is required"
            }));
        }
    };

    let secret = match &config.secret {
        Some(secret) => secret.clone(),
        None => {
            eprintln!("SERVER ERROR: TURNSTILE_SECRET_KEY is not configured");
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Server configuration error"
            }));
        }
    };

    let remote_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("")
        .to_string();

    let form = [
        ("secret", secret),
        ("response", token),
        ("remoteip", remote_ip),
    ];

    let client = reqwest::Client::new();
    let outcome: Value = match client.post(SITEVERIFY_URL).form(&form).send().await {
        Ok(response) => match response.json().await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Turnstile verification error: {:?}", e);
                return HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "message": "Internal server error during verification"
                }));
            }
        },
        Err(e) => {
            eprintln!("Turnstile verification error: {:?}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "message": "Internal server error during verification"
            }));
        }
    };

    if outcome.get("success").and_then(Value::as_bool).unwrap_or(false) {
        HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Token verified successfully"
        }))
    } else {
        let errors = outcome.get("error-codes").cloned().unwrap_or(Value::Null);
        HttpResponse::Forbidden().json(json!({
            "success": false,
            "message": "Verification failed",
            "errors": errors
        }))
    }
}

//Config Captcha Routes
// POST /captcha/verify
pub fn config_captcha_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/captcha")
            .service(web::resource("/verify").route(web::post().to(verify_captcha))),
    );
}

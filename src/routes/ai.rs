use crate::handlers::ai::AiClient;
use crate::handlers::auth::Claims;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

//Analyze Image Request
#[derive(Debug, Deserialize, Serialize)]
pub struct AnalyzeImageRequest {
    pub image_base64: String,
}

//Analyze Image
//Analyze Image Input: HttpRequest(Session), AnalyzeImageRequest
//Analyze Image Output: AiAnalysis
//Provider failures never surface as errors: the client always receives a
//usable analysis, at worst the manual-verification fallback.
pub async fn analyze_image(
    ai: web::Data<AiClient>,
    req: HttpRequest,
    payload: web::Json<AnalyzeImageRequest>,
) -> impl Responder {
    if req.extensions().get::<Claims>().is_none() {
        return HttpResponse::Unauthorized().body("Authentication required");
    }
    if payload.image_base64.trim().is_empty() {
        return HttpResponse::BadRequest().body("image_base64 is required");
    }

    let analysis = ai.analyze_image(&payload.image_base64).await;
    HttpResponse::Ok().json(analysis)
}

//Suggest Recipes Request
#[derive(Debug, Deserialize, Serialize)]
pub struct SuggestRecipesRequest {
    pub ingredients: Vec<String>,
}

//Suggest Recipes
//Suggest Recipes Input: HttpRequest(Session), SuggestRecipesRequest
//Suggest Recipes Output: Vec<Recipe> (empty when every provider fails)
pub async fn suggest_recipes(
    ai: web::Data<AiClient>,
    req: HttpRequest,
    payload: web::Json<SuggestRecipesRequest>,
) -> impl Responder {
    if req.extensions().get::<Claims>().is_none() {
        return HttpResponse::Unauthorized().body("Authentication required");
    }
    if payload.ingredients.is_empty() {
        return HttpResponse::BadRequest().body("At least one ingredient is required");
    }

    let recipes = ai.suggest_recipes(&payload.ingredients).await;
    HttpResponse::Ok().json(recipes)
}

//Config AI Routes
// POST /ai/analyze-image
// POST /ai/recipes
pub fn config_ai_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ai")
            .route("/analyze-image", web::post().to(analyze_image))
            .route("/recipes", web::post().to(suggest_recipes)),
    );
}

use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::constants;
use crate::error::SentinelError;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    pub image: Option<String>,
    pub prompt: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FrameResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ResponseError for SentinelError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default()
        .limit(constants::MAX_CONTENT_LENGTH)
        .error_handler(|err, _req| {
            warn!("Rejected request body: {}", err);
            let response = HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Error processing request: {}", err),
            });
            InternalError::from_response(err, response).into()
        });

    cfg.app_data(json_config)
        .service(web::resource("/process_frame").route(web::post().to(process_frame)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn process_frame(
    orchestrator: web::Data<Orchestrator>,
    body: web::Json<FrameRequest>,
) -> Result<HttpResponse, SentinelError> {
    let request = body.into_inner();
    info!(
        "Received frame: {} image characters, prompt {:?}",
        request.image.as_deref().map(str::len).unwrap_or(0),
        request.prompt.as_deref().unwrap_or("")
    );

    match orchestrator
        .handle(
            request.image.as_deref(),
            request.prompt.as_deref(),
            request.api_key.as_deref(),
        )
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(FrameResponse { response })),
        Err(e) => {
            error!("Error processing frame: {}", e);
            Err(e)
        }
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use anyhow::Result;
use log::{error, info, warn};
use std::sync::Arc;

use frame_sentinel::messaging::TelegramConnector;
use frame_sentinel::routes::configure_routes;
use frame_sentinel::{Category, Config, Dispatcher, Orchestrator, VisionClient};

/// Frame Sentinel - vision-model frame analysis with chat alerts.
///
/// Serves `POST /process_frame`. Each request is described by the vision
/// model; peace signs and weapons found in the description are posted to
/// Telegram in the background while the description goes back to the caller.
///
/// # Environment Variables
///
/// * `OPENAI_API_KEY` - Fallback vision credential when a request has none
/// * `PEACESIGN_BOT_TOKEN`, `PEACESIGN_CHAT_ID` - Gesture alert channel
/// * `WEAPON_BOT_TOKEN`, `WEAPON_CHAT_ID` - Weapon alert channel (defaults to the gesture channel)
/// * `VISION_API_URL`, `VISION_MODEL`, `VISION_MAX_TOKENS`, `VISION_TIMEOUT_SECONDS`
/// * `RATE_LIMIT_MAX_RETRIES`, `RATE_LIMIT_MAX_WAIT_SECONDS`
/// * `TELEGRAM_API_URL`, `HOST`, `PORT`
///
/// Variables may also come from a `.env` file in the working directory.
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger to output to stdout, using RUST_LOG env var or info level by default
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Stdout)
        .filter_level(
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|level| level.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        )
        .init();

    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    info!("Frame Sentinel starting...");
    info!("Using vision model {} at {}", config.vision_model, config.vision_api_url);
    if config.default_api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; requests must carry their own api_key");
    }

    let connector = Arc::new(TelegramConnector::new(config.telegram_api_url.clone()));
    let dispatcher = Arc::new(Dispatcher::from_config(&config, connector));
    for category in [Category::Gesture, Category::Weapon] {
        if dispatcher.has_channel(category) {
            info!("Alerts for {} enabled", category);
        } else {
            warn!("No channel configured for {} alerts; they will be skipped", category);
        }
    }

    // Connectivity check runs alongside startup, failures are only logged
    let checker = dispatcher.clone();
    tokio::spawn(async move { checker.verify_channels().await });

    let orchestrator = web::Data::new(Orchestrator::new(
        VisionClient::from_config(&config),
        dispatcher,
        config.default_api_key.clone(),
    ));

    let bind_address = config.bind_address();
    info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(orchestrator.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use mining_engine::{
    bot::{self, BotContext},
    config::Config,
    database::Database,
    handlers, metrics,
    services::{MiningParams, MiningService},
};
use std::sync::Arc;
use teloxide::Bot;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    info!("Starting Mining Engine on port {}", config.server.port);

    let db = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .await
            .expect("Failed to connect to database"),
    );

    db.init_schema()
        .await
        .expect("Failed to initialize database schema");
    db.seed_tasks()
        .await
        .expect("Failed to seed task reference data");

    info!("Database ready, task reference data seeded");

    if let Err(e) = metrics::register_metrics(prometheus::default_registry()) {
        warn!("Failed to register metrics: {}", e);
    }

    let params = MiningParams::from_config(&config).expect("Invalid mining parameters");
    let service = Arc::new(MiningService::new(db, params));

    if config.bot.token.is_empty() {
        warn!("Bot token not configured, running HTTP API only");
    } else {
        let ctx = BotContext {
            service: service.clone(),
            webapp_url: config.bot.webapp_url.clone(),
        };
        let telegram = Bot::new(config.bot.token.clone());
        tokio::spawn(async move { bot::run(telegram, ctx).await });
    }

    let service_data = web::Data::new(service);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(service_data.clone())
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.clone(), config.server.port))?
    .run()
    .await
}

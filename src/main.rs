use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use currency_engine::{
    config::Config,
    database::Database,
    handlers, metrics,
    services::LedgerService,
    verification::{CommentFeedGateway, VerificationGateway},
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, Level};
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

    info!("Starting Currency Engine on port {}", config.server.port);

    metrics::register_metrics(prometheus::default_registry())
        .expect("Failed to register metrics");

    let db = Arc::new(
        Database::new(&config.database.url, config.database.max_connections)
            .await
            .expect("Failed to connect to database"),
    );

    let gateway: Arc<dyn VerificationGateway> =
        Arc::new(CommentFeedGateway::new(config.verification.clone()));

    let ledger_service = Arc::new(LedgerService::new(db, gateway, config.ledger.clone()));

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(ledger_service.clone()))
            .configure(handlers::configure_routes)
    })
    .bind(("0.0.0.0", config.server.port))?
    .run()
    .await
}

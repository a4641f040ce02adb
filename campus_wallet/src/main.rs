use actix_web::{App, HttpServer, middleware::Logger, web};
use dotenv::dotenv;
use pretty_env_logger::env_logger::{Builder, Env};

use campus_wallet::config::AppConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    if cli::run_cli().await {
        return Ok(());
    }

    let logger_env = Env::default().default_filter_or("debug");
    let mut logger_builder = Builder::from_env(logger_env);
    logger_builder.init();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    let state = config.create_app_state().await.map_err(|e| {
        log::error!("Application initialization failed: {:#}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!("App state initialized successfully");

    let data = web::Data::new(state);

    log::info!(
        "Webhook endpoint: http://{}:{}/webhook/intasend",
        config.host,
        config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(campus_wallet::cors())
            .wrap(Logger::new("%a %t %r %s  %{Referer}i %Dms"))
            .configure(campus_wallet::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

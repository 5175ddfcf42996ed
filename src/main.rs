use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;

use taskdesk::config::Config;
use taskdesk::routes::{self, health::Uptime};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("invalid configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e));
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            log::error!("failed to connect to database: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e)
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        log::error!("failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e)
    })?;

    let bind_address = (config.server_host.clone(), config.server_port);
    log::info!("Starting Taskdesk server at {}", config.server_url());

    let server_pool = pool.clone();
    let config = web::Data::new(config);
    let uptime = web::Data::new(Uptime::now());

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(server_pool.clone()))
            .app_data(config.clone())
            .app_data(uptime.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind(bind_address)?
    .run()
    .await?;

    log::info!("Server stopped, closing database pool");
    pool.close().await;
    Ok(())
}

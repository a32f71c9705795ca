pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;

use std::{io, sync::Arc};

use actix_web::{HttpServer, App, web};
use dotenv::dotenv;
use log::{info, warn};
use sqlx::{postgres::Postgres, Pool};

use config::AppConfig;
use db::{Db, KvStore, MemoryStore, PgStore};
use service::log::{init_logger, LoggerMiddleware};

type PGPool = Pool<Postgres>;

async fn open_store(config: &AppConfig) -> io::Result<Arc<dyn KvStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.db_max_connections)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL is not set, rows live in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    init_logger();
    let config = AppConfig::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let db = Db::new(open_store(&config).await?, config.store_timeout);

    let bind = (config.bind_host.clone(), config.bind_port);
    info!("listening on {}:{}, tickets validate at {}", bind.0, bind.1, config.public_base_url);
    HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(handlers::init_routes)
    })
    .bind(bind)?
    .run()
    .await
}

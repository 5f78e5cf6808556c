// src/main.rs

mod app_state;
mod auth;
mod config;
mod error;
mod models;
mod mongo_store;
mod mosque;
mod post;
mod prayer_time;
mod services;
mod store;
mod timings_client;
mod user_management;

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use crate::app_state::AppState;
use crate::auth::{login, register, Authentication};
use crate::config::{Config, StoreBackend};
use crate::mongo_store::MongoStore;
use crate::mosque::{create_mosque, get_mosque, list_mosques, upload_donation_qr};
use crate::post::{
    create_post, delete_post, get_pending_posts, list_posts, update_post, update_post_status,
};
use crate::prayer_time::{get_prayer_times, set_manual_prayer_times};
use crate::store::{DocumentStore, MemoryStore};
use crate::timings_client::AladhanClient;
use crate::user_management::{
    add_favorite_mosque, get_favorite_mosques, get_pending_users, get_user_id_proof,
    remove_favorite_mosque, update_user_status,
};

fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login)),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("/pending", web::get().to(get_pending_users))
                    .route("/{user_id}/id-proof", web::get().to(get_user_id_proof))
                    .route("/{user_id}/status", web::patch().to(update_user_status))
                    .route("/{user_id}/favorites", web::get().to(get_favorite_mosques))
                    .route("/{user_id}/favorites/{mosque_id}", web::post().to(add_favorite_mosque))
                    .route("/{user_id}/favorites/{mosque_id}", web::delete().to(remove_favorite_mosque)),
            )
            // MOSQUES
            .service(
                web::scope("/mosques")
                    .route("", web::get().to(list_mosques))
                    .route("", web::post().to(create_mosque))
                    .route("/{mosque_id}", web::get().to(get_mosque))
                    .route("/{mosque_id}/donation-qr", web::post().to(upload_donation_qr)),
            )
            // PRAYER TIMES
            .service(
                web::scope("/prayer-times")
                    .route("", web::post().to(set_manual_prayer_times))
                    .route("/{mosque_id}", web::get().to(get_prayer_times)),
            )
            // POSTS
            .service(
                web::scope("/posts")
                    .route("", web::get().to(list_posts))
                    .route("", web::post().to(create_post))
                    .route("/pending", web::get().to(get_pending_posts))
                    .route("/{post_id}/status", web::patch().to(update_post_status))
                    .route("/{post_id}", web::patch().to(update_post))
                    .route("/{post_id}", web::delete().to(delete_post)),
            ),
    );
}

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(startup_error)?;

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Mongo => {
            let uri = config.mongo_uri.as_deref().unwrap_or_default();
            Arc::new(
                MongoStore::init(uri, &config.database_name)
                    .await
                    .map_err(startup_error)?,
            )
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };
    let provider = Arc::new(AladhanClient::new(&config.timings).map_err(startup_error)?);

    let state = AppState::new(store, provider, config.clone());
    state.prepare().await.map_err(startup_error)?;

    let frontend_origin = config.frontend_origin.clone();
    let jwt_secret = config.jwt_secret.clone();

    info!("Server running at http://{}", config.bind_addr);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(jwt_secret.clone()))
            .app_data(web::Data::new(state.clone()))
            .configure(api_routes)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    self, App, HttpServer,
    middleware::{Logger, from_fn},
    web,
};
use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use crate::{
    configs::{RedisCache, connect_database},
    middlewares::authentication,
    modules::{
        broadcast::{
            channel::ParticipantChannelAuthorizer,
            notifier::{BroadcastConfig, BroadcastDriver, Broadcaster, Notifier},
            service::ChannelAuthService,
        },
        call::{repository_pg::CallRepositoryPg, service::CallService},
        chat::{repository_pg::ChatRepositoryPg, service::ChatService},
        contact::{repository_pg::ContactRepositoryPg, service::ContactService},
        message::{repository_pg::MessageRepositoryPg, service::MessageService},
        setting::{repository_pg::SettingRepositoryPg, service::SettingsService},
        status::{repository_pg::StatusRepositoryPg, service::StatusService},
        user::repository_pg::UserRepositoryPg,
        websocket::{
            broadcaster::WebSocketBroadcaster, handler::websocket_handler,
            server::WebSocketServer, session::SessionConfig,
        },
    },
};

mod api;
mod configs;
mod constants;
mod middlewares;
mod modules;
#[cfg(test)]
mod test;
mod utils;

pub static ENV: LazyLock<constants::Env> = LazyLock::new(|| {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Environment variables loaded from .env file");
    constants::Env::default()
});

#[actix_web::get("/")]
async fn health_check() -> &'static str {
    "Server is running"
}

/// Boot-time broadcast settings, overridden later by the configuration store.
fn default_broadcast_config() -> BroadcastConfig {
    let driver = BroadcastDriver::parse(&ENV.broadcast_driver).unwrap_or_else(|| {
        log::warn!("Unknown BROADCAST_DRIVER {:?}, using websocket", ENV.broadcast_driver);
        BroadcastDriver::WebSocket
    });
    BroadcastConfig {
        timeout: Duration::from_millis(ENV.broadcast_timeout_ms),
        ..BroadcastConfig::new(driver)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let db_pool =
        connect_database().await.map_err(|_| std::io::Error::other("Database connection error"))?;

    let redis_pool =
        RedisCache::new().await.map_err(|_| std::io::Error::other("Redis connection error"))?;

    let ws_server = WebSocketServer::new().start();

    let user_repo = Arc::new(UserRepositoryPg::new(db_pool.clone()));
    let chat_repo = Arc::new(ChatRepositoryPg::new(db_pool.clone()));
    let message_repo = Arc::new(MessageRepositoryPg::new(db_pool.clone()));
    let contact_repo = Arc::new(ContactRepositoryPg::new(db_pool.clone()));
    let status_repo = Arc::new(StatusRepositoryPg::new(db_pool.clone()));
    let call_repo = Arc::new(CallRepositoryPg::new(db_pool.clone()));
    let setting_repo = Arc::new(SettingRepositoryPg::new(db_pool.clone()));

    let broadcast_defaults = default_broadcast_config();
    let ws_backend: Arc<dyn Broadcaster> = Arc::new(WebSocketBroadcaster::new(ws_server.clone()));
    let notifier = Arc::new(Notifier::new(&broadcast_defaults, Some(ws_backend)));

    let setting_service = SettingsService::with_dependencies(
        setting_repo,
        Arc::new(redis_pool.clone()),
        notifier.clone(),
        broadcast_defaults,
    );
    let reloaded = setting_service.reload_broadcast().await;
    log::info!("Broadcasting through {} (enabled: {})", reloaded.driver, reloaded.enabled);

    let chat_service = ChatService::with_dependencies(
        chat_repo.clone(),
        message_repo.clone(),
        user_repo.clone(),
        notifier.clone(),
    );
    let message_service =
        MessageService::with_dependencies(message_repo, chat_repo.clone(), notifier.clone());
    let contact_service = ContactService::with_dependencies(contact_repo.clone(), user_repo.clone());
    let status_service = StatusService::with_dependencies(
        status_repo,
        contact_repo,
        user_repo.clone(),
        notifier.clone(),
        chrono::Duration::hours(ENV.status_ttl_hours),
    );
    let call_service = CallService::with_dependencies(
        call_repo,
        chat_repo.clone(),
        user_repo,
        notifier.clone(),
        Duration::from_secs(ENV.call_ring_timeout_secs),
    );

    let auth_service =
        ChannelAuthService::new(Arc::new(ParticipantChannelAuthorizer::new(chat_repo)));
    let session_config = web::Data::new(SessionConfig {
        authorizer: auth_service.authorizer(),
        jwt_secret: ENV.jwt_secret.clone(),
    });

    let _cleanup =
        status_service.spawn_cleanup(Duration::from_secs(ENV.status_cleanup_interval_secs));
    let _ring_sweep =
        call_service.spawn_ring_sweep(Duration::from_secs(ENV.call_sweep_interval_secs));

    log::info!("Starting server at http://{}:{}", ENV.ip.as_str(), ENV.port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&ENV.frontend_url)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(chat_service.clone()))
            .app_data(web::Data::new(message_service.clone()))
            .app_data(web::Data::new(contact_service.clone()))
            .app_data(web::Data::new(status_service.clone()))
            .app_data(web::Data::new(call_service.clone()))
            .app_data(web::Data::new(setting_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(ws_server.clone()))
            .app_data(session_config.clone())
            .service(health_check)
            .route("/ws", web::get().to(websocket_handler))
            .service(
                web::scope("/api")
                    .wrap(from_fn(authentication))
                    .configure(modules::message::route::configure)
                    .configure(modules::chat::route::configure)
                    .configure(modules::contact::route::configure)
                    .configure(modules::status::route::configure)
                    .configure(modules::call::route::configure)
                    .configure(modules::broadcast::route::configure)
                    .configure(modules::setting::route::configure),
            )
    })
    .bind((ENV.ip.as_str(), ENV.port))?
    .workers(2)
    .run()
    .await
}

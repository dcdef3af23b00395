use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use clap::Parser;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use recipe_board::{
    backend::{identity::SqliteIdentityProvider, media_store::FsObjectStore, redb_store::RedbDocumentStore},
    config::Config,
    routes, AppState,
};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "recipe_board_server", author, version, about = "Starts the recipe board API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn fatal<E: Display>(context: &'static str) -> impl FnOnce(E) -> io::Error {
    move |e| io::Error::new(io::ErrorKind::Other, format!("FATAL: {}: {}", context, e))
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .map_err(fatal("Failed to load or parse configuration"))?;

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    fs::create_dir_all(&config.database_path)?;
    fs::create_dir_all(&config.media_path)?;

    let documents_path = config.documents_db_path();
    if let Some(parent) = documents_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let documents = RedbDocumentStore::create(&documents_path)
        .map_err(fatal("Could not open the documents database"))?;

    let users_path = config.users_db_path();
    if !users_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "FATAL: {} not found. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
                users_path.display()
            ),
        ));
    }
    let pool = Pool::builder()
        .build(SqliteConnectionManager::file(&users_path))
        .map_err(fatal("Failed to create Rusqlite connection pool"))?;

    let objects = FsObjectStore::new(&config.media_path, &config.media_base_url())
        .map_err(fatal("Invalid PUBLIC_BASE_URL"))?;

    let app_state = web::Data::new(AppState {
        documents: Arc::new(documents),
        objects: Arc::new(objects),
        identity: Arc::new(SqliteIdentityProvider::new(pool)),
    });

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .map_err(fatal("SESSION_SECRET_KEY is not a valid hex string"))?;
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .map_err(fatal("SESSION_SECRET_KEY is too short (64 bytes required)"))?;

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .app_data(app_state.clone())
            .configure(routes::config_api)
            .service(actix_files::Files::new("/media", &config.media_path))
    })
    .bind(server_address)?
    .run()
    .await
}

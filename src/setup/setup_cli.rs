use clap::{Parser, Subcommand};
use rand::RngCore;
use recipe_board::backend::media_store::FsObjectStore;
use recipe_board::backend::redb_store::RedbDocumentStore;
use recipe_board::config::Config;
use recipe_board::models::db_operations::{posts_db_operations, users_db_operations};
use recipe_board::setup::db_setup;
use redb::Database;
use rusqlite::Connection;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for recipe board setup and maintenance.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file. Not needed for `keygen`.
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Prints a fresh SESSION_SECRET_KEY.
    Keygen,
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    Media {
        #[command(subcommand)]
        action: MediaAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Creates the `users` and/or `documents` database.
    Setup { db_type: Option<String> },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    List,
}

#[derive(Subcommand, Debug)]
enum MediaAction {
    /// Lists stored post images no post refers to.
    Orphans,
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Keygen => generate_session_key(),
        Commands::Db { action } => {
            let Some(config) = load_config(cli.env_file.as_deref()) else { return };
            match action {
                DbAction::Setup { db_type } => match db_type.as_deref() {
                    Some("users") => setup_users_database(&config),
                    Some("documents") => setup_documents_database(&config),
                    Some(other) => eprintln!(
                        "❌ Error: Unknown database type '{}'. Use 'users' or 'documents'.",
                        other
                    ),
                    None => {
                        setup_users_database(&config);
                        setup_documents_database(&config);
                    }
                },
            }
        }
        Commands::User { action } => {
            let Some(config) = load_config(cli.env_file.as_deref()) else { return };
            match action {
                UserAction::List => list_users(&config),
            }
        }
        Commands::Media { action } => {
            let Some(config) = load_config(cli.env_file.as_deref()) else { return };
            match action {
                MediaAction::Orphans => list_orphaned_images(&config),
            }
        }
    }
}

fn load_config(env_file: Option<&Path>) -> Option<Config> {
    let Some(env_file) = env_file else {
        eprintln!("❌ Error: --env-file is required for this command.");
        return None;
    };
    match Config::from_env(env_file) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("❌ {}", e);
            None
        }
    }
}

fn generate_session_key() {
    let mut key = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut key);
    println!("SESSION_SECRET_KEY={}", hex::encode(key));
}

fn ensure_parent_dir(db_path: &Path) -> bool {
    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error: Could not create '{}': {}", parent_dir.display(), e);
            return false;
        }
    }
    true
}

fn setup_users_database(config: &Config) {
    let db_path = config.users_db_path();
    if db_path.exists() {
        println!("ℹ️ Users database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up users database at '{}'...", db_path.display());
    if !ensure_parent_dir(&db_path) {
        return;
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error creating users database file: {}", e);
            return;
        }
    };
    match db_setup::setup_users_db(&mut conn) {
        Ok(_) => println!("✅ Users database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up users database: {}", e),
    }
}

fn setup_documents_database(config: &Config) {
    let db_path = config.documents_db_path();
    if db_path.exists() {
        println!("ℹ️ Documents database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up documents database at '{}'...", db_path.display());
    if !ensure_parent_dir(&db_path) {
        return;
    }

    let db = match Database::create(&db_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("❌ Error creating documents database file: {}", e);
            return;
        }
    };
    match db_setup::setup_documents_db(&db) {
        Ok(_) => println!("✅ Documents database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up documents database: {}", e),
    }
}

fn list_users(config: &Config) {
    let db_path = config.users_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Users database not found. Please run `setup_cli db setup` first.");
        return;
    }
    let conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ Error opening users database: {}", e);
            return;
        }
    };

    match users_db_operations::read_all_users(&conn) {
        Ok(users) => {
            println!("Listing users ({}):", users.len());
            for user in users {
                println!("- {} <{}> ({})", user.display_label(), user.email, user.uid);
            }
        }
        Err(e) => eprintln!("❌ Error fetching users: {}", e),
    }
}

fn list_orphaned_images(config: &Config) {
    let db_path = config.documents_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Documents database not found. Please run `setup_cli db setup` first.");
        return;
    }
    let store = match RedbDocumentStore::create(&db_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("❌ Error opening documents database: {}", e);
            return;
        }
    };
    let objects = match FsObjectStore::new(&config.media_path, &config.media_base_url()) {
        Ok(objects) => objects,
        Err(e) => {
            eprintln!("❌ Error: Invalid media configuration: {}", e);
            return;
        }
    };
    let referenced: HashSet<String> = match posts_db_operations::list_posts(&store) {
        Ok(posts) => posts.into_iter().filter_map(|post| post.image_url).collect(),
        Err(e) => {
            eprintln!("❌ Error reading posts: {}", e);
            return;
        }
    };

    let image_dir = objects.root().join(posts_db_operations::IMAGE_PREFIX);
    if !image_dir.exists() {
        println!("ℹ️ No images stored yet.");
        return;
    }

    let mut orphans = 0;
    for entry in WalkDir::new(&image_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let object_path = format!("{}/{}", posts_db_operations::IMAGE_PREFIX, name);
        match objects.url_for(&object_path) {
            Ok(url) if !referenced.contains(&url) => {
                orphans += 1;
                println!("- {}", entry.path().display());
            }
            Ok(_) => {}
            Err(e) => eprintln!("❌ Could not map '{}' to a URL: {}", entry.path().display(), e),
        }
    }
    println!("Found {} orphaned image(s).", orphans);
}

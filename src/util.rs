use std::net::SocketAddr;
use std::path::PathBuf;

const DATABASE_URL: &str = "DATABASE_URL";

/// SQLite file from `DATABASE_URL`, with or without a `sqlite://` scheme.
pub fn get_database_path() -> Option<PathBuf> {
    let url = std::env::var(DATABASE_URL).ok()?;
    database_path_from_url(&url)
}

fn database_path_from_url(url: &str) -> Option<PathBuf> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

const RABBITMQ_URL: &str = "RABBITMQ_URL";

pub fn get_broker_url() -> Option<String> {
    std::env::var(RABBITMQ_URL).ok().filter(|url| !url.is_empty())
}

const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";

pub fn get_webhook_url() -> Option<String> {
    std::env::var(DISCORD_WEBHOOK_URL)
        .ok()
        .filter(|url| !url.is_empty())
}

const BIND_ADDR: &str = "HORUS_BIND_ADDR";

pub fn get_bind_addr() -> Option<SocketAddr> {
    std::env::var(BIND_ADDR).ok()?.parse().ok()
}

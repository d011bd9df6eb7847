pub struct Env {
    pub jwt_secret: String,
    pub database_url: String,
    pub redis_url: String,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub call_ring_timeout_secs: u64,
    pub call_sweep_interval_secs: u64,
    pub status_ttl_hours: i64,
    pub status_cleanup_interval_secs: u64,
    pub broadcast_driver: String,
    pub broadcast_timeout_ms: u64,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: &str) -> T {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .unwrap_or_else(|_| panic!("{key} must be a valid number"))
}

impl Env {
    fn new() -> Self {
        let jwt_secret = std::env::var("SECRET_KEY")
            .expect("SECRET_KEY must be set in .env file or environment variable");

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");
        let redis_url = std::env::var("REDIS_URL")
            .expect("REDIS_URL must be set in .env file or environment variable");

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or::<u16>("PORT", "8080");

        let call_ring_timeout_secs = parse_or::<u64>("CALL_RING_TIMEOUT_SECS", "45");
        let call_sweep_interval_secs = parse_or::<u64>("CALL_SWEEP_INTERVAL_SECS", "30");
        let status_ttl_hours = parse_or::<i64>("STATUS_TTL_HOURS", "24");
        let status_cleanup_interval_secs =
            parse_or::<u64>("STATUS_CLEANUP_INTERVAL_SECS", "3600");

        let broadcast_driver =
            std::env::var("BROADCAST_DRIVER").unwrap_or_else(|_| "websocket".to_string());
        let broadcast_timeout_ms = parse_or::<u64>("BROADCAST_TIMEOUT_MS", "2000");

        Env {
            jwt_secret,
            database_url,
            redis_url,
            frontend_url,
            ip,
            port,
            call_ring_timeout_secs,
            call_sweep_interval_secs,
            status_ttl_hours,
            status_cleanup_interval_secs,
            broadcast_driver,
            broadcast_timeout_ms,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

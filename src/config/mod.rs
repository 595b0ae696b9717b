use std::env;
use std::time::Duration;

pub const MEMORY_DATABASE_URL: &str = "memory://";

const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub bcrypt_cost: u32,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub cors_permissive: bool,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub persona_instruction: String,
    pub generation_temperature: f32,
    pub upstream_timeout_secs: u64,
    pub require_auth_for_generation: bool,
    /// Request body cap for chat routes; saved images travel as data URIs.
    pub max_body_bytes: usize,
}

const DEFAULT_PERSONA: &str = "You are JOINT HUB, a laid-back but sharp assistant. \
Keep answers short, friendly and direct, and stay in character.";

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn flag(key: &str) -> bool {
    matches!(
        env::var(key).map(|v| v.to_ascii_lowercase()).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = var_or("JWT_EXPIRATION", "24h")
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            db_max_connections: var_or("DB_MAX_CONNECTIONS", "10").parse().unwrap_or(10),
            db_connect_timeout_secs: var_or("DB_CONNECT_TIMEOUT", "5").parse().unwrap_or(5),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            bcrypt_cost: var_or("BCRYPT_COST", "10").parse().unwrap_or(10),
            rate_limit_window_secs: var_or("RATE_LIMIT_WINDOW", "60").parse().unwrap_or(60),
            rate_limit_requests: var_or("RATE_LIMIT_REQUESTS", "100").parse().unwrap_or(100),
            server_host: var_or("SERVER_HOST", "0.0.0.0"),
            server_port: var_or("SERVER_PORT", "3000").parse().unwrap_or(3000),
            api_base_uri: var_or("API_BASE_URI", "/api"),
            cors_permissive: flag("CORS_PERMISSIVE"),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            gemini_base_url: var_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            text_model: var_or("TEXT_MODEL", "gemini-2.0-flash"),
            image_model: var_or("IMAGE_MODEL", "imagen-3.0-generate-002"),
            persona_instruction: var_or("PERSONA_INSTRUCTION", DEFAULT_PERSONA),
            generation_temperature: var_or("GENERATION_TEMPERATURE", "0.9")
                .parse()
                .unwrap_or(0.9),
            upstream_timeout_secs: var_or("UPSTREAM_TIMEOUT", "60").parse().unwrap_or(60),
            require_auth_for_generation: flag("REQUIRE_AUTH_FOR_GENERATION"),
            max_body_bytes: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn db_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.db_connect_timeout_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

#[cfg(test)]
impl Config {
    /// Settings for router tests: in-memory store, cheap bcrypt, no upstream key.
    pub fn for_tests() -> Self {
        Config {
            database_url: MEMORY_DATABASE_URL.to_string(),
            db_max_connections: 1,
            db_connect_timeout_secs: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_secs: 3600,
            bcrypt_cost: 4,
            rate_limit_window_secs: 60,
            rate_limit_requests: 1000,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            api_base_uri: "/api".to_string(),
            cors_permissive: false,
            gemini_api_key: None,
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            text_model: "test-text".to_string(),
            image_model: "test-image".to_string(),
            persona_instruction: DEFAULT_PERSONA.to_string(),
            generation_temperature: 0.9,
            upstream_timeout_secs: 5,
            require_auth_for_generation: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

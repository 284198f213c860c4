/// URL for accessing the PostgreSQL database holding the `todos` table
pub const DB_URL: &str = "DATABASE_URL";
/// Log level configuration for the application. For formatting info, see [tracing_subscriber's EnvFilter documentation](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html)
pub const LOG_LEVEL: &str = "LOG_LEVEL";
/// Socket address the HTTP server listens on. Defaults to [DEFAULT_BIND_ADDR]
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// OTLP endpoint spans are exported to, usually a collector sidecar on http://localhost:4317.
/// Unset disables export.
pub const OTEL_SPAN_EXPORT_URL: &str = "OTEL_SPAN_EXPORT_URL";

/// API key for the generative model used to parse free-text tasks. Optional: when it's missing the
/// server still starts, but the parse endpoint answers with a 500.
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Model identifier used for task parsing
pub const GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
/// Base URL of the generative language API
pub const GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Base URL of the GoTrue-compatible identity provider (e.g. https://<project>.supabase.co)
pub const AUTH_BASE_URL: &str = "AUTH_BASE_URL";
/// Public API key sent to the identity provider with every request
pub const AUTH_API_KEY: &str = "AUTH_API_KEY";

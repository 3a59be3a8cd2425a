use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading/validation error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool provisioning/execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Checkpoint persistence error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Agent turn protocol error.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment value was not provided.
    #[error("Missing {0}. Add it to your .env file.")]
    MissingEnv(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// LLM provider errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// Remote API failure.
    #[error("{0}")]
    Api(String),

    /// Provider throttled the request.
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Provider response schema/content was invalid.
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),

    /// Runtime exceeded configured tool-call rounds.
    #[error("Max tool rounds exceeded")]
    MaxToolRoundsExceeded,

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tool provisioning, authorization, and execution errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool service HTTP/transport failure.
    #[error("Request failed: {0}")]
    Http(String),

    /// Tool service answered with a non-success status.
    #[error("Tool service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Tool service response could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authorization did not complete successfully.
    #[error("Authorization {id} ended with status '{status}'")]
    AuthorizationFailed { id: String, status: String },}

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx operation error.
    #[error("SQLx error: {0}")]
    Sqlx(String),

    /// Migration execution error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Stored checkpoint could not be encoded or decoded.
    #[error("Checkpoint encoding error: {0}")]
    Encoding(String),
}

/// Agent turn protocol errors
#[derive(Debug, Error)]
pub enum AgentError {
    /// A resume was submitted but the thread has no paused tool calls.
    #[error("Thread {0} has no pending interrupts to resume")]
    NothingToResume(String),

    /// Resume decisions do not line up with the pending interrupts.
    #[error("Expected {expected} decision(s) for pending interrupts, got {actual}")]
    DecisionMismatch { expected: usize, actual: usize },}

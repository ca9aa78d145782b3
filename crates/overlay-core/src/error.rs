use thiserror::Error;

/// Core error types for Overlay operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid fragment provider id: {0}")]
    InvalidProviderId(String),

    #[error("Invalid route '{path}': {message}")]
    InvalidRoute { path: String, message: String },

    #[error("Duplicate route path '{path}' in fragment")]
    DuplicateRoute { path: String },

    #[error("Duplicate route name '{name}' in fragment")]
    DuplicateRouteName { name: String },

    #[error("Fragment provider already registered: {0}")]
    ProviderConflict(String),

    #[error("Override payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidProviderId error
    pub fn invalid_provider_id(id: impl Into<String>) -> Self {
        Self::InvalidProviderId(id.into())
    }

    /// Create a new InvalidRoute error
    pub fn invalid_route(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRoute {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new DuplicateRoute error
    pub fn duplicate_route(path: impl Into<String>) -> Self {
        Self::DuplicateRoute { path: path.into() }
    }

    /// Create a new DuplicateRouteName error
    pub fn duplicate_route_name(name: impl Into<String>) -> Self {
        Self::DuplicateRouteName { name: name.into() }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

use thiserror::Error;

use crate::payment::GatewayError;

/// Error types for the compute module
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A referenced record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The requester may not act on the record
    #[error("{0}")]
    Forbidden(String),

    /// Input rejected before touching the store
    #[error("{0}")]
    Validation(String),

    #[error("no hay cupos disponibles")]
    NoPlacesAvailable,

    #[error("No cumples la edad mínima para este curso: se requieren {required} años, tienes {actual}")]
    UnderAge { required: i32, actual: i32 },

    #[error("ya estás inscrito en este curso")]
    AlreadyEnrolled,

    #[error("El estudiante no está inscrito en este curso")]
    NotEnrolled,

    /// Error from the external payment provider
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Error from date operations
    #[error("Date error: {0}")]
    Date(String),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;

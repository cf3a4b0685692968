use diesel::result::DatabaseErrorKind;
use diesel_async::pooled_connection::deadpool;
use hostel_booking_core::error::{BookingError, StoreError};
use hostel_booking_core::model::InvalidRoom;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Database contains invalid data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookingError> for DatabaseError {
    fn from(value: BookingError) -> Self {
        Self::Store(value.into())
    }
}

impl From<InvalidRoom> for DatabaseError {
    fn from(value: InvalidRoom) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl From<DatabaseError> for StoreError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::Store(error) => error,
            DatabaseError::InvalidData(message) => Self::Invalid(message),
            DatabaseError::Database(diesel::result::Error::DatabaseError(kind, info)) => {
                match kind {
                    DatabaseErrorKind::SerializationFailure => {
                        BookingError::ConcurrencyConflict.into()
                    }
                    DatabaseErrorKind::UniqueViolation => Self::Conflict(info.message().to_owned()),
                    DatabaseErrorKind::CheckViolation => Self::Invalid(info.message().to_owned()),
                    _ => Self::Backend(Box::new(diesel::result::Error::DatabaseError(kind, info))),
                }
            }
            other => Self::Backend(Box::new(other)),
        }
    }
}

use crate::model::{Gender, InvalidRoom, RoomId};

/// Business rule violations. All of them are expected outcomes that are
/// shown to the user, none of them is an infrastructure fault.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error(
        "Gender information is required to view blocks and book rooms. Please complete your \
         profile."
    )]
    ProfileIncomplete,
    #[error("Access denied: block {block} is for {gender} residents only.")]
    AccessDenied { block: String, gender: Gender },
    #[error(
        "You already have room {room} booked. Please cancel it first or confirm to switch rooms."
    )]
    AlreadyBooked { room: RoomId },
    #[error("Room {0} is already fully booked.")]
    RoomFull(RoomId),
    #[error("You do not have an active booking for room {0}.")]
    NotBooked(RoomId),
    #[error("The room was changed by someone else at the same time. Please try again.")]
    ConcurrencyConflict,
}

impl BookingError {
    /// Stable machine readable name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProfileIncomplete => "profile-incomplete",
            Self::AccessDenied { .. } => "access-denied",
            Self::AlreadyBooked { .. } => "already-booked",
            Self::RoomFull(_) => "room-full",
            Self::NotBooked(_) => "not-booked",
            Self::ConcurrencyConflict => "concurrency-conflict",
        }
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Rejected(#[from] BookingError),
    #[error("{kind} {id} does not exist")]
    NotFound { kind: &'static str, id: i32 },
    #[error("{0}")]
    Conflict(String),
    #[error("invalid data: {0}")]
    Invalid(String),
    #[error("storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    #[must_use]
    pub const fn not_found(kind: &'static str, id: i32) -> Self {
        Self::NotFound { kind, id }
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&BookingError> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<InvalidRoom> for StoreError {
    fn from(value: InvalidRoom) -> Self {
        Self::Invalid(value.to_string())
    }
}

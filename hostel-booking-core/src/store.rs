use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;
use crate::model::{
    Block, BlockId, Floor, FloorId, Gender, Profile, Room, RoomDetail, RoomId, User, UserId,
};
use crate::policy::BookingOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub subject: String,
    pub display_name: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub name: String,
    pub gender: Gender,
    pub description: String,
}

/// Longest block name or room number a store accepts.
pub const MAX_NAME_LENGTH: usize = 50;

/// Longest subject or display name a store accepts.
pub const MAX_USER_FIELD_LENGTH: usize = 255;

/// Rejects `value` when it has more than `max` characters.
pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), StoreError> {
    if value.chars().count() > max {
        return Err(StoreError::Invalid(format!(
            "{field} must be at most {max} characters long"
        )));
    }
    Ok(())
}

pub fn check_user(subject: &str, display_name: &str) -> Result<(), StoreError> {
    check_length("subject", subject, MAX_USER_FIELD_LENGTH)?;
    check_length("display name", display_name, MAX_USER_FIELD_LENGTH)
}

/// Result of a successful booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingReceipt {
    pub outcome: BookingOutcome,
    pub room: RoomDetail,
    /// The room given up by a switch, after the release.
    pub released: Option<Room>,
}

/// Persisted hostel state.
///
/// `book` and `cancel` must load, check and write inside one serialisable
/// unit of work, running the checks of [`crate::policy`] against what they
/// loaded.
#[async_trait]
pub trait HostelStore: Send + Sync {
    /// Creates a user together with a complete profile.
    async fn register(&self, registration: Registration) -> Result<(User, Profile), StoreError>;

    /// Creates a user without a profile, the way imported accounts start
    /// out before their first login.
    async fn create_user(&self, subject: &str, display_name: &str) -> Result<User, StoreError>;

    async fn user_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError>;

    /// Creates a profile without gender unless one exists. Idempotent.
    async fn ensure_profile(&self, user: UserId) -> Result<Profile, StoreError>;

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, StoreError>;

    /// Sets the gender of a profile that has none yet.
    async fn set_gender(&self, user: UserId, gender: Gender) -> Result<Profile, StoreError>;

    /// Blocks of one gender ordered by name.
    async fn blocks_for_gender(&self, gender: Gender) -> Result<Vec<Block>, StoreError>;

    async fn block(&self, id: BlockId) -> Result<Block, StoreError>;

    /// Floors of a block ordered by floor number.
    async fn floors(&self, block: BlockId) -> Result<Vec<Floor>, StoreError>;

    /// Rooms of a floor ordered by room number.
    async fn rooms(&self, floor: FloorId) -> Result<Vec<Room>, StoreError>;

    async fn room(&self, id: RoomId) -> Result<RoomDetail, StoreError>;

    /// The room the user currently occupies.
    async fn booking_of(&self, user: UserId) -> Result<Option<RoomDetail>, StoreError>;

    async fn book(
        &self,
        profile: &Profile,
        room: RoomId,
        switch: bool,
    ) -> Result<BookingReceipt, StoreError>;

    async fn cancel(&self, user: UserId, room: RoomId) -> Result<RoomDetail, StoreError>;

    async fn create_block(&self, block: NewBlock) -> Result<Block, StoreError>;

    async fn create_floor(&self, block: BlockId, number: i32) -> Result<Floor, StoreError>;

    async fn create_room(
        &self,
        floor: FloorId,
        number: &str,
        capacity: u32,
    ) -> Result<Room, StoreError>;
}

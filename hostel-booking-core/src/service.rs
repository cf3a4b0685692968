//! Use cases of the booking system.
//!
//! Every operation takes the caller's identity explicitly and runs the
//! gender guard before touching the directory.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{BookingError, StoreError};
use crate::model::{
    Block, BlockId, BlockLayout, FloorLayout, Gender, Profile, RoomDetail, RoomId, User, UserId,
};
use crate::policy::{self, BookingOutcome};
use crate::store::{BookingReceipt, HostelStore, Registration};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub user: User,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomView {
    #[serde(flatten)]
    pub detail: RoomDetail,
    pub can_book: bool,
    pub user_has_booking: bool,
    pub is_user_room: bool,
    pub user_room: Option<RoomDetail>,
}

/// What the user is asked to confirm before booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmView {
    #[serde(flatten)]
    pub detail: RoomDetail,
    /// Booking that will be given up when the user confirms a switch.
    pub current_booking: Option<RoomDetail>,
    pub requires_switch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub user: User,
    pub profile: Profile,
    pub booking: Option<RoomDetail>,
    pub profile_complete: bool,
}

#[derive(Clone)]
pub struct HostelService {
    store: Arc<dyn HostelStore>,
    conflict_retries: u32,
}

impl HostelService {
    #[must_use]
    pub fn new(store: Arc<dyn HostelStore>, conflict_retries: u32) -> Self {
        Self {
            store,
            conflict_retries,
        }
    }

    #[instrument(skip(self, registration), fields(subject = %registration.subject))]
    pub async fn register(&self, registration: Registration) -> Result<Account, StoreError> {
        let (user, profile) = self.store.register(registration).await?;
        info!(user = %user.id, gender = ?profile.gender, "registered user");
        Ok(Account { user, profile })
    }

    pub async fn ensure_profile(&self, user: UserId) -> Result<Profile, StoreError> {
        self.store.ensure_profile(user).await
    }

    /// Sets the gender of a profile that was created without one.
    pub async fn complete_profile(
        &self,
        profile: &Profile,
        gender: Gender,
    ) -> Result<Profile, StoreError> {
        if profile.gender.is_some() {
            return Err(StoreError::Conflict(
                "gender is already set, please contact an administrator to change it".to_owned(),
            ));
        }
        let profile = self.store.set_gender(profile.user_id, gender).await?;
        info!(user = %profile.user_id, %gender, "completed profile");
        Ok(profile)
    }

    /// Looks up a registered user. A missing profile reads as incomplete.
    pub async fn account(&self, subject: &str) -> Result<Option<Account>, StoreError> {
        let Some(user) = self.store.user_by_subject(subject).await? else {
            return Ok(None);
        };
        let profile = self
            .store
            .profile(user.id)
            .await?
            .unwrap_or_else(|| Profile::incomplete(user.id));
        Ok(Some(Account { user, profile }))
    }

    pub async fn list_blocks_for_gender(
        &self,
        gender: Option<Gender>,
    ) -> Result<Vec<Block>, StoreError> {
        match gender {
            Some(gender) => self.store.blocks_for_gender(gender).await,
            None => Ok(Vec::new()),
        }
    }

    /// Blocks the user may book in.
    pub async fn blocks(&self, profile: &Profile) -> Result<Vec<Block>, StoreError> {
        let gender = policy::require_gender(profile)?;
        self.list_blocks_for_gender(Some(gender)).await
    }

    pub async fn block_layout(
        &self,
        profile: &Profile,
        block: BlockId,
    ) -> Result<BlockLayout, StoreError> {
        let block = self.store.block(block).await?;
        policy::authorize(profile, &block)?;

        let mut floors = Vec::new();
        for floor in self.store.floors(block.id).await? {
            let rooms = self.store.rooms(floor.id).await?;
            floors.push(FloorLayout { floor, rooms });
        }
        Ok(BlockLayout { block, floors })
    }

    pub async fn room_view(&self, profile: &Profile, room: RoomId) -> Result<RoomView, StoreError> {
        let detail = self.store.room(room).await?;
        policy::authorize(profile, &detail.block)?;

        let user_room = self.store.booking_of(profile.user_id).await?;
        let current = user_room.as_ref().map(|booking| booking.room.id);
        Ok(RoomView {
            can_book: policy::can_book(profile, &detail, current),
            user_has_booking: user_room.is_some(),
            is_user_room: current == Some(detail.room.id),
            detail,
            user_room,
        })
    }

    /// Checks that the room could be booked right now without changing
    /// anything.
    pub async fn confirm(&self, profile: &Profile, room: RoomId) -> Result<ConfirmView, StoreError> {
        let detail = self.store.room(room).await?;
        policy::authorize(profile, &detail.block)?;
        if detail.room.is_occupant(profile.user_id) {
            return Err(BookingError::AlreadyBooked { room }.into());
        }
        if !detail.room.state().accepts_bookings() {
            return Err(BookingError::RoomFull(room).into());
        }

        let current_booking = self.store.booking_of(profile.user_id).await?;
        Ok(ConfirmView {
            requires_switch: current_booking.is_some(),
            detail,
            current_booking,
        })
    }

    /// Books `room`, switching away from an existing booking when `switch`
    /// is set. Transient conflicts are retried a bounded number of times.
    #[instrument(skip(self, profile), fields(user = %profile.user_id))]
    pub async fn book(
        &self,
        profile: &Profile,
        room: RoomId,
        switch: bool,
    ) -> Result<BookingReceipt, StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.book(profile, room, switch).await {
                Ok(receipt) => {
                    match receipt.outcome {
                        BookingOutcome::Booked => info!("booked room"),
                        BookingOutcome::Switched { from } => info!(%from, "switched room"),
                    }
                    return Ok(receipt);
                }
                Err(StoreError::Rejected(BookingError::ConcurrencyConflict))
                    if attempt < self.conflict_retries =>
                {
                    attempt += 1;
                    warn!(attempt, "booking conflicted with a concurrent change, retrying");
                }
                Err(error) => return Err(error),
            }
        }
    }

    #[instrument(skip(self, profile), fields(user = %profile.user_id))]
    pub async fn cancel(&self, profile: &Profile, room: RoomId) -> Result<RoomDetail, StoreError> {
        let detail = self.store.room(room).await?;
        policy::authorize(profile, &detail.block)?;
        let detail = self.store.cancel(profile.user_id, room).await?;
        info!("cancelled booking");
        Ok(detail)
    }

    pub async fn dashboard(&self, account: Account) -> Result<Dashboard, StoreError> {
        let booking = self.store.booking_of(account.user.id).await?;
        Ok(Dashboard {
            profile_complete: account.profile.gender.is_some(),
            user: account.user,
            profile: account.profile,
            booking,
        })
    }
}

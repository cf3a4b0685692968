//! Access control and occupancy rules.
//!
//! Everything here works on values that the store loaded inside one
//! transaction, so a store only has to persist what these functions changed.

use serde::Serialize;
use tracing::debug;

use crate::error::BookingError;
use crate::model::{Block, Gender, Profile, Room, RoomDetail, RoomId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BookingOutcome {
    Booked,
    /// The previous booking in `from` was released in the same step.
    Switched { from: RoomId },
}

/// Returns the gender of a complete profile.
pub const fn require_gender(profile: &Profile) -> Result<Gender, BookingError> {
    match profile.gender {
        Some(gender) => Ok(gender),
        None => Err(BookingError::ProfileIncomplete),
    }
}

/// Checks that `profile` may see and book rooms in `block`.
pub fn authorize(profile: &Profile, block: &Block) -> Result<(), BookingError> {
    let gender = require_gender(profile)?;
    if gender == block.gender {
        Ok(())
    } else {
        debug!(user = %profile.user_id, block = %block.id, "gender does not match block");
        Err(BookingError::AccessDenied {
            block: block.name.clone(),
            gender: block.gender,
        })
    }
}

/// Whether a booking of `detail` by `profile` would currently succeed
/// without asking for a switch.
#[must_use]
pub fn can_book(profile: &Profile, detail: &RoomDetail, current_booking: Option<RoomId>) -> bool {
    authorize(profile, &detail.block).is_ok()
        && current_booking.is_none()
        && detail.room.state().accepts_bookings()
}

/// Adds the user to `target`.
///
/// `current` is the room the user occupies right now, if any. Unless
/// `switch` is set that booking makes the request fail, otherwise it is
/// released first. Nothing is changed when an error is returned.
pub fn book(
    profile: &Profile,
    block: &Block,
    target: &mut Room,
    current: Option<&mut Room>,
    switch: bool,
) -> Result<BookingOutcome, BookingError> {
    authorize(profile, block)?;
    let user = profile.user_id;

    if target.is_occupant(user) {
        return Err(BookingError::AlreadyBooked { room: target.id });
    }
    if !target.state().accepts_bookings() {
        return Err(BookingError::RoomFull(target.id));
    }

    let outcome = match current {
        None => BookingOutcome::Booked,
        Some(previous) if !switch => {
            return Err(BookingError::AlreadyBooked { room: previous.id });
        }
        Some(previous) => {
            debug_assert_ne!(previous.id, target.id);
            previous.release(user)?;
            BookingOutcome::Switched { from: previous.id }
        }
    };
    target.admit(user)?;
    Ok(outcome)
}

/// Removes the user from `room`.
pub fn cancel(user: UserId, room: &mut Room) -> Result<(), BookingError> {
    room.release(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockId, Floor, FloorId, RoomState};

    fn block(gender: Gender) -> Block {
        Block {
            id: BlockId(1),
            name: "B1".to_owned(),
            gender,
            description: String::new(),
        }
    }

    fn profile(id: i32, gender: Option<Gender>) -> Profile {
        Profile {
            user_id: UserId(id),
            gender,
        }
    }

    fn room(id: i32, capacity: u32) -> Room {
        Room::new(RoomId(id), FloorId(1), format!("{id}"), capacity).unwrap()
    }

    #[test]
    fn authorize_matches_gender() {
        let male = profile(1, Some(Gender::Male));
        let female = profile(2, Some(Gender::Female));
        let unset = profile(3, None);

        assert_eq!(authorize(&male, &block(Gender::Male)), Ok(()));
        assert_eq!(authorize(&female, &block(Gender::Female)), Ok(()));
        assert_eq!(
            authorize(&male, &block(Gender::Female)),
            Err(BookingError::AccessDenied {
                block: "B1".to_owned(),
                gender: Gender::Female
            })
        );
        assert!(matches!(
            authorize(&female, &block(Gender::Male)),
            Err(BookingError::AccessDenied { .. })
        ));
        assert_eq!(
            authorize(&unset, &block(Gender::Male)),
            Err(BookingError::ProfileIncomplete)
        );
    }

    #[test]
    fn book_fills_room() {
        let block = block(Gender::Male);
        let mut target = room(101, 2);

        let outcome = book(&profile(1, Some(Gender::Male)), &block, &mut target, None, false);
        assert_eq!(outcome, Ok(BookingOutcome::Booked));
        assert_eq!(target.state(), RoomState::PartiallyOccupied);
        assert_eq!(target.primary_occupant(), Some(UserId(1)));

        book(&profile(2, Some(Gender::Male)), &block, &mut target, None, false).unwrap();
        assert_eq!(target.state(), RoomState::Full);
        assert!(target.is_booked());

        assert_eq!(
            book(&profile(3, Some(Gender::Male)), &block, &mut target, None, false),
            Err(BookingError::RoomFull(RoomId(101)))
        );
        assert_eq!(target.occupancy(), 2);
    }

    #[test]
    fn second_booking_needs_switch() {
        let block = block(Gender::Female);
        let user = profile(5, Some(Gender::Female));
        let mut previous = room(101, 2);
        let mut target = room(205, 2);
        book(&user, &block, &mut previous, None, false).unwrap();

        assert_eq!(
            book(&user, &block, &mut target, Some(&mut previous), false),
            Err(BookingError::AlreadyBooked { room: RoomId(101) })
        );
        assert!(previous.is_occupant(UserId(5)));
        assert_eq!(target.occupancy(), 0);

        assert_eq!(
            book(&user, &block, &mut target, Some(&mut previous), true),
            Ok(BookingOutcome::Switched { from: RoomId(101) })
        );
        assert!(!previous.is_occupant(UserId(5)));
        assert!(target.is_occupant(UserId(5)));
    }

    #[test]
    fn switch_into_full_room_keeps_old_booking() {
        let block = block(Gender::Male);
        let user = profile(1, Some(Gender::Male));
        let mut previous = room(101, 1);
        let mut target = room(102, 1);
        book(&user, &block, &mut previous, None, false).unwrap();
        book(&profile(2, Some(Gender::Male)), &block, &mut target, None, false).unwrap();

        assert_eq!(
            book(&user, &block, &mut target, Some(&mut previous), true),
            Err(BookingError::RoomFull(RoomId(102)))
        );
        assert!(previous.is_occupant(UserId(1)));
    }

    #[test]
    fn booking_own_room_again_is_rejected() {
        let block = block(Gender::Male);
        let user = profile(1, Some(Gender::Male));
        let mut target = room(101, 2);
        book(&user, &block, &mut target, None, false).unwrap();
        assert_eq!(
            book(&user, &block, &mut target, None, true),
            Err(BookingError::AlreadyBooked { room: RoomId(101) })
        );
    }

    #[test]
    fn book_then_cancel_restores_occupancy() {
        let block = block(Gender::Male);
        let mut target = room(101, 2);
        book(&profile(9, Some(Gender::Male)), &block, &mut target, None, false).unwrap();
        let before = target.occupancy();

        book(&profile(1, Some(Gender::Male)), &block, &mut target, None, false).unwrap();
        cancel(UserId(1), &mut target).unwrap();

        assert_eq!(target.occupancy(), before);
        assert_eq!(cancel(UserId(1), &mut target), Err(BookingError::NotBooked(RoomId(101))));
    }

    #[test]
    fn can_book_requires_free_spot_and_no_booking() {
        let detail = RoomDetail {
            block: block(Gender::Male),
            floor: Floor {
                id: FloorId(1),
                block_id: BlockId(1),
                number: 1,
            },
            room: room(101, 1),
        };
        let male = profile(1, Some(Gender::Male));
        assert!(can_book(&male, &detail, None));
        assert!(!can_book(&male, &detail, Some(RoomId(7))));
        assert!(!can_book(&profile(2, Some(Gender::Female)), &detail, None));
        assert!(!can_book(&profile(3, None), &detail, None));
    }
}

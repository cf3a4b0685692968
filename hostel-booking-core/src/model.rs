use core::fmt::{self, Display};
use core::str::FromStr;

use serde::ser::SerializeStruct as _;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::BookingError;

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub i32);

            impl Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    Display::fmt(&self.0, f)
                }
            }

            impl From<i32> for $name {
                fn from(value: i32) -> Self {
                    Self(value)
                }
            }
        )*
    };
}

id_type!(
    /// Stable identifier of an authenticated person.
    UserId,
    BlockId,
    FloorId,
    RoomId,
);

/// Parsed case-insensitively from `M`, `F`, `male` or `female`, serialized
/// as the single letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// Single letter code used in storage and forms.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown gender {0:?}, expected M or F")]
pub struct UnknownGender(pub String);

impl TryFrom<String> for Gender {
    type Error = UnknownGender;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Self::Male),
            "f" | "female" => Ok(Self::Female),
            _ => Err(UnknownGender(value.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Identifier handed out by the authentication provider.
    pub subject: String,
    pub display_name: String,
}

/// Per-user attributes used for access gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub gender: Option<Gender>,
}

impl Profile {
    #[must_use]
    pub const fn incomplete(user_id: UserId) -> Self {
        Self {
            user_id,
            gender: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub gender: Gender,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub id: FloorId,
    pub block_id: BlockId,
    pub number: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomState {
    Empty,
    PartiallyOccupied,
    Full,
}

impl RoomState {
    #[must_use]
    pub const fn accepts_bookings(self) -> bool {
        !matches!(self, Self::Full)
    }
}

/// A bookable room.
///
/// The occupant list is kept in booking order and is only changed by the
/// booking policy, which keeps `is_booked` and `primary_occupant` in sync
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub floor_id: FloorId,
    pub number: String,
    capacity: u32,
    occupants: Vec<UserId>,
    is_booked: bool,
    primary_occupant: Option<UserId>,
}

impl Room {
    pub fn new(
        id: RoomId,
        floor_id: FloorId,
        number: impl Into<String>,
        capacity: u32,
    ) -> Result<Self, InvalidRoom> {
        Self::from_parts(id, floor_id, number, capacity, Vec::new(), None)
    }

    /// Rebuilds a room from persisted rows.
    ///
    /// The stored primary occupant is kept when it is still an occupant,
    /// otherwise the earliest occupant takes its place.
    pub fn from_parts(
        id: RoomId,
        floor_id: FloorId,
        number: impl Into<String>,
        capacity: u32,
        occupants: Vec<UserId>,
        primary_occupant: Option<UserId>,
    ) -> Result<Self, InvalidRoom> {
        if capacity == 0 {
            return Err(InvalidRoom::ZeroCapacity);
        }
        if occupants.len() > capacity as usize {
            return Err(InvalidRoom::OverCapacity {
                occupants: occupants.len(),
                capacity,
            });
        }
        let mut room = Self {
            id,
            floor_id,
            number: number.into(),
            capacity,
            occupants,
            is_booked: false,
            primary_occupant,
        };
        room.refresh();
        Ok(room)
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    #[must_use]
    pub fn occupants(&self) -> &[UserId] {
        &self.occupants
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn occupancy(&self) -> u32 {
        // bounded by capacity which is a u32
        self.occupants.len() as u32
    }

    #[must_use]
    pub fn available_spots(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy())
    }

    #[must_use]
    pub fn state(&self) -> RoomState {
        match self.occupancy() {
            0 => RoomState::Empty,
            count if count < self.capacity => RoomState::PartiallyOccupied,
            _ => RoomState::Full,
        }
    }

    /// Denormalised flag, true once the room is at full capacity.
    #[must_use]
    pub const fn is_booked(&self) -> bool {
        self.is_booked
    }

    #[must_use]
    pub const fn primary_occupant(&self) -> Option<UserId> {
        self.primary_occupant
    }

    #[must_use]
    pub fn is_occupant(&self, user: UserId) -> bool {
        self.occupants.contains(&user)
    }

    pub(crate) fn admit(&mut self, user: UserId) -> Result<(), BookingError> {
        if self.is_occupant(user) {
            return Err(BookingError::AlreadyBooked { room: self.id });
        }
        if !self.state().accepts_bookings() {
            return Err(BookingError::RoomFull(self.id));
        }
        self.occupants.push(user);
        self.refresh();
        Ok(())
    }

    pub(crate) fn release(&mut self, user: UserId) -> Result<(), BookingError> {
        let Some(position) = self.occupants.iter().position(|occupant| *occupant == user) else {
            return Err(BookingError::NotBooked(self.id));
        };
        self.occupants.remove(position);
        if self.primary_occupant == Some(user) {
            self.primary_occupant = None;
        }
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        self.is_booked = self.state() == RoomState::Full;
        match self.primary_occupant {
            Some(primary) if self.occupants.contains(&primary) => {}
            _ => self.primary_occupant = self.occupants.first().copied(),
        }
    }
}

/// Serialized with the derived `state` and `available_spots` so clients do
/// not have to recompute them.
impl Serialize for Room {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut room = serializer.serialize_struct("Room", 9)?;
        room.serialize_field("id", &self.id)?;
        room.serialize_field("floor_id", &self.floor_id)?;
        room.serialize_field("number", &self.number)?;
        room.serialize_field("capacity", &self.capacity)?;
        room.serialize_field("occupants", &self.occupants)?;
        room.serialize_field("is_booked", &self.is_booked)?;
        room.serialize_field("primary_occupant", &self.primary_occupant)?;
        room.serialize_field("state", &self.state())?;
        room.serialize_field("available_spots", &self.available_spots())?;
        room.end()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRoom {
    #[error("room capacity must be at least one")]
    ZeroCapacity,
    #[error("room holds {occupants} occupants but only has capacity for {capacity}")]
    OverCapacity { occupants: usize, capacity: u32 },
}

/// A room together with where it is located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomDetail {
    pub block: Block,
    pub floor: Floor,
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FloorLayout {
    pub floor: Floor,
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockLayout {
    pub block: Block,
    pub floors: Vec<FloorLayout>,
}

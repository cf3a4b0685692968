use diesel::prelude::*;
use hostel_booking_core::model::{
    Block, BlockId, Floor, FloorId, Gender, Profile, Room, RoomId, User, UserId,
};

use crate::error::DatabaseError;
use crate::schema::{blocks, floors, profiles, room_occupants, rooms, users};

fn parse_gender(code: &str) -> Result<Gender, DatabaseError> {
    code.parse()
        .map_err(|error: hostel_booking_core::model::UnknownGender| {
            DatabaseError::InvalidData(error.to_string())
        })
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: i32,
    pub subject: String,
    pub display_name: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            subject: row.subject,
            display_name: row.display_name,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow<'a> {
    pub subject: &'a str,
    pub display_name: &'a str,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileRow {
    pub user_id: i32,
    pub gender: Option<String>,
}

impl From<&Profile> for ProfileRow {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.user_id.0,
            gender: profile.gender.map(|gender| gender.code().to_owned()),
        }
    }
}

impl TryFrom<ProfileRow> for Profile {
    type Error = DatabaseError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId(row.user_id),
            gender: row.gender.as_deref().map(parse_gender).transpose()?,
        })
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = blocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BlockRow {
    pub id: i32,
    pub name: String,
    pub gender: String,
    pub description: String,
}

impl TryFrom<BlockRow> for Block {
    type Error = DatabaseError;

    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BlockId(row.id),
            gender: parse_gender(&row.gender)?,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = blocks)]
pub struct NewBlockRow<'a> {
    pub name: &'a str,
    pub gender: &'a str,
    pub description: &'a str,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = floors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FloorRow {
    pub id: i32,
    pub block_id: i32,
    pub floor_number: i32,
}

#[derive(Insertable)]
#[diesel(table_name = floors)]
pub struct NewFloorRow {
    pub block_id: i32,
    pub floor_number: i32,
}

impl From<FloorRow> for Floor {
    fn from(row: FloorRow) -> Self {
        Self {
            id: FloorId(row.id),
            block_id: BlockId(row.block_id),
            number: row.floor_number,
        }
    }
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RoomRow {
    pub id: i32,
    pub floor_id: i32,
    pub room_number: String,
    pub capacity: i32,
    pub is_booked: bool,
    pub booked_by: Option<i32>,
}

impl RoomRow {
    /// `occupants` must be in booking order.
    pub fn into_room(self, occupants: Vec<UserId>) -> Result<Room, DatabaseError> {
        let capacity = u32::try_from(self.capacity).map_err(|_negative| {
            DatabaseError::InvalidData(format!("room {} has capacity {}", self.id, self.capacity))
        })?;
        Room::from_parts(
            RoomId(self.id),
            FloorId(self.floor_id),
            self.room_number,
            capacity,
            occupants,
            self.booked_by.map(UserId),
        )
        .map_err(DatabaseError::from)
    }
}

#[derive(Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoomRow<'a> {
    pub floor_id: i32,
    pub room_number: &'a str,
    pub capacity: i32,
}

#[derive(Insertable)]
#[diesel(table_name = room_occupants)]
pub struct NewOccupantRow {
    pub room_id: i32,
    pub user_id: i32,
}

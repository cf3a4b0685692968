use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use hostel_booking_core::error::StoreError;
use hostel_booking_core::model::{
    Block, BlockId, Floor, FloorId, Gender, Profile, Room, RoomDetail, RoomId, User, UserId,
};
use hostel_booking_core::policy;
use hostel_booking_core::store::{
    check_length, check_user, BookingReceipt, HostelStore, NewBlock, Registration,
    MAX_NAME_LENGTH,
};
use tracing::debug;

use crate::error::DatabaseError;
use crate::models::{
    BlockRow, FloorRow, NewBlockRow, NewFloorRow, NewOccupantRow, NewRoomRow, NewUserRow,
    ProfileRow, RoomRow, UserRow,
};
use crate::schema::{blocks, floors, profiles, room_occupants, rooms, users};
use crate::Pool;

/// [`HostelStore`] backed by PostgreSQL.
///
/// Bookings run in `SERIALIZABLE` transactions that lock the affected room
/// rows in ascending id order before re-checking the policy.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<Object<AsyncPgConnection>, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

async fn occupants(
    connection: &mut AsyncPgConnection,
    room_ids: Vec<i32>,
) -> Result<Vec<(i32, UserId)>, DatabaseError> {
    let rows: Vec<(i32, i32)> = room_occupants::table
        .filter(room_occupants::room_id.eq_any(room_ids))
        .order(room_occupants::id)
        .select((room_occupants::room_id, room_occupants::user_id))
        .load(connection)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(room, user)| (room, UserId(user)))
        .collect())
}

async fn rooms_with_occupants(
    connection: &mut AsyncPgConnection,
    rows: Vec<RoomRow>,
) -> Result<Vec<Room>, DatabaseError> {
    let all = occupants(connection, rows.iter().map(|row| row.id).collect()).await?;
    rows.into_iter()
        .map(|row| {
            let of_room = all
                .iter()
                .filter(|(room, _)| *room == row.id)
                .map(|(_, user)| *user)
                .collect();
            row.into_room(of_room)
        })
        .collect()
}

async fn load_room(
    connection: &mut AsyncPgConnection,
    id: RoomId,
    lock: bool,
) -> Result<Room, DatabaseError> {
    let query = rooms::table.find(id.0).select(RoomRow::as_select());
    let row: Option<RoomRow> = if lock {
        query.for_update().first(connection).await.optional()?
    } else {
        query.first(connection).await.optional()?
    };
    let row = row.ok_or_else(|| StoreError::not_found("room", id.0))?;
    let mut loaded = rooms_with_occupants(connection, vec![row]).await?;
    loaded
        .pop()
        .ok_or_else(|| StoreError::not_found("room", id.0).into())
}

async fn location(
    connection: &mut AsyncPgConnection,
    floor: FloorId,
) -> Result<(Floor, Block), DatabaseError> {
    let (floor_row, block_row): (FloorRow, BlockRow) = floors::table
        .inner_join(blocks::table)
        .filter(floors::id.eq(floor.0))
        .select((FloorRow::as_select(), BlockRow::as_select()))
        .first(connection)
        .await
        .optional()?
        .ok_or_else(|| StoreError::not_found("floor", floor.0))?;
    Ok((floor_row.into(), block_row.try_into()?))
}

async fn room_detail(
    connection: &mut AsyncPgConnection,
    room: Room,
) -> Result<RoomDetail, DatabaseError> {
    let (floor, block) = location(connection, room.floor_id).await?;
    Ok(RoomDetail { block, floor, room })
}

async fn booked_room_of(
    connection: &mut AsyncPgConnection,
    user: UserId,
) -> Result<Option<RoomId>, DatabaseError> {
    Ok(room_occupants::table
        .filter(room_occupants::user_id.eq(user.0))
        .select(room_occupants::room_id)
        .first::<i32>(connection)
        .await
        .optional()?
        .map(RoomId))
}

/// Writes the denormalised columns derived from the occupant list.
async fn write_flags(connection: &mut AsyncPgConnection, room: &Room) -> Result<(), DatabaseError> {
    diesel::update(rooms::table.find(room.id.0))
        .set((
            rooms::is_booked.eq(room.is_booked()),
            rooms::booked_by.eq(room.primary_occupant().map(|user| user.0)),
        ))
        .execute(connection)
        .await?;
    Ok(())
}

async fn remove_occupant(
    connection: &mut AsyncPgConnection,
    user: UserId,
    room: &Room,
) -> Result<(), DatabaseError> {
    diesel::delete(
        room_occupants::table
            .filter(room_occupants::user_id.eq(user.0))
            .filter(room_occupants::room_id.eq(room.id.0)),
    )
    .execute(connection)
    .await?;
    write_flags(connection, room).await
}

async fn book_in_transaction(
    connection: &mut AsyncPgConnection,
    profile: &Profile,
    room: RoomId,
    switch: bool,
) -> Result<BookingReceipt, DatabaseError> {
    let user = profile.user_id;
    let current = booked_room_of(connection, user)
        .await?
        .filter(|current| *current != room);

    // lock order is ascending room id
    let (mut target, mut previous) = match current {
        Some(current) if current < room => {
            let previous = load_room(connection, current, true).await?;
            (load_room(connection, room, true).await?, Some(previous))
        }
        Some(current) => {
            let target = load_room(connection, room, true).await?;
            (target, Some(load_room(connection, current, true).await?))
        }
        None => (load_room(connection, room, true).await?, None),
    };
    let (floor, block) = location(connection, target.floor_id).await?;

    let outcome = policy::book(profile, &block, &mut target, previous.as_mut(), switch)?;

    if let Some(previous) = &previous {
        remove_occupant(connection, user, previous).await?;
    }
    diesel::insert_into(room_occupants::table)
        .values(NewOccupantRow {
            room_id: target.id.0,
            user_id: user.0,
        })
        .execute(connection)
        .await?;
    write_flags(connection, &target).await?;

    Ok(BookingReceipt {
        outcome,
        room: RoomDetail {
            block,
            floor,
            room: target,
        },
        released: previous,
    })
}

#[async_trait]
impl HostelStore for PgStore {
    async fn register(&self, registration: Registration) -> Result<(User, Profile), StoreError> {
        check_user(&registration.subject, &registration.display_name)?;
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        Ok(connection
            .transaction(|connection| {
                async move {
                    let user: User = diesel::insert_into(users::table)
                        .values(NewUserRow {
                            subject: &registration.subject,
                            display_name: &registration.display_name,
                        })
                        .returning(UserRow::as_returning())
                        .get_result::<UserRow>(connection)
                        .await?
                        .into();
                    let profile = Profile {
                        user_id: user.id,
                        gender: Some(registration.gender),
                    };
                    diesel::insert_into(profiles::table)
                        .values(ProfileRow::from(&profile))
                        .execute(connection)
                        .await?;
                    Ok::<_, DatabaseError>((user, profile))
                }
                .scope_boxed()
            })
            .await?)
    }

    async fn create_user(&self, subject: &str, display_name: &str) -> Result<User, StoreError> {
        check_user(subject, display_name)?;
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: UserRow = diesel::insert_into(users::table)
            .values(NewUserRow {
                subject,
                display_name,
            })
            .returning(UserRow::as_returning())
            .get_result(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.into())
    }

    async fn user_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: Option<UserRow> = users::table
            .filter(users::subject.eq(subject))
            .select(UserRow::as_select())
            .first(connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(row.map(User::from))
    }

    async fn ensure_profile(&self, user: UserId) -> Result<Profile, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let exists: Option<i32> = users::table
            .find(user.0)
            .select(users::id)
            .first(connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?;
        if exists.is_none() {
            return Err(StoreError::not_found("user", user.0));
        }
        let created = diesel::insert_into(profiles::table)
            .values(ProfileRow::from(&Profile::incomplete(user)))
            .on_conflict_do_nothing()
            .execute(connection)
            .await
            .map_err(DatabaseError::from)?;
        if created > 0 {
            debug!(%user, "created missing profile");
        }
        let row: ProfileRow = profiles::table
            .find(user.0)
            .select(ProfileRow::as_select())
            .first(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(Profile::try_from(row)?)
    }

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: Option<ProfileRow> = profiles::table
            .find(user.0)
            .select(ProfileRow::as_select())
            .first(connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?;
        Ok(row.map(Profile::try_from).transpose()?)
    }

    async fn set_gender(&self, user: UserId, gender: Gender) -> Result<Profile, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let updated: Option<ProfileRow> = diesel::update(
            profiles::table
                .filter(profiles::user_id.eq(user.0))
                .filter(profiles::gender.is_null()),
        )
        .set(profiles::gender.eq(gender.code()))
        .returning(ProfileRow::as_returning())
        .get_result(connection)
        .await
        .optional()
        .map_err(DatabaseError::from)?;
        if let Some(row) = updated {
            return Ok(Profile::try_from(row)?);
        }
        match self.profile(user).await? {
            Some(_) => Err(StoreError::Conflict(
                "gender is already set, please contact an administrator to change it".to_owned(),
            )),
            None => Err(StoreError::not_found("profile", user.0)),
        }
    }

    async fn blocks_for_gender(&self, gender: Gender) -> Result<Vec<Block>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let rows: Vec<BlockRow> = blocks::table
            .filter(blocks::gender.eq(gender.code()))
            .order(blocks::name)
            .select(BlockRow::as_select())
            .load(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(rows
            .into_iter()
            .map(Block::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn block(&self, id: BlockId) -> Result<Block, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: BlockRow = blocks::table
            .find(id.0)
            .select(BlockRow::as_select())
            .first(connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?
            .ok_or_else(|| StoreError::not_found("block", id.0))?;
        Ok(Block::try_from(row)?)
    }

    async fn floors(&self, block: BlockId) -> Result<Vec<Floor>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let rows: Vec<FloorRow> = floors::table
            .filter(floors::block_id.eq(block.0))
            .order(floors::floor_number)
            .select(FloorRow::as_select())
            .load(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(Floor::from).collect())
    }

    async fn rooms(&self, floor: FloorId) -> Result<Vec<Room>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let rows: Vec<RoomRow> = rooms::table
            .filter(rooms::floor_id.eq(floor.0))
            .order(rooms::room_number)
            .select(RoomRow::as_select())
            .load(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(rooms_with_occupants(connection, rows).await?)
    }

    async fn room(&self, id: RoomId) -> Result<RoomDetail, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let room = load_room(connection, id, false).await?;
        Ok(room_detail(connection, room).await?)
    }

    async fn booking_of(&self, user: UserId) -> Result<Option<RoomDetail>, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let Some(room) = booked_room_of(connection, user).await? else {
            return Ok(None);
        };
        let room = load_room(connection, room, false).await?;
        Ok(Some(room_detail(connection, room).await?))
    }

    async fn book(
        &self,
        profile: &Profile,
        room: RoomId,
        switch: bool,
    ) -> Result<BookingReceipt, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        Ok(connection
            .build_transaction()
            .serializable()
            .run(|connection| {
                book_in_transaction(connection, profile, room, switch).scope_boxed()
            })
            .await?)
    }

    async fn cancel(&self, user: UserId, room: RoomId) -> Result<RoomDetail, StoreError> {
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        Ok(connection
            .build_transaction()
            .serializable()
            .run(|connection| {
                async move {
                    let mut room = load_room(connection, room, true).await?;
                    policy::cancel(user, &mut room)?;
                    remove_occupant(connection, user, &room).await?;
                    room_detail(connection, room).await
                }
                .scope_boxed()
            })
            .await?)
    }

    async fn create_block(&self, block: NewBlock) -> Result<Block, StoreError> {
        check_length("block name", &block.name, MAX_NAME_LENGTH)?;
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: BlockRow = diesel::insert_into(blocks::table)
            .values(NewBlockRow {
                name: &block.name,
                gender: block.gender.code(),
                description: &block.description,
            })
            .returning(BlockRow::as_returning())
            .get_result(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(Block::try_from(row)?)
    }

    async fn create_floor(&self, block: BlockId, number: i32) -> Result<Floor, StoreError> {
        self.block(block).await?;
        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let row: FloorRow = diesel::insert_into(floors::table)
            .values(NewFloorRow {
                block_id: block.0,
                floor_number: number,
            })
            .returning(FloorRow::as_returning())
            .get_result(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.into())
    }

    async fn create_room(
        &self,
        floor: FloorId,
        number: &str,
        capacity: u32,
    ) -> Result<Room, StoreError> {
        // validates before anything is written
        check_length("room number", number, MAX_NAME_LENGTH)?;
        Room::new(RoomId(0), floor, number, capacity)?;
        let capacity = i32::try_from(capacity)
            .map_err(|_too_large| StoreError::Invalid(format!("capacity {capacity} is too large")))?;

        let mut connection = self.connection().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        let exists: Option<i32> = floors::table
            .find(floor.0)
            .select(floors::id)
            .first(connection)
            .await
            .optional()
            .map_err(DatabaseError::from)?;
        if exists.is_none() {
            return Err(StoreError::not_found("floor", floor.0));
        }
        let row: RoomRow = diesel::insert_into(rooms::table)
            .values(NewRoomRow {
                floor_id: floor.0,
                room_number: number,
                capacity,
            })
            .returning(RoomRow::as_returning())
            .get_result(connection)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.into_room(Vec::new())?)
    }
}

//! In-process [`HostelStore`], every operation runs under one lock.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BookingError, StoreError};
use crate::model::{
    Block, BlockId, Floor, FloorId, Gender, Profile, Room, RoomDetail, RoomId, User, UserId,
};
use crate::policy;
use crate::store::{
    check_length, check_user, BookingReceipt, HostelStore, NewBlock, Registration,
    MAX_NAME_LENGTH,
};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    last_id: i32,
    users: BTreeMap<UserId, User>,
    profiles: BTreeMap<UserId, Profile>,
    blocks: BTreeMap<BlockId, Block>,
    floors: BTreeMap<FloorId, Floor>,
    rooms: BTreeMap<RoomId, Room>,
    pending_conflicts: u32,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` booking attempts fail as if another
    /// transaction had won the race.
    pub fn inject_conflicts(&self, count: u32) -> Result<(), StoreError> {
        self.lock()?.pending_conflicts = count;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_poisoned| StoreError::Backend("memory store lock poisoned".into()))
    }
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn block(&self, id: BlockId) -> Result<&Block, StoreError> {
        self.blocks
            .get(&id)
            .ok_or_else(|| StoreError::not_found("block", id.0))
    }

    fn detail(&self, id: RoomId) -> Result<RoomDetail, StoreError> {
        let room = self
            .rooms
            .get(&id)
            .ok_or_else(|| StoreError::not_found("room", id.0))?;
        let floor = self
            .floors
            .get(&room.floor_id)
            .ok_or_else(|| StoreError::not_found("floor", room.floor_id.0))?;
        let block = self.block(floor.block_id)?;
        Ok(RoomDetail {
            block: block.clone(),
            floor: floor.clone(),
            room: room.clone(),
        })
    }

    fn insert_user(&mut self, subject: &str, display_name: &str) -> Result<User, StoreError> {
        check_user(subject, display_name)?;
        if self.users.values().any(|user| user.subject == subject) {
            return Err(StoreError::Conflict(format!("{subject} is already registered")));
        }
        let user = User {
            id: UserId(self.next_id()),
            subject: subject.to_owned(),
            display_name: display_name.to_owned(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn booking_of(&self, user: UserId) -> Option<RoomId> {
        self.rooms
            .values()
            .find(|room| room.is_occupant(user))
            .map(|room| room.id)
    }
}

#[async_trait]
impl HostelStore for MemoryStore {
    async fn register(&self, registration: Registration) -> Result<(User, Profile), StoreError> {
        let mut inner = self.lock()?;
        let user = inner.insert_user(&registration.subject, &registration.display_name)?;
        let profile = Profile {
            user_id: user.id,
            gender: Some(registration.gender),
        };
        inner.profiles.insert(user.id, profile.clone());
        Ok((user, profile))
    }

    async fn create_user(&self, subject: &str, display_name: &str) -> Result<User, StoreError> {
        self.lock()?.insert_user(subject, display_name)
    }

    async fn user_by_subject(&self, subject: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.subject == subject)
            .cloned())
    }

    async fn ensure_profile(&self, user: UserId) -> Result<Profile, StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&user) {
            return Err(StoreError::not_found("user", user.0));
        }
        Ok(inner
            .profiles
            .entry(user)
            .or_insert_with(|| {
                debug!(%user, "creating missing profile");
                Profile::incomplete(user)
            })
            .clone())
    }

    async fn profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        Ok(self.lock()?.profiles.get(&user).cloned())
    }

    async fn set_gender(&self, user: UserId, gender: Gender) -> Result<Profile, StoreError> {
        let mut inner = self.lock()?;
        let profile = inner
            .profiles
            .get_mut(&user)
            .ok_or_else(|| StoreError::not_found("profile", user.0))?;
        if profile.gender.is_some() {
            return Err(StoreError::Conflict(
                "gender is already set, please contact an administrator to change it".to_owned(),
            ));
        }
        profile.gender = Some(gender);
        Ok(profile.clone())
    }

    async fn blocks_for_gender(&self, gender: Gender) -> Result<Vec<Block>, StoreError> {
        let mut blocks: Vec<Block> = self
            .lock()?
            .blocks
            .values()
            .filter(|block| block.gender == gender)
            .cloned()
            .collect();
        blocks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blocks)
    }

    async fn block(&self, id: BlockId) -> Result<Block, StoreError> {
        self.lock()?.block(id).cloned()
    }

    async fn floors(&self, block: BlockId) -> Result<Vec<Floor>, StoreError> {
        let mut floors: Vec<Floor> = self
            .lock()?
            .floors
            .values()
            .filter(|floor| floor.block_id == block)
            .cloned()
            .collect();
        floors.sort_by_key(|floor| floor.number);
        Ok(floors)
    }

    async fn rooms(&self, floor: FloorId) -> Result<Vec<Room>, StoreError> {
        let mut rooms: Vec<Room> = self
            .lock()?
            .rooms
            .values()
            .filter(|room| room.floor_id == floor)
            .cloned()
            .collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(rooms)
    }

    async fn room(&self, id: RoomId) -> Result<RoomDetail, StoreError> {
        self.lock()?.detail(id)
    }

    async fn booking_of(&self, user: UserId) -> Result<Option<RoomDetail>, StoreError> {
        let inner = self.lock()?;
        inner
            .booking_of(user)
            .map(|room| inner.detail(room))
            .transpose()
    }

    async fn book(
        &self,
        profile: &Profile,
        room: RoomId,
        switch: bool,
    ) -> Result<BookingReceipt, StoreError> {
        let mut inner = self.lock()?;
        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            return Err(BookingError::ConcurrencyConflict.into());
        }

        let detail = inner.detail(room)?;
        let mut target = detail.room.clone();
        let mut previous = inner
            .booking_of(profile.user_id)
            .filter(|current| *current != room)
            .and_then(|current| inner.rooms.get(&current).cloned());

        let outcome = policy::book(
            profile,
            &detail.block,
            &mut target,
            previous.as_mut(),
            switch,
        )?;

        if let Some(released) = &previous {
            inner.rooms.insert(released.id, released.clone());
        }
        inner.rooms.insert(target.id, target.clone());
        Ok(BookingReceipt {
            outcome,
            room: RoomDetail {
                room: target,
                ..detail
            },
            released: previous,
        })
    }

    async fn cancel(&self, user: UserId, room: RoomId) -> Result<RoomDetail, StoreError> {
        let mut inner = self.lock()?;
        let mut detail = inner.detail(room)?;
        policy::cancel(user, &mut detail.room)?;
        inner.rooms.insert(room, detail.room.clone());
        Ok(detail)
    }

    async fn create_block(&self, block: NewBlock) -> Result<Block, StoreError> {
        check_length("block name", &block.name, MAX_NAME_LENGTH)?;
        let mut inner = self.lock()?;
        if inner.blocks.values().any(|other| other.name == block.name) {
            return Err(StoreError::Conflict(format!(
                "block {} already exists",
                block.name
            )));
        }
        let block = Block {
            id: BlockId(inner.next_id()),
            name: block.name,
            gender: block.gender,
            description: block.description,
        };
        inner.blocks.insert(block.id, block.clone());
        Ok(block)
    }

    async fn create_floor(&self, block: BlockId, number: i32) -> Result<Floor, StoreError> {
        let mut inner = self.lock()?;
        inner.block(block)?;
        if inner
            .floors
            .values()
            .any(|floor| floor.block_id == block && floor.number == number)
        {
            return Err(StoreError::Conflict(format!(
                "floor {number} already exists in block {block}"
            )));
        }
        let floor = Floor {
            id: FloorId(inner.next_id()),
            block_id: block,
            number,
        };
        inner.floors.insert(floor.id, floor.clone());
        Ok(floor)
    }

    async fn create_room(
        &self,
        floor: FloorId,
        number: &str,
        capacity: u32,
    ) -> Result<Room, StoreError> {
        check_length("room number", number, MAX_NAME_LENGTH)?;
        let mut inner = self.lock()?;
        if !inner.floors.contains_key(&floor) {
            return Err(StoreError::not_found("floor", floor.0));
        }
        if inner
            .rooms
            .values()
            .any(|room| room.floor_id == floor && room.number == number)
        {
            return Err(StoreError::Conflict(format!(
                "room {number} already exists on floor {floor}"
            )));
        }
        let id = RoomId(inner.next_id());
        let room = Room::new(id, floor, number, capacity)?;
        inner.rooms.insert(room.id, room.clone());
        Ok(room)
    }
}

use hostel_booking_core::model::{Block, BlockId, FloorId, Gender, Profile, Room, RoomId, UserId};
use hostel_booking_core::policy;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Book { user: i32, room: usize, switch: bool },
    Cancel { user: i32, room: usize },
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0..6_i32, 0..4_usize, any::<bool>())
            .prop_map(|(user, room, switch)| Action::Book { user, room, switch }),
        (0..6_i32, 0..4_usize).prop_map(|(user, room)| Action::Cancel { user, room }),
    ]
}

fn block() -> Block {
    Block {
        id: BlockId(1),
        name: "B1".to_owned(),
        gender: Gender::Male,
        description: String::new(),
    }
}

fn profile(user: i32) -> Profile {
    Profile {
        user_id: UserId(user),
        // odd users are in the wrong block
        gender: Some(if user % 2 == 0 { Gender::Male } else { Gender::Female }),
    }
}

fn apply(rooms: &mut [Room], action: &Action) {
    let block = block();
    match *action {
        Action::Book { user, room, switch } => {
            let profile = profile(user);
            let mut target = rooms[room].clone();
            let current = rooms
                .iter()
                .position(|other| other.is_occupant(profile.user_id) && other.id != target.id);
            let mut previous = current.map(|index| rooms[index].clone());
            if policy::book(&profile, &block, &mut target, previous.as_mut(), switch).is_ok() {
                rooms[room] = target;
                if let (Some(index), Some(previous)) = (current, previous) {
                    rooms[index] = previous;
                }
            }
        }
        Action::Cancel { user, room } => {
            let _ = policy::cancel(UserId(user), &mut rooms[room]);
        }
    }
}

proptest! {
    #[test]
    fn occupancy_invariants_hold(actions in proptest::collection::vec(action(), 0..64)) {
        let mut rooms: Vec<Room> = (0..4)
            .map(|index| Room::new(RoomId(index), FloorId(1), format!("10{index}"), 1 + index.unsigned_abs() % 3).unwrap())
            .collect();

        for action in &actions {
            apply(&mut rooms, action);

            for room in &rooms {
                prop_assert!(room.occupancy() <= room.capacity());
                prop_assert_eq!(room.is_booked(), room.occupancy() == room.capacity());
                prop_assert_eq!(room.primary_occupant(), room.occupants().first().copied());
            }
            for user in 0..6 {
                let bookings = rooms.iter().filter(|room| room.is_occupant(UserId(user))).count();
                prop_assert!(bookings <= 1);
                if user % 2 == 1 {
                    prop_assert_eq!(bookings, 0);
                }
            }
        }
    }

    #[test]
    fn book_then_cancel_round_trips(occupied in 0..3_i32) {
        let block = block();
        let mut room = Room::new(RoomId(1), FloorId(1), "101", 4).unwrap();
        for user in 0..occupied {
            policy::book(&profile(user * 2 + 100), &block, &mut room, None, false).unwrap();
        }
        let before = room.clone();

        policy::book(&profile(0), &block, &mut room, None, false).unwrap();
        policy::cancel(UserId(0), &mut room).unwrap();

        prop_assert_eq!(room.occupancy(), before.occupancy());
        prop_assert_eq!(room, before);
    }
}

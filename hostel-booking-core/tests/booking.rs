use std::sync::Arc;

use hostel_booking_core::error::{BookingError, StoreError};
use hostel_booking_core::model::{Gender, Profile, RoomId, RoomState};
use hostel_booking_core::policy::BookingOutcome;
use hostel_booking_core::store::{NewBlock, Registration};
use hostel_booking_core::{HostelService, HostelStore, MemoryStore};

struct Hostel {
    store: Arc<MemoryStore>,
    service: HostelService,
    b1: hostel_booking_core::model::BlockId,
    room_101: RoomId,
    room_205: RoomId,
    room_single: RoomId,
}

async fn hostel() -> Hostel {
    let store = Arc::new(MemoryStore::new());
    let b1 = store
        .create_block(NewBlock {
            name: "B1".to_owned(),
            gender: Gender::Male,
            description: "Male Block 1".to_owned(),
        })
        .await
        .unwrap();
    let first = store.create_floor(b1.id, 1).await.unwrap();
    let second = store.create_floor(b1.id, 2).await.unwrap();
    let room_101 = store.create_room(first.id, "101", 2).await.unwrap().id;
    let room_single = store.create_room(first.id, "102", 1).await.unwrap().id;
    let room_205 = store.create_room(second.id, "205", 2).await.unwrap().id;

    let g1 = store
        .create_block(NewBlock {
            name: "G1".to_owned(),
            gender: Gender::Female,
            description: "Female Block 1".to_owned(),
        })
        .await
        .unwrap();
    store.create_floor(g1.id, 1).await.unwrap();

    let service = HostelService::new(store.clone(), 3);
    Hostel {
        store,
        service,
        b1: b1.id,
        room_101,
        room_205,
        room_single,
    }
}

async fn resident(hostel: &Hostel, subject: &str, gender: Gender) -> Profile {
    hostel
        .service
        .register(Registration {
            subject: subject.to_owned(),
            display_name: subject.to_uppercase(),
            gender,
        })
        .await
        .unwrap()
        .profile
}

#[tokio::test]
async fn two_residents_fill_a_double_room() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;
    let b = resident(&hostel, "b", Gender::Male).await;
    let c = resident(&hostel, "c", Gender::Female).await;

    let receipt = hostel.service.book(&a, hostel.room_101, false).await.unwrap();
    assert_eq!(receipt.outcome, BookingOutcome::Booked);
    assert_eq!(receipt.room.room.occupancy(), 1);
    assert_eq!(receipt.room.room.state(), RoomState::PartiallyOccupied);

    let receipt = hostel.service.book(&b, hostel.room_101, false).await.unwrap();
    assert_eq!(receipt.room.room.occupancy(), 2);
    assert_eq!(receipt.room.room.state(), RoomState::Full);
    assert!(receipt.room.room.is_booked());
    assert_eq!(receipt.room.room.primary_occupant(), Some(a.user_id));

    let denied = hostel.service.block_layout(&c, hostel.b1).await.unwrap_err();
    assert!(matches!(
        denied.rejection(),
        Some(BookingError::AccessDenied { .. })
    ));
}

#[tokio::test]
async fn switching_moves_the_single_booking() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;
    hostel.service.book(&a, hostel.room_101, false).await.unwrap();

    let refused = hostel
        .service
        .book(&a, hostel.room_205, false)
        .await
        .unwrap_err();
    assert_eq!(
        refused.rejection(),
        Some(&BookingError::AlreadyBooked {
            room: hostel.room_101
        })
    );

    let receipt = hostel.service.book(&a, hostel.room_205, true).await.unwrap();
    assert_eq!(
        receipt.outcome,
        BookingOutcome::Switched {
            from: hostel.room_101
        }
    );
    assert_eq!(receipt.released.map(|room| room.occupancy()), Some(0));

    let old = hostel.store.room(hostel.room_101).await.unwrap();
    let new = hostel.store.room(hostel.room_205).await.unwrap();
    assert_eq!(old.room.occupancy(), 0);
    assert!(new.room.is_occupant(a.user_id));
    let booking = hostel.store.booking_of(a.user_id).await.unwrap().unwrap();
    assert_eq!(booking.room.id, hostel.room_205);
}

#[tokio::test]
async fn incomplete_profile_sees_no_blocks() {
    let hostel = hostel().await;
    let incomplete = Profile::incomplete(hostel_booking_core::model::UserId(999));

    assert!(hostel
        .service
        .list_blocks_for_gender(None)
        .await
        .unwrap()
        .is_empty());
    let error = hostel.service.blocks(&incomplete).await.unwrap_err();
    assert_eq!(error.rejection(), Some(&BookingError::ProfileIncomplete));
    let error = hostel
        .service
        .book(&incomplete, hostel.room_101, false)
        .await
        .unwrap_err();
    assert_eq!(error.rejection(), Some(&BookingError::ProfileIncomplete));
}

#[tokio::test]
async fn blocks_are_filtered_by_gender() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;
    let f = resident(&hostel, "f", Gender::Female).await;

    let names = |blocks: Vec<hostel_booking_core::model::Block>| {
        blocks.into_iter().map(|block| block.name).collect::<Vec<_>>()
    };
    assert_eq!(names(hostel.service.blocks(&a).await.unwrap()), ["B1"]);
    assert_eq!(names(hostel.service.blocks(&f).await.unwrap()), ["G1"]);

    let layout = hostel.service.block_layout(&a, hostel.b1).await.unwrap();
    let numbers: Vec<_> = layout
        .floors
        .iter()
        .map(|floor| {
            (
                floor.floor.number,
                floor
                    .rooms
                    .iter()
                    .map(|room| room.number.as_str())
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    assert_eq!(numbers, [(1, vec!["101", "102"]), (2, vec!["205"])]);
}

#[tokio::test]
async fn room_view_and_confirmation() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;
    let b = resident(&hostel, "b", Gender::Male).await;

    let view = hostel.service.room_view(&a, hostel.room_single).await.unwrap();
    assert!(view.can_book);
    assert!(!view.user_has_booking);

    let confirm = hostel.service.confirm(&a, hostel.room_single).await.unwrap();
    assert!(!confirm.requires_switch);
    // confirming does not book
    assert_eq!(
        hostel.store.room(hostel.room_single).await.unwrap().room.occupancy(),
        0
    );

    hostel.service.book(&a, hostel.room_single, false).await.unwrap();
    let view = hostel.service.room_view(&a, hostel.room_single).await.unwrap();
    assert!(view.is_user_room);
    assert!(!view.can_book);

    let view = hostel.service.room_view(&b, hostel.room_single).await.unwrap();
    assert!(!view.can_book);
    let error = hostel.service.confirm(&b, hostel.room_single).await.unwrap_err();
    assert_eq!(
        error.rejection(),
        Some(&BookingError::RoomFull(hostel.room_single))
    );

    let confirm = hostel.service.confirm(&a, hostel.room_101).await.unwrap();
    assert!(confirm.requires_switch);
    assert_eq!(
        confirm.current_booking.map(|booking| booking.room.id),
        Some(hostel.room_single)
    );
}

#[tokio::test]
async fn cancel_requires_a_booking() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;
    let b = resident(&hostel, "b", Gender::Male).await;
    hostel.service.book(&a, hostel.room_101, false).await.unwrap();
    hostel.service.book(&b, hostel.room_101, false).await.unwrap();

    let error = hostel
        .service
        .cancel(&a, hostel.room_205)
        .await
        .unwrap_err();
    assert_eq!(
        error.rejection(),
        Some(&BookingError::NotBooked(hostel.room_205))
    );

    let detail = hostel.service.cancel(&a, hostel.room_101).await.unwrap();
    assert_eq!(detail.room.occupants(), &[b.user_id]);
    assert_eq!(detail.room.primary_occupant(), Some(b.user_id));
    assert!(!detail.room.is_booked());
}

#[tokio::test]
async fn ensure_profile_is_idempotent_and_completion_happens_once() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;

    let again = hostel.service.ensure_profile(a.user_id).await.unwrap();
    assert_eq!(again, a);

    let error = hostel
        .service
        .complete_profile(&a, Gender::Female)
        .await
        .unwrap_err();
    assert!(matches!(error, StoreError::Conflict(_)));

    let missing = hostel
        .service
        .ensure_profile(hostel_booking_core::model::UserId(4242))
        .await
        .unwrap_err();
    assert!(matches!(missing, StoreError::NotFound { kind: "user", .. }));
}

#[tokio::test]
async fn transient_conflicts_are_retried() {
    let hostel = hostel().await;
    let a = resident(&hostel, "a", Gender::Male).await;

    hostel.store.inject_conflicts(2).unwrap();
    hostel.service.book(&a, hostel.room_101, false).await.unwrap();

    let impatient = HostelService::new(hostel.store.clone(), 0);
    hostel.store.inject_conflicts(1).unwrap();
    let error = impatient
        .book(&a, hostel.room_205, true)
        .await
        .unwrap_err();
    assert_eq!(error.rejection(), Some(&BookingError::ConcurrencyConflict));
    assert!(error.rejection().is_some_and(BookingError::is_transient));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_of_a_single_room() {
    let hostel = hostel().await;
    let mut profiles = Vec::new();
    for index in 0..8 {
        profiles.push(resident(&hostel, &format!("user-{index}"), Gender::Male).await);
    }

    let handles: Vec<_> = profiles
        .into_iter()
        .map(|profile| {
            let service = hostel.service.clone();
            let room = hostel.room_single;
            tokio::spawn(async move { service.book(&profile, room, false).await })
        })
        .collect();

    let mut booked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(error) => assert!(matches!(
                error.rejection(),
                Some(BookingError::RoomFull(_) | BookingError::ConcurrencyConflict)
            )),
        }
    }
    assert_eq!(booked, 1);
    assert_eq!(
        hostel.store.room(hostel.room_single).await.unwrap().room.occupancy(),
        1
    );
}

#[tokio::test]
async fn imported_user_completes_profile_after_login() {
    let hostel = hostel().await;
    let user = hostel.store.create_user("imported", "Imported").await.unwrap();

    let account = hostel.service.account("imported").await.unwrap().unwrap();
    assert_eq!(account.profile, Profile::incomplete(user.id));
    assert_eq!(hostel.store.profile(user.id).await.unwrap(), None);

    let profile = hostel.service.ensure_profile(user.id).await.unwrap();
    assert_eq!(profile, Profile::incomplete(user.id));
    assert_eq!(
        hostel.store.profile(user.id).await.unwrap(),
        Some(profile.clone())
    );
    let error = hostel.service.blocks(&profile).await.unwrap_err();
    assert_eq!(error.rejection(), Some(&BookingError::ProfileIncomplete));

    let profile = hostel
        .service
        .complete_profile(&profile, Gender::Male)
        .await
        .unwrap();
    assert_eq!(profile.gender, Some(Gender::Male));
    assert_eq!(hostel.service.blocks(&profile).await.unwrap().len(), 1);

    let stale = Profile::incomplete(user.id);
    let error = hostel
        .service
        .complete_profile(&stale, Gender::Female)
        .await
        .unwrap_err();
    assert!(matches!(error, StoreError::Conflict(_)));
}

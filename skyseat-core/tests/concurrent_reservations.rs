use std::sync::Arc;
use skyseat_core::{
    BroadcastNotifier, Flight, FlightStore, MemoryFlightStore, ReservationEngine, Seat,
};
use skyseat_core::ReservationError;

async fn engine_with(flight: Flight) -> (Arc<ReservationEngine>, Arc<MemoryFlightStore>) {
    let store = Arc::new(MemoryFlightStore::new());
    store.save(&flight).await.unwrap();
    let notifier = Arc::new(BroadcastNotifier::new(1024));
    (Arc::new(ReservationEngine::new(store.clone(), notifier)), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_same_seat_has_exactly_one_winner() {
    let (engine, store) = engine_with(Flight::new(
        "f2",
        "2019-11-26T09:05:00+0000",
        vec![Seat::new("s1", "A", 1), Seat::new("s2", "A", 1)],
    ))
    .await;

    let limit = 100;
    let mut handles = Vec::with_capacity(limit);
    for i in 0..limit {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let passenger = i.to_string();
            engine.reserve_seat("f2", "s1", &passenger).await.map(|_| passenger)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(passenger) => winners.push(passenger),
            Err(ReservationError::SeatNotAvailable { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners.len(), 1, "A seat was reserved more than once");
    let stored = store.find("f2").await.unwrap();
    assert_eq!(stored.seats[0].passenger_id.as_deref(), Some(winners[0].as_str()));
    assert!(stored.has_free_seats);
    assert!(stored.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_racing_for_every_seat_closes_flight() {
    let seats: Vec<Seat> = (1..=12).map(|row| Seat::new(format!("s{row}"), "C", row)).collect();
    let (engine, store) = engine_with(Flight::new("f7", "2019-11-28T18:00:00+0000", seats)).await;

    let mut handles = Vec::new();
    for attempt in 0..48 {
        let engine = engine.clone();
        let seat_id = format!("s{}", attempt % 12 + 1);
        handles.push(tokio::spawn(async move {
            engine.reserve_seat("f7", &seat_id, &format!("p{attempt}")).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 12);
    let stored = store.find("f7").await.unwrap();
    assert!(stored.seats.iter().all(|s| !s.is_free()));
    assert!(!stored.has_free_seats);
    assert!(store
        .list_by_departure("2019-11-28T00:00:00+0000", "2019-11-29T00:00:00+0000")
        .await
        .is_err());
}

#[tokio::test]
async fn test_list_by_departure_window() {
    let store = MemoryFlightStore::new();
    for (id, departure) in [
        ("f1", "2019-11-22T09:05:00+0000"),
        ("f2", "2019-11-24T09:05:00+0000"),
        ("f3", "2019-11-26T09:05:00+0000"),
    ] {
        store
            .save(&Flight::new(id, departure, vec![Seat::new("s1", "A", 1)]))
            .await
            .unwrap();
    }

    let found = store
        .list_by_departure("2019-11-21T00:00:00+0000", "2019-11-25T00:00:00+0000")
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|f| f.id == "f1"));
    assert!(found.iter().any(|f| f.id == "f2"));
}

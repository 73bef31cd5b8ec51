use std::sync::Arc;
use skyseat_core::{FlightStore, ReservationEngine, ReservationNotifier};

#[derive(Clone)]
pub struct AppState {
    pub flights: Arc<dyn FlightStore>,
    pub reservations: Arc<ReservationEngine>,
}

impl AppState {
    pub fn new(flights: Arc<dyn FlightStore>, notifier: Arc<dyn ReservationNotifier>) -> Self {
        let reservations = Arc::new(ReservationEngine::new(flights.clone(), notifier));
        Self { flights, reservations }
    }
}

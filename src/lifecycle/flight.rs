use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::TokenError;

pub type FlightResult = Result<String, TokenError>;

/// Handle every waiter of one exchange polls; all of them observe the same result.
pub type Flight = Shared<BoxFuture<'static, FlightResult>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FlightKey {
    Company,
    Location(String),
}

impl FlightKey {
    pub fn tier(&self) -> &'static str {
        match self {
            FlightKey::Company => "company",
            FlightKey::Location(_) => "location",
        }
    }
}

/// Exchanges currently running, at most one per key.
#[derive(Default)]
pub struct Flights {
    running: Mutex<HashMap<FlightKey, Flight>>,
}

impl Flights {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Join the exchange already running for `key`, or spawn `exchange` as a
    /// detached task. The task outlives any single waiter: dropping a returned
    /// flight never cancels the exchange. The bool is true when joining.
    pub fn join_or_start<Fut>(self: &Arc<Self>, key: FlightKey, exchange: Fut) -> (Flight, bool)
    where
        Fut: Future<Output = FlightResult> + Send + 'static,
    {
        let (flight, sender) = {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(flight) = running.get(&key) {
                debug!("joining {:?} exchange already in flight", key);
                return (flight.clone(), true);
            }

            let (sender, receiver) = oneshot::channel::<FlightResult>();
            let flight = async move {
                receiver.await.unwrap_or_else(|_| {
                    Err(TokenError::Aborted("exchange task dropped before completing".to_owned()))
                })
            }
            .boxed()
            .shared();
            running.insert(key.clone(), flight.clone());
            (flight, sender)
        };

        // registered before spawning, so the landing always finds its own entry
        let landing = Landing { flights: Arc::clone(self), key };
        tokio::spawn(async move {
            let result = exchange.await;
            // unregister first: a caller arriving after this point starts a new exchange
            drop(landing);
            let _ = sender.send(result);
        });

        (flight, false)
    }

    pub fn in_flight(&self) -> usize {
        self.running.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Unregisters the key once the exchange task finishes, panics or is cancelled.
struct Landing {
    flights: Arc<Flights>,
    key: FlightKey,
}

impl Drop for Landing {
    fn drop(&mut self) {
        self.flights
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

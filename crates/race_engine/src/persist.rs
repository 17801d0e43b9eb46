//! Persistence worker - performs store writes off the runner loop.
//!
//! Requests are applied in order by a single task; each outcome is fed
//! back into the runner inbox as a [`RaceInput`].

use std::sync::Arc;

use contracts::{CarId, CarUpdate, RaceResult, ResultStore};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::machine::RaceInput;

/// Store write request
#[derive(Debug, Clone)]
pub enum PersistRequest {
    SaveResult(RaceResult),
    UpdateCar { car_id: CarId, update: CarUpdate },
}

/// Handle to the persistence worker
pub struct PersistHandle {
    tx: mpsc::UnboundedSender<PersistRequest>,
    worker: JoinHandle<()>,
}

impl PersistHandle {
    /// Spawn the worker for `store`
    pub fn spawn<S>(store: Arc<S>, reply_tx: mpsc::Sender<RaceInput>) -> Self
    where
        S: ResultStore + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(persist_worker(store, rx, reply_tx));
        Self { tx, worker }
    }

    /// Queue a request without waiting
    ///
    /// Returns false when the worker has stopped.
    pub fn submit(&self, request: PersistRequest) -> bool {
        self.tx.send(request).is_ok()
    }

    /// Finish queued writes, then stop
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = ?e, "persistence worker panicked");
        }
    }
}

#[instrument(name = "persist_worker_loop", skip_all, fields(store = store.name()))]
async fn persist_worker<S>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<PersistRequest>,
    reply_tx: mpsc::Sender<RaceInput>,
) where
    S: ResultStore + Send + Sync + 'static,
{
    debug!("persistence worker started");

    while let Some(request) = rx.recv().await {
        let reply = match request {
            PersistRequest::SaveResult(result) => match store.save_result(&result).await {
                Ok(()) => RaceInput::ResultSaved {
                    result_id: result.result_id,
                },
                Err(e) => RaceInput::ResultSaveFailed {
                    result_id: result.result_id,
                    car_id: result.car_id,
                    error: e.to_string(),
                },
            },
            PersistRequest::UpdateCar { car_id, update } => {
                match store.update_car(car_id, &update).await {
                    Ok(()) => RaceInput::CarUpdated { car_id },
                    Err(e) => RaceInput::CarUpdateFailed {
                        car_id,
                        error: e.to_string(),
                    },
                }
            }
        };

        // replies after runner shutdown are dropped
        if reply_tx.send(reply).await.is_err() {
            debug!("runner inbox closed, reply dropped");
        }
    }

    debug!("persistence worker stopped");
}

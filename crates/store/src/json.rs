//! JSON document store.
//!
//! The whole document lives in memory and is rewritten (temp file + rename)
//! after every successful write.

use std::path::{Path, PathBuf};

use contracts::{CarId, CarUpdate, ContractError, EventId, RaceResult, ResultStore, Roster};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::StoreDocument;

const STORE_NAME: &str = "json";

/// Result store backed by one JSON file
#[derive(Debug)]
pub struct JsonResultStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl JsonResultStore {
    /// Open an existing document
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ContractError::store_read(STORE_NAME, format!("{}: {e}", path.display()))
        })?;
        let doc: StoreDocument = serde_json::from_str(&raw).map_err(|e| {
            ContractError::store_read(STORE_NAME, format!("{}: {e}", path.display()))
        })?;

        info!(
            path = %path.display(),
            events = doc.events.len(),
            cars = doc.cars.len(),
            results = doc.results.len(),
            "json store opened"
        );

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Open the document, creating it when missing, and merge `roster` in
    pub async fn open_or_seed(
        path: impl AsRef<Path>,
        roster: &Roster,
    ) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let store = if tokio::fs::try_exists(path).await? {
            Self::open(path).await?
        } else {
            Self {
                path: path.to_path_buf(),
                doc: Mutex::new(StoreDocument::default()),
            }
        };

        {
            let mut doc = store.doc.lock().await;
            doc.seed(roster);
            store.persist(&doc).await?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the whole document
    pub async fn document(&self) -> StoreDocument {
        self.doc.lock().await.clone()
    }

    async fn persist(&self, doc: &StoreDocument) -> Result<(), ContractError> {
        let json = serde_json::to_vec_pretty(doc)
            .map_err(|e| ContractError::store_write(STORE_NAME, e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await.map_err(|e| {
            ContractError::store_write(STORE_NAME, format!("{}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            ContractError::store_write(STORE_NAME, format!("{}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), bytes = json.len(), "json store flushed");
        Ok(())
    }
}

impl ResultStore for JsonResultStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn load_roster(&self, event_id: EventId) -> Result<Roster, ContractError> {
        self.doc.lock().await.roster(event_id)
    }

    async fn get_results_by_car(&self, car_id: CarId) -> Result<Vec<RaceResult>, ContractError> {
        Ok(self.doc.lock().await.results_by_car(car_id))
    }

    async fn save_result(&self, result: &RaceResult) -> Result<(), ContractError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.append_result(STORE_NAME, result)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(())
    }

    async fn update_car(&self, car_id: CarId, update: &CarUpdate) -> Result<(), ContractError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.update_car(car_id, update)?;
        self.persist(&next).await?;
        *doc = next;
        Ok(())
    }
}

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{domain::ShotId, protocol::Shot};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{error::ClientError, transport::ShotBackend};

#[derive(Debug, Clone)]
pub enum StoreEvent {
    ActiveShotChanged(Option<Shot>),
    LibraryReplaced { len: usize },
}

#[derive(Default)]
struct StoreState {
    active: Option<Shot>,
    library: Arc<Vec<Shot>>,
    library_generation: u64,
}

pub struct ShotStore {
    state: RwLock<StoreState>,
    generations: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ShotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ShotStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: RwLock::new(StoreState::default()),
            generations: AtomicU64::new(0),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn active(&self) -> Option<Shot> {
        self.state.read().await.active.clone()
    }

    pub async fn active_id(&self) -> Option<ShotId> {
        self.state
            .read()
            .await
            .active
            .as_ref()
            .map(|shot| shot.shot_id.clone())
    }

    pub async fn library(&self) -> Arc<Vec<Shot>> {
        self.state.read().await.library.clone()
    }

    pub async fn find_in_library(&self, shot_id: &ShotId) -> Option<Shot> {
        self.state
            .read()
            .await
            .library
            .iter()
            .find(|shot| &shot.shot_id == shot_id)
            .cloned()
    }

    pub async fn set_active(&self, shot: Shot) -> Option<Shot> {
        let previous = {
            let mut guard = self.state.write().await;
            guard.active.replace(shot.clone())
        };
        debug!(shot_id = %shot.shot_id, "store: active shot replaced");
        let _ = self.events.send(StoreEvent::ActiveShotChanged(Some(shot)));
        previous
    }

    pub async fn clear_active(&self) -> Option<Shot> {
        let previous = self.state.write().await.active.take();
        if previous.is_some() {
            let _ = self.events.send(StoreEvent::ActiveShotChanged(None));
        }
        previous
    }

    /// Swaps in `shot` only while the active shot still has `expected` as its
    /// id. Hands the shot back when the active shot has moved on.
    pub async fn replace_active_if(&self, expected: &ShotId, shot: Shot) -> Result<(), Shot> {
        {
            let mut guard = self.state.write().await;
            let current = guard.active.as_ref().map(|active| &active.shot_id);
            if current != Some(expected) {
                return Err(shot);
            }
            guard.active = Some(shot.clone());
        }
        debug!(expected = %expected, shot_id = %shot.shot_id, "store: active shot swapped");
        let _ = self.events.send(StoreEvent::ActiveShotChanged(Some(shot)));
        Ok(())
    }

    pub async fn replace_library(&self, shots: Vec<Shot>) -> usize {
        let generation = self.next_generation();
        self.install_library(generation, shots)
            .await
            .unwrap_or_default()
    }

    /// Fetches the full list and installs it unless a refresh started later
    /// has already landed. On failure the previous library stays in place.
    pub async fn refresh_library(&self, backend: &dyn ShotBackend) -> Result<usize, ClientError> {
        let generation = self.next_generation();
        let shots = backend.list_shots().await?;
        match self.install_library(generation, shots).await {
            Some(len) => {
                info!(len, generation, "store: library refreshed");
                Ok(len)
            }
            None => {
                debug!(generation, "store: dropping library snapshot overtaken by a newer refresh");
                Ok(self.library().await.len())
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn install_library(&self, generation: u64, shots: Vec<Shot>) -> Option<usize> {
        let mut seen = HashSet::with_capacity(shots.len());
        let mut library = Vec::with_capacity(shots.len());
        for shot in shots {
            if seen.insert(shot.shot_id.clone()) {
                library.push(shot);
            } else {
                warn!(shot_id = %shot.shot_id, "store: dropping duplicate library entry");
            }
        }
        let len = library.len();
        {
            let mut guard = self.state.write().await;
            if generation < guard.library_generation {
                return None;
            }
            guard.library_generation = generation;
            guard.library = Arc::new(library);
        }
        let _ = self.events.send(StoreEvent::LibraryReplaced { len });
        Some(len)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;

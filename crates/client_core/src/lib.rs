pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod transport;
pub mod views;

pub use config::{load_settings, Settings};
pub use error::{ClientError, SessionError};
pub use session::{ModifyOutcome, Notice, NoticeLevel, SessionController, SessionEvent, SessionPhase};
pub use store::{ShotStore, StoreEvent};
pub use transport::{ArtifactResolver, GenerationClient, ShotBackend};
pub use views::{ComparisonView, ExportTargets, LibraryEntry, LibraryView};

use std::sync::Arc;

pub fn connect(settings: &Settings) -> Result<(Arc<SessionController>, ArtifactResolver), ClientError> {
    let client = GenerationClient::new(settings)?;
    let artifacts = client.artifacts();
    let controller = SessionController::new(Arc::new(client), Arc::new(ShotStore::new()));
    Ok((controller, artifacts))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

//! In-memory backend double shared by the controller, store and view tests.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{ParameterChange, Seed, ShotId},
    protocol::{Shot, ShotSpec},
};
use tokio::sync::{Mutex, Notify, Semaphore};

use crate::{error::ClientError, transport::ShotBackend};

#[derive(Debug, Clone)]
pub enum Failure {
    Timeout,
    Unreachable,
    Backend { status: u16, detail: Option<String> },
}

impl Failure {
    fn into_error(self, endpoint: &str) -> ClientError {
        match self {
            Failure::Timeout => ClientError::Timeout {
                endpoint: endpoint.to_string(),
                timeout: Duration::from_secs(300),
            },
            Failure::Unreachable => ClientError::Transport {
                endpoint: endpoint.to_string(),
                message: "connection refused".into(),
            },
            Failure::Backend { status, detail } => ClientError::Backend {
                endpoint: endpoint.to_string(),
                status,
                detail,
            },
        }
    }
}

pub fn sample_shot(shot_id: &str, scene: &str) -> Shot {
    serde_json::from_value(serde_json::json!({
        "shot_id": shot_id,
        "scene_description": scene,
        "shot_type": "medium shot",
        "aspect_ratio": "16:9",
        "seed": 77,
        "image_url": format!("https://cdn.example/{shot_id}.png"),
        "created_at": "2025-12-16T14:30:22",
        "camera_angle": "eye-level",
        "lens_focal_length": "50mm",
        "depth_of_field": "medium, f/5.6",
        "lighting_direction": "front",
        "color_scheme": "vibrant"
    }))
    .expect("sample shot")
}

#[derive(Default)]
pub struct FakeBackend {
    pub shots: Mutex<Vec<Shot>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub modify_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub create_failure: Mutex<Option<Failure>>,
    pub modify_failure: Mutex<Option<Failure>>,
    pub list_failure: Mutex<Option<Failure>>,
    /// When set, modify calls wait for a permit before answering.
    pub modify_gate: Option<Arc<Semaphore>>,
    pub modify_started: Notify,
    /// When set, the modify response also rewrites this field to mimic a
    /// backend that leaks changes into unrelated parameters.
    pub leak_color_scheme: Option<String>,
    /// The first list call snapshots the shots, then waits this long before
    /// answering with that snapshot.
    pub first_list_delay: Option<Duration>,
    /// Modify answers with a new derived id and keeps the source shot.
    pub derive_modify_ids: bool,
    pub modify_targets: Mutex<Vec<ShotId>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shots(shots: Vec<Shot>) -> Self {
        Self {
            shots: Mutex::new(shots),
            ..Self::default()
        }
    }

    /// Holds every modify call until the returned semaphore gets permits.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.modify_gate = Some(gate.clone());
        (self, gate)
    }

    pub fn slow_first_list(mut self, delay: Duration) -> Self {
        self.first_list_delay = Some(delay);
        self
    }

    pub fn deriving_modify_ids(mut self) -> Self {
        self.derive_modify_ids = true;
        self
    }

    pub async fn fail_create(&self, failure: Failure) {
        *self.create_failure.lock().await = Some(failure);
    }

    pub async fn fail_modify(&self, failure: Failure) {
        *self.modify_failure.lock().await = Some(failure);
    }

    pub async fn fail_list(&self, failure: Option<Failure>) {
        *self.list_failure.lock().await = failure;
    }
}

#[async_trait]
impl ShotBackend for FakeBackend {
    async fn create_shot(&self, spec: &ShotSpec) -> Result<Shot, ClientError> {
        spec.validate()?;
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(failure) = self.create_failure.lock().await.take() {
            return Err(failure.into_error("/api/shots/create"));
        }
        let mut shot = sample_shot(&format!("shot_{n}"), &spec.scene_description);
        shot.shot_type = spec.shot_type.as_str().to_string();
        shot.aspect_ratio = spec.aspect_ratio.as_str().to_string();
        shot.seed = Some(Seed(1000 + n as i64));
        shot.hdr_16bit_path = Some(format!("outputs/hdr/shot_{n}_16bit.tiff"));
        shot.hdr_comparison_path = Some(format!("outputs/hdr/shot_{n}_comparison.png"));
        self.shots.lock().await.push(shot.clone());
        Ok(shot)
    }

    async fn list_shots(&self) -> Result<Vec<Shot>, ClientError> {
        let n = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(failure) = self.list_failure.lock().await.clone() {
            return Err(failure.into_error("/api/shots"));
        }
        let snapshot = self.shots.lock().await.clone();
        if let (1, Some(delay)) = (n, self.first_list_delay) {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn get_shot(&self, shot_id: &ShotId) -> Result<Shot, ClientError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.shots
            .lock()
            .await
            .iter()
            .find(|shot| &shot.shot_id == shot_id)
            .cloned()
            .ok_or_else(|| ClientError::Backend {
                endpoint: format!("/api/shots/{shot_id}"),
                status: 404,
                detail: Some("Shot not found".into()),
            })
    }

    async fn modify_parameter(
        &self,
        shot_id: &ShotId,
        change: ParameterChange,
    ) -> Result<Shot, ClientError> {
        let n = self.modify_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.modify_targets.lock().await.push(shot_id.clone());
        self.modify_started.notify_one();
        if let Some(gate) = &self.modify_gate {
            gate.acquire().await.expect("gate open").forget();
        }
        if let Some(failure) = self.modify_failure.lock().await.take() {
            return Err(failure.into_error("/api/shots/modify"));
        }

        let mut shots = self.shots.lock().await;
        let Some(stored) = shots.iter_mut().find(|shot| &shot.shot_id == shot_id) else {
            return Err(ClientError::Backend {
                endpoint: format!("/api/shots/{shot_id}/modify"),
                status: 404,
                detail: Some("Shot not found".into()),
            });
        };
        let mut modified = stored.clone();
        *modified.parameter_mut(change.parameter()) = Some(change.value().to_string());
        modified.image_url = Some(format!("https://cdn.example/{shot_id}-r{n}.png"));
        if let Some(leak) = &self.leak_color_scheme {
            modified.color_scheme = Some(leak.clone());
        }
        if self.derive_modify_ids {
            modified.shot_id = ShotId::new(format!("{shot_id}_mod_{}_{n}", change.parameter()));
            shots.push(modified.clone());
        } else {
            *stored = modified.clone();
        }
        Ok(modified)
    }

    async fn refine_shot(
        &self,
        shot_id: &ShotId,
        prompt: &str,
        _apply_hdr: bool,
    ) -> Result<Shot, ClientError> {
        let original = self.get_shot(shot_id).await?;
        let mut refined = original.clone();
        refined.shot_id = ShotId::new(format!("{shot_id}_refined"));
        refined.scene_description = format!("{} (refined: {prompt})", original.scene_description);
        self.shots.lock().await.push(refined.clone());
        Ok(refined)
    }
}

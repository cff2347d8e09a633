use std::sync::Arc;

use shared::{domain::ShotId, protocol::Shot};
use url::Url;

use crate::{
    error::{ClientError, SessionError},
    store::ShotStore,
    transport::ArtifactResolver,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub shot: Shot,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct LibraryView {
    store: Arc<ShotStore>,
}

impl LibraryView {
    pub fn new(store: Arc<ShotStore>) -> Self {
        Self { store }
    }

    pub async fn entries(&self) -> Vec<LibraryEntry> {
        let active = self.store.active_id().await;
        self.store
            .library()
            .await
            .iter()
            .map(|shot| LibraryEntry {
                is_active: active.as_ref() == Some(&shot.shot_id),
                shot: shot.clone(),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.store.library().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.library().await.is_empty()
    }

    pub async fn select(&self, shot: Shot) -> ShotId {
        let shot_id = shot.shot_id.clone();
        self.store.set_active(shot).await;
        shot_id
    }

    pub async fn select_by_id(&self, shot_id: &ShotId) -> Result<Shot, SessionError> {
        let shot = self
            .store
            .find_in_library(shot_id)
            .await
            .ok_or_else(|| SessionError::UnknownShot(shot_id.clone()))?;
        self.store.set_active(shot.clone()).await;
        Ok(shot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTargets {
    pub hdr_16bit_path: String,
    pub png_path: String,
    pub hdr_16bit_url: Url,
    pub png_url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonView {
    pub comparison_path: String,
    pub comparison_url: Url,
    pub exports: Option<ExportTargets>,
}

impl ComparisonView {
    pub fn derive(shot: &Shot, resolver: &ArtifactResolver) -> Result<Option<Self>, ClientError> {
        let Some(comparison_path) = non_empty(shot.hdr_comparison_path.as_deref()) else {
            return Ok(None);
        };

        let exports = match non_empty(shot.hdr_16bit_path.as_deref()) {
            Some(hdr_16bit_path) => {
                let png_path = with_extension(hdr_16bit_path, "png");
                Some(ExportTargets {
                    hdr_16bit_url: resolver.output_url(hdr_16bit_path)?,
                    png_url: resolver.output_url(&png_path)?,
                    hdr_16bit_path: hdr_16bit_path.to_string(),
                    png_path,
                })
            }
            None => None,
        };

        Ok(Some(Self {
            comparison_url: resolver.output_url(comparison_path)?,
            comparison_path: comparison_path.to_string(),
            exports,
        }))
    }

    pub async fn for_active(
        store: &ShotStore,
        resolver: &ArtifactResolver,
    ) -> Result<Option<Self>, ClientError> {
        match store.active().await {
            Some(shot) => Self::derive(&shot, resolver),
            None => Ok(None),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Swaps the extension of the final path component, appending one when the
/// file name has none.
pub fn with_extension(path: &str, extension: &str) -> String {
    let name_start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{extension}", &path[..name_start + dot]),
        _ => format!("{path}.{extension}"),
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{AspectRatio, HdrPreset, ModifiableParameter, ParameterChange, Seed, ShotId, ShotType},
    error::ValidationError,
};

fn default_shot_type() -> String {
    ShotType::default().as_str().to_string()
}

fn default_aspect_ratio() -> String {
    AspectRatio::default().as_str().to_string()
}

fn default_steps() -> u32 {
    50
}

fn default_guidance_scale() -> f64 {
    5.0
}

/// One generated image plus the parameters that produced it.
///
/// The list endpoint only returns a summary subset of these fields, so
/// everything except the id and description is defaulted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub shot_id: ShotId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_name: Option<String>,
    pub scene_description: String,
    #[serde(default = "default_shot_type")]
    pub shot_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simple_prompt: Option<String>,
    #[serde(default)]
    pub seed: Option<Seed>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_local_path: Option<String>,
    #[serde(default)]
    pub hdr_16bit_path: Option<String>,
    #[serde(default)]
    pub hdr_comparison_path: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_opt")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens_focal_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_of_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting_direction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,
}

impl Shot {
    pub fn parameter(&self, parameter: ModifiableParameter) -> Option<&str> {
        let value = match parameter {
            ModifiableParameter::CameraAngle => &self.camera_angle,
            ModifiableParameter::LensFocalLength => &self.lens_focal_length,
            ModifiableParameter::DepthOfField => &self.depth_of_field,
            ModifiableParameter::LightingDirection => &self.lighting_direction,
            ModifiableParameter::ColorScheme => &self.color_scheme,
        };
        value.as_deref()
    }

    pub fn parameter_mut(&mut self, parameter: ModifiableParameter) -> &mut Option<String> {
        match parameter {
            ModifiableParameter::CameraAngle => &mut self.camera_angle,
            ModifiableParameter::LensFocalLength => &mut self.lens_focal_length,
            ModifiableParameter::DepthOfField => &mut self.depth_of_field,
            ModifiableParameter::LightingDirection => &mut self.lighting_direction,
            ModifiableParameter::ColorScheme => &mut self.color_scheme,
        }
    }

    /// Parameters whose values differ between `self` and `other`.
    pub fn changed_parameters(&self, other: &Shot) -> Vec<ModifiableParameter> {
        ModifiableParameter::ALL
            .iter()
            .copied()
            .filter(|p| self.parameter(*p) != other.parameter(*p))
            .collect()
    }

    /// Creation-time fields that a parameter modification must leave alone.
    pub fn identity_drift(&self, other: &Shot) -> Vec<&'static str> {
        let mut drift = Vec::new();
        if self.seed != other.seed {
            drift.push("seed");
        }
        if self.scene_description != other.scene_description {
            drift.push("scene_description");
        }
        if self.shot_type != other.shot_type {
            drift.push("shot_type");
        }
        if self.aspect_ratio != other.aspect_ratio {
            drift.push("aspect_ratio");
        }
        drift
    }

    pub fn has_hdr_comparison(&self) -> bool {
        self.hdr_comparison_path
            .as_deref()
            .is_some_and(|path| !path.trim().is_empty())
    }
}

/// Neutral numeric grade sent with every creation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HdrSettings {
    pub exposure: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub temperature: f64,
}

impl HdrSettings {
    pub const NEUTRAL: HdrSettings = HdrSettings {
        exposure: 0.0,
        contrast: 1.0,
        saturation: 1.0,
        temperature: 0.0,
    };
}

impl Default for HdrSettings {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// What the user asks for when creating a shot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShotSpec {
    pub scene_description: String,
    pub shot_type: ShotType,
    pub aspect_ratio: AspectRatio,
    pub hdr_preset: HdrPreset,
}

impl ShotSpec {
    pub fn new(scene_description: impl Into<String>) -> Self {
        Self {
            scene_description: scene_description.into(),
            ..Self::default()
        }
    }

    pub fn with_shot_type(mut self, shot_type: ShotType) -> Self {
        self.shot_type = shot_type;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_hdr_preset(mut self, hdr_preset: HdrPreset) -> Self {
        self.hdr_preset = hdr_preset;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scene_description.trim().is_empty() {
            return Err(ValidationError::EmptyField("scene_description"));
        }
        Ok(())
    }

    pub fn to_request(&self) -> Result<CreateShotRequest, ValidationError> {
        self.validate()?;
        Ok(CreateShotRequest {
            scene_description: self.scene_description.clone(),
            shot_type: self.shot_type,
            aspect_ratio: self.aspect_ratio,
            apply_hdr: true,
            hdr_preset: self.hdr_preset,
            hdr_settings: HdrSettings::NEUTRAL,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShotRequest {
    pub scene_description: String,
    pub shot_type: ShotType,
    pub aspect_ratio: AspectRatio,
    pub apply_hdr: bool,
    pub hdr_preset: HdrPreset,
    pub hdr_settings: HdrSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyParameterRequest {
    pub shot_id: ShotId,
    pub parameter: ModifiableParameter,
    pub value: String,
}

impl ModifyParameterRequest {
    pub fn new(shot_id: ShotId, change: ParameterChange) -> Self {
        Self {
            shot_id,
            parameter: change.parameter(),
            value: change.value().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineShotRequest {
    pub shot_id: ShotId,
    pub refinement_prompt: String,
    pub apply_hdr: bool,
}

/// `{ "shot": ... }` wrapper used by create/get/modify/refine responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotEnvelope {
    pub shot: Shot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotListResponse {
    pub shots: Vec<Shot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub message: String,
    pub version: String,
    pub status: String,
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

impl ServiceStatus {
    pub fn is_operational(&self) -> bool {
        self.status.eq_ignore_ascii_case("operational")
    }
}

/// Timestamps arrive either RFC 3339 or as naive ISO-8601 local times.
/// Naive values are taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        parse(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

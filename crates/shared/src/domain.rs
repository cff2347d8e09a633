use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id_newtype!(ShotId);

/// Reproducibility token returned by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(pub i64);

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed string enumerations shared by the request builders and the CLI.
///
/// Each variant maps to exactly one wire label; parsing is exact-match after
/// trimming, so labels containing spaces ("medium shot") round-trip intact.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn labels() -> impl Iterator<Item = &'static str> {
                Self::ALL.iter().map(|value| value.as_str())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == raw)
                    .ok_or_else(|| ValidationError::UnknownOption {
                        field: stringify!($name),
                        value: raw.to_string(),
                    })
            }
        }
    };
}

labeled_enum! {
    /// Framing of a shot, fixed at creation.
    ShotType, default = Medium {
        ExtremeWide => "extreme wide shot",
        Wide => "wide shot",
        MediumWide => "medium wide shot",
        Medium => "medium shot",
        MediumClose => "medium close-up",
        CloseUp => "close-up",
        ExtremeClose => "extreme close-up",
    }
}

labeled_enum! {
    AspectRatio, default = Widescreen {
        Widescreen => "16:9",
        Square => "1:1",
        Standard => "4:3",
        Portrait => "2:3",
        Vertical => "9:16",
    }
}

labeled_enum! {
    /// Named HDR grade forwarded with creation requests.
    HdrPreset, default = Neutral {
        Neutral => "neutral",
        Warm => "warm",
        Cool => "cool",
        Dramatic => "dramatic",
        Vintage => "vintage",
    }
}

labeled_enum! {
    /// Shot attributes that can be changed after creation, one at a time.
    ModifiableParameter, default = CameraAngle {
        CameraAngle => "camera_angle",
        LensFocalLength => "lens_focal_length",
        DepthOfField => "depth_of_field",
        LightingDirection => "lighting_direction",
        ColorScheme => "color_scheme",
    }
}

const CAMERA_ANGLES: &[&str] = &[
    "eye-level",
    "low-angle",
    "high-angle",
    "overhead",
    "dutch angle",
    "point of view",
];

const LENS_FOCAL_LENGTHS: &[&str] = &[
    "14mm wide angle",
    "24mm",
    "35mm",
    "50mm",
    "85mm portrait",
    "135mm",
    "200mm telephoto",
];

const DEPTHS_OF_FIELD: &[&str] = &[
    "shallow, f/1.4",
    "shallow, f/2.8",
    "medium, f/5.6",
    "medium, f/8",
    "deep, f/11",
    "deep, f/16",
];

const LIGHTING_DIRECTIONS: &[&str] = &[
    "front",
    "45-degree key light",
    "side",
    "back",
    "overhead",
    "low angle",
];

const COLOR_SCHEMES: &[&str] = &[
    "warm golden tones",
    "cool blue tones",
    "monochromatic",
    "high contrast",
    "desaturated",
    "vibrant",
];

impl ModifiableParameter {
    pub fn allowed_values(self) -> &'static [&'static str] {
        match self {
            ModifiableParameter::CameraAngle => CAMERA_ANGLES,
            ModifiableParameter::LensFocalLength => LENS_FOCAL_LENGTHS,
            ModifiableParameter::DepthOfField => DEPTHS_OF_FIELD,
            ModifiableParameter::LightingDirection => LIGHTING_DIRECTIONS,
            ModifiableParameter::ColorScheme => COLOR_SCHEMES,
        }
    }

    /// Human label used in notifications ("Camera Angle").
    pub fn title(self) -> &'static str {
        match self {
            ModifiableParameter::CameraAngle => "Camera Angle",
            ModifiableParameter::LensFocalLength => "Focal Length",
            ModifiableParameter::DepthOfField => "Depth of Field",
            ModifiableParameter::LightingDirection => "Lighting Direction",
            ModifiableParameter::ColorScheme => "Color Grade",
        }
    }

    pub fn validate_value(self, value: &str) -> Result<ParameterChange, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyField("value"));
        }
        let Some(allowed) = self.allowed_values().iter().find(|v| **v == value) else {
            return Err(ValidationError::ValueOutOfDomain {
                parameter: self,
                value: value.to_string(),
            });
        };
        Ok(ParameterChange {
            parameter: self,
            value: allowed,
        })
    }
}

/// A parameter paired with a value already checked against its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterChange {
    parameter: ModifiableParameter,
    value: &'static str,
}

impl ParameterChange {
    pub fn parse(parameter: &str, value: &str) -> Result<Self, ValidationError> {
        let parameter = parameter
            .parse::<ModifiableParameter>()
            .map_err(|_| ValidationError::UnknownParameter(parameter.trim().to_string()))?;
        parameter.validate_value(value)
    }

    pub fn parameter(&self) -> ModifiableParameter {
        self.parameter
    }

    pub fn value(&self) -> &'static str {
        self.value
    }
}

impl fmt::Display for ParameterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.parameter, self.value)
    }
}

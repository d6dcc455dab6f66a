//! Model presets understood by the hosted BiRefNet v2 endpoint
//!
//! The remote API takes model and resolution names as plain strings. These
//! enums hold the accepted values and serialize to exactly those strings, so a
//! request is passed through without any substitution.

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BiRefNet v2 model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiRefNetModel {
    /// Fast general-purpose segmentation
    #[serde(rename = "General Use (Light)")]
    GeneralLight,
    /// Slower, more accurate general-purpose segmentation
    #[serde(rename = "General Use (Heavy)")]
    GeneralHeavy,
    /// Tuned for people and portraits
    #[serde(rename = "Portrait")]
    Portrait,
    /// Fine structures such as hair and fur
    #[serde(rename = "Matting")]
    Matting,
}

impl BiRefNetModel {
    /// All presets in the order they are listed to users
    pub const ALL: [Self; 4] = [
        Self::GeneralLight,
        Self::GeneralHeavy,
        Self::Portrait,
        Self::Matting,
    ];

    /// Name sent to the remote API
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::GeneralLight => "General Use (Light)",
            Self::GeneralHeavy => "General Use (Heavy)",
            Self::Portrait => "Portrait",
            Self::Matting => "Matting",
        }
    }

    /// Short alias accepted on the command line
    #[must_use]
    pub fn alias(self) -> &'static str {
        match self {
            Self::GeneralLight => "light",
            Self::GeneralHeavy => "heavy",
            Self::Portrait => "portrait",
            Self::Matting => "matting",
        }
    }

    /// One-line description for `--list-models`
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::GeneralLight => "Fast general-purpose background removal (default)",
            Self::GeneralHeavy => "Higher accuracy for complex scenes, slower",
            Self::Portrait => "Optimized for people and portraits",
            Self::Matting => "Fine structures such as hair, fur and transparent edges",
        }
    }
}

impl Default for BiRefNetModel {
    fn default() -> Self {
        Self::GeneralLight
    }
}

impl fmt::Display for BiRefNetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for BiRefNetModel {
    type Err = BgRemovalError;

    /// Accepts the exact API name or the short alias (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|model| {
                model.api_name() == wanted || model.alias().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|m| m.api_name()).collect();
                BgRemovalError::model(format!(
                    "Unknown model '{}'. Valid models: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Resolution the remote model processes the image at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingResolution {
    #[serde(rename = "1024x1024")]
    R1024,
    #[serde(rename = "2048x2048")]
    R2048,
}

impl OperatingResolution {
    pub const ALL: [Self; 2] = [Self::R1024, Self::R2048];

    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::R1024 => "1024x1024",
            Self::R2048 => "2048x2048",
        }
    }

    /// Edge length in pixels
    #[must_use]
    pub fn pixels(self) -> u32 {
        match self {
            Self::R1024 => 1024,
            Self::R2048 => 2048,
        }
    }
}

impl Default for OperatingResolution {
    fn default() -> Self {
        Self::R1024
    }
}

impl fmt::Display for OperatingResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for OperatingResolution {
    type Err = BgRemovalError;

    /// Accepts `1024x1024`, `2048x2048` or the bare edge length (`1024`, `2048`)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1024x1024" | "1024" => Ok(Self::R1024),
            "2048x2048" | "2048" => Ok(Self::R2048),
            _ => Err(BgRemovalError::model(format!(
                "Unknown operating resolution '{}'. Valid resolutions: 1024x1024, 2048x2048",
                s
            ))),
        }
    }
}

/// Output image format requested from the remote model
///
/// Results always come back as PNG so the alpha channel survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
}

impl OutputFormat {
    /// File extension (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }
}

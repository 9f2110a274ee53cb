// SPDX-License-Identifier: MPL-2.0
//! This module handles the pipeline configuration, including loading and saving
//! it to a `pipeline.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use frame_pacer::config::{self, PipelineConfig};
//! use frame_pacer::domain::video::OverflowPolicy;
//!
//! // Load existing configuration
//! let mut config = config::load().unwrap_or_default();
//!
//! // Favour latency over completeness
//! config.overflow_policy = OverflowPolicy::DropOldest;
//! config.loop_playback = true;
//!
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;

use crate::domain::video::{OverflowPolicy, PixelFormat, QueueCapacity, SpeedRange};
use crate::error::{Error, Result};
use crate::video_player::normalizer::CanonicalLayout;
use defaults::{
    DEFAULT_MAX_PLAYBACK_SPEED, DEFAULT_MIN_PLAYBACK_SPEED, DEFAULT_PLAYBACK_SPEED,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SPEED_STEP, MAX_CANONICAL_DIMENSION, MAX_QUEUE_CAPACITY,
    MIN_QUEUE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "pipeline.toml";
const APP_NAME: &str = "FramePacer";

/// Tunables of one playback pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames buffered between the decode and render workers.
    pub queue_capacity: usize,
    /// What a push does when the queue is full.
    pub overflow_policy: OverflowPolicy,
    /// Restart from the beginning at end of stream instead of stopping.
    pub loop_playback: bool,
    pub initial_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Increment used by speed up / slow down.
    pub speed_step: f64,
    /// Layout every frame is normalized to before queuing.
    pub canonical_format: PixelFormat,
    /// Fixed output size; frames keep their decoded size when unset.
    pub canonical_width: Option<u32>,
    pub canonical_height: Option<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            loop_playback: false,
            initial_speed: DEFAULT_PLAYBACK_SPEED,
            min_speed: DEFAULT_MIN_PLAYBACK_SPEED,
            max_speed: DEFAULT_MAX_PLAYBACK_SPEED,
            speed_step: DEFAULT_SPEED_STEP,
            canonical_format: PixelFormat::Rgba,
            canonical_width: None,
            canonical_height: None,
        }
    }
}

impl PipelineConfig {
    /// Checks every field, reporting the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the offending setting.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            return Err(Error::Config(format!(
                "queue_capacity must be between {MIN_QUEUE_CAPACITY} and {MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            )));
        }
        let range = self.speed_range()?;
        if !self.initial_speed.is_finite()
            || self.initial_speed < range.min()
            || self.initial_speed > range.max()
        {
            return Err(Error::Config(format!(
                "initial_speed {} is outside [{}, {}]",
                self.initial_speed,
                range.min(),
                range.max()
            )));
        }
        self.canonical_layout()?;
        Ok(())
    }

    /// Queue capacity as a bounded newtype.
    #[must_use]
    pub fn capacity(&self) -> QueueCapacity {
        QueueCapacity::new(self.queue_capacity)
    }

    /// Speed bounds and step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `0 < min_speed <= max_speed` and
    /// `speed_step > 0`.
    pub fn speed_range(&self) -> Result<SpeedRange> {
        SpeedRange::new(self.min_speed, self.max_speed, self.speed_step).ok_or_else(|| {
            Error::Config(format!(
                "invalid speed range [{}, {}] with step {}",
                self.min_speed, self.max_speed, self.speed_step
            ))
        })
    }

    /// Canonical frame layout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for planar formats, zero dimensions,
    /// dimensions above `MAX_CANONICAL_DIMENSION`, or when only one of
    /// width/height is set.
    pub fn canonical_layout(&self) -> Result<CanonicalLayout> {
        let size = match (self.canonical_width, self.canonical_height) {
            (Some(w), Some(h)) => Some((w, h)),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "canonical_width and canonical_height must be set together".to_string(),
                ))
            }
        };
        if let Some((w, h)) = size {
            if w > MAX_CANONICAL_DIMENSION || h > MAX_CANONICAL_DIMENSION {
                return Err(Error::Config(format!(
                    "canonical size {w}x{h} exceeds {MAX_CANONICAL_DIMENSION} per side"
                )));
            }
        }
        CanonicalLayout::new(self.canonical_format, size).map_err(|err| {
            Error::Config(format!(
                "canonical layout {} {size:?} rejected: {err}",
                self.canonical_format
            ))
        })
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<PipelineConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PipelineConfig::default())
}

pub fn save(config: &PipelineConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Reads a configuration file. Unparseable content yields the defaults.
pub fn load_from_path(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content).unwrap_or_default())
}

pub fn save_to_path(config: &PipelineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

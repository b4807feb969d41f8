//! Configuration management for MenuBar
//!
//! Handles loading, saving, and managing user preferences and settings.

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::companion::{ShadowPlacement, TaskbarPlacement};
use crate::error::MenuBarError;
use crate::geometry::ScreenEdge;

/// Largest thickness, in logical units, any bar or strip may ask for
pub const MAX_THICKNESS: u32 = 4096;

/// Longest gap between search status polls
const MAX_PROBE_INTERVAL_SECS: u64 = 3600;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Appearance settings
    pub appearance: AppearanceConfig,
    /// Behavior settings
    pub behavior: BehaviorConfig,
    /// Secondary taskbar settings
    pub taskbar: TaskbarConfig,
    /// Search availability probe
    pub search: SearchConfig,
    /// Shutdown handshake
    pub shutdown: ShutdownConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("menubar")
            .join("config.toml")
    }

    /// Load configuration from file or create default
    pub fn load_or_default() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing defaults there if it does not exist yet
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from: {:?}", path);
            let content = std::fs::read_to_string(path)?;
            match toml::from_str::<Config>(&content) {
                Ok(config) => return Ok(config.sanitized()),
                Err(e) => {
                    warn!("Failed to parse config, using defaults: {}", e);
                    return Ok(Self::default());
                }
            }
        }

        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| MenuBarError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Replace out-of-range values with their defaults
    fn sanitized(mut self) -> Self {
        let appearance = AppearanceConfig::default();
        if !(1..=MAX_THICKNESS).contains(&self.appearance.bar_height) {
            warn!(
                "bar_height {} outside 1..={}, using default",
                self.appearance.bar_height, MAX_THICKNESS
            );
            self.appearance.bar_height = appearance.bar_height;
        }
        if self.appearance.shadow_height > MAX_THICKNESS {
            warn!("shadow_height {} too large, using default", self.appearance.shadow_height);
            self.appearance.shadow_height = appearance.shadow_height;
        }
        if self.appearance.shadow_overlap > MAX_THICKNESS {
            warn!("shadow_overlap {} too large, using default", self.appearance.shadow_overlap);
            self.appearance.shadow_overlap = appearance.shadow_overlap;
        }
        if !(1..=MAX_THICKNESS).contains(&self.taskbar.height) {
            warn!(
                "taskbar height {} outside 1..={}, using default",
                self.taskbar.height, MAX_THICKNESS
            );
            self.taskbar.height = TaskbarConfig::default().height;
        }
        if !(1..=MAX_PROBE_INTERVAL_SECS).contains(&self.search.probe_interval_secs) {
            warn!(
                "probe_interval_secs {} outside 1..={}, using default",
                self.search.probe_interval_secs, MAX_PROBE_INTERVAL_SECS
            );
            self.search.probe_interval_secs = SearchConfig::default().probe_interval_secs;
        }
        self
    }
}

/// Appearance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Bar thickness in logical units
    pub bar_height: u32,
    /// Screen edge the bar docks on
    pub edge: ScreenEdge,
    /// Draw the shadow window under the bar
    pub shadow_enabled: bool,
    /// Shadow strip thickness in logical units
    pub shadow_height: u32,
    /// How far the shadow reaches back under the bar
    pub shadow_overlap: u32,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            bar_height: 23,
            edge: ScreenEdge::Top,
            shadow_enabled: true,
            shadow_height: 14,
            shadow_overlap: 0,
        }
    }
}

impl AppearanceConfig {
    pub fn shadow_placement(&self) -> ShadowPlacement {
        ShadowPlacement {
            thickness: self.shadow_height as i32,
            overlap: self.shadow_overlap as i32,
        }
    }
}

/// Behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Reserve screen space (push windows down)
    pub reserve_space: bool,
    /// Restore the full work area on exit (when running as the user shell)
    pub reset_work_area_on_exit: bool,
    /// Keep the bar out of Alt+Tab and the taskbar
    pub hide_from_tasks: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            reserve_space: true,
            reset_work_area_on_exit: false,
            hide_from_tasks: true,
        }
    }
}

/// Secondary taskbar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskbarConfig {
    /// Show the secondary taskbar
    pub enabled: bool,
    /// Edge the taskbar docks on
    pub edge: ScreenEdge,
    /// Taskbar thickness in logical units
    pub height: u32,
}

impl Default for TaskbarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            edge: ScreenEdge::Bottom,
            height: 30,
        }
    }
}

impl TaskbarConfig {
    pub fn placement(&self) -> TaskbarPlacement {
        TaskbarPlacement {
            edge: self.edge,
            thickness: self.height as i32,
        }
    }
}

/// Search availability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Service whose status gates the search entry
    pub service_name: String,
    /// Seconds between status polls
    pub probe_interval_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            service_name: "WSearch".to_string(),
            probe_interval_secs: 5,
        }
    }
}

impl SearchConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// Shutdown handshake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How many times a close request may be deferred for cleanup
    pub max_close_deferrals: u32,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            max_close_deferrals: 3,
        }
    }
}

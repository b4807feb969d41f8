//! Custom error types for the MenuBar application

use thiserror::Error;

use crate::appbar::{AppBarHandle, WindowId};
use crate::companion::CompanionRole;

/// Main error type for MenuBar operations
#[derive(Error, Debug)]
pub enum MenuBarError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("AppBar registration denied: {0}")]
    RegistrationDenied(String),

    #[error("AppBar handle {0} is no longer recognized by the shell")]
    StaleHandle(AppBarHandle),

    #[error("Companion window unavailable: {0}")]
    CompanionUnavailable(CompanionRole),

    #[error("Window {0:?} no longer exists")]
    WindowGone(WindowId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApi(#[from] windows::core::Error),
}

/// Result type alias for MenuBar operations
pub type MenuBarResult<T> = Result<T, MenuBarError>;

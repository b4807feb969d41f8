//! Win32 host for the MenuBar
//!
//! Creates the windows, owns the message loop and adapts the shell, window
//! and service APIs to the traits the core logic runs against.

pub mod manager;
pub mod platform;
pub mod proc;
pub mod state;

pub use manager::WindowManager;

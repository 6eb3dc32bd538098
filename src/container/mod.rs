//! Container lifecycle module
//!
//! This module resolves or builds the image, launches a single-use container,
//! supervises it, and tears down whatever the invocation created.

mod cleanup;
pub mod image;
pub mod launch;
pub mod lifecycle;
pub mod names;
pub mod supervisor;

// Re-export commonly used items for convenience
pub use image::ResolvedImage;
pub use launch::{host_gateway, Host, DESKTOP_GATEWAY, LINUX_GATEWAY};
pub use lifecycle::{run, run_with};
pub use names::unique_name;
pub use supervisor::{Callback, Mode, RunningContainer};

//! Lifecycle management for LizardFS-backed container volumes.
//!
//! The crate owns the part of the volume plugin that has state: the per-volume
//! mount reference table, the helper process invocations that perform the real
//! mounts, and the supervisor that reclaims terminated helper processes.

pub mod config;
pub mod driver;
pub mod error;
pub mod exec;
pub mod mount_table;
pub mod reaper;
pub mod root;

pub use config::{DriverConfig, HelperBinaries, MountFailurePolicy};
pub use driver::{Capabilities, Scope, Volume, VolumeDriver};
pub use error::{InvokeError, VolumeError};
pub use exec::{Invocation, Invoker, ProcessInvoker};
pub use mount_table::{Detached, MountGuard, MountState, MountTable};

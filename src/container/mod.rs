//! The per-workspace agent container: naming, ownership, creation requests,
//! volume provisioning and the lifecycle state machine.

pub mod identity;
pub mod lifecycle;
pub mod ownership;
pub mod provision;
pub mod request;

pub use identity::{derive_container_name, validate_container_name};
pub use lifecycle::{ContainerRecord, LaunchTarget, Mode, Orchestrator, RunOptions, expand_excludes, read_record};
pub use ownership::{OWNERSHIP_LABEL, OWNERSHIP_SENTINEL, Ownership, verify};
pub use provision::{EnvImportPlan, InContainerProvisioner, ProvisionPlan, ProvisionVolume};
pub use request::{CreateRequest, Mount, OneShotRequest, SocketMount};

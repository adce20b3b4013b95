//! Filesystem guards shared by the layout, env import and link steps.
//!
//! The data volume is shared with other invocations and with whatever runs
//! inside the container, so every check here is repeated immediately before
//! the mutation it protects.

pub mod atomic;
pub mod path_guard;

pub use atomic::write_atomic;
pub use path_guard::{check_relative, ensure_real_dir, reject_symlink, resolve_under};

/// Numeric owner applied to provisioned files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// The invoking user. Inside the container this is the service user.
    pub fn current() -> Self {
        // SAFETY: getuid/getgid cannot fail and touch no memory.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }
}

pub mod launcher;
pub mod port;
pub mod supervisor;

pub use launcher::{DetachedLauncher, Launcher};
pub use port::reclaim_port;
pub use supervisor::{EnsureOutcome, LivenessProbe, ProcessSupervisor, SupervisorState};

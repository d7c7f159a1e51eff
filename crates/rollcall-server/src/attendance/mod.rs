//! Live attendance sessions: shared state, event routing and finalization.

pub mod finalizer;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use finalizer::{Finalizer, reconcile};
pub use router::EventRouter;
pub use state::{ActiveSession, SessionSlot, SessionState};

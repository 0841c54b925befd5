//! Bridge handles and the disposal protocol.
//!
//! Every long-lived native resource the engine mints (iterator, query,
//! script) is wrapped by exactly one handle from this module. All handles
//! share one lifecycle:
//!
//! ```text
//! ┌─────────────────────────────┐
//! │     host-visible handle     │
//! │  EntityIter / Query / Script│
//! └──────────────┬──────────────┘
//!                │ operations while live
//! ┌──────────────▼──────────────┐
//! │    shared engine (Mutex)    │
//! └──────────────┬──────────────┘
//!                │ dispose()/done(), or Drop when abandoned
//! ┌──────────────▼──────────────┐
//! │  native resource released   │
//! │        exactly once         │
//! └─────────────────────────────┘
//! ```
//!
//! The explicit disposal call and the drop path funnel into one
//! `Option::take`-guarded release per handle, so the native resource is
//! released at most once however the host lets go of the object. After
//! disposal, a second dispose is an accepted no-op while every other
//! operation fails with a lifecycle error.

pub mod iter;
pub mod query;
pub mod script;

pub use iter::{EntityIter, IterStep};
pub use query::Query;
pub use script::Script;

use crate::error::BridgeResult;

/// Uniform disposal surface shared by every bridge handle, the host-side
/// hook for scoped-resource constructs.
pub trait Disposable {
    /// Releases the wrapped native resource. Idempotent: the first call
    /// releases, later calls succeed as no-ops.
    fn dispose(&mut self) -> BridgeResult<()>;

    /// Whether the handle has already been disposed.
    fn is_disposed(&self) -> bool;
}

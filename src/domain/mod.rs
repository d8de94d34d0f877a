//! Domain layer: event model, change classification, and the
//! reconciliation engine.
//!
//! Everything here is pure computation. Fetching lives in [`crate::sources`]
//! and persistence in [`crate::persistence`]; the reconciler only ever sees
//! in-memory maps and vectors.

pub mod change;
pub mod promotion_event;
pub mod reconciler;

pub use change::{ChangeDigest, ChangeKind, FieldDelta, UpdatedEvent};
pub use promotion_event::{EventType, PromotionEvent};
pub use reconciler::{ReconcileOutcome, reconcile};

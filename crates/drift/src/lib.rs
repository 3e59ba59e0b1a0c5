//! Drift reconciliation between the knowledge store and the live database.
//!
//! [`Reconciler::reconcile`] is a pure function of the two inputs.
//! [`apply_fixes`] is the only write path and runs only when asked.

pub mod fix;
pub mod reconcile;
pub mod types;

pub use fix::{FixOutcome, apply_fixes, synthesize_descriptor};
pub use reconcile::Reconciler;
pub use types::{TypeEquivalence, normalize_type};

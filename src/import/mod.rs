//! Inbound path: upstream kara to local catalog.

mod media_type;
mod reconciler;

pub use media_type::{infer_media_type, MediaTagBundle};
pub use reconciler::{ImportOutcome, ImportReconciler, RefreshOutcome, RefreshSummary};

pub mod completion;
pub mod reconciler;
pub mod scheduler;

pub use completion::{CompletionOutcome, CompletionSettings, CompletionWorker};
pub use reconciler::{ReconcileSettings, Reconciler};
pub use scheduler::{CompletionScheduler, TokioCompletionScheduler};

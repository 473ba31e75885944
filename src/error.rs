use thiserror::Error;

/// The single fallible-result type for the crate.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("insufficient padding: need at least {minimum}, got {provided}")]
    InsufficientPadding { minimum: u32, provided: u32 },

    #[error("worker for patch {patch_id} was interrupted")]
    WorkerInterrupted { patch_id: usize },

    #[error("broken invariant: {0}")]
    ProgrammerAssertion(String),
}

pub type SimResult<T> = Result<T, SimError>;

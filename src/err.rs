#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fast-recovery flag is only meaningful for the fixed-window controller")]
    FastRecoveryNotApplicable,
}

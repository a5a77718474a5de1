pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("`tick` must be a positive duration")]
    InvalidTick,

    #[error("`run_timeout` must be a positive duration when set")]
    InvalidRunTimeout,

    #[error(transparent)]
    Misuse(#[from] herd_metrics::MisuseError),
}

use tailcat_api::TailError;

#[derive(Debug, thiserror::Error)]
pub enum TailcatError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Session(#[from] TailError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

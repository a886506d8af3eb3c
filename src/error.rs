use thiserror::Error;

/// Failure taxonomy shared by the bank client, storage and notification
/// transport. `NotFound` is an expected outcome of point lookups, not a
/// fault; `Unavailable` is transient and safe to retry on the next cycle.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("rejected by remote: {0}")]
    RemoteRejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound,
            err => Error::Unavailable(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Error::Malformed(err.to_string());
        }
        match err.status() {
            Some(status)
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN =>
            {
                Error::Unauthorized(err.to_string())
            }
            _ => Error::Unavailable(err.to_string()),
        }
    }
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Record store fetch rejected or timed out
    #[error("transport error: {0}")]
    Transport(#[from] sqlx::Error),

    /// A fetched record is missing a required field or carries an impossible value
    #[error("malformed {kind} record {id}: {reason}")]
    MalformedRecord {
        kind: &'static str,
        id: String,
        reason: String,
    },

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn malformed(kind: &'static str, id: impl ToString, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            kind,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncGraphError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl SyncGraphError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SyncGraphError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SyncGraphError::Serialization(msg.into())
    }

    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        SyncGraphError::Persistence(msg.into())
    }

    pub fn field_not_found<T: Into<String>>(msg: T) -> Self {
        SyncGraphError::FieldNotFound(msg.into())
    }

    pub fn invalid_query<T: Into<String>>(msg: T) -> Self {
        SyncGraphError::InvalidQuery(msg.into())
    }
}

use kobo_api::BackendError;
use kobo_engine::LoadError;

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Backend(#[from] BackendError),
}

impl EtlError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        EtlError::Config { context, detail: detail.into() }
    }
}

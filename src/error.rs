use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TransformerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("TME request failed: {0}")]
    TmeHttp(String),

    #[error("TME returned status {status}: {message}")]
    TmeStatus { status: u16, message: String },

    #[error("failed to parse TME response: {0}")]
    TmeParse(String),

    #[error("special reports source unavailable at offset {offset}")]
    #[diagnostic(help("the previously loaded special reports are still being served"))]
    SourceUnavailable {
        offset: usize,
        #[source]
        source: Box<TransformerError>,
    },

    #[error("special report not found: {0}")]
    NotFound(String),

    #[error("failed to encode response: {0}")]
    Encoding(String),

    #[error("HTTP server error: {0}")]
    Server(String),
}

impl TransformerError {
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            TransformerError::TmeHttp(_)
                | TransformerError::TmeStatus { .. }
                | TransformerError::TmeParse(_)
                | TransformerError::SourceUnavailable { .. }
        )
    }
}

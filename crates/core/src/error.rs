#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No node titled '{title}' in job graph")]
    NodeNotFound { title: String },

    #[error("Image encoding failed: {0}")]
    Image(String),
}

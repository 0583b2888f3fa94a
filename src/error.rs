use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("input contains no usable rows or cells")]
    EmptyInput,

    #[error("not a valid number: '{cell}'")]
    ValueParse { cell: String },

    #[error("feature vector has width {got}, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("recording produced {produced} features, {required} required")]
    InsufficientFeatures { produced: usize, required: usize },

    #[error("failed to load: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScreenError>;

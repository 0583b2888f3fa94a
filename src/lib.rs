pub mod classifier;
pub mod edf;
pub mod error;
pub mod features;
pub mod filters;
pub mod tabular;
pub mod types;

pub use classifier::{Classifier, RandomForest, ScreeningModel};
pub use error::{Result, ScreenError};
pub use features::{extract_from_edf, extract_from_recording, ExtractionConfig};
pub use tabular::{read_features, read_features_csv};
pub use types::{ClassLabel, PredictionResult, Recording};

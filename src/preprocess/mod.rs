mod clean;
mod pipeline;
mod scaler;


pub use clean::{clean, featurize, validate_features, MissingFeaturePolicy};
pub use pipeline::FeaturePipeline;
pub use scaler::NormalizationParams;

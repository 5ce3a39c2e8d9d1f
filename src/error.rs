use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Feature not detected: {feature}")]
    FeatureNotDetected { feature: &'static str },

    #[error("Unknown product family: {0}")]
    UnknownProductFamily(String),

    #[error("Unable to load product image {id}: {reason}")]
    AssetLoad { id: String, reason: String },

    #[error("Invalid index group {group}: index {index} out of range for {landmark_count} landmarks")]
    InvalidIndexGroup {
        group: &'static str,
        index: usize,
        landmark_count: usize,
    },

    #[error("Invalid asset dimensions: {width}x{height}")]
    InvalidAssetDimensions { width: u32, height: u32 },

    #[error("Invalid adjustment: {0}")]
    InvalidAdjustment(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

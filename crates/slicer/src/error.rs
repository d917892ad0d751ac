//! Error types for the slicer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlicerError {
    #[error("Failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode slice {number} of {name}: {source}")]
    Encode {
        name: String,
        number: u32,
        #[source]
        source: image::ImageError,
    },

    #[error("{name} would rescale to {width}x{height}, which is too large to slice")]
    TooLarge {
        name: String,
        width: u32,
        height: u32,
    },

    #[error("{name} has no pixels ({width}x{height})")]
    EmptyImage {
        name: String,
        width: u32,
        height: u32,
    },
}

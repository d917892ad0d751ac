//! Slicing core for tallcrop
//!
//! Turns a list of source images into a list of PNG slices: each source is
//! rescaled to a fixed width, cut top-to-bottom into fixed-height bands, and
//! every band whose encoded size exceeds the limit is dropped. The result is
//! handed to an [`UploadTarget`], which is the browser's upload input in the
//! wasm build and a directory in the CLI.

mod delivery;
mod error;
pub mod geometry;
pub mod naming;
mod slicer;
mod surface;

pub use delivery::{Delivery, UploadTarget, deliver};
pub use error::SlicerError;
pub use geometry::{SliceBand, SliceGeometry};
pub use naming::slice_file_name;
pub use slicer::{SkippedSlice, SliceBatch, SliceFile, Slicer, SourceImage, slice_sources};
pub use surface::ScratchSurface;

pub use tallcrop_config::SliceConfig;

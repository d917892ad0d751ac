//! Shared configuration for tallcrop
//!
//! This crate is the single source of truth for the slicing geometry, the
//! size gate, and the markers used to find and tag elements on the host page.
//! The values are fixed; the structs only exist so the other crates can pass
//! them around as one unit.

use serde::{Deserialize, Serialize};

/// Width every source image is rescaled to, in pixels
pub const TARGET_WIDTH: u32 = 800;

/// Maximum height of one slice, in pixels
pub const SLICE_HEIGHT: u32 = 1000;

/// Largest encoded slice that is kept, in bytes (1.4 MiB, inclusive).
///
/// The userscript advertises "1.5 MB" but has always enforced 1.4 MiB.
pub const MAX_SLICE_BYTES: u64 = (1.4 * 1024.0 * 1024.0) as u64;

/// Largest rescaled RGBA8 surface the slicer will allocate, in bytes.
///
/// Very narrow sources upscale to enormous heights; past this they are
/// rejected instead of exhausting memory.
pub const MAX_SURFACE_BYTES: u64 = 1 << 30;

/// MIME type of every produced slice
pub const OUTPUT_MIME: &str = "image/png";

/// File extension of every produced slice
pub const OUTPUT_EXTENSION: &str = "png";

/// Interval between readiness checks while the trigger is missing
pub const POLL_INTERVAL_MS: i32 = 500;

/// Host page label next to which the trigger is placed
pub const LABEL_SELECTOR: &str = "label.custom-file-label";

/// Host page upload input that receives the slices
pub const UPLOAD_INPUT_SELECTOR: &str = "#bulk-add-images";

/// Marker id carried by the injected trigger
pub const TRIGGER_ID: &str = "crop-upload-btn";

/// Visible text of the injected trigger
pub const TRIGGER_LABEL: &str = "Crop & Upload Tall Images";

/// `accept` attribute of the hidden picker
pub const PICKER_ACCEPT: &str = "image/*";

/// Host the injector activates on
pub const HOST: &str = "pratilipicomics.com";

/// Episode editor path, `*` matches any run of characters
pub const PATH_PATTERN: &str = "/me/comics/*/episodes/*";

/// Inline style applied to the trigger (CSS property, value)
pub const TRIGGER_STYLE: &[(&str, &str)] = &[
    ("margin-left", "10px"),
    ("background-color", "#28a745"),
    ("color", "white"),
    ("border", "none"),
    ("padding", "6px 12px"),
    ("border-radius", "4px"),
    ("cursor", "pointer"),
];

/// Geometry and size gate applied by the slicer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceConfig {
    /// Width of the rescaled surface
    pub target_width: u32,
    /// Height of every slice but the last
    pub slice_height: u32,
    /// Inclusive upper bound on an encoded slice
    pub max_slice_bytes: u64,
    /// Upper bound on the rescaled surface's pixel memory
    pub max_surface_bytes: u64,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            target_width: TARGET_WIDTH,
            slice_height: SLICE_HEIGHT,
            max_slice_bytes: MAX_SLICE_BYTES,
            max_surface_bytes: MAX_SURFACE_BYTES,
        }
    }
}

impl SliceConfig {
    /// Whether an encoded slice of `size` bytes is small enough to keep
    #[inline]
    pub fn fits(&self, size: u64) -> bool {
        size <= self.max_slice_bytes
    }
}

/// Where the injector runs and how it finds and marks host page elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub path_pattern: String,
    pub label_selector: String,
    pub upload_input_selector: String,
    pub trigger_id: String,
    pub trigger_label: String,
    pub trigger_style: Vec<(String, String)>,
    pub picker_accept: String,
    pub poll_interval_ms: i32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: HOST.to_string(),
            path_pattern: PATH_PATTERN.to_string(),
            label_selector: LABEL_SELECTOR.to_string(),
            upload_input_selector: UPLOAD_INPUT_SELECTOR.to_string(),
            trigger_id: TRIGGER_ID.to_string(),
            trigger_label: TRIGGER_LABEL.to_string(),
            trigger_style: TRIGGER_STYLE
                .iter()
                .map(|(property, value)| (property.to_string(), value.to_string()))
                .collect(),
            picker_accept: PICKER_ACCEPT.to_string(),
            poll_interval_ms: POLL_INTERVAL_MS,
        }
    }
}

impl HostConfig {
    /// Check a page location against the configured host and path pattern
    pub fn matches_location(&self, host: &str, path: &str) -> bool {
        host.eq_ignore_ascii_case(&self.host) && wildcard_match(&self.path_pattern, path)
    }
}

/// Match `text` against `pattern`, where `*` stands for any run of characters
/// (including `/` and the empty run). Every other character matches literally.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.as_bytes();
    let text = text.as_bytes();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star, start)) = backtrack {
            p = star + 1;
            t = start + 1;
            backtrack = Some((star, start + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

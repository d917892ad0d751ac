//! Output file names

use tallcrop_config::OUTPUT_EXTENSION;

/// Strip the final extension from a file name.
///
/// An extension is a `.` followed by at least one character, none of which is
/// `.` or `/`. Names without one are returned unchanged.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    }
}

/// Name of the slice numbered `number` (one-based) cut from `original`
pub fn slice_file_name(original: &str, number: u32) -> String {
    format!(
        "{}_slice_{}.{}",
        strip_extension(original),
        number,
        OUTPUT_EXTENSION
    )
}

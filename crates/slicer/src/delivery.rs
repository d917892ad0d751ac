//! Handing a finished batch to whoever consumes it

use crate::slicer::{SliceBatch, SliceFile};

/// Something that accepts a replacement file list and can announce the change.
///
/// In the browser this is the host page's upload input: its file list is
/// swapped and a bubbling `change` event is dispatched so the page's own
/// listeners pick the files up.
pub trait UploadTarget {
    type Error;

    /// Replace the target's current files with `files`, in order
    fn replace_files(&self, files: &[SliceFile]) -> Result<(), Self::Error>;

    /// Tell listeners the file list changed
    fn notify_changed(&self) -> Result<(), Self::Error>;
}

/// Outcome of [`deliver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The target now holds this many files and was notified
    Delivered { files: usize },
    /// The batch was empty; the target was not touched
    Nothing,
}

/// Give the batch's files to `target` and notify it.
///
/// An empty batch leaves the target exactly as it was.
pub fn deliver<T: UploadTarget>(target: &T, batch: &SliceBatch) -> Result<Delivery, T::Error> {
    if batch.is_empty() {
        return Ok(Delivery::Nothing);
    }
    target.replace_files(&batch.files)?;
    target.notify_changed()?;
    Ok(Delivery::Delivered {
        files: batch.files.len(),
    })
}

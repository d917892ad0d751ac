//! Picker selection -> slices -> host upload input

use js_sys::Uint8Array;
use tallcrop_slicer::{Delivery, SliceConfig, Slicer, SourceImage, deliver};
use tracing::{error, info};
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FileList};

use crate::error::InjectorError;
use crate::host::HostUploadInput;

/// Collect a `FileList` into a `Vec`, keeping the user's order
pub fn file_list_to_vec(files: &FileList) -> Vec<File> {
    (0..files.length()).filter_map(|i| files.get(i)).collect()
}

/// Read the full contents of a browser file
async fn read_file(file: &File) -> Result<Vec<u8>, InjectorError> {
    let buffer = JsFuture::from(file.array_buffer()).await?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

/// Slice `files` one at a time and deliver whatever qualifies to `target`.
///
/// Each file is read, decoded and sliced before the next one is read. An
/// empty selection does nothing at all.
pub async fn slice_and_deliver(
    files: Vec<File>,
    config: SliceConfig,
    target: &HostUploadInput,
) -> Result<Delivery, InjectorError> {
    if files.is_empty() {
        return Ok(Delivery::Nothing);
    }

    let mut slicer = Slicer::new(config);
    for file in &files {
        let bytes = read_file(file).await?;
        let source = SourceImage::new(file.name(), bytes);
        slicer.add_source(&source)?;
    }

    let batch = slicer.finish();
    deliver(target, &batch)
}

/// Run [`slice_and_deliver`] on the page's task queue and log the outcome
pub fn spawn_slicing(files: Vec<File>, config: SliceConfig, target: HostUploadInput) {
    wasm_bindgen_futures::spawn_local(async move {
        let count = files.len();
        match slice_and_deliver(files, config, &target).await {
            Ok(Delivery::Delivered { files }) => {
                info!("Delivered {files} slice(s) from {count} image(s) to the upload input");
            }
            Ok(Delivery::Nothing) => {}
            Err(err) => error!("Slicing aborted: {err}"),
        }
    });
}

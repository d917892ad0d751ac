//! Host page elements the injector depends on

use js_sys::{Array, Uint8Array};
use tallcrop_config::{HostConfig, OUTPUT_MIME};
use tallcrop_slicer::{SliceFile, UploadTarget};
use wasm_bindgen::JsCast;
use web_sys::{
    DataTransfer, Document, Element, Event, EventInit, File, FilePropertyBag, HtmlInputElement,
};

use crate::error::InjectorError;

/// The two host page elements the trigger is attached to
pub struct HostAnchors {
    /// The page's file label; the trigger goes next to it
    pub label: Element,
    /// The page's own upload input; slices are delivered here
    pub upload_input: HtmlInputElement,
}

impl HostAnchors {
    /// Find both anchors, or `None` while the page has not rendered them yet
    pub fn locate(document: &Document, config: &HostConfig) -> Result<Option<Self>, InjectorError> {
        let Some(label) = document.query_selector(&config.label_selector)? else {
            return Ok(None);
        };
        let Some(upload_input) = document.query_selector(&config.upload_input_selector)? else {
            return Ok(None);
        };
        let upload_input = upload_input
            .dyn_into::<HtmlInputElement>()
            .map_err(|_| InjectorError::ElementType("upload input"))?;

        Ok(Some(Self {
            label,
            upload_input,
        }))
    }

    /// Element the trigger is appended to: the label's parent
    pub fn trigger_container(&self) -> Option<Element> {
        self.label.parent_element()
    }
}

/// The host page's upload input, seen as a place to deliver slices
#[derive(Clone)]
pub struct HostUploadInput {
    input: HtmlInputElement,
}

impl HostUploadInput {
    pub fn new(input: HtmlInputElement) -> Self {
        Self { input }
    }
}

impl UploadTarget for HostUploadInput {
    type Error = InjectorError;

    fn replace_files(&self, files: &[SliceFile]) -> Result<(), InjectorError> {
        let transfer = DataTransfer::new()?;
        let items = transfer.items();
        for file in files {
            items.add_with_file(&to_browser_file(file)?)?;
        }
        self.input.set_files(transfer.files().as_ref());
        Ok(())
    }

    fn notify_changed(&self) -> Result<(), InjectorError> {
        let init = EventInit::new();
        init.set_bubbles(true);
        let event = Event::new_with_event_init_dict("change", &init)?;
        self.input.dispatch_event(&event)?;
        Ok(())
    }
}

/// Wrap encoded slice bytes in a browser `File` typed as PNG
fn to_browser_file(file: &SliceFile) -> Result<File, InjectorError> {
    let bytes = Uint8Array::from(file.bytes.as_slice());
    let parts = Array::of1(&bytes);
    let options = FilePropertyBag::new();
    options.set_type(OUTPUT_MIME);
    Ok(File::new_with_u8_array_sequence_and_options(
        &parts,
        &file.name,
        &options,
    )?)
}

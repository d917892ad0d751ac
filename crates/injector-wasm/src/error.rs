//! Error types for the browser build

use tallcrop_slicer::SlicerError;
use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("No global window")]
    NoWindow,

    #[error("Window has no document")]
    NoDocument,

    #[error("Document has no body")]
    NoBody,

    #[error("Unexpected element type for {0}")]
    ElementType(&'static str),

    #[error("JavaScript error: {0}")]
    Js(String),

    #[error(transparent)]
    Slice(#[from] SlicerError),
}

impl From<JsValue> for InjectorError {
    fn from(value: JsValue) -> Self {
        let message = value
            .as_string()
            .or_else(|| {
                js_sys::Reflect::get(&value, &JsValue::from_str("message"))
                    .ok()
                    .and_then(|message| message.as_string())
            })
            .unwrap_or_else(|| format!("{value:?}"));
        Self::Js(message)
    }
}

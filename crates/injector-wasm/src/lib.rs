//! tallcrop browser build
//!
//! Compiled to WebAssembly and loaded on the episode editor page. It adds a
//! "Crop & Upload Tall Images" control next to the page's own file label; the
//! images picked through it are sliced by `tallcrop-slicer` and the slices are
//! put into the page's upload input as if the user had chosen them there.

use std::cell::RefCell;

use tallcrop_config::{HostConfig, SliceConfig};
use tracing::{info, warn};
use wasm_bindgen::prelude::*;

mod error;
mod host;
mod injector;
mod logging;
mod upload;

pub use error::InjectorError;
pub use host::{HostAnchors, HostUploadInput};
pub use injector::Injector;
pub use upload::{file_list_to_vec, slice_and_deliver};

thread_local! {
    /// The running injector, if the page matched
    static INJECTOR: RefCell<Option<Injector>> = const { RefCell::new(None) };
}

/// Main entry point for the WASM module
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    logging::init();

    if let Err(err) = start(HostConfig::default(), SliceConfig::default()) {
        warn!("tallcrop failed to start: {err}");
    }
}

/// Start the injector if the current page is an episode editor
fn start(host: HostConfig, slice: SliceConfig) -> Result<(), InjectorError> {
    let window = web_sys::window().ok_or(InjectorError::NoWindow)?;
    let location = window.location();
    let hostname = location.hostname()?;
    let path = location.pathname()?;

    if !host.matches_location(&hostname, &path) {
        info!("tallcrop idle on {hostname}{path}");
        return Ok(());
    }

    let injector = Injector::start(host, slice)?;
    INJECTOR.with(|slot| {
        if let Some(previous) = slot.borrow_mut().replace(injector) {
            previous.dispose();
        }
    });
    Ok(())
}

/// Stop watching the page and remove the injected controls
#[wasm_bindgen]
pub fn stop_injector() {
    if let Some(injector) = INJECTOR.with(|slot| slot.borrow_mut().take()) {
        injector.dispose();
    }
}

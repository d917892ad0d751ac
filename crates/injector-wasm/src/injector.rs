//! Keeps the trigger and hidden picker on the page
//!
//! The host page re-renders freely and may throw our elements away. The
//! injector owns the elements it created and re-checks them from two places:
//! a timer that runs until the first successful injection, and a mutation
//! observer that runs for as long as the injector lives.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::Array;
use tallcrop_config::{HostConfig, SliceConfig};
use tracing::{debug, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, HtmlButtonElement, HtmlElement, HtmlInputElement, MutationObserver,
    MutationObserverInit, Window,
};

use crate::error::InjectorError;
use crate::host::{HostAnchors, HostUploadInput};
use crate::upload::{file_list_to_vec, spawn_slicing};

/// Lifecycle handle for the injected UI.
///
/// Dropping it without calling [`Injector::dispose`] leaves the timer and
/// observer running, matching a page-lifetime script.
pub struct Injector {
    inner: Rc<Inner>,
}

struct Inner {
    window: Window,
    document: Document,
    host: HostConfig,
    slice: SliceConfig,
    ui: RefCell<Option<InjectedUi>>,
    poll: RefCell<Option<PollTimer>>,
    observer: RefCell<Option<PageObserver>>,
}

impl Injector {
    /// Try to inject once, then keep trying from the poll timer and on every
    /// DOM mutation under `document.body`
    pub fn start(host: HostConfig, slice: SliceConfig) -> Result<Self, InjectorError> {
        let window = web_sys::window().ok_or(InjectorError::NoWindow)?;
        let document = window.document().ok_or(InjectorError::NoDocument)?;

        let inner = Rc::new(Inner {
            window,
            document,
            host,
            slice,
            ui: RefCell::new(None),
            poll: RefCell::new(None),
            observer: RefCell::new(None),
        });

        inner.tick();

        if !inner.trigger_present() {
            let timer = PollTimer::start(&inner)?;
            *inner.poll.borrow_mut() = Some(timer);
        }
        let observer = PageObserver::start(&inner)?;
        *inner.observer.borrow_mut() = Some(observer);

        Ok(Self { inner })
    }

    /// Inject the trigger and picker if they are missing.
    ///
    /// Returns `true` if this call created them.
    pub fn ensure_ui_present(&self) -> Result<bool, InjectorError> {
        self.inner.ensure_ui_present()
    }

    /// Whether the readiness timer is still running
    pub fn is_polling(&self) -> bool {
        self.inner
            .poll
            .borrow()
            .as_ref()
            .is_some_and(PollTimer::is_active)
    }

    /// Whether the mutation observer is still connected
    pub fn is_observing(&self) -> bool {
        self.inner.observer.borrow().is_some()
    }

    /// Stop the timer and observer and remove everything that was injected
    pub fn dispose(&self) {
        if let Some(timer) = self.inner.poll.borrow_mut().take() {
            timer.cancel();
        }
        if let Some(observer) = self.inner.observer.borrow_mut().take() {
            observer.observer.disconnect();
        }
        if let Some(ui) = self.inner.ui.borrow_mut().take() {
            ui.remove();
        }
        debug!("Injector disposed");
    }
}

impl Inner {
    fn has_ui(&self) -> bool {
        self.ui.borrow().as_ref().is_some_and(InjectedUi::is_attached)
    }

    /// Our trigger, or any element carrying its id, is on the page
    fn trigger_present(&self) -> bool {
        self.has_ui() || self.document.get_element_by_id(&self.host.trigger_id).is_some()
    }

    /// One readiness check; errors are logged and the next tick retries
    fn tick(self: &Rc<Self>) {
        if let Err(err) = self.ensure_ui_present() {
            warn!("Could not inject crop control: {err}");
        }
    }

    fn ensure_ui_present(self: &Rc<Self>) -> Result<bool, InjectorError> {
        if self.has_ui() {
            return Ok(false);
        }

        // The page threw our trigger away; drop the stale picker with it
        if let Some(stale) = self.ui.borrow_mut().take() {
            debug!("Crop control was detached, re-injecting");
            stale.remove();
        }

        // Another copy of the script got there first
        if self.document.get_element_by_id(&self.host.trigger_id).is_some() {
            return Ok(false);
        }

        let Some(anchors) = HostAnchors::locate(&self.document, &self.host)? else {
            return Ok(false);
        };
        let Some(container) = anchors.trigger_container() else {
            return Ok(false);
        };

        let ui = InjectedUi::build(self, &anchors)?;
        container.append_child(&ui.trigger)?;
        self.document
            .body()
            .ok_or(InjectorError::NoBody)?
            .append_child(&ui.picker)?;

        *self.ui.borrow_mut() = Some(ui);
        info!("Crop control injected");
        Ok(true)
    }
}

/// The trigger button, the hidden picker, and the listeners wired to them
struct InjectedUi {
    trigger: HtmlButtonElement,
    picker: HtmlInputElement,
    _on_click: Closure<dyn FnMut()>,
    _on_change: Closure<dyn FnMut()>,
}

impl InjectedUi {
    fn build(inner: &Rc<Inner>, anchors: &HostAnchors) -> Result<Self, InjectorError> {
        let host = &inner.host;

        let trigger = inner
            .document
            .create_element("button")?
            .dyn_into::<HtmlButtonElement>()
            .map_err(|_| InjectorError::ElementType("button"))?;
        trigger.set_id(&host.trigger_id);
        trigger.set_type("button");
        trigger.set_text_content(Some(host.trigger_label.as_str()));
        let style = trigger.style();
        for (property, value) in &host.trigger_style {
            style.set_property(property, value)?;
        }

        let picker = inner
            .document
            .create_element("input")?
            .dyn_into::<HtmlInputElement>()
            .map_err(|_| InjectorError::ElementType("input"))?;
        picker.set_type("file");
        picker.set_accept(&host.picker_accept);
        picker.set_multiple(true);
        picker.set_attribute("data-for", &host.trigger_id)?;
        picker.style().set_property("display", "none")?;

        let on_click = {
            let picker = picker.clone();
            Closure::<dyn FnMut()>::new(move || picker.click())
        };
        trigger.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;

        let on_change = {
            let picker = picker.clone();
            let target = HostUploadInput::new(anchors.upload_input.clone());
            let slice = inner.slice.clone();
            Closure::<dyn FnMut()>::new(move || {
                let Some(list) = picker.files() else {
                    return;
                };
                let files = file_list_to_vec(&list);
                if files.is_empty() {
                    return;
                }
                spawn_slicing(files, slice.clone(), target.clone());
            })
        };
        picker.add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())?;

        Ok(Self {
            trigger,
            picker,
            _on_click: on_click,
            _on_change: on_change,
        })
    }

    fn is_attached(&self) -> bool {
        self.trigger.is_connected()
    }

    fn remove(&self) {
        self.trigger.remove();
        self.picker.remove();
    }
}

/// Interval that re-runs the readiness check until the UI exists
struct PollTimer {
    window: Window,
    handle: Cell<Option<i32>>,
    _callback: Closure<dyn FnMut()>,
}

impl PollTimer {
    fn start(inner: &Rc<Inner>) -> Result<Self, InjectorError> {
        let weak: Weak<Inner> = Rc::downgrade(inner);
        let callback = Closure::<dyn FnMut()>::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.tick();
            if inner.trigger_present() {
                // The closure is still running; only clear the interval here
                if let Some(timer) = inner.poll.borrow().as_ref() {
                    timer.cancel();
                }
            }
        });

        let handle = inner
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                inner.host.poll_interval_ms,
            )?;

        Ok(Self {
            window: inner.window.clone(),
            handle: Cell::new(Some(handle)),
            _callback: callback,
        })
    }

    fn is_active(&self) -> bool {
        self.handle.get().is_some()
    }

    fn cancel(&self) {
        if let Some(handle) = self.handle.take() {
            self.window.clear_interval_with_handle(handle);
            debug!("Readiness polling stopped");
        }
    }
}

/// Subtree-wide mutation observer on `document.body`
struct PageObserver {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl PageObserver {
    fn start(inner: &Rc<Inner>) -> Result<Self, InjectorError> {
        let weak: Weak<Inner> = Rc::downgrade(inner);
        let callback = Closure::<dyn FnMut(Array, MutationObserver)>::new(
            move |_records: Array, _observer: MutationObserver| {
                if let Some(inner) = weak.upgrade() {
                    inner.tick();
                }
            },
        );

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);

        let body: HtmlElement = inner.document.body().ok_or(InjectorError::NoBody)?;
        observer.observe_with_options(&body, &options)?;

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

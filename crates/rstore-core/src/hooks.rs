#![forbid(unsafe_code)]

//! Hook-style bindings between reactive state and a rendering consumer.
//!
//! A [`Component`] stands in for one mounted UI element. Each
//! [`Component::render`] pass receives a [`RenderCx`] whose hooks are
//! matched to persistent slots by call order, the way UI frameworks do it.
//! Hooks acquire resources (subscriptions) when their slot is created and
//! release them when the component unmounts.
//!
//! # Invariants
//!
//! 1. A hook is mounted exactly once per slot lifetime and unmounted exactly
//!    once: on [`Component::unmount`], when its slot is replaced, or when a
//!    render pass stops short of its slot.
//! 2. Unmount drops every slot; the next render starts fresh, so repeated
//!    mount/unmount cycles never accumulate subscriptions.
//! 3. [`Invalidator::invalidate`] only marks the component dirty and calls the
//!    scheduler. Schedulers must defer the actual re-render.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::repository::Repository;
use crate::selector::Selector;

#[cfg(feature = "tracing")]
use crate::logging::{trace, warn};
#[cfg(not(feature = "tracing"))]
use crate::{trace, warn};

/// Persistent per-slot state owned by a [`Component`].
pub trait Hook: 'static {
    /// Called once when the slot is created.
    fn mount(&mut self, _invalidator: &Invalidator) {}

    /// Called once when the slot is dropped.
    fn unmount(&mut self) {}
}

trait ErasedHook {
    fn mount(&mut self, invalidator: &Invalidator);
    fn unmount(&mut self);
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<H: Hook> ErasedHook for H {
    fn mount(&mut self, invalidator: &Invalidator) {
        Hook::mount(self, invalidator);
    }

    fn unmount(&mut self) {
        Hook::unmount(self);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<H>()
    }
}

struct ComponentInner {
    slots: RefCell<Vec<Box<dyn ErasedHook>>>,
    needs_render: Cell<bool>,
    mounted: Cell<bool>,
    renders: Cell<u64>,
    scheduler: RefCell<Option<Rc<dyn Fn()>>>,
}

/// A rendering consumer that owns hook slots.
///
/// Cloning a `Component` creates a new handle to the **same** slots.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

impl Default for Component {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("slots", &self.inner.slots.borrow().len())
            .field("needs_render", &self.inner.needs_render.get())
            .field("mounted", &self.inner.mounted.get())
            .field("renders", &self.inner.renders.get())
            .finish()
    }
}

impl Component {
    /// Create an unmounted component.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ComponentInner {
                slots: RefCell::new(Vec::new()),
                needs_render: Cell::new(true),
                mounted: Cell::new(false),
                renders: Cell::new(0),
                scheduler: RefCell::new(None),
            }),
        }
    }

    /// Install a callback run whenever a hook invalidates the component.
    pub fn on_invalidate(&self, scheduler: impl Fn() + 'static) {
        *self.inner.scheduler.borrow_mut() = Some(Rc::new(scheduler));
    }

    /// Run one render pass, mounting the component if needed.
    pub fn render<R>(&self, f: impl FnOnce(&mut RenderCx<'_>) -> R) -> R {
        self.inner.mounted.set(true);
        self.inner.needs_render.set(false);
        let mut cx = RenderCx {
            component: self,
            cursor: 0,
        };
        let out = f(&mut cx);
        let used = cx.cursor;
        let mut unused = {
            let mut slots = self.inner.slots.borrow_mut();
            let keep = used.min(slots.len());
            slots.split_off(keep)
        };
        if !unused.is_empty() {
            warn!(
                used,
                released = unused.len(),
                "render used fewer hooks than the previous pass"
            );
            for slot in &mut unused {
                slot.unmount();
            }
        }
        let renders = self.inner.renders.get() + 1;
        self.inner.renders.set(renders);
        trace!(renders, hooks = used, "component.render");
        out
    }

    /// Unmount every hook and drop all slots.
    pub fn unmount(&self) {
        if !self.inner.mounted.replace(false) {
            return;
        }
        let mut slots = std::mem::take(&mut *self.inner.slots.borrow_mut());
        for slot in &mut slots {
            slot.unmount();
        }
        trace!(hooks = slots.len(), "component.unmount");
        drop(slots);
    }

    /// Whether a hook asked for a re-render since the last render pass.
    #[must_use]
    pub fn needs_render(&self) -> bool {
        self.inner.needs_render.get()
    }

    /// Whether the component is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Number of completed render passes.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    /// Handle hooks use to request a re-render.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        Invalidator {
            component: Rc::downgrade(&self.inner),
        }
    }
}

/// Requests a re-render of its component.
#[derive(Clone)]
pub struct Invalidator {
    component: Weak<ComponentInner>,
}

impl fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidator")
            .field("live", &(self.component.strong_count() > 0))
            .finish()
    }
}

impl Invalidator {
    /// Mark the component dirty and notify its scheduler.
    pub fn invalidate(&self) {
        let Some(component) = self.component.upgrade() else {
            return;
        };
        if !component.mounted.get() {
            return;
        }
        component.needs_render.set(true);
        let scheduler = component.scheduler.borrow().clone();
        if let Some(scheduler) = scheduler {
            scheduler();
        }
    }
}

/// Per-render context handed to [`Component::render`].
pub struct RenderCx<'a> {
    component: &'a Component,
    cursor: usize,
}

impl fmt::Debug for RenderCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCx")
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl RenderCx<'_> {
    /// Use the hook stored in the next slot, creating it with `init` on first
    /// use, and read from it with `read`.
    ///
    /// If the slot holds a different hook type (hooks called in a different
    /// order than last render), the old hook is unmounted and replaced.
    pub fn use_hook<H: Hook, R>(
        &mut self,
        init: impl FnOnce() -> H,
        read: impl FnOnce(&mut H) -> R,
    ) -> R {
        let index = self.cursor;
        self.cursor += 1;

        let inner = &self.component.inner;
        let mut slots = inner.slots.borrow_mut();
        if let Some(hook) = slots
            .get_mut(index)
            .and_then(|slot| slot.as_any_mut().downcast_mut::<H>())
        {
            return read(hook);
        }

        let mut hook = init();
        Hook::mount(&mut hook, &self.component.invalidator());
        let out = read(&mut hook);
        if let Some(slot) = slots.get_mut(index) {
            warn!(
                index,
                previous = slot.type_name(),
                next = std::any::type_name::<H>(),
                "hook order changed between renders"
            );
            let mut old = std::mem::replace(slot, Box::new(hook));
            old.unmount();
        } else {
            slots.push(Box::new(hook));
        }
        out
    }

    /// Invalidator for the component being rendered.
    #[must_use]
    pub fn invalidator(&self) -> Invalidator {
        self.component.invalidator()
    }
}

struct SelectorHook<T, S> {
    selector: Selector<T, S>,
}

impl<T: Clone + 'static, S: Clone + 'static> Hook for SelectorHook<T, S> {
    fn mount(&mut self, invalidator: &Invalidator) {
        let invalidator = invalidator.clone();
        if self
            .selector
            .attach(move |_| invalidator.invalidate())
            .is_err()
        {
            warn!("selector hook mounted while already attached");
        }
    }

    fn unmount(&mut self) {
        self.selector.detach();
    }
}

/// Read a slice of `repository`, re-rendering the component whenever the
/// slice changes under `PartialEq`.
pub fn use_selector<T, S>(
    cx: &mut RenderCx<'_>,
    repository: &Repository<T>,
    select: impl Fn(&T) -> S + 'static,
) -> S
where
    T: Clone + 'static,
    S: Clone + PartialEq + 'static,
{
    cx.use_hook(
        || SelectorHook {
            selector: Selector::new(repository, select),
        },
        |hook| hook.selector.get(),
    )
}

/// Like [`use_selector`] with a custom equality test.
pub fn use_selector_with<T, S>(
    cx: &mut RenderCx<'_>,
    repository: &Repository<T>,
    select: impl Fn(&T) -> S + 'static,
    equal: impl Fn(&S, &S) -> bool + 'static,
) -> S
where
    T: Clone + 'static,
    S: Clone + 'static,
{
    cx.use_hook(
        || SelectorHook {
            selector: Selector::with_equality(repository, select, equal),
        },
        |hook| hook.selector.get(),
    )
}

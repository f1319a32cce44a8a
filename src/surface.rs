//! Fan-out of host surface events to live views.

use crate::gpu::GraphicsBackend;
use crate::view::ImageView;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub trait SurfaceListener {
    /// The drawable surface is gone, for example because the app moved to
    /// the background.
    fn on_surface_teardown(&mut self);
}

impl<B: GraphicsBackend> SurfaceListener for ImageView<B> {
    fn on_surface_teardown(&mut self) {
        ImageView::on_surface_teardown(self);
    }
}

/// Held by the host. Views are tracked weakly and fall out once dropped.
#[derive(Default)]
pub struct SurfaceHost {
    listeners: Vec<Weak<RefCell<dyn SurfaceListener>>>,
}

impl SurfaceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<L: SurfaceListener + 'static>(&mut self, listener: &Rc<RefCell<L>>) {
        let listener: Rc<RefCell<dyn SurfaceListener>> = listener.clone();
        self.listeners.push(Rc::downgrade(&listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notifies every live listener and returns how many were reached.
    pub fn surface_torn_down(&mut self) -> usize {
        self.listeners.retain(|listener| listener.strong_count() > 0);
        let mut notified = 0;
        for listener in self.listeners.iter().filter_map(Weak::upgrade) {
            match listener.try_borrow_mut() {
                Ok(mut listener) => {
                    listener.on_surface_teardown();
                    notified += 1;
                }
                Err(_) => tracing::warn!("listener busy during surface teardown, skipped"),
            }
        }
        tracing::debug!(notified, "surface teardown dispatched");
        notified
    }
}

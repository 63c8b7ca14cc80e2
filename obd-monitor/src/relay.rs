//! Raw frame capture relay
//!
//! While enabled, every frame the worker observes is handed to each registered
//! observer in receipt order, whether or not the decoder recognized it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::observer::{guarded, RawFrameObserver};
use crate::types::RawFrame;

#[derive(Default)]
pub struct RawCaptureRelay {
    active: AtomicBool,
    observers: RwLock<Vec<Arc<dyn RawFrameObserver>>>,
    forwarded: AtomicU64,
}

impl RawCaptureRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            log::info!("Raw CAN capture started");
        }
    }

    pub fn disable(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            log::info!("Raw CAN capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn add_observer(&self, observer: Arc<dyn RawFrameObserver>) {
        self.observers.write().push(observer);
    }

    /// Frames handed to observers since creation
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Deliver a frame if capture is on; true if it was delivered
    pub fn forward(&self, frame: &RawFrame) -> bool {
        if !self.is_active() {
            return false;
        }

        // Observers may register further observers from the callback
        let observers = self.observers.read().clone();
        if observers.is_empty() {
            return false;
        }
        for observer in observers.iter() {
            guarded("Raw frame", || observer.on_frame(frame));
        }
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        true
    }
}

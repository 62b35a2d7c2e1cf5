//! Bridge from `tracing` events to a [`LogBackend`].

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::{Level, Location, LogBackend};

/// Layer forwarding events whose severity is in the mask.
#[derive(Debug, Clone)]
pub struct DiagLayer {
    backend: Arc<dyn LogBackend>,
    mask: Arc<AtomicU32>,
    location: bool,
}

impl DiagLayer {
    /// Forward to `backend`, keeping severities set in `mask`.
    pub fn new(backend: Arc<dyn LogBackend>, mask: u32) -> Self {
        Self {
            backend,
            mask: Arc::new(AtomicU32::new(mask)),
            location: false,
        }
    }

    /// Pass file, line and module of each event to the backend.
    pub fn with_location(mut self, enabled: bool) -> Self {
        self.location = enabled;
        self
    }

    /// Shared mask, for changing it after the layer is installed.
    pub fn mask_handle(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.mask)
    }

    fn wants(&self, level: Level) -> bool {
        self.mask.load(Ordering::Relaxed) & level.mask() != 0
    }
}

/// Formats the message first, then the remaining fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagLayer {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The mask changes at runtime; never let the callsite cache a decision.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.wants(Level::from(metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = Level::from(meta.level());
        if !self.wants(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let mut text = visitor.message;
        text.push_str(&visitor.fields);

        let location = self.location.then(|| Location {
            file: meta.file(),
            line: meta.line(),
            module: meta.module_path(),
        });
        self.backend.write(level, location.as_ref(), &text);
    }
}

use super::*;

use std::fmt::Write as _;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Forwards `tracing` events to the browser devtools console.
pub(super) struct BrowserConsoleLayer {
    max_level: Level,
}

impl<S: Subscriber> tracing_subscriber::Layer<S> for BrowserConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level > self.max_level {
            return;
        }
        let mut line = ConsoleLine::default();
        event.record(&mut line);
        let text = JsValue::from_str(&format!(
            "[{}] {}{}",
            metadata.target(),
            line.message,
            line.fields
        ));
        match level {
            Level::ERROR => web_sys::console::error_1(&text),
            Level::WARN => web_sys::console::warn_1(&text),
            Level::INFO => web_sys::console::info_1(&text),
            _ => web_sys::console::debug_1(&text),
        }
    }
}

#[derive(Default)]
struct ConsoleLine {
    message: String,
    fields: String,
}

impl Visit for ConsoleLine {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

pub(super) fn install_console_logging(config: &ConsoleConfig) {
    let max_level = config.level().unwrap_or(Level::INFO);
    // A second runtime on the same page keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(BrowserConsoleLayer { max_level })
        .try_init();
}

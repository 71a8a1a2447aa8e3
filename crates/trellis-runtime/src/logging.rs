//! Logging utilities for the Trellis runtime.
//!
//! A thin builder over `tracing-subscriber` with environment-based filtering
//! (`RUST_LOG`) and optional span lifecycle events.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("trellis=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

/// Span event configuration.
///
/// Controls when span lifecycle events are written, which is mainly useful
/// for watching dispatch and consumer-loop spans during debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanEvents {
    /// Log when a span is created.
    pub new: bool,
    /// Log when a span is entered.
    pub enter: bool,
    /// Log when a span is exited.
    pub exit: bool,
    /// Log when a span is closed.
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Span creation and close events only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// All span events.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

/// Builder for the global tracing subscriber.
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    level: Option<Level>,
    directive: Option<String>,
    span_events: SpanEvents,
}

impl LoggingBuilder {
    /// Creates a builder with default settings (INFO, no span events).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Sets a filter directive string, e.g. `"trellis_runtime=debug"`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directive = Some(directive.into());
        self
    }

    /// Configures span lifecycle events.
    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured directive and level.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber is already set.
    pub fn init(self) {
        let fallback = self
            .directive
            .unwrap_or_else(|| self.level.unwrap_or(Level::INFO).to_string().to_lowercase());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        fmt()
            .with_env_filter(filter)
            .with_span_events(self.span_events.to_fmt_span())
            .init();
    }
}

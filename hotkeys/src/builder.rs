use std::sync::Arc;
use std::time::Duration;

use hotkeys_tty::{InputSource, TerminalControl};

use crate::callback::{CallbackFailure, ErrorHook, default_error_hook};
use crate::error::Result;
use crate::hotkeys::Hotkeys;
use crate::options::HotkeysOptions;

/// Builder for a [`Hotkeys`] listener.
///
/// Without a custom terminal the listener reads standard input.
#[derive(Default)]
pub struct HotkeysBuilder {
    options: HotkeysOptions,
    scheduler: Option<tokio::runtime::Handle>,
    error_hook: Option<ErrorHook>,
    terminal: Option<(Arc<dyn TerminalControl>, Box<dyn InputSource>)>,
}

impl HotkeysBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every runtime option at once.
    #[must_use]
    pub fn with_options(mut self, options: HotkeysOptions) -> Self {
        self.options = options;
        self
    }

    /// How long an ambiguous prefix such as a lone ESC waits for more input.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Keep at most `capacity` unhandled keys.
    #[must_use]
    pub fn with_unhandled_capacity(mut self, capacity: usize) -> Self {
        self.options.unhandled_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_restore_on_signal(mut self, enable: bool) -> Self {
        self.options.restore_on_signal = enable;
        self
    }

    /// Runtime that asynchronous callbacks are spawned on.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: tokio::runtime::Handle) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Receive callback failures instead of having them logged.
    #[must_use]
    pub fn with_error_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CallbackFailure) + Send + Sync + 'static,
    {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Drive a custom terminal instead of standard input.
    #[must_use]
    pub fn with_terminal(
        mut self,
        control: Arc<dyn TerminalControl>,
        source: Box<dyn InputSource>,
    ) -> Self {
        self.terminal = Some((control, source));
        self
    }

    pub fn build(self) -> Result<Hotkeys> {
        let Self {
            options,
            scheduler,
            error_hook,
            terminal,
        } = self;

        let (control, source) = match terminal {
            Some((control, source)) => (Some(control), Some(source)),
            None => (None, None),
        };
        Hotkeys::from_parts(
            options,
            control,
            source,
            scheduler,
            error_hook.unwrap_or_else(default_error_hook),
        )
    }
}

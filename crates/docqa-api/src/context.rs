use std::sync::OnceLock;

use docqa_core::config::ServerSettings;
use docqa_rag::Pipelines;

/// State shared by every request handler.
///
/// Starts empty; [`AppContext::set_ready`] installs the pipelines once the
/// index has been built, after which the context is read-only.
pub struct AppContext {
    pipelines: OnceLock<Pipelines>,
    cors: bool,
    expose_error_details: bool,
}

impl AppContext {
    pub fn new(settings: &ServerSettings) -> Self {
        Self { pipelines: OnceLock::new(), cors: settings.cors, expose_error_details: settings.expose_error_details }
    }

    /// Install the built pipelines. Returns `false` if they were already set.
    pub fn set_ready(&self, pipelines: Pipelines) -> bool {
        self.pipelines.set(pipelines).is_ok()
    }

    pub fn pipelines(&self) -> Option<&Pipelines> {
        self.pipelines.get()
    }

    pub fn is_ready(&self) -> bool {
        self.pipelines.get().is_some()
    }

    pub fn cors(&self) -> bool {
        self.cors
    }

    pub fn expose_error_details(&self) -> bool {
        self.expose_error_details
    }
}

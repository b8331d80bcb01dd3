//! Keyword → action dispatch.
//!
//! The [`ActionRegistry`] maps keywords to handlers and always holds a
//! fallback handler, so every lookup resolves. Handler failures, returned
//! errors and panics alike, are logged and absorbed by [`ActionRegistry::dispatch`].

use crate::error::Result;
use crate::keywords::Keyword;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, info};

/// A side-effecting action bound to a keyword.
pub trait ActionHandler: Send + Sync {
    /// Short handler name for logs.
    fn name(&self) -> &str;

    /// Perform the action for the raw `utterance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the action could not be carried out.
    fn run(&self, utterance: &str) -> Result<()>;
}

/// What happened during one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Name of the handler that ran.
    pub handler: String,
    /// Whether the fallback handler was used.
    pub fallback: bool,
    /// Failure message, if the handler errored or panicked.
    pub failure: Option<String>,
}

/// Static keyword → handler table with a first-class fallback.
pub struct ActionRegistry {
    handlers: HashMap<Keyword, Arc<dyn ActionHandler>>,
    fallback: Arc<dyn ActionHandler>,
}

impl ActionRegistry {
    /// Empty registry that routes everything to `fallback`.
    pub fn new(fallback: Arc<dyn ActionHandler>) -> Self {
        Self {
            handlers: HashMap::new(),
            fallback,
        }
    }

    /// Registry with the built-in handlers and [`NoAction`] as fallback.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new(Arc::new(NoAction));
        for (keyword, description) in [
            ("music", "play music"),
            ("video", "play video"),
            ("volume", "change volume"),
        ] {
            if let Ok(k) = Keyword::new(keyword) {
                registry.register(k, Arc::new(Placeholder::new(keyword, description)));
            }
        }
        registry
    }

    /// Bind `keyword` to `handler`, replacing any existing binding.
    pub fn register(&mut self, keyword: Keyword, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(keyword, handler);
    }

    /// Whether `keyword` has a dedicated handler.
    #[must_use]
    pub fn is_registered(&self, keyword: &Keyword) -> bool {
        self.handlers.contains_key(keyword)
    }

    /// Registered keywords, sorted.
    #[must_use]
    pub fn keywords(&self) -> Vec<&Keyword> {
        let mut out: Vec<&Keyword> = self.handlers.keys().collect();
        out.sort_unstable();
        out
    }

    /// The handler for `keyword`, or the fallback.
    #[must_use]
    pub fn resolve(&self, keyword: &Keyword) -> &dyn ActionHandler {
        self.handlers
            .get(keyword)
            .map_or(self.fallback.as_ref(), |h| h.as_ref())
    }

    /// Run the handler for `keyword` with the original `utterance`.
    ///
    /// Never fails; errors and panics are logged and reported.
    pub fn dispatch(&self, keyword: &Keyword, utterance: &str) -> DispatchReport {
        let fallback = !self.is_registered(keyword);
        let handler = self.resolve(keyword);
        let name = handler.name().to_owned();

        let outcome = catch_unwind(AssertUnwindSafe(|| handler.run(utterance)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        if let Some(ref msg) = failure {
            error!("error executing action for '{keyword}' ({name}): {msg}");
        }

        DispatchReport {
            handler: name,
            fallback,
            failure,
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_owned()
    }
}

/// Fallback: logs that nothing is bound to the keyword.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAction;

impl ActionHandler for NoAction {
    fn name(&self) -> &str {
        "no_action"
    }

    fn run(&self, utterance: &str) -> Result<()> {
        info!("no action available for: {utterance}");
        Ok(())
    }
}

/// Logs the action it stands in for.
#[derive(Debug, Clone)]
pub struct Placeholder {
    name: String,
    description: String,
}

impl Placeholder {
    /// Placeholder named `name` that describes itself as `description`.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl ActionHandler for Placeholder {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, utterance: &str) -> Result<()> {
        info!("(placeholder) action: {} ({utterance})", self.description);
        Ok(())
    }
}

/// Adapts a closure into an [`ActionHandler`].
pub struct FnAction<F> {
    name: String,
    f: F,
}

impl<F> FnAction<F>
where
    F: Fn(&str) -> Result<()> + Send + Sync,
{
    /// Wrap `f` under `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ActionHandler for FnAction<F>
where
    F: Fn(&str) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, utterance: &str) -> Result<()> {
        (self.f)(utterance)
    }
}

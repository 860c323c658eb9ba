//! Session-scoped console state.
//!
//! One [`ApplicationState`] exists per running console session. It is passed
//! by reference to every consumer (or shared as [`SharedState`] by the web
//! shell) and returned to a known-good state with [`ApplicationState::reset`].

use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

pub const DEFAULT_TEAM_RELATIONSHIP_FILTER: &str = "all";

/// Opaque handle to an externally constructed editor widget.
///
/// The state only holds the handle; destroying the widget is the owner's job.
pub type EditorHandle = Rc<dyn Any>;

/// Shared, single-threaded ownership of the session state.
pub type SharedState = Rc<RefCell<ApplicationState>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CancellationError {
    pub message: String,
}

impl CancellationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An in-flight operation that can be asked to abort.
pub trait CancellationHandle {
    fn cancel(&self) -> Result<(), CancellationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cleanup callback failed: {message}")]
pub struct CleanupError {
    pub message: String,
}

impl CleanupError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type CleanupFn = Box<dyn FnMut() -> Result<(), CleanupError>>;

/// The single cleanup registration run at the end of every reset.
pub enum CleanupHook {
    Callable(CleanupFn),
    /// A registration that was accepted but can never be invoked, e.g. a
    /// non-function value handed over from JavaScript.
    NotCallable { kind: String },
}

impl CleanupHook {
    pub fn callable(callback: impl FnMut() -> Result<(), CleanupError> + 'static) -> Self {
        Self::Callable(Box::new(callback))
    }

    fn run(&mut self) {
        match self {
            Self::Callable(callback) => {
                if let Err(error) = callback() {
                    tracing::warn!(error = %error, "state reset cleanup callback failed");
                }
            }
            Self::NotCallable { kind } => {
                tracing::debug!(kind = %kind, "skipping non-callable cleanup registration");
            }
        }
    }
}

impl fmt::Debug for CleanupHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("CleanupHook::Callable(..)"),
            Self::NotCallable { kind } => f
                .debug_struct("CleanupHook::NotCallable")
                .field("kind", kind)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorSlot {
    Headers,
    Body,
    FormHandler,
    CloseHandler,
}

impl EditorSlot {
    pub const ALL: [Self; 4] = [
        Self::Headers,
        Self::Body,
        Self::FormHandler,
        Self::CloseHandler,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Headers => "headers",
            Self::Body => "body",
            Self::FormHandler => "formHandler",
            Self::CloseHandler => "closeHandler",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.as_str() == raw)
    }
}

/// Editor widgets mounted on the gateway form, one slot per editor.
#[derive(Default)]
pub struct GatewayEditors {
    pub headers: Option<EditorHandle>,
    pub body: Option<EditorHandle>,
    pub form_handler: Option<EditorHandle>,
    pub close_handler: Option<EditorHandle>,
}

impl GatewayEditors {
    #[must_use]
    pub fn get(&self, slot: EditorSlot) -> Option<&EditorHandle> {
        match slot {
            EditorSlot::Headers => self.headers.as_ref(),
            EditorSlot::Body => self.body.as_ref(),
            EditorSlot::FormHandler => self.form_handler.as_ref(),
            EditorSlot::CloseHandler => self.close_handler.as_ref(),
        }
    }

    /// Stores `handle` in `slot`, returning whatever was held before.
    pub fn set(&mut self, slot: EditorSlot, handle: Option<EditorHandle>) -> Option<EditorHandle> {
        let target = match slot {
            EditorSlot::Headers => &mut self.headers,
            EditorSlot::Body => &mut self.body,
            EditorSlot::FormHandler => &mut self.form_handler,
            EditorSlot::CloseHandler => &mut self.close_handler,
        };
        std::mem::replace(target, handle)
    }

    /// Drops every handle without touching the widgets behind them.
    pub fn clear(&mut self) {
        self.headers = None;
        self.body = None;
        self.form_handler = None;
        self.close_handler = None;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_none()
            && self.body.is_none()
            && self.form_handler.is_none()
            && self.close_handler.is_none()
    }
}

impl fmt::Debug for GatewayEditors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayEditors")
            .field("headers", &self.headers.is_some())
            .field("body", &self.body.is_some())
            .field("form_handler", &self.form_handler.is_some())
            .field("close_handler", &self.close_handler.is_some())
            .finish()
    }
}

pub struct ApplicationState {
    parameter_count: u32,
    pending_requests: Vec<Rc<dyn CancellationHandle>>,
    active_modals: BTreeSet<String>,
    pub editors: GatewayEditors,
    pub current_test_tool: Option<serde_json::Value>,
    pub tool_test_result_editor: Option<EditorHandle>,
    current_team_relationship_filter: String,
    restricted_context_logged: bool,
    is_initialized: bool,
    cleanup_hook: Option<CleanupHook>,
}

impl Default for ApplicationState {
    fn default() -> Self {
        Self {
            parameter_count: 0,
            pending_requests: Vec::new(),
            active_modals: BTreeSet::new(),
            editors: GatewayEditors::default(),
            current_test_tool: None,
            tool_test_result_editor: None,
            current_team_relationship_filter: DEFAULT_TEAM_RELATIONSHIP_FILTER.to_string(),
            restricted_context_logged: false,
            is_initialized: false,
            cleanup_hook: None,
        }
    }
}

impl fmt::Debug for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationState")
            .field("parameter_count", &self.parameter_count)
            .field("pending_requests", &self.pending_requests.len())
            .field("active_modals", &self.active_modals)
            .field("editors", &self.editors)
            .field("current_test_tool", &self.current_test_tool)
            .field(
                "tool_test_result_editor",
                &self.tool_test_result_editor.is_some(),
            )
            .field(
                "current_team_relationship_filter",
                &self.current_team_relationship_filter,
            )
            .field("restricted_context_logged", &self.restricted_context_logged)
            .field("is_initialized", &self.is_initialized)
            .field("cleanup_hook", &self.cleanup_hook)
            .finish()
    }
}

impl ApplicationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> SharedState {
        Rc::new(RefCell::new(Self::new()))
    }

    #[must_use]
    pub fn parameter_count(&self) -> u32 {
        self.parameter_count
    }

    pub fn increment_parameter_count(&mut self) -> u32 {
        self.parameter_count = self.parameter_count.saturating_add(1);
        self.parameter_count
    }

    pub fn decrement_parameter_count(&mut self) -> u32 {
        self.parameter_count = self.parameter_count.saturating_sub(1);
        self.parameter_count
    }

    #[must_use]
    pub fn is_modal_active(&self, modal_id: &str) -> bool {
        self.active_modals.contains(modal_id)
    }

    pub fn set_modal_active(&mut self, modal_id: &str) {
        if !self.active_modals.contains(modal_id) {
            self.active_modals.insert(modal_id.to_string());
        }
    }

    pub fn set_modal_inactive(&mut self, modal_id: &str) {
        self.active_modals.remove(modal_id);
    }

    pub fn active_modals(&self) -> impl Iterator<Item = &str> {
        self.active_modals.iter().map(String::as_str)
    }

    /// Registers an in-flight request. Adding the same handle twice keeps one entry.
    pub fn add_pending_request(&mut self, handle: Rc<dyn CancellationHandle>) {
        if !self.has_pending_request(&handle) {
            self.pending_requests.push(handle);
        }
    }

    /// Removes a settled request. Unknown handles (e.g. after a reset) are ignored.
    pub fn remove_pending_request(&mut self, handle: &Rc<dyn CancellationHandle>) {
        self.pending_requests
            .retain(|pending| !same_handle(pending, handle));
    }

    #[must_use]
    pub fn has_pending_request(&self, handle: &Rc<dyn CancellationHandle>) -> bool {
        self.pending_requests
            .iter()
            .any(|pending| same_handle(pending, handle))
    }

    #[must_use]
    pub fn pending_request_count(&self) -> usize {
        self.pending_requests.len()
    }

    #[must_use]
    pub fn current_team_relationship_filter(&self) -> &str {
        &self.current_team_relationship_filter
    }

    pub fn set_current_team_relationship_filter(&mut self, value: impl Into<String>) {
        self.current_team_relationship_filter = value.into();
    }

    #[must_use]
    pub fn is_restricted_context_logged(&self) -> bool {
        self.restricted_context_logged
    }

    pub fn set_restricted_context_logged(&mut self, logged: bool) {
        self.restricted_context_logged = logged;
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.is_initialized = initialized;
    }

    /// Replaces the cleanup registration. `None` clears it; the last registration wins.
    pub fn register_cleanup_callback(&mut self, hook: Option<CleanupHook>) {
        self.cleanup_hook = hook;
    }

    #[must_use]
    pub fn has_cleanup_callback(&self) -> bool {
        self.cleanup_hook.is_some()
    }

    /// Cancels in-flight requests, clears session fields, then runs the cleanup
    /// callback. Never fails; individual failures are logged.
    pub fn reset(&mut self) {
        let pending = self.clear_session();
        cancel_all(pending);
        if let Some(hook) = self.cleanup_hook.as_mut() {
            hook.run();
        }
    }

    /// Clears every session field and hands back the pending handles, which
    /// the caller must cancel.
    fn clear_session(&mut self) -> Vec<Rc<dyn CancellationHandle>> {
        self.active_modals.clear();
        self.parameter_count = 0;
        self.current_test_tool = None;
        self.tool_test_result_editor = None;
        self.restricted_context_logged = false;
        self.editors.clear();
        std::mem::take(&mut self.pending_requests)
    }
}

fn cancel_all(handles: Vec<Rc<dyn CancellationHandle>>) {
    for handle in handles {
        if let Err(error) = handle.cancel() {
            tracing::warn!(error = %error, "failed to cancel pending request during state reset");
        }
    }
}

/// Resets shared state without holding the borrow while handles are
/// cancelled or the cleanup callback runs, so either may call back into the
/// (already fresh) state.
pub fn reset_shared(state: &SharedState) {
    let (pending, hook) = {
        let mut state = state.borrow_mut();
        let pending = state.clear_session();
        (pending, state.cleanup_hook.take())
    };
    cancel_all(pending);
    let Some(mut hook) = hook else {
        return;
    };
    hook.run();
    let mut state = state.borrow_mut();
    if state.cleanup_hook.is_none() {
        state.cleanup_hook = Some(hook);
    }
}

fn same_handle(left: &Rc<dyn CancellationHandle>, right: &Rc<dyn CancellationHandle>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(left), Rc::as_ptr(right))
}

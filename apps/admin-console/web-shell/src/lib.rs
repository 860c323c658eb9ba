#![cfg_attr(test, allow(clippy::expect_used))]

#[cfg(any(target_arch = "wasm32", test))]
mod feedback;
#[cfg(target_arch = "wasm32")]
mod wasm_constants;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    use gateway_console_core::form::body_label_for_content_type;
    use gateway_console_core::upload::{UploadCandidate, parse_uploaded_texts};
    use gateway_console_core::{
        ApplicationState, BrowserHistory, CancellationError, CancellationHandle, CertificateChain,
        CleanupError, CleanupHook, ConsoleConfig, ContextError, EditorHandle, EditorSlot,
        GuardedResponse, MarkupSink, ResponseGuard, ResponseReadError, SharedState, Trust,
        UploadPolicy, UploadRejection, escape_html, log_restricted_context,
        parse_certificate_info, reset_shared, safe_replace_state, safe_set_inner_html,
        validate_upload_selection,
    };
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};
    use web_sys::{Document, DragEvent, Element, FileList, HtmlInputElement, HtmlSelectElement};

    use crate::feedback::{UploadOutcome, render_upload_feedback};
    use crate::wasm_constants::*;

    mod certificates;
    mod console_log;
    mod dom;
    mod history;
    mod network;

    use certificates::{process_ca_cert_files, wire_ca_cert_upload};
    use console_log::install_console_logging;
    use dom::*;
    use history::replace_history_state;
    use network::*;

    type EventListener = Closure<dyn FnMut(web_sys::Event)>;

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
    }

    /// Session runtime handed to the console's JavaScript UI layer.
    #[wasm_bindgen]
    pub struct ConsoleRuntime {
        state: SharedState,
        config: ConsoleConfig,
        js_handles: RefCell<JsHandleRegistry>,
        listeners: RefCell<Vec<EventListener>>,
    }

    impl Default for ConsoleRuntime {
        fn default() -> Self {
            Self::new()
        }
    }

    #[wasm_bindgen]
    impl ConsoleRuntime {
        #[wasm_bindgen(constructor)]
        pub fn new() -> Self {
            let config = load_console_config();
            install_console_logging(&config);
            Self {
                state: ApplicationState::shared(),
                config,
                js_handles: RefCell::new(JsHandleRegistry::default()),
                listeners: RefCell::new(Vec::new()),
            }
        }

        #[wasm_bindgen(js_name = getParameterCount)]
        pub fn parameter_count(&self) -> u32 {
            self.state.borrow().parameter_count()
        }

        #[wasm_bindgen(js_name = incrementParameterCount)]
        pub fn increment_parameter_count(&self) -> u32 {
            self.state.borrow_mut().increment_parameter_count()
        }

        #[wasm_bindgen(js_name = decrementParameterCount)]
        pub fn decrement_parameter_count(&self) -> u32 {
            self.state.borrow_mut().decrement_parameter_count()
        }

        #[wasm_bindgen(js_name = isModalActive)]
        pub fn is_modal_active(&self, modal_id: &str) -> bool {
            self.state.borrow().is_modal_active(modal_id)
        }

        #[wasm_bindgen(js_name = setModalActive)]
        pub fn set_modal_active(&self, modal_id: &str) {
            self.state.borrow_mut().set_modal_active(modal_id);
        }

        #[wasm_bindgen(js_name = setModalInactive)]
        pub fn set_modal_inactive(&self, modal_id: &str) {
            self.state.borrow_mut().set_modal_inactive(modal_id);
        }

        #[wasm_bindgen(js_name = openModal)]
        pub fn open_modal(&self, modal_id: &str) {
            set_modal_visibility(modal_id, true);
            self.state.borrow_mut().set_modal_active(modal_id);
        }

        #[wasm_bindgen(js_name = closeModal)]
        pub fn close_modal(&self, modal_id: &str) {
            set_modal_visibility(modal_id, false);
            self.state.borrow_mut().set_modal_inactive(modal_id);
        }

        #[wasm_bindgen(js_name = addPendingRequest)]
        pub fn add_pending_request(&self, handle: JsValue) {
            let handle = self.js_handles.borrow_mut().resolve(handle);
            self.state.borrow_mut().add_pending_request(handle);
        }

        #[wasm_bindgen(js_name = removePendingRequest)]
        pub fn remove_pending_request(&self, handle: JsValue) {
            let Some(handle) = self.js_handles.borrow_mut().release(&handle) else {
                return;
            };
            self.state.borrow_mut().remove_pending_request(&handle);
        }

        #[wasm_bindgen(js_name = pendingRequestCount)]
        pub fn pending_request_count(&self) -> usize {
            self.state.borrow().pending_request_count()
        }

        #[wasm_bindgen(js_name = getCurrentTeamRelationshipFilter)]
        pub fn current_team_relationship_filter(&self) -> String {
            self.state
                .borrow()
                .current_team_relationship_filter()
                .to_string()
        }

        #[wasm_bindgen(js_name = setCurrentTeamRelationshipFilter)]
        pub fn set_current_team_relationship_filter(&self, value: String) {
            self.state
                .borrow_mut()
                .set_current_team_relationship_filter(value);
        }

        #[wasm_bindgen(js_name = isRestrictedContextLogged)]
        pub fn is_restricted_context_logged(&self) -> bool {
            self.state.borrow().is_restricted_context_logged()
        }

        #[wasm_bindgen(js_name = setRestrictedContextLogged)]
        pub fn set_restricted_context_logged(&self, logged: bool) {
            self.state.borrow_mut().set_restricted_context_logged(logged);
        }

        #[wasm_bindgen(js_name = isInitialized)]
        pub fn is_initialized(&self) -> bool {
            self.state.borrow().is_initialized()
        }

        #[wasm_bindgen(js_name = setInitialized)]
        pub fn set_initialized(&self, initialized: bool) {
            self.state.borrow_mut().set_initialized(initialized);
        }

        #[wasm_bindgen(js_name = setEditor)]
        pub fn set_editor(&self, slot: &str, editor: JsValue) -> Result<(), JsValue> {
            let slot = EditorSlot::parse(slot)
                .ok_or_else(|| JsValue::from_str(&format!("unknown editor slot: {slot}")))?;
            let handle = (!editor.is_null() && !editor.is_undefined())
                .then(|| Rc::new(editor) as EditorHandle);
            self.state.borrow_mut().editors.set(slot, handle);
            Ok(())
        }

        #[wasm_bindgen(js_name = getEditor)]
        pub fn editor(&self, slot: &str) -> JsValue {
            EditorSlot::parse(slot)
                .and_then(|slot| editor_to_js(self.state.borrow().editors.get(slot)))
                .unwrap_or(JsValue::NULL)
        }

        #[wasm_bindgen(js_name = setToolTestResultEditor)]
        pub fn set_tool_test_result_editor(&self, editor: JsValue) {
            let handle = (!editor.is_null() && !editor.is_undefined())
                .then(|| Rc::new(editor) as EditorHandle);
            self.state.borrow_mut().tool_test_result_editor = handle;
        }

        #[wasm_bindgen(js_name = getToolTestResultEditor)]
        pub fn tool_test_result_editor(&self) -> JsValue {
            editor_to_js(self.state.borrow().tool_test_result_editor.as_ref())
                .unwrap_or(JsValue::NULL)
        }

        #[wasm_bindgen(js_name = setCurrentTestTool)]
        pub fn set_current_test_tool(&self, tool: JsValue) -> Result<(), JsValue> {
            let tool = if tool.is_null() || tool.is_undefined() {
                None
            } else {
                Some(js_to_json(&tool)?)
            };
            self.state.borrow_mut().current_test_tool = tool;
            Ok(())
        }

        #[wasm_bindgen(js_name = getCurrentTestTool)]
        pub fn current_test_tool(&self) -> JsValue {
            let tool = self.state.borrow().current_test_tool.clone();
            tool.and_then(|tool| json_to_js(&tool).ok())
                .unwrap_or(JsValue::NULL)
        }

        /// Accepts a function, `null`/`undefined` (clears), or anything else
        /// (kept, never invoked).
        #[wasm_bindgen(js_name = registerCleanupCallback)]
        pub fn register_cleanup_callback(&self, callback: JsValue) {
            let hook = cleanup_hook_from_js(callback);
            self.state.borrow_mut().register_cleanup_callback(hook);
        }

        pub fn reset(&self) {
            self.js_handles.borrow_mut().clear();
            reset_shared(&self.state);
        }

        #[wasm_bindgen(js_name = parseCertificateInfo)]
        pub fn parse_certificate_info(&self, text: &str) -> Result<JsValue, JsValue> {
            let record = parse_certificate_info(text);
            let raw = serde_json::to_string(&record)
                .map_err(|error| JsValue::from_str(&error.to_string()))?;
            js_sys::JSON::parse(&raw)
        }

        /// Resolves with `{ ok: true, chain }` or `{ ok: false, error }`; the
        /// feedback region is updated either way.
        #[wasm_bindgen(js_name = validateCACertFiles)]
        pub fn validate_ca_cert_files(&self, event: web_sys::Event) -> js_sys::Promise {
            let files = event
                .target()
                .and_then(|target| target.dyn_into::<HtmlInputElement>().ok())
                .and_then(|input| input.files());
            let policy = self.config.upload_policy();
            future_to_promise(async move {
                let outcome = process_ca_cert_files(files, policy).await;
                let raw = serde_json::to_string(&UploadOutcome::from(&outcome))
                    .map_err(|error| JsValue::from_str(&error.to_string()))?;
                js_sys::JSON::parse(&raw)
            })
        }

        #[wasm_bindgen(js_name = initializeCACertUpload)]
        pub fn initialize_ca_cert_upload(&self) {
            let listeners = wire_ca_cert_upload(self.config.upload_policy());
            self.listeners.borrow_mut().extend(listeners);
        }

        #[wasm_bindgen(js_name = updateBodyLabel)]
        pub fn update_body_label(&self) {
            update_body_label();
        }

        #[wasm_bindgen(js_name = safeSetInnerHTML)]
        pub fn safe_set_inner_html(&self, element: Element, html: &str, is_trusted: Option<bool>) {
            safe_set_inner_html(
                &ElementMarkup(&element),
                html,
                Trust::from(is_trusted.unwrap_or(false)),
            );
        }

        #[wasm_bindgen(js_name = logRestrictedContext)]
        pub fn log_restricted_context(&self, error: JsValue) -> bool {
            let error = context_error_from_js(&error);
            log_restricted_context(&mut self.state.borrow_mut(), &error)
        }

        #[wasm_bindgen(js_name = safeReplaceState)]
        pub fn safe_replace_state(&self, state: JsValue, title: &str, url: Option<String>) -> bool {
            replace_history_state(&self.state, &state, title, url.as_deref())
        }

        #[wasm_bindgen(js_name = parseErrorResponse)]
        pub fn parse_error_response(
            &self,
            response: web_sys::Response,
            fallback: String,
        ) -> js_sys::Promise {
            let guard = self.config.response_guard();
            future_to_promise(async move {
                let response = FetchResponse::from(response);
                let message = guard.parse_error_response(&response, &fallback).await;
                Ok(JsValue::from_str(&message))
            })
        }

        #[wasm_bindgen(js_name = safeParseJsonResponse)]
        pub fn safe_parse_json_response(
            &self,
            response: web_sys::Response,
            fallback: String,
        ) -> js_sys::Promise {
            let guard = self.config.response_guard();
            future_to_promise(async move {
                let response = FetchResponse::from(response);
                let value = guard
                    .safe_parse_json_response(&response, &fallback)
                    .await
                    .map_err(|error| js_sys::Error::new(&error.to_string()))?;
                json_to_js(&value)
            })
        }

        /// GET `url` as JSON, tracked in the pending-request set until it settles.
        #[wasm_bindgen(js_name = fetchJson)]
        pub fn fetch_json(&self, url: String, fallback: Option<String>) -> js_sys::Promise {
            let state = self.state.clone();
            let guard = self.config.response_guard();
            let fallback = fallback.unwrap_or_else(|| DEFAULT_FETCH_ERROR.to_string());
            future_to_promise(async move {
                let value = fetch_json_tracked(&state, guard, &url, &fallback)
                    .await
                    .map_err(|message| js_sys::Error::new(&message))?;
                json_to_js(&value)
            })
        }

        #[wasm_bindgen(js_name = escapeHtml)]
        pub fn escape_html(text: &str) -> String {
            escape_html(text)
        }
    }

    fn load_console_config() -> ConsoleConfig {
        let Some(window) = web_sys::window() else {
            return ConsoleConfig::default();
        };
        let Ok(value) = js_sys::Reflect::get(&window, &JsValue::from_str(CONSOLE_CONFIG_GLOBAL))
        else {
            return ConsoleConfig::default();
        };
        if value.is_null() || value.is_undefined() {
            return ConsoleConfig::default();
        }
        let raw = match value.as_string() {
            Some(raw) => raw,
            None => match js_sys::JSON::stringify(&value) {
                Ok(raw) => String::from(raw),
                Err(_) => return ConsoleConfig::default(),
            },
        };
        match ConsoleConfig::from_json_str(&raw) {
            Ok(config) => config,
            Err(error) => {
                // Logging is not installed yet; report straight to the console.
                web_sys::console::warn_1(&JsValue::from_str(&format!(
                    "ignoring invalid {CONSOLE_CONFIG_GLOBAL}: {error}"
                )));
                ConsoleConfig::default()
            }
        }
    }

    fn cleanup_hook_from_js(callback: JsValue) -> Option<CleanupHook> {
        if callback.is_null() || callback.is_undefined() {
            return None;
        }
        match callback.dyn_into::<js_sys::Function>() {
            Ok(function) => Some(CleanupHook::callable(move || {
                function
                    .call0(&JsValue::NULL)
                    .map(|_| ())
                    .map_err(|error| CleanupError::new(js_error_message(&error)))
            })),
            Err(value) => Some(CleanupHook::NotCallable {
                kind: value.js_typeof().as_string().unwrap_or_default(),
            }),
        }
    }

    fn editor_to_js(handle: Option<&EditorHandle>) -> Option<JsValue> {
        let handle: &dyn Any = handle?.as_ref();
        handle.downcast_ref::<JsValue>().cloned()
    }

    fn js_to_json(value: &JsValue) -> Result<serde_json::Value, JsValue> {
        let raw = String::from(js_sys::JSON::stringify(value)?);
        serde_json::from_str(&raw).map_err(|error| JsValue::from_str(&error.to_string()))
    }

    fn json_to_js(value: &serde_json::Value) -> Result<JsValue, JsValue> {
        js_sys::JSON::parse(&value.to_string())
    }

    pub(super) fn js_error_message(error: &JsValue) -> String {
        if let Some(message) = error.as_string() {
            return message;
        }
        js_sys::Reflect::get(error, &JsValue::from_str("message"))
            .ok()
            .and_then(|message| message.as_string())
            .unwrap_or_else(|| "unknown error".to_string())
    }

    pub(super) fn context_error_from_js(error: &JsValue) -> ContextError {
        let name = js_sys::Reflect::get(error, &JsValue::from_str("name"))
            .ok()
            .and_then(|name| name.as_string())
            .unwrap_or_else(|| "Error".to_string());
        ContextError::new(name, js_error_message(error))
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm::ConsoleRuntime;

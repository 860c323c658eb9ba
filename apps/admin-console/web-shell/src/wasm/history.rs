use super::*;

pub(super) struct WindowHistory(web_sys::History);

impl BrowserHistory for WindowHistory {
    type State = JsValue;

    fn replace_state(
        &self,
        state: &JsValue,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), ContextError> {
        self.0
            .replace_state_with_url(state, title, url)
            .map_err(|error| context_error_from_js(&error))
    }
}

pub(super) fn replace_history_state(
    state: &SharedState,
    history_state: &JsValue,
    title: &str,
    url: Option<&str>,
) -> bool {
    let history = match web_sys::window().map(|window| window.history()) {
        Some(Ok(history)) => WindowHistory(history),
        Some(Err(error)) => {
            // Sandboxed frames can throw on the property read itself.
            log_restricted_context(&mut state.borrow_mut(), &context_error_from_js(&error));
            return false;
        }
        None => return false,
    };
    safe_replace_state(&mut state.borrow_mut(), &history, history_state, title, url)
}

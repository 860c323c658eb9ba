//! Markup injection gate and restricted-context handling.

use crate::app_state::ApplicationState;

/// Whether a string may be parsed as markup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trust {
    Trusted,
    #[default]
    Untrusted,
}

impl From<bool> for Trust {
    fn from(is_trusted: bool) -> Self {
        if is_trusted {
            Self::Trusted
        } else {
            Self::Untrusted
        }
    }
}

/// An element whose content can be replaced either as markup or as text.
pub trait MarkupSink {
    fn set_markup(&self, html: &str);
    fn set_text(&self, text: &str);
}

/// Injects `html` as markup only when `trust` is [`Trust::Trusted`];
/// anything else lands as inert text.
pub fn safe_set_inner_html<S: MarkupSink + ?Sized>(sink: &S, html: &str, trust: Trust) {
    match trust {
        Trust::Trusted => sink.set_markup(html),
        Trust::Untrusted => {
            tracing::error!(
                length = html.len(),
                "refusing to inject untrusted content as HTML; rendering it as text"
            );
            sink.set_text(html);
        }
    }
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// A browser API failure, identified by the thrown error's `name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name}: {message}")]
pub struct ContextError {
    pub name: String,
    pub message: String,
}

impl ContextError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_security_error(&self) -> bool {
        self.name == "SecurityError"
    }
}

pub trait BrowserHistory {
    type State: ?Sized;

    fn replace_state(
        &self,
        state: &Self::State,
        title: &str,
        url: Option<&str>,
    ) -> Result<(), ContextError>;
}

/// Logs the first restricted-context error after the latch was cleared.
/// Returns whether this call emitted the diagnostic.
pub fn log_restricted_context(state: &mut ApplicationState, error: &ContextError) -> bool {
    if state.is_restricted_context_logged() {
        return false;
    }
    tracing::warn!(
        error_name = %error.name,
        security_error = error.is_security_error(),
        error = %error.message,
        "running in a restricted browser context; further errors of this kind are suppressed"
    );
    state.set_restricted_context_logged(true);
    true
}

/// `history.replaceState` that never fails. Returns whether the entry was replaced.
pub fn safe_replace_state<H: BrowserHistory + ?Sized>(
    state: &mut ApplicationState,
    history: &H,
    history_state: &H::State,
    title: &str,
    url: Option<&str>,
) -> bool {
    match history.replace_state(history_state, title, url) {
        Ok(()) => true,
        Err(error) => {
            log_restricted_context(state, &error);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_tracing_events;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Written {
        Markup(String),
        Text(String),
    }

    #[derive(Default)]
    struct RecordingElement {
        written: RefCell<Vec<Written>>,
    }

    impl MarkupSink for RecordingElement {
        fn set_markup(&self, html: &str) {
            self.written.borrow_mut().push(Written::Markup(html.to_string()));
        }

        fn set_text(&self, text: &str) {
            self.written.borrow_mut().push(Written::Text(text.to_string()));
        }
    }

    struct SandboxedHistory {
        fail: bool,
        replaced: RefCell<Vec<String>>,
    }

    impl BrowserHistory for SandboxedHistory {
        type State = str;

        fn replace_state(
            &self,
            state: &str,
            _title: &str,
            url: Option<&str>,
        ) -> Result<(), ContextError> {
            if self.fail {
                return Err(ContextError::new(
                    "SecurityError",
                    "The operation is insecure.",
                ));
            }
            self.replaced
                .borrow_mut()
                .push(format!("{state}@{}", url.unwrap_or_default()));
            Ok(())
        }
    }

    #[test]
    fn trusted_markup_is_injected() {
        let element = RecordingElement::default();
        safe_set_inner_html(&element, "<b>ok</b>", Trust::Trusted);
        assert_eq!(
            *element.written.borrow(),
            vec![Written::Markup("<b>ok</b>".to_string())]
        );
    }

    #[test]
    fn untrusted_markup_becomes_text_and_is_logged() {
        let element = RecordingElement::default();
        let ((), events) = capture_tracing_events(|| {
            safe_set_inner_html(&element, "<script>x</script>", Trust::default());
        });
        assert_eq!(
            *element.written.borrow(),
            vec![Written::Text("<script>x</script>".to_string())]
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, tracing::Level::ERROR);
        assert!(events[0].message().contains("untrusted"));
    }

    #[test]
    fn trust_from_bool() {
        assert_eq!(Trust::from(true), Trust::Trusted);
        assert_eq!(Trust::from(false), Trust::Untrusted);
    }

    #[test]
    fn escape_html_neutralises_markup() {
        let escaped = escape_html("<script>alert('x') & \"y\"</script>");
        assert_eq!(
            escaped,
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert!(!escaped.contains('<'));
    }

    #[test]
    fn restricted_context_is_logged_once_per_latch_cycle() {
        let mut state = ApplicationState::new();
        let error = ContextError::new("SecurityError", "history.replaceState blocked");

        let (results, events) = capture_tracing_events(|| {
            let first = log_restricted_context(&mut state, &error);
            let second = log_restricted_context(&mut state, &error);
            let third = log_restricted_context(&mut state, &error);
            (first, second, third)
        });
        assert_eq!(results, (true, false, false));
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].fields.get("error_name").map(String::as_str),
            Some("SecurityError")
        );
        assert!(state.is_restricted_context_logged());

        state.set_restricted_context_logged(false);
        let (logged_again, events) =
            capture_tracing_events(|| log_restricted_context(&mut state, &error));
        assert!(logged_again);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn state_reset_reopens_the_latch() {
        let mut state = ApplicationState::new();
        let error = ContextError::new("SecurityError", "blocked");
        assert!(log_restricted_context(&mut state, &error));
        state.reset();
        assert!(log_restricted_context(&mut state, &error));
    }

    #[test]
    fn safe_replace_state_swallows_security_errors() {
        let mut state = ApplicationState::new();
        let history = SandboxedHistory {
            fail: true,
            replaced: RefCell::new(Vec::new()),
        };
        let (outcomes, events) = capture_tracing_events(|| {
            (
                safe_replace_state(&mut state, &history, "{}", "", Some("/admin#gateways")),
                safe_replace_state(&mut state, &history, "{}", "", Some("/admin#tools")),
            )
        });
        assert_eq!(outcomes, (false, false));
        assert_eq!(events.len(), 1);
        assert!(state.is_restricted_context_logged());
    }

    #[test]
    fn safe_replace_state_passes_through_when_allowed() {
        let mut state = ApplicationState::new();
        let history = SandboxedHistory {
            fail: false,
            replaced: RefCell::new(Vec::new()),
        };
        assert!(safe_replace_state(
            &mut state,
            &history,
            "tab",
            "",
            Some("/admin#gateways")
        ));
        assert_eq!(*history.replaced.borrow(), vec!["tab@/admin#gateways"]);
        assert!(!state.is_restricted_context_logged());
    }
}

#![cfg_attr(test, allow(clippy::expect_used))]

//! Client-side core of the gateway admin console.
//!
//! Everything here is browser-agnostic: DOM, history, and network access are
//! reached through the small traits in [`trust`] and [`response_guard`], and the
//! `gateway-console-web` shell provides the `web-sys` implementations.

pub mod app_state;
pub mod certificate;
pub mod config;
pub mod form;
pub mod response_guard;
pub mod trust;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use app_state::{
    ApplicationState, CancellationError, CancellationHandle, CleanupError, CleanupHook,
    EditorHandle, EditorSlot, GatewayEditors, SharedState, reset_shared,
};
pub use certificate::{
    CertificateChain, CertificateRecord, CertificateRole, ChainOrderingError,
    order_certificate_chain, parse_certificate_info, split_certificate_bundle,
};
pub use config::{ConfigError, ConsoleConfig};
pub use response_guard::{
    GuardedResponse, ResponseGuard, ResponseGuardError, ResponseReadError, parse_error_response,
    safe_parse_json_response,
};
pub use trust::{
    BrowserHistory, ContextError, MarkupSink, Trust, escape_html, log_restricted_context,
    safe_replace_state, safe_set_inner_html,
};
pub use upload::{UploadCandidate, UploadPolicy, UploadRejection, validate_upload_selection};

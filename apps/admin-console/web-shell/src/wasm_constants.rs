pub(crate) const CONSOLE_CONFIG_GLOBAL: &str = "__GATEWAY_CONSOLE_CONFIG__";
pub(crate) const CA_CERT_INPUT_ID: &str = "upload-ca-cert";
pub(crate) const CA_CERT_DROP_ZONE_ID: &str = "ca-certificate-upload-drop-zone";
pub(crate) const CA_CERT_FEEDBACK_ID: &str = "ca-certificate-feedback";
pub(crate) const CA_CERT_CHAIN_FIELD_ID: &str = "ca-certificate-chain";
pub(crate) const CA_CERT_DROP_ZONE_READY_ATTR: &str = "data-ca-upload-ready";
pub(crate) const DRAG_ACTIVE_CLASS: &str = "drag-active";
pub(crate) const CONTENT_TYPE_SELECT_ID: &str = "gateway-test-content-type";
pub(crate) const BODY_LABEL_ID: &str = "gateway-test-body-label";
pub(crate) const MODAL_HIDDEN_CLASS: &str = "hidden";
pub(crate) const DEFAULT_FETCH_ERROR: &str = "Request failed";

use gateway_console_core::upload::UploadRejection;
use gateway_console_core::{CertificateChain, escape_html};
use serde::Serialize;

/// Value an upload resolves to. Rejections are ordinary outcomes, not errors.
#[derive(Debug, Serialize)]
pub(crate) struct UploadOutcome<'a> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chain: Option<&'a CertificateChain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a Result<CertificateChain, UploadRejection>> for UploadOutcome<'a> {
    fn from(outcome: &'a Result<CertificateChain, UploadRejection>) -> Self {
        match outcome {
            Ok(chain) => Self {
                ok: true,
                chain: Some(chain),
                error: None,
            },
            Err(rejection) => Self {
                ok: false,
                chain: None,
                error: Some(rejection.to_string()),
            },
        }
    }
}

/// Markup for the CA upload feedback region. All certificate-derived and
/// file-derived text is escaped, so the result may be injected as trusted.
pub(crate) fn render_upload_feedback(outcome: &Result<CertificateChain, UploadRejection>) -> String {
    match outcome {
        Ok(chain) => render_chain_feedback(chain),
        Err(rejection) => render_rejection_feedback(rejection),
    }
}

pub(crate) fn render_rejection_feedback(rejection: &UploadRejection) -> String {
    format!(
        "<div class=\"ca-cert-feedback ca-cert-feedback--error\" role=\"alert\">{}</div>",
        escape_html(&rejection.to_string())
    )
}

pub(crate) fn render_chain_feedback(chain: &CertificateChain) -> String {
    let count = chain.len();
    let noun = if count == 1 {
        "certificate"
    } else {
        "certificates"
    };
    let mut html = format!(
        "<div class=\"ca-cert-feedback ca-cert-feedback--success\" role=\"status\"><p>Validated certificate chain ({count} {noun})</p><ol>"
    );
    for (role, record) in chain.with_roles() {
        let role = role.as_str();
        html.push_str(&format!(
            "<li><span class=\"ca-cert-role ca-cert-role--{role}\">{role}</span> <code>{}</code> issued by <code>{}</code></li>",
            escape_html(record.subject().unwrap_or_default()),
            escape_html(record.issuer().unwrap_or_default()),
        ));
    }
    html.push_str("</ol></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_console_core::upload::{
        UploadCandidate, UploadPolicy, parse_uploaded_texts, validate_upload_selection,
    };

    fn rejection_for(files: &[UploadCandidate]) -> String {
        let outcome = validate_upload_selection(files, &UploadPolicy::default())
            .and_then(|()| parse_uploaded_texts(std::iter::empty::<&str>()));
        render_upload_feedback(&outcome)
    }

    #[test]
    fn rejection_messages_reach_the_feedback_region() {
        assert!(rejection_for(&[]).contains("No files selected"));
        assert!(
            rejection_for(&[UploadCandidate::new("ca.pem", 11 * 1024 * 1024)]).contains("too large")
        );
        assert!(rejection_for(&[UploadCandidate::new("cert.txt", 10)]).contains("Invalid file type"));
    }

    #[test]
    fn rejection_text_is_escaped() {
        let html = rejection_for(&[UploadCandidate::new("<img src=x onerror=alert(1)>.txt", 10)]);
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;.txt"));
    }

    #[test]
    fn chain_is_listed_leaf_first_with_roles() {
        let chain = parse_uploaded_texts([
            "Subject: CN=Root\nIssuer: CN=Root\n",
            "Subject: CN=Leaf <evil>\nIssuer: CN=Root\n",
        ])
        .expect("chain");
        let html = render_upload_feedback(&Ok(chain));

        assert!(html.contains("(2 certificates)"));
        let leaf = html.find("ca-cert-role--leaf").expect("leaf badge");
        let root = html.find("ca-cert-role--root").expect("root badge");
        assert!(leaf < root);
        assert!(html.contains("CN=Leaf &lt;evil&gt;"));
        assert!(!html.contains("<evil>"));
    }

    #[test]
    fn rejection_resolves_as_a_failed_outcome() {
        let outcome = validate_upload_selection(&[], &UploadPolicy::default())
            .and_then(|()| parse_uploaded_texts(std::iter::empty::<&str>()));
        let value = serde_json::to_value(UploadOutcome::from(&outcome)).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"ok": false, "error": "No files selected"})
        );
    }

    #[test]
    fn accepted_chain_resolves_with_the_ordered_certificates() {
        let outcome = parse_uploaded_texts([
            "Subject: CN=Root\nIssuer: CN=Root\n",
            "Subject: CN=Leaf\nIssuer: CN=Root\n",
        ]);
        let value = serde_json::to_value(UploadOutcome::from(&outcome)).expect("serialize");
        assert_eq!(value["ok"], true);
        assert!(value.get("error").is_none());
        assert_eq!(value["chain"]["certificates"][0]["subject"], "CN=Leaf");
        assert_eq!(value["chain"]["certificates"][1]["isRoot"], true);
    }

    #[test]
    fn single_root_uses_singular_noun() {
        let chain = parse_uploaded_texts(["Subject: CN=Root\nIssuer: CN=Root"]).expect("root");
        assert!(render_chain_feedback(&chain).contains("(1 certificate)"));
    }
}

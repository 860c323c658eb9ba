use super::*;

use futures_util::future::try_join_all;
use web_sys::File;

/// Validates, reads, and orders the selected CA files, then publishes the
/// outcome to the feedback region and the hidden chain field.
pub(super) async fn process_ca_cert_files(
    files: Option<FileList>,
    policy: UploadPolicy,
) -> Result<CertificateChain, UploadRejection> {
    let files = collect_files(files.as_ref());
    let outcome = read_and_order(&files, &policy).await;
    publish_upload_outcome(&outcome);
    outcome
}

fn collect_files(list: Option<&FileList>) -> Vec<File> {
    let Some(list) = list else {
        return Vec::new();
    };
    (0..list.length()).filter_map(|index| list.item(index)).collect()
}

async fn read_and_order(
    files: &[File],
    policy: &UploadPolicy,
) -> Result<CertificateChain, UploadRejection> {
    let candidates = files
        .iter()
        .map(|file| UploadCandidate::new(file.name(), file.size() as u64))
        .collect::<Vec<_>>();
    validate_upload_selection(&candidates, policy)?;
    let texts = try_join_all(files.iter().map(read_file_text)).await?;
    parse_uploaded_texts(texts.iter().map(String::as_str))
}

async fn read_file_text(file: &File) -> Result<String, UploadRejection> {
    let text = JsFuture::from(file.text())
        .await
        .map_err(|error| UploadRejection::Unreadable {
            name: file.name(),
            message: js_error_message(&error),
        })?;
    text.as_string().ok_or_else(|| UploadRejection::Unreadable {
        name: file.name(),
        message: "file contents are not text".to_string(),
    })
}

fn publish_upload_outcome(outcome: &Result<CertificateChain, UploadRejection>) {
    match outcome {
        Ok(chain) => tracing::info!(certificates = chain.len(), "CA certificate chain validated"),
        Err(rejection) => tracing::warn!(error = %rejection, "CA certificate upload rejected"),
    }

    if let Some(feedback) = element_by_id(CA_CERT_FEEDBACK_ID) {
        // Every certificate-derived string is escaped by the renderer.
        safe_set_inner_html(
            &ElementMarkup(&feedback),
            &render_upload_feedback(outcome),
            Trust::Trusted,
        );
    }
    if let Some(field) = input_by_id(CA_CERT_CHAIN_FIELD_ID) {
        let bundle = outcome
            .as_ref()
            .map(CertificateChain::to_pem_bundle)
            .unwrap_or_default();
        field.set_value(&bundle);
    }
}

/// Wires the drop zone and file input once per page. Returns the listeners,
/// which must outlive the elements they are attached to.
pub(super) fn wire_ca_cert_upload(policy: UploadPolicy) -> Vec<EventListener> {
    let (Some(zone), Some(input)) = (
        element_by_id(CA_CERT_DROP_ZONE_ID),
        input_by_id(CA_CERT_INPUT_ID),
    ) else {
        tracing::debug!("CA certificate upload controls are not on this page");
        return Vec::new();
    };
    if zone.has_attribute(CA_CERT_DROP_ZONE_READY_ATTR) {
        return Vec::new();
    }

    let mut listeners = Vec::new();

    let click_input = input.clone();
    listeners.extend(listen(&zone, "click", move |_event| click_input.click()));

    for event_type in ["dragenter", "dragover"] {
        let target = zone.clone();
        listeners.extend(listen(&zone, event_type, move |event| {
            event.prevent_default();
            set_drag_active(&target, true);
        }));
    }

    let target = zone.clone();
    listeners.extend(listen(&zone, "dragleave", move |_event| {
        set_drag_active(&target, false);
    }));

    let target = zone.clone();
    let drop_input = input.clone();
    let drop_policy = policy.clone();
    listeners.extend(listen(&zone, "drop", move |event| {
        event.prevent_default();
        set_drag_active(&target, false);
        let files = event
            .dyn_ref::<DragEvent>()
            .and_then(DragEvent::data_transfer)
            .and_then(|transfer| transfer.files());
        if let Some(files) = files.as_ref() {
            drop_input.set_files(Some(files));
        }
        let policy = drop_policy.clone();
        spawn_local(async move {
            let _ = process_ca_cert_files(files, policy).await;
        });
    }));

    let change_input = input.clone();
    listeners.extend(listen(&input, "change", move |_event| {
        let files = change_input.files();
        let policy = policy.clone();
        spawn_local(async move {
            let _ = process_ca_cert_files(files, policy).await;
        });
    }));

    if let Err(error) = zone.set_attribute(CA_CERT_DROP_ZONE_READY_ATTR, "true") {
        tracing::warn!(error = %js_error_message(&error), "failed to mark CA upload drop zone");
    }
    listeners
}

fn listen(
    target: &Element,
    event_type: &str,
    handler: impl FnMut(web_sys::Event) + 'static,
) -> Option<EventListener> {
    let listener = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
    match target.add_event_listener_with_callback(event_type, listener.as_ref().unchecked_ref()) {
        Ok(()) => Some(listener),
        Err(error) => {
            tracing::warn!(event_type, error = %js_error_message(&error), "failed to attach listener");
            None
        }
    }
}

fn set_drag_active(zone: &Element, active: bool) {
    let classes = zone.class_list();
    let _ = if active {
        classes.add_1(DRAG_ACTIVE_CLASS)
    } else {
        classes.remove_1(DRAG_ACTIVE_CLASS)
    };
}

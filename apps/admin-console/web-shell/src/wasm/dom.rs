use super::*;

pub(super) fn document() -> Option<Document> {
    web_sys::window().and_then(|window| window.document())
}

pub(super) fn element_by_id(id: &str) -> Option<Element> {
    document().and_then(|document| document.get_element_by_id(id))
}

pub(super) fn input_by_id(id: &str) -> Option<HtmlInputElement> {
    element_by_id(id).and_then(|element| element.dyn_into::<HtmlInputElement>().ok())
}

/// Markup target backed by a live DOM element.
pub(super) struct ElementMarkup<'a>(pub(super) &'a Element);

impl MarkupSink for ElementMarkup<'_> {
    fn set_markup(&self, html: &str) {
        self.0.set_inner_html(html);
    }

    fn set_text(&self, text: &str) {
        self.0.set_text_content(Some(text));
    }
}

/// Syncs the request-body label with the selected content type. Missing
/// elements make this a no-op.
pub(super) fn update_body_label() {
    let Some(select) =
        element_by_id(CONTENT_TYPE_SELECT_ID).and_then(|el| el.dyn_into::<HtmlSelectElement>().ok())
    else {
        return;
    };
    let Some(label) = element_by_id(BODY_LABEL_ID) else {
        return;
    };
    let content_type = select.value();
    label.set_text_content(Some(body_label_for_content_type(Some(&content_type))));
}

pub(super) fn set_modal_visibility(modal_id: &str, visible: bool) {
    let Some(modal) = element_by_id(modal_id) else {
        tracing::debug!(modal_id, "modal element not found; only state is updated");
        return;
    };
    let classes = modal.class_list();
    let result = if visible {
        classes.remove_1(MODAL_HIDDEN_CLASS)
    } else {
        classes.add_1(MODAL_HIDDEN_CLASS)
    };
    if let Err(error) = result {
        tracing::warn!(modal_id, error = %js_error_message(&error), "failed to toggle modal visibility");
    }
}

use super::*;

use async_trait::async_trait;
use gloo_net::http::{Request, Response};

pub(super) struct FetchResponse(Response);

impl From<web_sys::Response> for FetchResponse {
    fn from(response: web_sys::Response) -> Self {
        Self(Response::from(response))
    }
}

#[async_trait(?Send)]
impl GuardedResponse for FetchResponse {
    fn status(&self) -> u16 {
        self.0.status()
    }

    fn content_type(&self) -> Result<Option<String>, ResponseReadError> {
        Ok(self.0.headers().get("content-type"))
    }

    async fn text(&self) -> Result<String, ResponseReadError> {
        self.0
            .text()
            .await
            .map_err(|error| ResponseReadError::new(error.to_string()))
    }
}

struct AbortHandle(web_sys::AbortController);

impl CancellationHandle for AbortHandle {
    fn cancel(&self) -> Result<(), CancellationError> {
        self.0.abort();
        Ok(())
    }
}

/// A page-supplied handle: anything with an `abort()` or `cancel()` method.
struct JsCancellationHandle(JsValue);

impl CancellationHandle for JsCancellationHandle {
    fn cancel(&self) -> Result<(), CancellationError> {
        let method = ["abort", "cancel"].into_iter().find_map(|name| {
            js_sys::Reflect::get(&self.0, &JsValue::from_str(name))
                .ok()
                .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
        });
        let Some(method) = method else {
            return Err(CancellationError::new(
                "handle exposes neither abort() nor cancel()",
            ));
        };
        method
            .call0(&self.0)
            .map(|_| ())
            .map_err(|error| CancellationError::new(js_error_message(&error)))
    }
}

/// Maps JavaScript handle objects to the `Rc`s held in the pending set, so
/// the same object (by `Object.is`) always resolves to the same entry.
#[derive(Default)]
pub(super) struct JsHandleRegistry {
    entries: Vec<(JsValue, Rc<dyn CancellationHandle>)>,
}

impl JsHandleRegistry {
    pub(super) fn resolve(&mut self, handle: JsValue) -> Rc<dyn CancellationHandle> {
        if let Some(existing) = self.find(&handle) {
            return existing;
        }
        let wrapped: Rc<dyn CancellationHandle> = Rc::new(JsCancellationHandle(handle.clone()));
        self.entries.push((handle, wrapped.clone()));
        wrapped
    }

    pub(super) fn release(&mut self, handle: &JsValue) -> Option<Rc<dyn CancellationHandle>> {
        let index = self
            .entries
            .iter()
            .position(|(known, _)| js_sys::Object::is(known, handle))?;
        Some(self.entries.swap_remove(index).1)
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    fn find(&self, handle: &JsValue) -> Option<Rc<dyn CancellationHandle>> {
        self.entries
            .iter()
            .find(|(known, _)| js_sys::Object::is(known, handle))
            .map(|(_, wrapped)| wrapped.clone())
    }
}

/// GETs `url` and decodes it as JSON. The request's abort handle sits in the
/// pending set from before the send until the body has been decoded.
pub(super) async fn fetch_json_tracked(
    state: &SharedState,
    guard: ResponseGuard,
    url: &str,
    fallback: &str,
) -> Result<serde_json::Value, String> {
    let controller =
        web_sys::AbortController::new().map_err(|error| js_error_message(&error))?;
    let signal = controller.signal();
    let handle: Rc<dyn CancellationHandle> = Rc::new(AbortHandle(controller));
    state.borrow_mut().add_pending_request(handle.clone());

    let outcome = async {
        let response = Request::get(url)
            .header("accept", "application/json")
            .abort_signal(Some(&signal))
            .send()
            .await
            .map_err(|error| {
                tracing::debug!(url, error = %error, "request did not complete");
                fallback.to_string()
            })?;
        guard
            .safe_parse_json_response(&FetchResponse(response), fallback)
            .await
            .map_err(|error| error.to_string())
    }
    .await;

    state.borrow_mut().remove_pending_request(&handle);
    outcome
}

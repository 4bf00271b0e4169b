//! Auth events held back until their response has been written.
//!
//! A handler that changes the session returns a [`DeferredEvent`] next to its
//! `Set-Cookie` headers. [`publish_after_response`] takes it out of the
//! response and publishes it once the body stream has ended, so other tabs on
//! the same device only react after the cookies reached the browser.

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponseParts, Response, ResponseParts},
};
use futures::{future, stream, StreamExt};
use std::{convert::Infallible, sync::Arc};
use tracing::debug;

use super::handlers::auth::AuthState;
use crate::navigation::AuthEvent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredEvent(pub AuthEvent);

impl IntoResponseParts for DeferredEvent {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        res.extensions_mut().insert(self);
        Ok(res)
    }
}

pub async fn publish_after_response(
    Extension(auth_state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(DeferredEvent(event)) = response.extensions_mut().remove::<DeferredEvent>() else {
        return response;
    };

    debug!("{} held until the response body ends", event.kind.as_str());
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, publish_on_end(body, auth_state, event))
}

fn publish_on_end(body: Body, auth_state: Arc<AuthState>, event: AuthEvent) -> Body {
    let publish = stream::once(async move { auth_state.publish(event) })
        .filter_map(|()| future::ready(None::<Result<Bytes, axum::Error>>));
    Body::from_stream(body.into_data_stream().chain(publish))
}

//! Server-Sent Events feed of navigation directives.
//!
//! A tab opens `/api/auth/events?path=<current path>` and receives one `auth`
//! event per directive. `stay` outcomes are never sent.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

use super::{cookies, state::AuthState};
use crate::{
    api::error::{ApiError, ErrorBody},
    navigation::{
        normalize_path, AuthEventKind, ClientDirective, Navigator, Subscription, ROOT_PATH,
    },
};

const KEEP_ALIVE_SECONDS: u64 = 15;

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct EventsQuery {
    /// Path the tab is currently showing.
    pub path: Option<String>,
}

/// Identity and location of one connected tab.
#[derive(Clone, Debug)]
pub struct Listener {
    pub path: String,
    pub user_id: Option<Uuid>,
    pub device_id: String,
}

/// Directives for the events addressed to `listener`, in publish order.
///
/// The listener follows its own navigations and sign-ins so later events are
/// judged against where the tab actually is.
pub fn directives(
    navigator: Navigator,
    subscription: Subscription,
    listener: Listener,
) -> impl Stream<Item = ClientDirective> {
    stream::unfold(
        (navigator, subscription, listener),
        |(navigator, mut subscription, mut listener)| async move {
            loop {
                let event = subscription.recv().await?;
                if !event.addressed_to(listener.user_id, Some(&listener.device_id)) {
                    continue;
                }
                if event.kind == AuthEventKind::SignedOut {
                    listener.user_id = None;
                } else if event.user_id.is_some() {
                    listener.user_id = event.user_id;
                }

                let directive = navigator.on_event(&event, &listener.path);
                match &directive {
                    ClientDirective::Stay => continue,
                    ClientDirective::Navigate { to } => listener.path.clone_from(to),
                    ClientDirective::Refresh => {}
                }
                debug!("{} -> {directive:?}", event.kind.as_str());
                return Some((directive, (navigator, subscription, listener)));
            }
        },
    )
}

#[utoipa::path(
    get,
    path = "/api/auth/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Event stream of client directives", body = ClientDirective, content_type = "text/event-stream"),
        (status = 503, description = "Event bus closed", body = ErrorBody)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn auth_events(
    auth_state: Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let Some(subscription) = auth_state.bus().subscribe() else {
        return Err(ApiError::Unavailable("Event stream is closed".to_string()));
    };

    let user_id = match cookies::access_token(&headers) {
        Some(token) => auth_state.provider().get_user(&token).await.ok().map(|user| user.id),
        None => None,
    };
    let (device_id, device_cookie) = cookies::device_id_or_new(auth_state.config(), &headers);
    let listener = Listener {
        path: normalize_path(query.path.as_deref().unwrap_or(ROOT_PATH)),
        user_id,
        device_id,
    };

    let events = directives(auth_state.navigator().clone(), subscription, listener)
        .map(|directive| Event::default().event("auth").json_data(directive));
    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECONDS)))
        .into_response();

    if let Some(cookie) = device_cookie {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{AuthEvent, AuthEventBus, SessionView};
    use std::pin::pin;

    fn listener(path: &str, user_id: Option<Uuid>) -> Listener {
        Listener {
            path: path.to_string(),
            user_id,
            device_id: "device-a".to_string(),
        }
    }

    #[tokio::test]
    async fn stays_are_not_delivered() {
        let bus = AuthEventBus::new();
        let subscription = bus.subscribe().expect("open bus");
        let user_id = Uuid::new_v4();
        let mut directives = pin!(directives(
            Navigator::default(),
            subscription,
            listener("/dashboard", Some(user_id)),
        ));

        let confirmed = SessionView::new(user_id, None, true);
        // Already on the dashboard: stay, skipped.
        bus.publish(AuthEvent::signed_in(confirmed, None));
        bus.publish(AuthEvent::signed_out(Some(user_id), None));

        assert_eq!(directives.next().await, Some(ClientDirective::Refresh));
    }

    #[tokio::test]
    async fn other_users_events_are_filtered() {
        let bus = AuthEventBus::new();
        let subscription = bus.subscribe().expect("open bus");
        let mut directives = pin!(directives(
            Navigator::default(),
            subscription,
            listener("/auth/login", None),
        ));

        let stranger = SessionView::new(Uuid::new_v4(), None, true);
        bus.publish(AuthEvent::signed_in(stranger, Some("device-b".to_string())));
        let me = SessionView::new(Uuid::new_v4(), None, true);
        bus.publish(AuthEvent::signed_in(me, Some("device-a".to_string())));

        assert_eq!(directives.next().await, Some(ClientDirective::Refresh));
    }

    #[tokio::test]
    async fn listener_follows_identity_and_navigation() {
        let bus = AuthEventBus::new();
        let subscription = bus.subscribe().expect("open bus");
        let mut directives = pin!(directives(
            Navigator::default(),
            subscription,
            listener("/verify-email", None),
        ));

        let user_id = Uuid::new_v4();
        bus.publish(AuthEvent::user_updated(
            SessionView::new(user_id, None, true),
            Some("device-a".to_string()),
        ));
        assert_eq!(
            directives.next().await,
            Some(ClientDirective::Navigate {
                to: "/welcome".to_string()
            })
        );

        // Addressed by user id only; the tab is now on /welcome.
        bus.publish(AuthEvent::signed_out(Some(user_id), None));
        assert_eq!(
            directives.next().await,
            Some(ClientDirective::Navigate {
                to: "/auth/login".to_string()
            })
        );

        // Signed out, so the next sign-in for that user is no longer addressed here.
        bus.publish(AuthEvent::signed_in(SessionView::new(user_id, None, true), None));
        bus.shutdown();
        assert_eq!(directives.next().await, None);
    }

    #[tokio::test]
    async fn stream_ends_when_bus_closes() {
        let bus = AuthEventBus::new();
        let subscription = bus.subscribe().expect("open bus");
        let mut directives = pin!(directives(
            Navigator::default(),
            subscription,
            listener("/", None),
        ));
        bus.shutdown();
        assert_eq!(directives.next().await, None);
    }
}

//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a booking WebSocket connection.
//! Each connection owns one `BookingSession` and drives it from client messages and
//! from booking change notifications.

use crate::web::{
    parse_business,
    protocol::{format_slot, parse_slot, ClientMessage, NoAvailabilityReason, ServerMessage, ServiceOption},
    state::AppState,
    today, Rejection,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use booking_core::booking::BookingOutcome;
use booking_core::domain::{BookingChange, BusinessId};
use booking_core::engine::DayAvailability;
use booking_core::ports::BookingChangeStream;
use booking_core::selection::{BookingSession, GridRequest};
use chrono::NaiveDate;
use futures::{
    stream::{self, SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to booking WebSocket connections.
pub async fn booking_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
) -> Result<Response, Rejection> {
    let business_id = parse_business(&business_id)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, app_state, business_id)))
}


async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {:?}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, business_id: BusinessId) {
    info!("New booking connection for business '{}'", business_id);
    let (mut sender, mut receiver) = socket.split();

    // --- 1. Initialization Phase ---
    let ready = match session_ready(&app_state, &business_id).await {
        Ok(msg) => msg,
        Err(message) => {
            let _ = send_message(&mut sender, &ServerMessage::Error { message }).await;
            return;
        }
    };
    if !send_message(&mut sender, &ready).await {
        error!("Failed to send session ready message.");
        return;
    }

    let mut changes: BookingChangeStream = match app_state.changes.subscribe(&business_id).await {
        Ok(changes) => changes,
        Err(e) => {
            warn!("Live availability disabled for this connection: {:?}", e);
            stream::pending::<BookingChange>().boxed()
        }
    };
    let mut session = BookingSession::new(business_id);

    // --- 2. Main Message Loop ---
    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_client_message(text.as_str(), &app_state, &mut session, today()).await
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client sent close message.");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {:?}", e);
                    break;
                }
                None => {
                    info!("Client disconnected.");
                    break;
                }
            },
            Some(change) = changes.next() => handle_change(&change, &app_state, &mut session).await,
        };

        for msg in &outgoing {
            if !send_message(&mut sender, msg).await {
                info!("Client went away while sending.");
                return;
            }
        }
    }

    // --- 3. Cleanup ---
    info!("Booking connection closed.");
}

async fn session_ready(app_state: &AppState, business_id: &BusinessId) -> Result<ServerMessage, String> {
    let engine = &app_state.engine;
    let config = engine.business_config(business_id).await.map_err(|e| {
        error!("Failed to load business config: {:?}", e);
        e.to_string()
    })?;
    let services = engine.active_services(business_id).await.map_err(|e| {
        error!("Failed to load services: {:?}", e);
        e.to_string()
    })?;

    Ok(ServerMessage::SessionReady {
        business_id: business_id.to_string(),
        opening_time: format_slot(config.opening_time),
        closing_time: format_slot(config.closing_time),
        min_date: today(),
        services: services
            .into_iter()
            .map(|s| ServiceOption {
                name: s.name,
                duration_minutes: s.duration_minutes,
            })
            .collect(),
    })
}

/// Regenerates the grid of `request` and stores it in the session.
async fn availability_messages(
    app_state: &AppState,
    session: &mut BookingSession,
    request: GridRequest,
) -> Vec<ServerMessage> {
    let availability = match app_state
        .engine
        .available_slots(session.business_id(), request.date, &request.service)
        .await
    {
        Ok(availability) => availability,
        Err(e) => {
            return vec![ServerMessage::Error {
                message: e.to_string(),
            }]
        }
    };

    let msg = match &availability {
        DayAvailability::Closed(date) => ServerMessage::NoAvailability {
            date: *date,
            reason: NoAvailabilityReason::Closed,
        },
        DayAvailability::Open(grid) if grid.is_empty() => ServerMessage::NoAvailability {
            date: grid.date,
            reason: NoAvailabilityReason::FullyBooked,
        },
        DayAvailability::Open(grid) => ServerMessage::SlotsAvailable {
            date: grid.date,
            service: request.service.name.clone(),
            slots: grid.slots.iter().copied().map(format_slot).collect(),
        },
    };

    // The customer may have switched service or date while the query ran.
    match session.apply_availability(availability) {
        Ok(()) => vec![msg],
        Err(_) => Vec::new(),
    }
}

async fn refresh_availability(
    app_state: &AppState,
    session: &mut BookingSession,
    request: GridRequest,
) -> Vec<ServerMessage> {
    let mut out = availability_messages(app_state, session, request).await;
    if !out.is_empty() {
        out.push(submit_state(session));
    }
    out
}

fn submit_state(session: &BookingSession) -> ServerMessage {
    ServerMessage::SubmitState {
        enabled: session.can_submit(),
    }
}

fn error_message(message: impl ToString) -> ServerMessage {
    ServerMessage::Error {
        message: message.to_string(),
    }
}

/// Re-sends the grid when a change lands on the date the customer is looking at.
pub(crate) async fn handle_change(
    change: &BookingChange,
    app_state: &AppState,
    session: &mut BookingSession,
) -> Vec<ServerMessage> {
    match session.refresh_request() {
        Some(request) if change.touches(request.date) => {
            refresh_availability(app_state, session, request).await
        }
        _ => Vec::new(),
    }
}

/// Applies one client message to the session and returns what to send back.
pub(crate) async fn handle_client_message(
    text: &str,
    app_state: &AppState,
    session: &mut BookingSession,
    today: NaiveDate,
) -> Vec<ServerMessage> {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return vec![error_message("Unrecognised message")];
        }
    };

    match client_msg {
        ClientMessage::ChooseService { service } => {
            let service = match app_state
                .engine
                .find_service(session.business_id(), &service)
                .await
            {
                Ok(service) => service,
                Err(e) => return vec![error_message(e)],
            };
            let chosen = ServerMessage::ServiceChosen {
                service: service.name.clone(),
                duration_minutes: service.duration_minutes,
            };
            match session.choose_service(service) {
                Ok(()) => vec![chosen, submit_state(session)],
                Err(e) => vec![error_message(e)],
            }
        }
        ClientMessage::ChooseDate { date } => match session.choose_date(date, today) {
            Ok(request) => refresh_availability(app_state, session, request).await,
            Err(e) => vec![error_message(e)],
        },
        ClientMessage::ChooseSlot { slot } => {
            let Some(slot) = parse_slot(&slot) else {
                return vec![error_message(format!("'{}' is not a valid time", slot))];
            };
            match session.choose_slot(slot) {
                Ok(()) => vec![
                    ServerMessage::SlotSelected {
                        slot: format_slot(slot),
                    },
                    submit_state(session),
                ],
                Err(e) => vec![error_message(e)],
            }
        }
        ClientMessage::UpdateDetails { name, phone } => match session.enter_details(&name, &phone) {
            Ok(()) => vec![submit_state(session)],
            Err(e) => vec![error_message(e)],
        },
        ClientMessage::Submit => {
            let request = match session.begin_submit() {
                Ok(request) => request,
                Err(e) => return vec![error_message(e)],
            };
            let outcome = app_state.engine.submit_booking(request).await;
            session.finish_submit(&outcome);

            match outcome {
                BookingOutcome::Confirmed(booking) => {
                    info!("Booking {} confirmed over WebSocket", booking.id);
                    vec![ServerMessage::BookingConfirmed {
                        booking_id: booking.id,
                        customer_name: booking.customer_name,
                        date: booking.date,
                        slot: format_slot(booking.start_time),
                    }]
                }
                BookingOutcome::SlotTaken => {
                    let mut out = vec![ServerMessage::SlotTaken {
                        message: session.last_error().unwrap_or_default().to_string(),
                    }];
                    if let Some(request) = session.refresh_request() {
                        out.extend(availability_messages(app_state, session, request).await);
                    }
                    out.push(submit_state(session));
                    out
                }
                BookingOutcome::Failed(reason) => {
                    error!("Booking failed: {}", reason);
                    vec![error_message(reason), submit_state(session)]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use booking_core::domain::{BookingStatus, BusinessConfig, NewBooking, Service};
    use booking_core::memory::InMemoryStore;
    use booking_core::ports::{BookingRepository, ChangeFeed};
    use chrono::NaiveTime;
    use std::collections::HashMap;

    fn centro() -> BusinessId {
        BusinessId::parse("centro").unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, AppState) {
        let store = Arc::new(InMemoryStore::new());
        store.put_config(&centro(), BusinessConfig::default()).unwrap();
        store
            .add_service(
                &centro(),
                Service {
                    name: "Corte".into(),
                    duration_minutes: 60,
                },
                true,
            )
            .unwrap();
        let config = Arc::new(Config::from_vars(&HashMap::new()).unwrap());
        let changes: Arc<dyn ChangeFeed> = store.clone();
        let state = AppState::with_store(store.clone(), changes, config);
        (store, state)
    }

    async fn send(state: &AppState, session: &mut BookingSession, json: &str) -> Vec<ServerMessage> {
        handle_client_message(json, state, session, today()).await
    }

    async fn walk_to_submit(state: &AppState, session: &mut BookingSession) {
        send(state, session, r#"{"type":"choose_service","service":"Corte"}"#).await;
        send(state, session, r#"{"type":"choose_date","date":"2026-10-20"}"#).await;
        send(state, session, r#"{"type":"choose_slot","slot":"14:00"}"#).await;
        let out = send(state, session, r#"{"type":"update_details","name":"Ana"}"#).await;
        assert_eq!(out, vec![ServerMessage::SubmitState { enabled: true }]);
    }

    #[tokio::test]
    async fn choosing_a_date_sends_the_grid() {
        let (_, state) = setup();
        let mut session = BookingSession::new(centro());

        let out = send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-20"}"#).await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));

        send(&state, &mut session, r#"{"type":"choose_service","service":"Corte"}"#).await;
        let out = send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-20"}"#).await;
        match &out[0] {
            ServerMessage::SlotsAvailable { slots, .. } => {
                assert_eq!(slots.first().map(String::as_str), Some("09:00"));
                assert_eq!(slots.len(), 9);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(out[1], ServerMessage::SubmitState { enabled: false });
    }

    #[tokio::test]
    async fn sunday_and_past_dates_are_not_offered() {
        let (_, state) = setup();
        let mut session = BookingSession::new(centro());
        send(&state, &mut session, r#"{"type":"choose_service","service":"Corte"}"#).await;

        let out = send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-18"}"#).await;
        assert_eq!(
            out[0],
            ServerMessage::NoAvailability {
                date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                reason: NoAvailabilityReason::Closed,
            }
        );

        let out = send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-01"}"#).await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));
    }

    #[tokio::test]
    async fn submit_confirms_booking() {
        let (store, state) = setup();
        let mut session = BookingSession::new(centro());
        walk_to_submit(&state, &mut session).await;

        let out = send(&state, &mut session, r#"{"type":"submit"}"#).await;
        match &out[0] {
            ServerMessage::BookingConfirmed { customer_name, slot, .. } => {
                assert_eq!(customer_name, "Ana");
                assert_eq!(slot, "14:00");
            }
            other => panic!("unexpected {:?}", other),
        }
        let stored = store.list_for_date(&centro(), tuesday()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, BookingStatus::Scheduled);

        let out = send(&state, &mut session, r#"{"type":"submit"}"#).await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));
    }

    #[tokio::test]
    async fn taken_slot_triggers_fresh_grid() {
        let (store, state) = setup();
        let mut session = BookingSession::new(centro());
        walk_to_submit(&state, &mut session).await;

        // Another customer books 14:00 after our grid was sent.
        store
            .insert(NewBooking {
                business_id: centro(),
                customer_name: "Luis".into(),
                phone: String::new(),
                service: "Corte".into(),
                date: tuesday(),
                start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            })
            .await
            .unwrap();

        let out = send(&state, &mut session, r#"{"type":"submit"}"#).await;
        assert!(matches!(out[0], ServerMessage::SlotTaken { .. }));
        match &out[1] {
            ServerMessage::SlotsAvailable { slots, .. } => {
                assert!(!slots.contains(&"14:00".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(out[2], ServerMessage::SubmitState { enabled: false });
        assert_eq!(session.slot(), None);
    }

    fn booking_at(date: NaiveDate, hour: u32) -> NewBooking {
        NewBooking {
            business_id: centro(),
            customer_name: "Luis".into(),
            phone: String::new(),
            service: "Corte".into(),
            date,
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn changes_on_the_open_date_resend_the_grid() {
        let (store, state) = setup();
        let mut session = BookingSession::new(centro());
        let mut changes = state.changes.subscribe(&centro()).await.unwrap();

        // Nothing is open yet.
        store.insert(booking_at(tuesday(), 9)).await.unwrap();
        let change = changes.next().await.unwrap();
        assert!(handle_change(&change, &state, &mut session).await.is_empty());

        send(&state, &mut session, r#"{"type":"choose_service","service":"Corte"}"#).await;
        send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-20"}"#).await;

        store.insert(booking_at(tuesday().succ_opt().unwrap(), 14)).await.unwrap();
        let change = changes.next().await.unwrap();
        assert!(handle_change(&change, &state, &mut session).await.is_empty());

        let other = store.insert(booking_at(tuesday(), 14)).await.unwrap();
        let change = changes.next().await.unwrap();
        let out = handle_change(&change, &state, &mut session).await;
        match &out[0] {
            ServerMessage::SlotsAvailable { slots, .. } => {
                assert_eq!(slots.len(), 7);
                assert!(!slots.contains(&"14:00".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(out[1], ServerMessage::SubmitState { enabled: false });

        store.update_status(other.id, BookingStatus::Cancelled).await.unwrap();
        let change = changes.next().await.unwrap();
        let out = handle_change(&change, &state, &mut session).await;
        assert!(matches!(
            &out[0],
            ServerMessage::SlotsAvailable { slots, .. } if slots.contains(&"14:00".to_string())
        ));
    }

    #[tokio::test]
    async fn garbage_and_unknown_slots_are_reported() {
        let (_, state) = setup();
        let mut session = BookingSession::new(centro());
        let out = send(&state, &mut session, "{not json").await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));

        send(&state, &mut session, r#"{"type":"choose_service","service":"Corte"}"#).await;
        send(&state, &mut session, r#"{"type":"choose_date","date":"2026-10-20"}"#).await;
        let out = send(&state, &mut session, r#"{"type":"choose_slot","slot":"14:30"}"#).await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));
        let out = send(&state, &mut session, r#"{"type":"choose_slot","slot":"soon"}"#).await;
        assert!(matches!(out.as_slice(), [ServerMessage::Error { .. }]));
    }
}

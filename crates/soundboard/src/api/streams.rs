//! Server-sent event stream of coordinator notifications.

use std::collections::VecDeque;
use std::time::Instant;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{Error, HttpResponse, Responder, get, web};
use futures_util::{Stream, stream::unfold};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Interval, MissedTickBehavior};

use soundboard_core::events::PlaybackEvent;

use super::{AppState, run_blocking};

const PING_INTERVAL: Duration = Duration::from_secs(15);

struct EventStreamState {
    state: web::Data<AppState>,
    receiver: broadcast::Receiver<PlaybackEvent>,
    interval: Interval,
    pending: VecDeque<Bytes>,
    last_ping: Instant,
}

fn sse_event(event: &str, data: &str) -> Bytes {
    let mut payload = String::new();
    payload.push_str("event: ");
    payload.push_str(event);
    payload.push('\n');
    for line in data.lines() {
        payload.push_str("data: ");
        payload.push_str(line);
        payload.push('\n');
    }
    payload.push('\n');
    Bytes::from(payload)
}

fn push_ping_if_needed(pending: &mut VecDeque<Bytes>, last_ping: &mut Instant) {
    if pending.is_empty() && last_ping.elapsed() >= PING_INTERVAL {
        *last_ping = Instant::now();
        pending.push_back(Bytes::from(": ping\n\n"));
    }
}

fn sse_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = Result<Bytes, Error>> + 'static,
{
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

/// Full status as a `status` event, used on connect and after falling behind.
async fn status_event(state: &web::Data<AppState>) -> Option<Bytes> {
    let handle = state.coordinator.clone();
    let snapshot = run_blocking(move || Ok(handle.snapshot()?)).await.ok()?;
    let json = serde_json::to_string(&snapshot).ok()?;
    Some(sse_event("status", &json))
}

/// Stream coordinator notifications; the first event is a full status snapshot.
#[get("/events")]
pub async fn events_stream(state: web::Data<AppState>) -> impl Responder {
    let receiver = state.events.subscribe();
    let mut pending = VecDeque::new();
    if let Some(initial) = status_event(&state).await {
        pending.push_back(initial);
    }
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stream = unfold(
        EventStreamState {
            state,
            receiver,
            interval,
            pending,
            last_ping: Instant::now(),
        },
        |mut ctx| async move {
            loop {
                if let Some(bytes) = ctx.pending.pop_front() {
                    return Some((Ok::<Bytes, Error>(bytes), ctx));
                }

                let signal = tokio::select! {
                    _ = ctx.interval.tick() => None,
                    result = ctx.receiver.recv() => Some(result),
                };
                match signal {
                    None => {}
                    Some(Ok(event)) => {
                        let json =
                            serde_json::to_string(&event).unwrap_or_else(|_| "null".to_string());
                        ctx.pending.push_back(sse_event(event.name(), &json));
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        tracing::debug!(skipped, "event stream lagged; resending status");
                        if let Some(bytes) = status_event(&ctx.state).await {
                            ctx.pending.push_back(bytes);
                        }
                    }
                    Some(Err(RecvError::Closed)) => return None,
                }

                push_ping_if_needed(&mut ctx.pending, &mut ctx.last_ping);
            }
        },
    );

    sse_response(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_event_prefixes_each_line() {
        let bytes = sse_event("queue", "{\"a\":1}\n{\"b\":2}");
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            "event: queue\ndata: {\"a\":1}\ndata: {\"b\":2}\n\n"
        );
    }

    #[test]
    fn ping_only_when_idle_and_due() {
        let mut pending = VecDeque::new();
        let mut last_ping = Instant::now();
        push_ping_if_needed(&mut pending, &mut last_ping);
        assert!(pending.is_empty());

        let mut last_ping = Instant::now() - PING_INTERVAL;
        pending.push_back(Bytes::from("x"));
        push_ping_if_needed(&mut pending, &mut last_ping);
        assert_eq!(pending.len(), 1);

        pending.clear();
        push_ping_if_needed(&mut pending, &mut last_ping);
        assert_eq!(pending.pop_front(), Some(Bytes::from(": ping\n\n")));
    }
}

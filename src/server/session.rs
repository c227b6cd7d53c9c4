//! WebSocket session: relays a job's progress events and the subscriber's cancel
//!
//! A subscriber that disconnects (close frame, stream end or socket error) cancels
//! its job. So does one that stops accepting frames within `send_timeout` or goes
//! silent past `pong_timeout` despite keep-alive pings. A `{"type": "cancel"}`
//! message cancels too, but the session keeps relaying until the job's final event
//! so the client sees the closing `done`.

use crate::config::ServerConfig;
use crate::job::{ClientMessage, JobHandle, JobSummary};
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Liveness bounds for one subscriber
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub send_timeout: Duration,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl SessionLimits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            ping_interval: Duration::from_secs(config.ping_interval_secs),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

/// Pumps events from `handle` to `outgoing` and control messages from `incoming`
/// until the job ends or the subscriber leaves
///
/// # Returns
///
/// The job summary, or `None` if the job task panicked
pub async fn relay<S, R, E>(
    mut outgoing: S,
    mut incoming: R,
    handle: JobHandle,
    limits: SessionLimits,
) -> Option<JobSummary>
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let JobHandle {
        id,
        mut events,
        cancel,
        task,
    } = handle;
    let mut subscriber_open = true;

    let mut ping = interval_at(Instant::now() + limits.ping_interval, limits.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_heard = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("Failed to encode progress event: {}", e);
                            continue;
                        }
                    };
                    if let Err(reason) =
                        send_within(&mut outgoing, Message::Text(text), limits.send_timeout).await
                    {
                        tracing::info!("Job {}: subscriber {}; cancelling", id, reason);
                        subscriber_open = false;
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            },
            message = incoming.next() => {
                last_heard = Instant::now();
                match message {
                    Some(Ok(Message::Text(text))) => handle_control(id, text.as_bytes(), &cancel),
                    Some(Ok(Message::Binary(bytes))) => handle_control(id, &bytes, &cancel),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Job {}: subscriber disconnected; cancelling", id);
                        subscriber_open = false;
                        cancel.cancel();
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Job {}: WebSocket error: {}", id, e);
                        subscriber_open = false;
                        cancel.cancel();
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            },
            _ = ping.tick() => {
                if last_heard.elapsed() >= limits.pong_timeout {
                    tracing::info!(
                        "Job {}: subscriber silent for {:?}; cancelling",
                        id,
                        last_heard.elapsed()
                    );
                    subscriber_open = false;
                    cancel.cancel();
                    break;
                }
                if let Err(reason) =
                    send_within(&mut outgoing, Message::Ping(Vec::new()), limits.send_timeout).await
                {
                    tracing::info!("Job {}: subscriber {}; cancelling", id, reason);
                    subscriber_open = false;
                    cancel.cancel();
                    break;
                }
            },
        }
    }

    // Unblocks a job waiting on a full queue
    drop(events);

    if subscriber_open {
        let _ = send_within(&mut outgoing, Message::Close(None), limits.send_timeout).await;
    }
    let _ = timeout(limits.send_timeout, outgoing.close()).await;

    match task.await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!("Job {} task failed: {}", id, e);
            None
        }
    }
}

/// Sends one frame, giving up after `limit`
async fn send_within<S>(outgoing: &mut S, message: Message, limit: Duration) -> Result<(), &'static str>
where
    S: Sink<Message> + Unpin,
{
    match timeout(limit, outgoing.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err("socket closed"),
        Err(_) => Err("stopped accepting frames"),
    }
}

fn handle_control(id: u64, payload: &[u8], cancel: &CancellationToken) {
    match serde_json::from_slice::<ClientMessage>(payload) {
        Ok(ClientMessage::Cancel) => {
            tracing::info!("Job {}: cancel requested by subscriber", id);
            cancel.cancel();
        }
        Err(e) => {
            tracing::debug!("Job {}: ignoring unknown control message: {}", id, e);
        }
    }
}

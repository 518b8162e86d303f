//! Comms: the external I/O channels (console, HTTP).
//!
//! Each channel implements [`Channel`] and runs as its own Tokio task. All of
//! them share one [`CommsState`] and one shutdown token; if a channel fails
//! the token is cancelled so its siblings stop too.
//!
//! A small `mpsc` queue carries [`CommsEvent`]s from channels back to the
//! manager task, which only logs them.

pub mod pty;
mod state;
#[cfg(feature = "channel-axum")]
pub mod axum_channel;

pub use state::{CommsEvent, CommsState};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::agents::CommunicationAgent;
use crate::config::Config;
use crate::error::AppError;

pub type ChannelFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A concurrently running I/O channel.
pub trait Channel: Send + 'static {
    fn id(&self) -> &str;

    /// Consume the channel and return its run loop. The loop must end when
    /// `shutdown` is cancelled.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture;
}

/// Handle on the running channel set.
pub struct CommsHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl CommsHandle {
    /// Wait for every channel to exit; returns the first error.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("comms task panicked: {e}"))),
        }
    }
}

/// Spawn the configured channels. Returns immediately.
pub fn start(config: &Config, agent: CommunicationAgent, shutdown: CancellationToken) -> CommsHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(agent, event_tx));

    let mut channels: Vec<Box<dyn Channel>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            channels.push(Box::new(pty::PtyChannel::new("pty0", state.clone(), config.bot_name.clone())));
        }
    }

    #[cfg(feature = "channel-axum")]
    {
        if config.comms_http_should_load() {
            info!(bind = %config.comms.http.bind, "loading http channel");
            channels.push(Box::new(axum_channel::AxumChannel::new("http0", &config.comms.http, state.clone())));
        }
    }

    if channels.is_empty() {
        info!("no comms channels configured, waiting for shutdown");
    }

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { ref channel_id } => {
                    debug!(channel_id, "channel reported shutdown");
                }
                CommsEvent::DatasetImported { ref channel_id, ref dataset_id } => {
                    debug!(channel_id, dataset_id, "dataset imported");
                }
            }
        }
    });

    spawn_channels(channels, shutdown)
}

fn spawn_channels(channels: Vec<Box<dyn Channel>>, shutdown: CancellationToken) -> CommsHandle {
    let inner = tokio::spawn(async move {
        if channels.is_empty() {
            shutdown.cancelled().await;
            return Ok(());
        }

        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();
        for channel in channels {
            debug!(channel = channel.id(), "spawning channel");
            set.spawn(channel.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;
        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("channel panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| AppError::Comms(format!("channel panicked: {e}")));
                }
                Ok(Err(e)) => {
                    error!("channel error: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok(Ok(())) => {}
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    CommsHandle { inner }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fails;

    impl Channel for Fails {
        fn id(&self) -> &str {
            "fails"
        }

        fn run(self: Box<Self>, _shutdown: CancellationToken) -> ChannelFuture {
            Box::pin(async { Err(AppError::Comms("boom".into())) })
        }
    }

    struct WaitsForShutdown;

    impl Channel for WaitsForShutdown {
        fn id(&self) -> &str {
            "waits"
        }

        fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
            Box::pin(async move {
                shutdown.cancelled().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn failing_channel_cancels_siblings() {
        let shutdown = CancellationToken::new();
        let handle = spawn_channels(vec![Box::new(WaitsForShutdown), Box::new(Fails)], shutdown.clone());
        let err = handle.join().await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn no_channels_waits_for_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = spawn_channels(Vec::new(), shutdown.clone());
        shutdown.cancel();
        handle.join().await.unwrap();
    }
}

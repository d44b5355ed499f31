//! Structures to keep the process alive until some event occurs

use futures::{
    channel::mpsc::{channel, Receiver, Sender},
    pin_mut,
    prelude::*,
    select,
};
use log::{debug, error, info, warn};
use std::{
    fmt,
    fmt::{Error as FmtError, Formatter},
    time::Duration,
};
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::time::sleep;

/// Reason why the heart stopped beating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeathReason {
    /// Internal kill signal has been sent
    Killed(String),
    /// Predetermined lifetime has been exceeded
    LifetimeExceeded,
    /// SIGINT, SIGTERM or other process-external cause
    Terminated,
}

impl fmt::Display for DeathReason {
    fn fmt(&self, w: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            DeathReason::Killed(reason) => write!(w, "Killed ({})", reason),
            DeathReason::LifetimeExceeded => write!(w, "Lifetime was exceeded"),
            DeathReason::Terminated => write!(w, "Terminated due to external signal"),
        }
    }
}

/// Lifecycle management struct that keeps the application alive
pub struct Heart {
    /// Receiver for kill requests sent by heart stones
    rx: Receiver<String>,
    /// Maximum lifetime duration
    lifetime: Option<Duration>,
}

impl Heart {
    /// Creates a new heart and linked stone with no lifetime limit
    pub fn new() -> (Self, HeartStone) {
        Heart::internal_new(None)
    }

    /// Creates a new heart and linked stone with a lifetime
    pub fn with_lifetime(lifetime: Duration) -> (Self, HeartStone) {
        Heart::internal_new(Some(lifetime))
    }

    /// Future that waits until the heart dies for the returned reason
    pub async fn death(&mut self) -> DeathReason {
        let age_future = match self.lifetime {
            Some(lifetime) => sleep(lifetime).boxed(),
            None => future::pending().boxed(),
        }
        .fuse();

        // Once all stones are dropped only signals and the lifetime remain
        let rx = &mut self.rx;
        let killed = async move {
            match rx.next().await {
                Some(reason) => reason,
                None => future::pending().await,
            }
        }
        .fuse();

        let termination = Heart::termination_signal().fuse();

        pin_mut!(age_future, killed, termination);

        debug!("Heart starts beating");

        select! {
            reason = killed => DeathReason::Killed(reason),
            () = age_future => DeathReason::LifetimeExceeded,
            () = termination => DeathReason::Terminated,
        }
    }

    fn internal_new(lifetime: Option<Duration>) -> (Self, HeartStone) {
        if let Some(lifetime) = lifetime {
            info!("Lifetime set to {} seconds", lifetime.as_secs());
        }

        let (tx, rx) = channel(2);
        let heart = Self { rx, lifetime };
        let stone = HeartStone::new(tx);

        (heart, stone)
    }

    async fn termination_signal() {
        let mut sigterm_stream = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Unable to listen for SIGTERM, relying on SIGINT only: {}", e);
                ctrl_c().await.ok();
                return;
            }
        };

        let sigterm = sigterm_stream.recv().fuse();
        let ctrl_c = ctrl_c().fuse();

        pin_mut!(sigterm, ctrl_c);

        select! {
            _ = sigterm => {},
            _ = ctrl_c => {},
        };
    }
}

/// Remote controller for the heart
#[derive(Clone)]
pub struct HeartStone {
    remote: Sender<String>,
}

impl HeartStone {
    fn new(remote: Sender<String>) -> Self {
        Self { remote }
    }

    /// Kill the associated heart
    pub async fn kill(&mut self, reason: String) {
        if let Err(e) = self.remote.send(reason).await {
            error!("Failed to interact with Heart: {}", e);
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use futures::poll;
    use tokio::task::{spawn, yield_now};

    #[tokio::test]
    async fn live_without_lifetime() {
        let (mut heart, _stone) = Heart::new();

        let mut handle = spawn(async move { heart.death().await });
        sleep(Duration::from_millis(100)).await;
        yield_now().await;

        assert!(poll!(&mut handle).is_pending());
        handle.abort();
    }

    #[tokio::test]
    async fn die_when_killed() {
        let (mut heart, mut stone) = Heart::new();

        let handle = spawn(async move { heart.death().await });
        stone.kill("Testing".to_owned()).await;

        assert_eq!(
            handle.await.unwrap(),
            DeathReason::Killed("Testing".to_owned())
        );
    }

    #[tokio::test]
    async fn die_after_lifetime() {
        let lifetime = Duration::from_millis(10);
        let (mut heart, _stone) = Heart::with_lifetime(lifetime);

        let handle = spawn(async move { heart.death().await });

        assert_eq!(handle.await.unwrap(), DeathReason::LifetimeExceeded);
    }

    #[tokio::test]
    async fn survive_dropped_stones() {
        let (mut heart, stone) = Heart::with_lifetime(Duration::from_millis(50));
        drop(stone);

        assert_eq!(heart.death().await, DeathReason::LifetimeExceeded);
    }
}

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{Classic, Evaluator};
use crate::session::{ConnectionHandler, Session, SessionError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("failed to listen on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Accepts clients and pairs them on one shared [`Session`].
///
/// At most two connections are admitted at a time; further clients stay in the
/// listener backlog until a slot is released.
pub struct Server<E = Classic> {
    listener: TcpListener,
    session: Arc<Session<E>>,
}

impl Server<Classic> {
    pub async fn bind(config: &Config) -> ServerResult<Self> {
        Self::with_session(config, Session::with_timing(config.timing())).await
    }
}

impl<E> Server<E>
where
    E: Evaluator + 'static,
{
    pub async fn with_session(config: &Config, session: Session<E>) -> ServerResult<Self> {
        let listener = TcpListener::bind(&config.address)
            .await
            .map_err(|source| ServerError::Bind {
                address: config.address.clone(),
                source,
            })?;
        Ok(Self {
            listener,
            session: Arc::new(session),
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn session(&self) -> Arc<Session<E>> {
        self.session.clone()
    }

    /// Accept loop. Returns once `ct` is cancelled, aborting running handlers.
    pub async fn run(self, ct: CancellationToken) -> ServerResult<()> {
        info!("listening for connections on {}", self.local_addr()?);
        let mut handlers = JoinSet::new();
        loop {
            tokio::select! {
                _ = ct.cancelled() => break,
                res = self.session.wait_for_free_slot() => res?,
            }
            let (stream, peer) = tokio::select! {
                _ = ct.cancelled() => break,
                res = self.listener.accept() => match res {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("failed to accept connection: {}", err);
                        continue;
                    }
                },
            };
            let slot = match self.session.admit() {
                Ok(slot) => slot,
                Err(SessionError::NoSlotAvailable) => {
                    error!(%peer, "no free slot for an accepted connection, dropping it");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if let Err(err) = stream.set_nodelay(true) {
                warn!(%peer, "failed to set TCP_NODELAY: {}", err);
            }
            info!(%peer, %slot, "client connected");
            handlers.spawn(ConnectionHandler::new(self.session.clone(), slot, stream).run());

            // reap finished handlers so the set does not grow
            while let Some(res) = handlers.try_join_next() {
                if let Err(err) = res {
                    error!("connection handler panicked: {}", err);
                }
            }
        }
        info!("shutting down, {} handler(s) still running", handlers.len());
        handlers.shutdown().await;
        Ok(())
    }
}

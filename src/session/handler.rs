use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use super::coordinator::Session;
use super::{protocol, SessionResult, Slot, TurnOutcome};
use crate::core::{Evaluator, GameState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    AwaitingOpponent,
    SymbolAssigned,
    Playing,
    RoundOver(GameState),
    AwaitingRematch,
    Terminated,
}

/// Drives one client through waiting, playing and rematch negotiation.
pub struct ConnectionHandler<S, E> {
    session: Arc<Session<E>>,
    slot: Slot,
    stream: S,
    /// Round this handler last played in, until it has asked for its reset.
    round: Option<u64>,
}

impl<S, E> ConnectionHandler<S, E>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Evaluator,
{
    /// `slot` must already be admitted to `session`.
    pub fn new(session: Arc<Session<E>>, slot: Slot, stream: S) -> Self {
        Self {
            session,
            slot,
            stream,
            round: None,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Runs until the client goes away, then gives the slot back.
    pub async fn run(mut self) {
        let mut phase = Phase::AwaitingOpponent;
        while phase != Phase::Terminated {
            let next = match self.step(phase).await {
                Ok(next) => next,
                Err(err) => {
                    if err.is_disconnect() {
                        debug!(slot = %self.slot, ?phase, "client lost: {}", err);
                    } else {
                        warn!(slot = %self.slot, ?phase, "handler failed: {}", err);
                    }
                    Phase::Terminated
                }
            };
            debug!(slot = %self.slot, from = ?phase, to = ?next, "phase change");
            phase = next;
        }
        self.terminate();
    }

    async fn step(&mut self, phase: Phase) -> SessionResult<Phase> {
        match phase {
            Phase::AwaitingOpponent => self.await_opponent().await,
            Phase::SymbolAssigned => self.assign_symbol().await,
            Phase::Playing => self.play().await,
            Phase::RoundOver(last) => {
                protocol::send_snapshot(&mut self.stream, &last).await?;
                info!(slot = %self.slot, status = %last.status(), "round over");
                debug!("final board:\n{}", self.session.evaluator().render(last.board()));
                Ok(Phase::AwaitingRematch)
            }
            Phase::AwaitingRematch => self.await_rematch().await,
            Phase::Terminated => Ok(Phase::Terminated),
        }
    }

    async fn await_opponent(&mut self) -> SessionResult<Phase> {
        // a notice means the round already ended under us, go and collect it
        while self.session.presence()? < 2 && !self.session.has_notice_for(self.slot)? {
            protocol::send_keep_alive(&mut self.stream).await?;
            tokio::time::sleep(self.session.timing().keepalive).await;
        }
        Ok(Phase::SymbolAssigned)
    }

    async fn assign_symbol(&mut self) -> SessionResult<Phase> {
        if let Err(err) = protocol::send_slot(&mut self.stream, self.slot).await {
            self.session.publish_peer_gone(self.slot)?;
            return Err(err);
        }
        if self.slot == Slot::Two {
            let delay = self.first_move_delay();
            debug!(slot = %self.slot, ?delay, "delaying first turn");
            tokio::time::sleep(delay).await;
        }
        Ok(Phase::Playing)
    }

    async fn play(&mut self) -> SessionResult<Phase> {
        self.round = Some(self.session.round()?);
        loop {
            tokio::time::sleep(self.session.timing().turn_interval).await;
            match self.session.take_turn(self.slot, &mut self.stream).await? {
                TurnOutcome::Continue => continue,
                TurnOutcome::Stop(last) => return Ok(Phase::RoundOver(last)),
            }
        }
    }

    async fn await_rematch(&mut self) -> SessionResult<Phase> {
        // still away since the round stopped; a failed read leaves presence untouched
        protocol::read_byte(&mut self.stream, self.session.timing().read_timeout).await?;
        debug!(slot = %self.slot, "rematch accepted");
        // board is clean before the opponent can see us again
        if let Some(round) = self.round.take() {
            self.session.reset_round(round)?;
        }
        self.session.step_back(self.slot)?;
        Ok(Phase::AwaitingOpponent)
    }

    fn first_move_delay(&self) -> Duration {
        let max = self.session.timing().max_first_move_delay;
        if max.is_zero() {
            return max;
        }
        rand::thread_rng().gen_range(Duration::ZERO..max)
    }

    fn terminate(&self) {
        if let Err(err) = self.session.leave(self.slot) {
            warn!(slot = %self.slot, "failed to release slot: {}", err);
        }
        if let Some(round) = self.round {
            if let Err(err) = self.session.reset_round(round) {
                warn!(slot = %self.slot, "failed to reset board: {}", err);
            }
        }
        info!(slot = %self.slot, "client disconnected");
    }
}

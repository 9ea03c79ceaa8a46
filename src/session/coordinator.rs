use std::sync::Mutex;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::protocol;
use super::registry::Lobby;
use super::{SessionResult, SessionSignal, Slot, TurnOutcome};
use crate::config::Timing;
use crate::core::{Classic, Evaluator, GameError, GameState, Position, Status};

/// State guarded by the turn lock.
#[derive(Debug, Default)]
struct Shared {
    game: GameState,
    /// Slot allowed to move next. `None` at the start of a round: whoever asks first
    /// gets the first move.
    turn: Option<Slot>,
    /// Pending notice and the slot it is meant for. Only that slot clears it.
    signal: Option<(Slot, SessionSignal)>,
    /// Number of resets so far. A reset names the round it is meant for, so a
    /// concluded round is cleared once no matter how many handlers ask.
    round: u64,
}

impl Shared {
    fn take_signal_for(&mut self, slot: Slot) -> Option<SessionSignal> {
        match self.signal {
            Some((recipient, signal)) if recipient == slot => {
                self.signal = None;
                Some(signal)
            }
            _ => None,
        }
    }
}

enum Claim {
    Granted(GameState),
    Stop(GameState),
}

enum Applied {
    Continue,
    Concluded(GameState),
    Rejected(GameError),
}

/// One game table shared by two connection handlers.
///
/// The turn lock only guards the shared state. Sending snapshots and reading moves
/// happens outside of it, alternation is enforced by the turn token.
pub struct Session<E = Classic> {
    state: Mutex<Shared>,
    lobby: Mutex<Lobby>,
    /// Fired on every change of the shared state.
    state_changed: Notify,
    /// Fired whenever a slot is released.
    seat_freed: Notify,
    evaluator: E,
    timing: Timing,
}

impl Session<Classic> {
    pub fn with_timing(timing: Timing) -> Self {
        Self::new(Classic, timing)
    }
}

impl Default for Session<Classic> {
    fn default() -> Self {
        Self::with_timing(Timing::default())
    }
}

impl<E: Evaluator> Session<E> {
    pub fn new(evaluator: E, timing: Timing) -> Self {
        Self {
            state: Mutex::new(Shared::default()),
            lobby: Mutex::new(Lobby::default()),
            state_changed: Notify::new(),
            seat_freed: Notify::new(),
            evaluator,
            timing,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn snapshot(&self) -> SessionResult<GameState> {
        Ok(self.state.lock()?.game)
    }

    /// Claims a slot for a freshly accepted connection and counts it as present.
    pub fn admit(&self) -> SessionResult<Slot> {
        self.lobby.lock()?.admit()
    }

    /// Releases `slot` for good and forgets any notice still addressed to it.
    pub fn leave(&self, slot: Slot) -> SessionResult<()> {
        self.lobby.lock()?.leave(slot);
        {
            let mut shared = self.state.lock()?;
            if matches!(shared.signal, Some((recipient, _)) if recipient == slot) {
                shared.signal = None;
            }
        }
        self.seat_freed.notify_waiters();
        self.state_changed.notify_waiters();
        Ok(())
    }

    pub fn presence(&self) -> SessionResult<usize> {
        Ok(self.lobby.lock()?.presence())
    }

    /// Round number handlers must pass to [`Session::reset_round`].
    pub fn round(&self) -> SessionResult<u64> {
        Ok(self.state.lock()?.round)
    }

    /// Whether a notice is waiting for `slot`.
    pub fn has_notice_for(&self, slot: Slot) -> SessionResult<bool> {
        Ok(matches!(self.state.lock()?.signal, Some((recipient, _)) if recipient == slot))
    }

    /// Counts `slot` as present again after it has answered the rematch question.
    pub fn step_back(&self, slot: Slot) -> SessionResult<()> {
        self.lobby.lock()?.step_back(slot);
        self.state_changed.notify_waiters();
        Ok(())
    }

    /// Resolves once the lobby has a free slot.
    pub async fn wait_for_free_slot(&self) -> SessionResult<()> {
        loop {
            let notified = self.seat_freed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lobby.lock()?.has_free_slot() {
                return Ok(());
            }
            notified.await;
        }
    }

    /// Clears `round` and starts the next one: empty board, `InProgress`, first move
    /// open.
    ///
    /// Returns `false` and leaves the state alone if `round` has already been cleared,
    /// or while a notice is still waiting for the other handler: that handler has not
    /// seen the end of the round yet and resets the board itself once it has.
    pub fn reset_round(&self, round: u64) -> SessionResult<bool> {
        {
            let mut shared = self.state.lock()?;
            if shared.round != round {
                debug!(round, current = shared.round, "round already reset");
                return Ok(false);
            }
            if let Some((recipient, signal)) = shared.signal {
                debug!(%recipient, ?signal, "reset deferred until notice is consumed");
                return Ok(false);
            }
            shared.game.reset();
            shared.turn = None;
            shared.round += 1;
        }
        self.state_changed.notify_waiters();
        Ok(true)
    }

    /// Tells the opponent of `slot` that its peer is gone, if the opponent is present.
    /// A notice already pending is kept.
    ///
    /// The opponent stops counting as present until it has answered the rematch
    /// question, so a newcomer in the freed slot waits for that answer.
    pub fn publish_peer_gone(&self, slot: Slot) -> SessionResult<()> {
        {
            let mut shared = self.state.lock()?;
            let mut lobby = self.lobby.lock()?;
            if lobby.presence() < 2 || shared.signal.is_some() {
                return Ok(());
            }
            shared.signal = Some((slot.opponent(), SessionSignal::PeerGone));
            lobby.step_away(slot.opponent());
            debug!(%slot, "published peer gone");
        }
        self.state_changed.notify_waiters();
        Ok(())
    }

    /// Plays one turn for `slot` over `stream`.
    ///
    /// Waits until it is this slot's move, sends the snapshot, reads the move and
    /// applies it. Invalid moves are answered with a fresh snapshot until a legal one
    /// arrives. A failed exchange publishes [`SessionSignal::PeerGone`] for the opponent
    /// and is returned as the error.
    ///
    /// A slot that gets [`TurnOutcome::Stop`] no longer counts as present until it
    /// calls [`Session::step_back`].
    pub async fn take_turn<S>(&self, slot: Slot, stream: &mut S) -> SessionResult<TurnOutcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut snapshot = match self.claim_turn(slot).await? {
            Claim::Granted(snapshot) => snapshot,
            Claim::Stop(last) => return Ok(TurnOutcome::Stop(last)),
        };
        loop {
            let index = match self.exchange(stream, &snapshot).await {
                Ok(index) => index,
                Err(err) => {
                    if let Err(publish_err) = self.publish_peer_gone(slot) {
                        warn!(%slot, "failed to notify opponent: {}", publish_err);
                    }
                    return Err(err);
                }
            };
            match self.apply_move(slot, index)? {
                Applied::Continue => return Ok(TurnOutcome::Continue),
                Applied::Concluded(last) => return Ok(TurnOutcome::Stop(last)),
                Applied::Rejected(err) => {
                    warn!(%slot, index, "rejected move: {}", err);
                    snapshot = self.snapshot()?;
                }
            }
        }
    }

    /// Waits for the turn token, a notice, or the opponent's slot going empty.
    async fn claim_turn(&self, slot: Slot) -> SessionResult<Claim> {
        loop {
            let notified = self.state_changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut shared = self.state.lock()?;
                if let Some(signal) = shared.take_signal_for(slot) {
                    if signal == SessionSignal::PeerGone {
                        shared.game.set_status(Status::Disconnected);
                    }
                    self.lobby.lock()?.step_away(slot);
                    debug!(%slot, ?signal, "round stopped by opponent");
                    return Ok(Claim::Stop(shared.game));
                }
                {
                    let mut lobby = self.lobby.lock()?;
                    if !lobby.registry().is_occupied(slot.opponent()) {
                        lobby.step_away(slot);
                        shared.game.set_status(Status::Disconnected);
                        debug!(%slot, "opponent left the table");
                        return Ok(Claim::Stop(shared.game));
                    }
                }
                let game = shared.game;
                let my_turn = shared.turn.map_or(true, |holder| holder == slot);
                if !game.status().is_terminal() && my_turn {
                    shared.turn = Some(slot);
                    return Ok(Claim::Granted(game));
                }
            }
            let _ = tokio::time::timeout(self.timing.turn_interval, notified).await;
        }
    }

    async fn exchange<S>(&self, stream: &mut S, snapshot: &GameState) -> SessionResult<u8>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        protocol::send_snapshot(stream, snapshot).await?;
        protocol::read_byte(stream, self.timing.read_timeout).await
    }

    fn apply_move(&self, slot: Slot, index: u8) -> SessionResult<Applied> {
        let applied = {
            let mut shared = self.state.lock()?;
            let placed = Position::from_index(isize::from(index)).and_then(|position| {
                shared.game.place(position, slot.mark(), &self.evaluator)
            });
            let status = match placed {
                Ok(status) => status,
                Err(err) => return Ok(Applied::Rejected(err)),
            };
            debug!(%slot, index, "move applied");
            if status.is_terminal() {
                info!(%slot, %status, "round concluded");
                let mut lobby = self.lobby.lock()?;
                if lobby.presence() >= 2 {
                    shared.signal = Some((slot.opponent(), SessionSignal::RoundConcluded));
                }
                // nobody starts the next round before both have answered the rematch
                for seat in Slot::ALL {
                    lobby.step_away(seat);
                }
                Applied::Concluded(shared.game)
            } else {
                shared.turn = Some(slot.opponent());
                Applied::Continue
            }
        };
        self.state_changed.notify_waiters();
        Ok(applied)
    }
}

extern crate xo_server;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use xo_server::config::Timing;
use xo_server::core::{Cell, GameState, Status, SNAPSHOT_SIZE};
use xo_server::session::protocol::KEEP_ALIVE;
use xo_server::session::{ConnectionHandler, Session, Slot, TurnOutcome};

const WAIT: Duration = Duration::from_secs(5);

fn fast_timing() -> Timing {
    Timing {
        keepalive: Duration::from_millis(10),
        turn_interval: Duration::from_millis(10),
        max_first_move_delay: Duration::ZERO,
        read_timeout: Some(WAIT),
    }
}

/// Session with both slots taken.
fn seated_session() -> Arc<Session> {
    let session = Arc::new(Session::with_timing(fast_timing()));
    assert_eq!(session.admit().unwrap(), Slot::One);
    assert_eq!(session.admit().unwrap(), Slot::Two);
    session
}

/// Client end of a connection plus the server end the session talks to.
struct Seat {
    client: DuplexStream,
    server: DuplexStream,
}

impl Seat {
    fn new() -> Self {
        Self::with_buffer(256)
    }

    fn with_buffer(max_buf_size: usize) -> Self {
        let (client, server) = tokio::io::duplex(max_buf_size);
        Self { client, server }
    }
}

async fn read_snapshot(stream: &mut DuplexStream) -> GameState {
    let mut buf = [0u8; SNAPSHOT_SIZE];
    stream.read_exact(&mut buf).await.unwrap();
    GameState::from_bytes(&buf).unwrap()
}

/// Queues `index` on the client side, then runs one turn for `slot`.
async fn play(session: &Session, slot: Slot, seat: &mut Seat, index: u8) -> TurnOutcome {
    seat.client.write_all(&[index]).await.unwrap();
    session.take_turn(slot, &mut seat.server).await.unwrap()
}

fn marks(game: &GameState, cell: Cell) -> usize {
    game.board().iter().filter(|&&c| c == cell).count()
}

#[tokio::test]
async fn take_turn_top_row_wins() {
    let session = seated_session();
    let mut one = Seat::new();
    let mut two = Seat::new();

    assert_eq!(play(&session, Slot::One, &mut one, 0).await, TurnOutcome::Continue);
    assert_eq!(play(&session, Slot::Two, &mut two, 3).await, TurnOutcome::Continue);
    assert_eq!(play(&session, Slot::One, &mut one, 1).await, TurnOutcome::Continue);
    assert_eq!(play(&session, Slot::Two, &mut two, 4).await, TurnOutcome::Continue);
    let TurnOutcome::Stop(last) = play(&session, Slot::One, &mut one, 2).await else {
        panic!("winning move must stop the round");
    };
    assert_eq!(last.status(), Status::Player1Won);
    assert_eq!(&last.board()[..3], &[Cell::Player1; 3]);

    // the board stays put until the opponent has seen the result
    assert!(!session.reset_round(0).unwrap());

    // opponent stops without being asked for a move
    let outcome = tokio::time::timeout(WAIT, session.take_turn(Slot::Two, &mut two.server))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Stop(last));

    // each client saw a snapshot before each of its moves
    let first = read_snapshot(&mut one.client).await;
    assert_eq!(first, GameState::new());
    let second = read_snapshot(&mut one.client).await;
    assert_eq!(second.board()[0], Cell::Player1);
    assert_eq!(second.board()[3], Cell::Player2);
    read_snapshot(&mut one.client).await;
    read_snapshot(&mut two.client).await;
    let before_last = read_snapshot(&mut two.client).await;
    assert_eq!(marks(&before_last, Cell::Player1), 2);
    assert_eq!(marks(&before_last, Cell::Player2), 1);

    assert!(session.reset_round(0).unwrap());
    assert_eq!(session.snapshot().unwrap(), GameState::new());
    // a second reset for the same round is ignored
    assert!(!session.reset_round(0).unwrap());
}

#[tokio::test]
async fn take_turn_full_board_is_draw() {
    let session = seated_session();
    let mut one = Seat::new();
    let mut two = Seat::new();

    let moves = [
        (Slot::One, 0),
        (Slot::Two, 1),
        (Slot::One, 2),
        (Slot::Two, 4),
        (Slot::One, 3),
        (Slot::Two, 5),
        (Slot::One, 7),
        (Slot::Two, 6),
    ];
    for (slot, index) in moves {
        let seat = if slot == Slot::One { &mut one } else { &mut two };
        assert_eq!(play(&session, slot, seat, index).await, TurnOutcome::Continue);
    }
    let TurnOutcome::Stop(last) = play(&session, Slot::One, &mut one, 8).await else {
        panic!("last free cell must end the round");
    };
    assert_eq!(last.status(), Status::Draw);
    assert!(last.board().iter().all(|cell| !cell.is_empty()));

    let outcome = session.take_turn(Slot::Two, &mut two.server).await.unwrap();
    assert_eq!(outcome, TurnOutcome::Stop(last));
    assert!(session.reset_round(0).unwrap());
    assert_eq!(session.snapshot().unwrap(), GameState::new());
}

#[tokio::test]
async fn take_turn_reprompts_on_invalid_move() {
    let session = seated_session();
    let mut one = Seat::new();
    let mut two = Seat::new();

    // out of range twice, then the center
    one.client.write_all(&[9, 255]).await.unwrap();
    let outcome = play(&session, Slot::One, &mut one, 4).await;
    assert_eq!(outcome, TurnOutcome::Continue);
    for _ in 0..3 {
        assert_eq!(read_snapshot(&mut one.client).await, GameState::new());
    }

    // occupied cell, then a corner
    two.client.write_all(&[4]).await.unwrap();
    let outcome = play(&session, Slot::Two, &mut two, 0).await;
    assert_eq!(outcome, TurnOutcome::Continue);
    for _ in 0..2 {
        let seen = read_snapshot(&mut two.client).await;
        assert_eq!(seen.board()[4], Cell::Player1);
        assert_eq!(marks(&seen, Cell::Player2), 0);
    }

    let game = session.snapshot().unwrap();
    assert_eq!(game.board()[0], Cell::Player2);
    assert_eq!(game.board()[4], Cell::Player1);
    assert_eq!(marks(&game, Cell::Empty), 7);
    assert_eq!(game.status(), Status::InProgress);
}

#[tokio::test]
async fn take_turn_waits_for_opponent_move() {
    let session = seated_session();
    let mut one = Seat::new();
    let mut two = Seat::new();

    assert_eq!(play(&session, Slot::One, &mut one, 0).await, TurnOutcome::Continue);

    // second move in a row is not granted
    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        session.take_turn(Slot::One, &mut one.server),
    )
    .await;
    assert!(blocked.is_err());
    assert_eq!(marks(&session.snapshot().unwrap(), Cell::Player1), 1);

    assert_eq!(play(&session, Slot::Two, &mut two, 8).await, TurnOutcome::Continue);
    assert_eq!(play(&session, Slot::One, &mut one, 1).await, TurnOutcome::Continue);
    let game = session.snapshot().unwrap();
    assert_eq!(marks(&game, Cell::Player1), 2);
    assert_eq!(marks(&game, Cell::Player2), 1);
}

#[tokio::test]
async fn disconnect_stops_waiting_opponent() {
    let session = seated_session();
    let mut one = Seat::new();
    let mut two = Seat::new();

    assert_eq!(play(&session, Slot::One, &mut one, 0).await, TurnOutcome::Continue);

    // player one waits for its next turn in the background
    let waiting = tokio::spawn({
        let session = session.clone();
        let mut server = one.server;
        async move { session.take_turn(Slot::One, &mut server).await }
    });

    drop(two.client);
    let err = session.take_turn(Slot::Two, &mut two.server).await.unwrap_err();
    assert!(err.is_disconnect());

    // woken right away, well before a few polling intervals have passed
    let outcome = tokio::time::timeout(5 * fast_timing().turn_interval, waiting)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let TurnOutcome::Stop(last) = outcome else {
        panic!("opponent must be stopped");
    };
    // the stopped player is away until it answers the rematch question
    assert_eq!(session.presence().unwrap(), 1);
    assert_eq!(last.status(), Status::Disconnected);
    assert_eq!(last.board()[0], Cell::Player1);

    assert!(session.reset_round(0).unwrap());
    assert_eq!(session.snapshot().unwrap(), GameState::new());
}

#[tokio::test]
async fn empty_opponent_slot_stops_turn() {
    let session = seated_session();
    let mut one = Seat::new();
    session.leave(Slot::Two).unwrap();

    let outcome = tokio::time::timeout(WAIT, session.take_turn(Slot::One, &mut one.server))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Stop(last) if last.status() == Status::Disconnected));
}

/// How a scripted client paces itself.
#[derive(Clone, Copy)]
struct Pace {
    /// Pause before reading each snapshot.
    read_delay: Duration,
    /// Pause between seeing a result and accepting the rematch.
    ack_delay: Duration,
    /// Buffer size of the client's duplex pipe.
    buffer: usize,
}

const FAST: Pace = Pace {
    read_delay: Duration::ZERO,
    ack_delay: Duration::ZERO,
    buffer: 256,
};

#[derive(Debug)]
struct Report {
    slot: u8,
    /// Final state of every round.
    results: Vec<GameState>,
    /// When the slot byte of each round arrived.
    seated_at: Vec<Instant>,
    /// When each rematch was accepted.
    accepted_at: Vec<Instant>,
}

/// Client that always picks the first free cell.
///
/// Plays `rounds` rounds, accepting a rematch between them, then hangs up. Panics if
/// one of its moves disappears from the board or if it is asked to move twice without
/// the opponent moving in between.
async fn first_free_cell_client(mut stream: DuplexStream, rounds: usize, pace: Pace) -> Report {
    let mut report = Report {
        slot: 0,
        results: Vec::new(),
        seated_at: Vec::new(),
        accepted_at: Vec::new(),
    };
    for round in 0..rounds {
        if round > 0 {
            tokio::time::sleep(pace.ack_delay).await;
            report.accepted_at.push(Instant::now());
            stream.write_all(&[1]).await.unwrap();
        }
        report.slot = loop {
            let byte = stream.read_u8().await.unwrap();
            if byte != KEEP_ALIVE {
                break byte;
            }
        };
        report.seated_at.push(Instant::now());

        let mark = if report.slot == 1 { Cell::Player1 } else { Cell::Player2 };
        let mut placed = Vec::new();
        let mut theirs_before = None;
        let last = loop {
            tokio::time::sleep(pace.read_delay).await;
            let seen = read_snapshot(&mut stream).await;
            for &index in &placed {
                assert_eq!(seen.board()[index], mark, "move at {} was lost", index);
            }
            if seen.status().is_terminal() {
                break seen;
            }
            let theirs = seen
                .board()
                .iter()
                .filter(|&&cell| !cell.is_empty() && cell != mark)
                .count();
            if let Some(before) = theirs_before {
                assert!(theirs > before, "asked to move twice in a row");
            }
            theirs_before = Some(theirs);
            let index = seen.board().iter().position(|cell| cell.is_empty()).unwrap();
            placed.push(index);
            stream.write_all(&[index as u8]).await.unwrap();
        };
        report.results.push(last);
    }
    report
}

async fn run_pair(session: Arc<Session>, rounds: usize, paces: [Pace; 2]) -> [Report; 2] {
    let mut handlers = Vec::new();
    let mut clients = Vec::new();
    for (slot, pace) in Slot::ALL.into_iter().zip(paces) {
        let seat = Seat::with_buffer(pace.buffer);
        handlers.push(tokio::spawn(
            ConnectionHandler::new(session.clone(), slot, seat.server).run(),
        ));
        clients.push(tokio::spawn(first_free_cell_client(seat.client, rounds, pace)));
    }

    let mut reports = Vec::new();
    for client in clients {
        reports.push(tokio::time::timeout(WAIT, client).await.unwrap().unwrap());
    }
    for handler in handlers {
        tokio::time::timeout(WAIT, handler).await.unwrap().unwrap();
    }
    let [one, two]: [Report; 2] = reports.try_into().unwrap();
    [one, two]
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handlers_play_a_full_round() {
    let session = seated_session();
    let [one, two] = run_pair(session.clone(), 1, [FAST, FAST]).await;

    assert_eq!((one.slot, two.slot), (1, 2));
    assert_eq!(one.results, two.results);
    let last = one.results[0];
    // first mover takes 0, 2, 4, 6 and wins on the anti-diagonal
    assert!(matches!(last.status(), Status::Player1Won | Status::Player2Won));
    let (x, o) = (marks(&last, Cell::Player1), marks(&last, Cell::Player2));
    assert_eq!(x + o, 7);
    assert!(x.abs_diff(o) == 1);

    // both handlers gave their slots back and cleaned the board
    assert_eq!(session.presence().unwrap(), 0);
    assert_eq!(session.snapshot().unwrap(), GameState::new());
    assert_eq!(session.round().unwrap(), 1);
    session.wait_for_free_slot().await.unwrap();
    assert_eq!(session.admit().unwrap(), Slot::One);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handlers_negotiate_rematch() {
    let session = seated_session();
    let [one, two] = run_pair(session.clone(), 2, [FAST, FAST]).await;

    assert_eq!(one.results.len(), 2);
    assert_eq!(one.results, two.results);
    for last in one.results {
        assert!(last.status().is_terminal());
        assert_ne!(last.status(), Status::Disconnected);
    }
    assert_eq!(session.presence().unwrap(), 0);
    assert_eq!(session.snapshot().unwrap(), GameState::new());
    // one reset per round
    assert_eq!(session.round().unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rematch_waits_for_slow_reader() {
    let session = seated_session();
    let quick = Pace {
        ack_delay: Duration::from_millis(10),
        ..FAST
    };
    // a one byte pipe keeps the handler blocked on every snapshot it sends
    let slow = Pace {
        read_delay: Duration::from_millis(100),
        buffer: 1,
        ..FAST
    };
    let [one, two] = run_pair(session.clone(), 2, [quick, slow]).await;

    assert_eq!(one.results, two.results);
    for last in &one.results {
        assert!(last.status().is_terminal());
        assert_ne!(last.status(), Status::Disconnected);
    }
    // nobody is seated for the second round before both have accepted
    assert!(one.accepted_at[0] < two.accepted_at[0]);
    assert!(one.seated_at[1] >= two.accepted_at[0]);
    assert!(two.seated_at[1] >= two.accepted_at[0]);

    assert_eq!(session.presence().unwrap(), 0);
    assert_eq!(session.snapshot().unwrap(), GameState::new());
    assert_eq!(session.round().unwrap(), 2);
}

#[tokio::test]
async fn lone_handler_sends_keep_alive() {
    let session = Arc::new(Session::with_timing(fast_timing()));
    let slot = session.admit().unwrap();
    let Seat { mut client, server } = Seat::new();
    let handler = tokio::spawn(ConnectionHandler::new(session.clone(), slot, server).run());

    for _ in 0..3 {
        assert_eq!(client.read_u8().await.unwrap(), KEEP_ALIVE);
    }
    drop(client);

    tokio::time::timeout(WAIT, handler).await.unwrap().unwrap();
    assert_eq!(session.presence().unwrap(), 0);
}

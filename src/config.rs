use std::time::Duration;

use clap::Parser;

/// Two-player tic-tac-toe over a raw TCP byte stream.
#[derive(Parser, Debug, Clone)]
#[command(name = "xo-server", version, about, long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "XO_ADDRESS", default_value = "localhost:8088")]
    pub address: String,

    /// Pause between keep-alive bytes while a player waits for an opponent
    #[arg(long, env = "XO_KEEPALIVE_MS", default_value_t = 1000)]
    pub keepalive_ms: u64,

    /// Pause between turns, also the longest a waiting player sleeps before
    /// re-checking the shared state
    #[arg(long, env = "XO_TURN_INTERVAL_MS", default_value_t = 100)]
    pub turn_interval_ms: u64,

    /// Upper bound of the random delay player 2 waits before its first turn
    #[arg(long, env = "XO_MAX_FIRST_MOVE_DELAY_MS", default_value_t = 700)]
    pub max_first_move_delay_ms: u64,

    /// How long a client may take to answer; 0 waits forever
    #[arg(long, env = "XO_READ_TIMEOUT_SECS", default_value_t = 300)]
    pub read_timeout_secs: u64,
}

impl Config {
    pub fn timing(&self) -> Timing {
        Timing {
            keepalive: Duration::from_millis(self.keepalive_ms),
            turn_interval: Duration::from_millis(self.turn_interval_ms),
            max_first_move_delay: Duration::from_millis(self.max_first_move_delay_ms),
            read_timeout: (self.read_timeout_secs > 0)
                .then(|| Duration::from_secs(self.read_timeout_secs)),
        }
    }
}

/// Pacing used by the session and its connection handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub keepalive: Duration,
    pub turn_interval: Duration,
    pub max_first_move_delay: Duration,
    pub read_timeout: Option<Duration>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(1),
            turn_interval: Duration::from_millis(100),
            max_first_move_delay: Duration::from_millis(700),
            read_timeout: Some(Duration::from_secs(300)),
        }
    }
}

//! Fixed-size messages exchanged with a client.
//!
//! Server to client: a keep-alive byte `0` while waiting for an opponent, the slot id
//! (`1` or `2`) when a round starts, and a ten byte snapshot (nine cells, then the
//! status code) before every move and once more when the round ends.
//!
//! Client to server: a single cell index `0..=8` per move, and any single byte to
//! accept a rematch.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::SessionError;
use super::{SessionResult, Slot};
use crate::core::GameState;

pub const KEEP_ALIVE: u8 = 0;

pub async fn send_keep_alive<W>(writer: &mut W) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    send_bytes(writer, &[KEEP_ALIVE]).await
}

pub async fn send_slot<W>(writer: &mut W, slot: Slot) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    send_bytes(writer, &[slot.id()]).await
}

pub async fn send_snapshot<W>(writer: &mut W, game: &GameState) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    send_bytes(writer, &game.to_bytes()).await
}

/// Reads one byte. With a deadline set, expiry is reported as
/// [`SessionError::ReadTimeout`] and treated by callers like a dropped connection.
pub async fn read_byte<R>(reader: &mut R, deadline: Option<Duration>) -> SessionResult<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(deadline) = deadline else {
        return Ok(reader.read_u8().await?);
    };
    match tokio::time::timeout(deadline, reader.read_u8()).await {
        Ok(byte) => Ok(byte?),
        Err(_) => Err(SessionError::ReadTimeout {
            secs: deadline.as_secs(),
        }),
    }
}

async fn send_bytes<W>(writer: &mut W, bytes: &[u8]) -> SessionResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Cell, Classic, Position};

    #[tokio::test]
    async fn test_snapshot_layout() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut game = GameState::new();
        game.place(Position::from_index(4).unwrap(), Cell::Player2, &Classic)
            .unwrap();

        send_keep_alive(&mut server).await.unwrap();
        send_slot(&mut server, Slot::Two).await.unwrap();
        send_snapshot(&mut server, &game).await.unwrap();

        let mut buf = [0u8; 12];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0, 2, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_read_byte() {
        let (mut client, mut server) = tokio::io::duplex(8);
        client.write_all(&[7]).await.unwrap();
        assert_eq!(read_byte(&mut server, None).await.unwrap(), 7);

        drop(client);
        let err = read_byte(&mut server, None).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_read_byte_deadline() {
        let (_client, mut server) = tokio::io::duplex(8);
        let err = read_byte(&mut server, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ReadTimeout { .. }));
        assert!(err.is_disconnect());
    }
}

//! One connected player.
//!
//! A session is two tasks sharing one TCP stream: the receive loop below,
//! which decodes `ClientInput` frames and applies them to the game, and a
//! writer task that drains the session's outbound queue onto the socket.
//! Whichever side stops first ends the other.

use crate::client_manager::{ClientManager, Frame};
use crate::game::Game;
use log::{debug, info, warn};
use pong_shared::codec;
use pong_shared::{ClientInput, NetError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub struct Session {
    pub id: u64,
    pub slot: u8,
    pub addr: SocketAddr,
    reader: OwnedReadHalf,
    game: Arc<Mutex<Game>>,
    clients: Arc<Mutex<ClientManager>>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    pub fn new(
        id: u64,
        slot: u8,
        addr: SocketAddr,
        reader: OwnedReadHalf,
        game: Arc<Mutex<Game>>,
        clients: Arc<Mutex<ClientManager>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            slot,
            addr,
            reader,
            game,
            clients,
            shutdown,
        }
    }

    /// Receives input until the peer goes away, the writer stops, or the
    /// server shuts down, then unregisters the player.
    pub async fn run(mut self, mut writer: JoinHandle<()>) {
        let mut writer_done = false;

        let outcome = if *self.shutdown.borrow() {
            Ok(())
        } else {
            loop {
                tokio::select! {
                    // Only cancelled when the whole session is ending, so a
                    // half-read frame is never resumed.
                    result = codec::read_message::<ClientInput, _>(&mut self.reader) => {
                        match result {
                            Ok(input) => self.game.lock().await.apply_input(self.slot, &input),
                            Err(e) => break Err(e),
                        }
                    }
                    _ = &mut writer => {
                        writer_done = true;
                        debug!("Writer for player {} finished first", self.slot);
                        break Ok(());
                    }
                    _ = self.shutdown.changed() => break Ok(()),
                }
            }
        };

        match outcome {
            Ok(()) => info!("Session for player {} ({}) stopped", self.slot, self.addr),
            Err(NetError::Closed) => info!("Player {} ({}) closed the connection", self.slot, self.addr),
            Err(e) if e.is_framing() => {
                warn!("Player {} ({}) sent a malformed frame: {}", self.slot, self.addr, e)
            }
            Err(e) => warn!("Player {} ({}) dropped: {}", self.slot, self.addr, e),
        }

        {
            let mut clients = self.clients.lock().await;
            unregister(&mut clients, &self.game, self.slot, self.id).await;
        }

        // Unregistering closed the outbound queue, so the writer exits on
        // its own and shuts down the socket.
        if !writer_done {
            if let Err(e) = writer.await {
                warn!("Writer for player {} panicked: {}", self.slot, e);
            }
        }
    }
}

/// Spawns the task that owns the write half of a player's socket.
///
/// Every write is bounded by `write_timeout`. A failed or timed out write
/// ends the task, which in turn ends the session. In the server `W` is the
/// socket's `OwnedWriteHalf`.
pub fn spawn_writer<W>(
    slot: u8,
    mut writer: W,
    mut outbound: mpsc::Receiver<Frame>,
    write_timeout: Duration,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match timeout(write_timeout, codec::write_frame(&mut writer, &frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Write to player {} failed: {}", slot, e);
                    break;
                }
                Err(_) => {
                    warn!("Write to player {} timed out after {:?}", slot, write_timeout);
                    break;
                }
            }
        }

        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of player {} socket failed: {}", slot, e);
        }
    })
}

/// Removes connection `client_id` from `slot` and abandons the match.
///
/// The caller must already hold the roster lock; the game lock is taken
/// second. Returns false if that connection was already gone.
pub(crate) async fn unregister(
    clients: &mut ClientManager,
    game: &Mutex<Game>,
    slot: u8,
    client_id: u64,
) -> bool {
    if !clients.remove_client(slot, client_id) {
        return false;
    }
    game.lock().await.player_disconnected(slot);
    true
}

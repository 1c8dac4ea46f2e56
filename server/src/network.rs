//! Server network layer: TCP acceptor, simulation loop and state broadcasts

use crate::client_manager::{ClientManager, Frame};
use crate::config::ServerConfig;
use crate::game::Game;
use crate::session::{self, Session};
use log::{debug, error, info, trace, warn};
use pong_shared::codec;
use pong_shared::{Handshake, NetError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Frames a session may have waiting before broadcasts to it are dropped.
pub const OUTBOUND_QUEUE: usize = 8;

/// Requests an orderly stop of a running [`Server`].
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Signals every task of the server to stop.
    ///
    /// The acceptor stops taking connections, the tick loops exit, and each
    /// session unregisters its player. Calling this more than once, or after
    /// the server has already stopped, does nothing.
    pub fn shutdown(&self) {
        if self.tx.send(true).is_err() {
            debug!("Shutdown requested after the server already stopped");
        }
    }
}

/// Authoritative match server.
///
/// `run` drives three kinds of task: the acceptor on the calling task, one
/// simulation loop and one broadcast loop on fixed intervals, and a session
/// per connected player. All of them share the game behind one mutex and
/// the roster behind another, always locked roster first.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    game: Arc<Mutex<Game>>,
    clients: Arc<Mutex<ClientManager>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds the listening socket. Failing to bind is the only fatal error.
    pub async fn new(config: ServerConfig) -> Result<Self, NetError> {
        Self::with_game(config, Game::new()).await
    }

    /// Binds the listening socket and serves `game` instead of a fresh one.
    ///
    /// Tests use this to inject a game with a deterministic serve. The game
    /// should be in `AwaitingConnection`, as players have not joined yet.
    pub async fn with_game(config: ServerConfig, game: Game) -> Result<Self, NetError> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Server {
            listener,
            config,
            game: Arc::new(Mutex::new(game)),
            clients: Arc::new(Mutex::new(ClientManager::new())),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Address actually bound, which resolves port 0 to the chosen port.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the match.
    ///
    /// Take the roster lock first if both are needed.
    pub fn game(&self) -> Arc<Mutex<Game>> {
        Arc::clone(&self.game)
    }

    /// Shared handle to the player roster.
    pub fn clients(&self) -> Arc<Mutex<ClientManager>> {
        Arc::clone(&self.clients)
    }

    /// Returns a handle that stops the server once `run` is in progress.
    ///
    /// Handles stay valid after the server is moved into `run`.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Spawns the task that advances the match once per tick
    fn spawn_simulation_loop(&self) -> JoinHandle<()> {
        let game = Arc::clone(&self.game);
        let mut shutdown = self.shutdown_rx.clone();
        let tick_duration = self.config.tick_duration();

        tokio::spawn(async move {
            let mut ticker = interval(tick_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        let events = game.lock().await.step();
                        if events.wall_bounce {
                            trace!("Ball bounced off a wall");
                        }
                        if let Some(slot) = events.scored {
                            debug!("Goal for player {}", slot);
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Simulation loop stopped");
        })
    }

    /// Spawns the task that pushes snapshots to both players
    fn spawn_broadcast_loop(&self) -> JoinHandle<()> {
        let game = Arc::clone(&self.game);
        let clients = Arc::clone(&self.clients);
        let mut shutdown = self.shutdown_rx.clone();
        let broadcast_duration = self.config.broadcast_duration();

        tokio::spawn(async move {
            let mut ticker = interval(broadcast_duration);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while !*shutdown.borrow() {
                tokio::select! {
                    _ = ticker.tick() => broadcast_state(&clients, &game).await,
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Broadcast loop stopped");
        })
    }

    /// Registers a new connection, sends its handshake and starts its session.
    ///
    /// A refused or failed connection is dropped here, which closes it.
    async fn accept_client(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<JoinHandle<()>, NetError> {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Frame>(OUTBOUND_QUEUE);

        let (client_id, slot) = {
            let mut clients = self.clients.lock().await;
            let registered = clients.add_client(addr, outbound_tx)?;
            if clients.is_full() {
                self.game.lock().await.players_connected();
            }
            registered
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", addr, e);
        }
        let (reader, mut writer) = stream.into_split();

        // Snapshots queued meanwhile wait behind the handshake, because the
        // writer task only starts once it is on the wire.
        let handshake = Handshake { slot };
        let sent = match timeout(
            self.config.write_timeout,
            codec::write_message(&mut writer, &handshake),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NetError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "handshake write timed out",
            ))),
        };
        if let Err(e) = sent {
            let mut clients = self.clients.lock().await;
            session::unregister(&mut clients, &self.game, slot, client_id).await;
            return Err(e);
        }

        let writer = session::spawn_writer(slot, writer, outbound_rx, self.config.write_timeout);
        let session = Session::new(
            client_id,
            slot,
            addr,
            reader,
            Arc::clone(&self.game),
            Arc::clone(&self.clients),
            self.shutdown_rx.clone(),
        );

        Ok(tokio::spawn(session.run(writer)))
    }

    /// Accepts players until shutdown is requested, then stops every task.
    pub async fn run(self) -> Result<(), NetError> {
        let simulation = self.spawn_simulation_loop();
        let broadcast = self.spawn_broadcast_loop();
        let mut sessions: Vec<JoinHandle<()>> = Vec::new();
        let mut shutdown = self.shutdown_rx.clone();

        info!("Server started successfully");

        while !*shutdown.borrow() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => match self.accept_client(stream, addr).await {
                        Ok(session) => sessions.push(session),
                        Err(NetError::Capacity(players)) => {
                            warn!("Refused {}: {} players already connected", addr, players);
                        }
                        Err(e) => warn!("Failed to set up connection from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = shutdown.changed() => break,
            }

            sessions.retain(|session| !session.is_finished());
        }

        info!("Server shutting down");
        drop(self.listener);

        let removed = self.clients.lock().await.clear();
        debug!("Closed {} player connections", removed);

        for handle in [simulation, broadcast].into_iter().chain(sessions) {
            if let Err(e) = handle.await {
                error!("Server task panicked: {}", e);
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Sends one snapshot to every player, dropping players whose writer is gone.
/// Nothing is sent until both players are connected.
async fn broadcast_state(clients: &Mutex<ClientManager>, game: &Mutex<Game>) {
    let mut clients = clients.lock().await;
    if !clients.is_full() {
        return;
    }

    let snapshot = game.lock().await.snapshot();
    let frame: Frame = match codec::encode(&snapshot) {
        Ok(bytes) => Arc::new(bytes),
        Err(e) => {
            error!("Failed to encode match state: {}", e);
            return;
        }
    };

    for (slot, client_id) in clients.broadcast(&frame) {
        if session::unregister(&mut clients, game, slot, client_id).await {
            warn!("Dropped player {}: connection writer closed", slot);
        }
    }
}

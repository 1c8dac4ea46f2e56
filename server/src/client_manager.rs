//! Player roster for the match server
//!
//! Tracks which of the two player slots are occupied and by which
//! connection. Each entry carries the sending end of that session's
//! outbound frame queue, so dropping an entry also closes the session's
//! writer and, through it, the session itself.

use log::{debug, info};
use pong_shared::{NetError, PLAYER_COUNT};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// An encoded frame shared between every recipient of a broadcast.
pub type Frame = Arc<Vec<u8>>;

/// A registered player connection.
#[derive(Debug)]
pub struct Client {
    /// Unique per connection, so a stale session cannot evict the next
    /// occupant of its slot
    pub id: u64,
    /// Player slot, 0 (left paddle) or 1 (right paddle)
    pub slot: u8,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: mpsc::Sender<Frame>,
}

impl Client {
    /// Creates a client record stamped with the current time.
    ///
    /// `outbound` is the sending end of the queue drained by the session's
    /// writer task.
    pub fn new(id: u64, slot: u8, addr: SocketAddr, outbound: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            slot,
            addr,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Queues a frame for this client's writer without waiting.
    ///
    /// A full queue drops the frame and returns true: the writer is still
    /// alive and its own write timeout decides whether the client is too
    /// slow. Returns false only once the writer has gone away.
    pub fn queue_frame(&self, frame: Frame) -> bool {
        match self.outbound.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full for player {}, dropping frame", self.slot);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Slot-keyed registry of live player connections.
pub struct ClientManager {
    slots: [Option<Client>; PLAYER_COUNT],
    next_client_id: u64,
}

impl ClientManager {
    /// Creates an empty roster. Connection ids start at 1.
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            next_client_id: 1,
        }
    }

    /// Registers a connection in the lowest free slot.
    ///
    /// Returns the connection id and slot, or `NetError::Capacity` when both
    /// slots are taken. A refused connection leaves the roster untouched.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::Sender<Frame>,
    ) -> Result<(u64, u8), NetError> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(NetError::Capacity(PLAYER_COUNT))?;

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let slot = slot as u8;
        info!("Player {} connected from {} (connection {})", slot, addr, client_id);
        self.slots[slot as usize] = Some(Client::new(client_id, slot, addr, outbound));

        Ok((client_id, slot))
    }

    /// Removes the client in `slot` if it is still connection `client_id`.
    ///
    /// Returns true if something was removed. Removal drops the client's
    /// outbound queue, which shuts its writer down.
    pub fn remove_client(&mut self, slot: u8, client_id: u64) -> bool {
        let Some(entry) = self.slots.get_mut(slot as usize) else {
            return false;
        };

        if !entry.as_ref().is_some_and(|client| client.id == client_id) {
            return false;
        }

        if let Some(client) = entry.take() {
            info!(
                "Player {} disconnected after {:.1}s",
                slot,
                client.connected_at.elapsed().as_secs_f32()
            );
        }
        true
    }

    /// Returns the client in `slot`, if that slot is occupied.
    pub fn get(&self, slot: u8) -> Option<&Client> {
        self.slots.get(slot as usize).and_then(Option::as_ref)
    }

    /// Queues `frame` to every client and returns the `(slot, id)` of each
    /// client whose writer has gone away.
    pub fn broadcast(&self, frame: &Frame) -> Vec<(u8, u64)> {
        self.slots
            .iter()
            .flatten()
            .filter(|client| !client.queue_frame(Arc::clone(frame)))
            .map(|client| (client.slot, client.id))
            .collect()
    }

    /// Drops every client, closing all writers. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.len();
        self.slots = [None, None];
        removed
    }

    /// Number of occupied slots, from 0 to 2.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once both players are connected. Broadcasts only happen then.
    pub fn is_full(&self) -> bool {
        self.len() == PLAYER_COUNT
    }
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn outbound() -> (mpsc::Sender<Frame>, mpsc::Receiver<Frame>) {
        mpsc::channel(4)
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new();
        assert!(manager.is_empty());
        assert!(!manager.is_full());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_slots_assigned_in_order() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();

        let (id1, slot1) = manager.add_client(test_addr(), tx1).unwrap();
        let (id2, slot2) = manager.add_client(test_addr2(), tx2).unwrap();

        assert_eq!(slot1, 0);
        assert_eq!(slot2, 1);
        assert_ne!(id1, id2);
        assert!(manager.is_full());
        assert_eq!(manager.get(1).unwrap().addr, test_addr2());
    }

    #[test]
    fn test_third_client_refused() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();
        let (tx3, _rx3) = outbound();

        manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        let result = manager.add_client("127.0.0.1:8082".parse().unwrap(), tx3);
        assert!(matches!(result, Err(NetError::Capacity(2))));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();
        let (tx3, _rx3) = outbound();

        let (id1, _) = manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        assert!(manager.remove_client(0, id1));
        let (id3, slot3) = manager.add_client(test_addr(), tx3).unwrap();

        assert_eq!(slot3, 0);
        assert!(id3 > id1);
    }

    #[test]
    fn test_stale_removal_is_ignored() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();

        let (id1, slot) = manager.add_client(test_addr(), tx1).unwrap();
        assert!(manager.remove_client(slot, id1));
        let (id2, _) = manager.add_client(test_addr2(), tx2).unwrap();

        // The first connection's cleanup must not evict the new occupant.
        assert!(!manager.remove_client(slot, id1));
        assert_eq!(manager.get(slot).unwrap().id, id2);
        assert!(!manager.remove_client(7, id2));
    }

    #[test]
    fn test_removal_closes_outbound_queue() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = outbound();

        let (id, slot) = manager.add_client(test_addr(), tx).unwrap();
        manager.remove_client(slot, id);

        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_broadcast_reaches_every_client() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = outbound();
        let (tx2, mut rx2) = outbound();
        manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        let frame: Frame = Arc::new(vec![0, 0, 0, 1, 9]);
        let dead = manager.broadcast(&frame);

        assert!(dead.is_empty());
        assert_eq!(*rx1.try_recv().unwrap(), vec![0, 0, 0, 1, 9]);
        assert_eq!(*rx2.try_recv().unwrap(), vec![0, 0, 0, 1, 9]);
    }

    #[test]
    fn test_broadcast_reports_closed_writers() {
        let mut manager = ClientManager::new();
        let (tx1, rx1) = outbound();
        let (tx2, _rx2) = outbound();
        let (id1, _) = manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        drop(rx1);
        let dead = manager.broadcast(&Arc::new(vec![1]));

        assert_eq!(dead, vec![(0, id1)]);
    }

    #[test]
    fn test_full_queue_drops_frame_but_keeps_client() {
        let mut manager = ClientManager::new();
        let (tx, mut rx) = mpsc::channel(1);
        manager.add_client(test_addr(), tx).unwrap();

        assert!(manager.broadcast(&Arc::new(vec![1])).is_empty());
        assert!(manager.broadcast(&Arc::new(vec![2])).is_empty());

        assert_eq!(*rx.try_recv().unwrap(), vec![1]);
        assert!(rx.try_recv().is_err());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut manager = ClientManager::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();
        manager.add_client(test_addr(), tx1).unwrap();
        manager.add_client(test_addr2(), tx2).unwrap();

        assert_eq!(manager.clear(), 2);
        assert!(manager.is_empty());
    }
}

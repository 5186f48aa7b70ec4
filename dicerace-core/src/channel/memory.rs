//! In-process transport: one unbounded queue per direction.

use super::{Arrival, ArrivalSource, ParticipantChannel, Request, Response};
use crate::error::{DiceError, Result};
use crate::types::SlotId;
use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

/// Session side of an in-memory participant connection.
pub struct MemoryChannel {
    slot: Option<SlotId>,
    inbound: UnboundedReceiver<String>,
    outbound: UnboundedSender<String>,
}

impl MemoryChannel {
    fn fault(&self, reason: &str) -> DiceError {
        DiceError::channel_fault(self.slot.unwrap_or(SlotId::MAX), reason)
    }
}

#[async_trait]
impl ParticipantChannel for MemoryChannel {
    async fn recv(&mut self) -> Result<Request> {
        match self.inbound.recv().await {
            Some(raw) => Ok(Request::parse(&raw)),
            None => Err(self.fault("participant hung up")),
        }
    }

    async fn send(&mut self, response: Response) -> Result<()> {
        self.outbound
            .send(response.to_string())
            .map_err(|_| self.fault("participant hung up"))
    }

    fn bind(&mut self, slot: SlotId) {
        self.slot = Some(slot);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatReply {
    Seated(SlotId),
    Rejected(String),
}

/// Participant side of an in-memory connection.
pub struct ParticipantHandle {
    name: String,
    slot: Option<SlotId>,
    to_session: UnboundedSender<String>,
    from_session: UnboundedReceiver<String>,
}

impl ParticipantHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    async fn next_response(&mut self) -> Result<Response> {
        let slot = self.slot.unwrap_or(SlotId::MAX);
        let raw = self
            .from_session
            .recv()
            .await
            .ok_or_else(|| DiceError::channel_fault(slot, "session closed the channel"))?;
        Response::parse(&raw)
            .ok_or_else(|| DiceError::channel_fault(slot, format!("unexpected reply '{}'", raw)))
    }

    /// Wait for the admission verdict.
    pub async fn await_seat(&mut self) -> Result<SeatReply> {
        match self.next_response().await? {
            Response::Seated(slot) => {
                self.slot = Some(slot);
                Ok(SeatReply::Seated(slot))
            }
            Response::Rejected(reason) => Ok(SeatReply::Rejected(reason)),
            other => Err(DiceError::channel_fault(
                SlotId::MAX,
                format!("expected admission reply, got '{}'", other),
            )),
        }
    }

    /// One `ROLL` / `ROLLED n` exchange. Completes only once the session
    /// has served this participant's turn.
    pub async fn roll(&mut self) -> Result<u32> {
        self.send_raw(&Request::Roll.to_string())?;
        match self.next_response().await? {
            Response::Rolled(value) => Ok(value),
            other => Err(DiceError::channel_fault(
                self.slot.unwrap_or(SlotId::MAX),
                format!("expected roll result, got '{}'", other),
            )),
        }
    }

    pub fn send_raw(&self, raw: &str) -> Result<()> {
        self.to_session.send(raw.to_string()).map_err(|_| {
            DiceError::channel_fault(self.slot.unwrap_or(SlotId::MAX), "session closed the channel")
        })
    }
}

pub fn pair(name: &str) -> (MemoryChannel, ParticipantHandle) {
    let (to_session, inbound) = mpsc::unbounded_channel();
    let (outbound, from_session) = mpsc::unbounded_channel();

    (
        MemoryChannel {
            slot: None,
            inbound,
            outbound,
        },
        ParticipantHandle {
            name: name.to_string(),
            slot: None,
            to_session,
            from_session,
        },
    )
}

/// Entry point participants use to announce themselves.
#[derive(Clone)]
pub struct LobbyDoor {
    arrivals: UnboundedSender<Arrival>,
}

impl LobbyDoor {
    pub fn knock(&self, name: &str) -> Result<ParticipantHandle> {
        let (channel, handle) = pair(name);
        self.arrivals
            .send(Arrival {
                name: name.to_string(),
                channel: Box::new(channel),
            })
            .map_err(|_| DiceError::resource_unavailable("lobby is closed"))?;
        Ok(handle)
    }
}

pub struct MemoryArrivals {
    arrivals: UnboundedReceiver<Arrival>,
}

#[async_trait]
impl ArrivalSource for MemoryArrivals {
    async fn poll_arrivals(&mut self) -> Result<Vec<Arrival>> {
        let mut ready = Vec::new();
        loop {
            match self.arrivals.try_recv() {
                Ok(arrival) => ready.push(arrival),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(ready)
    }
}

pub fn lobby() -> (LobbyDoor, MemoryArrivals) {
    let (arrivals, rx) = mpsc::unbounded_channel();
    (LobbyDoor { arrivals }, MemoryArrivals { arrivals: rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roll_exchange() {
        let (mut channel, mut handle) = pair("Alice");
        channel.bind(0);

        let participant = tokio::spawn(async move { handle.roll().await });

        assert_eq!(channel.recv().await.unwrap(), Request::Roll);
        channel.send(Response::Rolled(5)).await.unwrap();
        assert_eq!(participant.await.unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn test_hangup_is_channel_fault() {
        let (mut channel, handle) = pair("Alice");
        channel.bind(2);
        drop(handle);

        match channel.recv().await {
            Err(DiceError::ChannelFault { slot, .. }) => assert_eq!(slot, 2),
            other => panic!("expected channel fault, got {:?}", other),
        }
        assert!(channel.send(Response::Rolled(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_lobby_delivers_arrivals_in_order() {
        let (door, mut arrivals) = lobby();
        let _alice = door.knock("Alice").unwrap();
        let _bob = door.knock("Bob").unwrap();

        let ready = arrivals.poll_arrivals().await.unwrap();
        let names: Vec<&str> = ready.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(arrivals.poll_arrivals().await.unwrap().is_empty());

        drop(arrivals);
        assert!(matches!(
            door.knock("Carol"),
            Err(DiceError::ResourceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_seat_reply() {
        let (mut channel, mut handle) = pair("Alice");
        channel.send(Response::Seated(3)).await.unwrap();
        assert_eq!(handle.await_seat().await.unwrap(), SeatReply::Seated(3));
        assert_eq!(handle.slot(), Some(3));

        let (mut channel, mut handle) = pair("Dave");
        channel
            .send(Response::Rejected("Game is full".to_string()))
            .await
            .unwrap();
        assert_eq!(
            handle.await_seat().await.unwrap(),
            SeatReply::Rejected("Game is full".to_string())
        );
    }
}

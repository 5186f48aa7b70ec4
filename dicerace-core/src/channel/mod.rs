//! Message channel between a session worker and its remote participant.

pub mod memory;

use crate::error::Result;
use crate::types::SlotId;
use async_trait::async_trait;
use std::fmt;

pub const ROLL: &str = "ROLL";
pub const ROLLED: &str = "ROLLED";
pub const SEATED: &str = "SEATED";
pub const REJECTED: &str = "REJECTED";

/// Participant → session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Roll,
    /// Any other tag. Reserved; the core ignores it.
    Other(String),
}

impl Request {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim_end_matches('\0').trim();
        match raw.split_whitespace().next() {
            Some(ROLL) => Request::Roll,
            _ => Request::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Roll => f.write_str(ROLL),
            Request::Other(raw) => f.write_str(raw),
        }
    }
}

/// Session → participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Rolled(u32),
    Seated(SlotId),
    Rejected(String),
}

impl Response {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches('\0').trim();
        let (tag, rest) = raw.split_once(' ').unwrap_or((raw, ""));
        match tag {
            ROLLED => rest.trim().parse().ok().map(Response::Rolled),
            SEATED => rest.trim().parse().ok().map(Response::Seated),
            REJECTED => Some(Response::Rejected(rest.trim().to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Rolled(value) => write!(f, "{} {}", ROLLED, value),
            Response::Seated(slot) => write!(f, "{} {}", SEATED, slot),
            Response::Rejected(reason) => write!(f, "{} {}", REJECTED, reason),
        }
    }
}

/// Duplex channel owned by one session worker.
///
/// `recv` must be cancel-safe: workers race it against turn changes and
/// drop the future when the turn moves on.
#[async_trait]
pub trait ParticipantChannel: Send {
    /// Wait for the next request. A closed or broken channel is a
    /// [`crate::DiceError::ChannelFault`].
    async fn recv(&mut self) -> Result<Request>;

    async fn send(&mut self, response: Response) -> Result<()>;

    /// Bind the channel to its seat so faults name the right slot.
    fn bind(&mut self, slot: SlotId);
}

/// A participant that is ready to be seated.
pub struct Arrival {
    pub name: String,
    pub channel: Box<dyn ParticipantChannel>,
}

impl fmt::Debug for Arrival {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arrival").field("name", &self.name).finish()
    }
}

/// Where the admission manager discovers new participants.
#[async_trait]
pub trait ArrivalSource: Send {
    /// Everything that arrived since the previous poll. Never blocks for
    /// long; an error means the source itself is unusable.
    async fn poll_arrivals(&mut self) -> Result<Vec<Arrival>>;
}

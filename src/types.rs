//! Basic type definitions for the relay server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: counter-based process-unique connection identifier
//! - `RoomCode`: 4-letter uppercase room code
//!
//! Neither type is a secret. Ids and codes are guessable and must never be
//! used as access tokens.

use rand::Rng;

/// Number of letters in a room code
pub const ROOM_CODE_LEN: usize = 4;

/// Unique client identifier (newtype pattern)
///
/// Allocated from a monotonically increasing counter, so no two live
/// connections ever share an id. Rendered as `p<n>` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Hands out `ClientId`s in increasing order, starting at `p1`
#[derive(Debug)]
pub struct ClientIdAllocator {
    next: u64,
}

impl ClientIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id
    pub fn allocate(&mut self) -> ClientId {
        let id = ClientId(self.next);
        self.next += 1;
        id
    }
}

impl Default for ClientIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Room code (4 uppercase ASCII letters)
///
/// Used to identify and join rooms.
/// Generated randomly or parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Generate a new random 4-letter room code
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let code: String = (0..ROOM_CODE_LEN)
            .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
            .collect();
        Self(code)
    }

    /// Parse a room code from user input (converts to uppercase)
    ///
    /// Returns None unless the input is exactly 4 ASCII letters.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == ROOM_CODE_LEN && code.bytes().all(|b| b.is_ascii_alphabetic()) {
            Some(Self(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the code is 4 uppercase ASCII letters
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == ROOM_CODE_LEN && self.0.bytes().all(|b| b.is_ascii_uppercase())
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

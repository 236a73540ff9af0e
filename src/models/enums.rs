use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Movement tracking flag stored on a member record.
///
/// Serialized as its integer value so clients see `0` / `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MovingState {
    #[default]
    Stopped = 0,
    Moving = 1,
}

impl MovingState {
    pub fn as_flag(self) -> i32 {
        self as i32
    }
}

impl From<MovingState> for i32 {
    fn from(state: MovingState) -> Self {
        state.as_flag()
    }
}

impl TryFrom<i32> for MovingState {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MovingState::Stopped),
            1 => Ok(MovingState::Moving),
            _ => Err(format!("Invalid moving state flag: {}", value)),
        }
    }
}

impl fmt::Display for MovingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovingState::Stopped => write!(f, "stopped"),
            MovingState::Moving => write!(f, "moving"),
        }
    }
}

impl FromStr for MovingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stopped" | "0" => Ok(MovingState::Stopped),
            "moving" | "1" => Ok(MovingState::Moving),
            _ => Err(format!("Invalid moving state: {}", s)),
        }
    }
}

/// Persistence backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    DynamoDb,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::DynamoDb => write!(f, "dynamodb"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dynamodb" => Ok(StorageBackend::DynamoDb),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

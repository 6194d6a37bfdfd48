use std::fmt;
use std::str::FromStr;

use crate::constants::{ERROR_COUNT_KEY, LAST_OPERATION_KEY};
use crate::meta::ObjectMeta;

const IN_QUEUE: &str = "in_queue";
const UPDATE: &str = "update";
const DELETE: &str = "delete";
const IN_PROGRESS: &str = "in progress";
const SUCCEEDED: &str = "succeeded";
const FAILED: &str = "failed";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown state: {0:?}")]
pub struct UnknownState(pub String);

/// life cycle state of a service instance.
/// Encoded on the wire as `status.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    InQueue,
    Update,
    Delete,
    InProgress,
    Succeeded,
    Failed,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InQueue => IN_QUEUE,
            Self::Update => UPDATE,
            Self::Delete => DELETE,
            Self::InProgress => IN_PROGRESS,
            Self::Succeeded => SUCCEEDED,
            Self::Failed => FAILED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// request waiting to be picked up
    pub fn is_pending(&self) -> bool {
        self.operation().is_some()
    }

    /// operation carried by a pending state
    pub fn operation(&self) -> Option<LastOperation> {
        match self {
            Self::InQueue => Some(LastOperation::InQueue),
            Self::Update => Some(LastOperation::Update),
            Self::Delete => Some(LastOperation::Delete),
            _ => None,
        }
    }
}

impl FromStr for InstanceState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            IN_QUEUE => Ok(Self::InQueue),
            UPDATE => Ok(Self::Update),
            DELETE => Ok(Self::Delete),
            IN_PROGRESS => Ok(Self::InProgress),
            SUCCEEDED => Ok(Self::Succeeded),
            FAILED => Ok(Self::Failed),
            other => Err(UnknownState(other.to_owned())),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// pending operation recorded in the `lastOperation` label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LastOperation {
    InQueue,
    Update,
    Delete,
}

impl LastOperation {
    /// absent label is an operation still in queue
    pub fn from_meta(meta: &ObjectMeta) -> Result<Self, UnknownState> {
        match meta.label(LAST_OPERATION_KEY) {
            Some(value) => value.parse(),
            None => Ok(Self::InQueue),
        }
    }

    pub fn write(&self, meta: &mut ObjectMeta) {
        meta.set_label(LAST_OPERATION_KEY, self.as_str());
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InQueue => IN_QUEUE,
            Self::Update => UPDATE,
            Self::Delete => DELETE,
        }
    }
}

impl FromStr for LastOperation {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            IN_QUEUE => Ok(Self::InQueue),
            UPDATE => Ok(Self::Update),
            DELETE => Ok(Self::Delete),
            other => Err(UnknownState(other.to_owned())),
        }
    }
}

impl fmt::Display for LastOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// consecutive failed passes, kept in the `errorCount` label
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ErrorCount(pub u32);

impl ErrorCount {
    /// absent or malformed label counts as zero
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self(
            meta.label(ERROR_COUNT_KEY)
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
        )
    }

    pub fn write(&self, meta: &mut ObjectMeta) {
        meta.set_label(ERROR_COUNT_KEY, self.0.to_string());
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_state_wire_strings() {
        for state in [
            InstanceState::InQueue,
            InstanceState::Update,
            InstanceState::Delete,
            InstanceState::InProgress,
            InstanceState::Succeeded,
            InstanceState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<InstanceState>(), Ok(state));
        }
        assert_eq!(InstanceState::InProgress.to_string(), "in progress");
        assert!("in_progress".parse::<InstanceState>().is_err());
        assert!("".parse::<InstanceState>().is_err());
    }

    #[test]
    fn test_pending_and_terminal() {
        assert!(InstanceState::Delete.is_pending());
        assert!(!InstanceState::InProgress.is_pending());
        assert!(InstanceState::Failed.is_terminal());
        assert_eq!(InstanceState::Update.operation(), Some(LastOperation::Update));
    }

    #[test]
    fn test_missing_last_operation_is_in_queue() {
        let mut meta = ObjectMeta::named("i1");
        assert_eq!(LastOperation::from_meta(&meta), Ok(LastOperation::InQueue));
        LastOperation::Delete.write(&mut meta);
        assert_eq!(meta.label("lastOperation"), Some("delete"));
        assert_eq!(LastOperation::from_meta(&meta), Ok(LastOperation::Delete));
    }

    #[test]
    fn test_error_count_label() {
        let mut meta = ObjectMeta::named("i1");
        assert!(ErrorCount::from_meta(&meta).is_zero());
        meta.set_label("errorCount", "abc");
        assert!(ErrorCount::from_meta(&meta).is_zero());
        ErrorCount(3).increment().write(&mut meta);
        assert_eq!(meta.label("errorCount"), Some("4"));
        assert_eq!(ErrorCount::from_meta(&meta), ErrorCount(4));
    }
}

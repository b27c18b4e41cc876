use thiserror::Error;

use crate::host::BridgeError;

#[derive(Debug, Error)]
pub enum DomError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("{feature} is not supported")]
    NotSupported { feature: &'static str },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("listener failed: {0}")]
    Listener(#[source] anyhow::Error),
}

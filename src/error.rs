use thiserror::Error;

use crate::core::{InstanceId, RendererKind};

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("invalid group: {0}")]
    InvalidGroup(String),

    #[error("instance {0} is disposed")]
    DisposedInstance(InstanceId),

    #[error("instance {0} is not connected to any group")]
    EmptyGroup(InstanceId),

    #[error(
        "mixed renderer kinds: export requested {requested:?} but instance {instance} renders {found:?}"
    )]
    MixedRenderer {
        requested: RendererKind,
        instance: InstanceId,
        found: RendererKind,
    },

    #[error("peer {peer} failed to apply action (generation {generation}): {source}")]
    PeerDispatch {
        peer: InstanceId,
        generation: u64,
        #[source]
        source: Box<ChartError>,
    },

    #[error("instance {instance} cannot export {requested:?} output")]
    UnsupportedEncoding {
        requested: RendererKind,
        instance: InstanceId,
    },

    #[error("instance {0} is already borrowed")]
    InstanceBusy(InstanceId),

    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("encoding failed: {0}")]
    Encode(String),
}

impl ChartError {
    /// Structural errors abort the triggering operation entirely.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidGroup(_)
                | Self::DisposedInstance(_)
                | Self::EmptyGroup(_)
                | Self::MixedRenderer { .. }
        )
    }
}

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::{ActionRecord, InstanceHandle, InstanceId, Propagation};
use crate::error::{ChartError, ChartResult};

use super::GroupRegistry;

/// Receives non-fatal peer failures raised during a broadcast.
pub trait DiagnosticsSink {
    /// `error` is always a `ChartError::PeerDispatch`.
    fn report_peer_failure(&mut self, origin: InstanceId, error: &ChartError);
}

/// Sink that only relies on the `warn!` emitted by the broadcaster itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report_peer_failure(&mut self, _origin: InstanceId, _error: &ChartError) {}
}

/// Outcome of one dispatch.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub generation: u64,
    /// Peers that applied the replay, in replay order.
    pub applied: Vec<InstanceId>,
    /// Peers that were disposed before their turn came.
    pub skipped: Vec<InstanceId>,
    /// `ChartError::PeerDispatch` per failed peer.
    pub failures: Vec<ChartError>,
}

impl DispatchReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            generation: self.generation,
            applied: self.applied.len(),
            skipped: self.skipped.len(),
            failed: self.failures.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub generation: u64,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Mirrors actions from an origin instance onto its connected peers.
///
/// Replays are synchronous and depth-first: every peer has applied the
/// action before `dispatch` returns. Peers receive `Propagation::Connected`,
/// which is what stops them from broadcasting the replay again.
#[derive(Debug, Default)]
pub struct ActionBroadcaster {
    generation: u64,
}

impl ActionBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation stamped on the most recent dispatch.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dispatch(
        &mut self,
        registry: &mut GroupRegistry,
        origin: &InstanceHandle,
        mut action: ActionRecord,
        sink: &mut dyn DiagnosticsSink,
    ) -> ChartResult<DispatchReport> {
        if !origin.is_alive() {
            return Err(ChartError::DisposedInstance(origin.id()));
        }

        self.generation += 1;
        action.origin = Some(origin.id());
        action.generation = self.generation;

        origin.with_instance_mut(|instance| instance.apply_action(&action, Propagation::Origin))??;

        let mut report = DispatchReport {
            generation: self.generation,
            ..DispatchReport::default()
        };

        let peers = registry.members_of(origin.id());
        if peers.is_empty() {
            return Ok(report);
        }

        for peer in &peers {
            // Liveness is re-checked per peer: an earlier replay may dispose it.
            if !peer.is_alive() {
                trace!(peer = %peer.id(), "skipping peer disposed mid-broadcast");
                report.skipped.push(peer.id());
                continue;
            }
            trace!(
                origin = %origin.id(),
                peer = %peer.id(),
                generation = self.generation,
                kind = %action.kind,
                "replaying action on peer"
            );
            let outcome = peer
                .with_instance_mut(|instance| instance.apply_action(&action, Propagation::Connected))
                .and_then(|applied| applied);
            match outcome {
                Ok(()) => report.applied.push(peer.id()),
                Err(source) => {
                    let error = ChartError::PeerDispatch {
                        peer: peer.id(),
                        generation: self.generation,
                        source: Box::new(source),
                    };
                    warn!(origin = %origin.id(), error = %error, "peer dispatch failed");
                    sink.report_peer_failure(origin.id(), &error);
                    report.failures.push(error);
                }
            }
        }

        let pruned = registry.prune_dead();
        debug!(
            origin = %origin.id(),
            generation = self.generation,
            applied = report.applied.len(),
            failed = report.failures.len(),
            pruned = pruned.len(),
            "broadcast finished"
        );
        Ok(report)
    }
}

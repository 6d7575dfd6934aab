use std::cell::RefCell;
use std::rc::Rc;

use chart_connect::ChartError;
use chart_connect::api::{ActionBroadcaster, ChartConnector, DiagnosticsSink, GroupRegistry};
use chart_connect::core::{
    ActionKind, ActionRecord, ChartInstance, ContainerRect, InstanceId, Propagation, RendererKind,
};
use chart_connect::render::RasterImage;

/// Instance that records every action it receives.
#[derive(Default)]
struct Probe {
    received: Vec<(ActionRecord, Propagation)>,
    fail_with: Option<String>,
    /// Dropped on the first apply, which disposes that instance.
    victim: Option<Rc<RefCell<Probe>>>,
}

impl Probe {
    fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    fn failing(message: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            fail_with: Some(message.to_owned()),
            ..Self::default()
        }))
    }

    fn count(&self) -> usize {
        self.received.len()
    }
}

impl ChartInstance for Probe {
    fn renderer_kind(&self) -> RendererKind {
        RendererKind::Raster
    }

    fn container_rect(&self) -> ContainerRect {
        ContainerRect::new(0.0, 0.0, 10.0, 10.0)
    }

    fn apply_action(&mut self, action: &ActionRecord, propagation: Propagation) -> Result<(), ChartError> {
        self.victim.take();
        if let Some(message) = &self.fail_with {
            return Err(ChartError::InvalidData(message.clone()));
        }
        self.received.push((action.clone(), propagation));
        Ok(())
    }

    fn read_raster(&self, _pixel_ratio: f64) -> Result<RasterImage, ChartError> {
        Ok(RasterImage::new(10, 10))
    }

    fn read_vector_markup(&self) -> Result<String, ChartError> {
        Err(ChartError::InvalidData("raster only".to_owned()))
    }
}

#[derive(Default)]
struct CollectingSink {
    reports: Vec<(InstanceId, String)>,
}

impl DiagnosticsSink for CollectingSink {
    fn report_peer_failure(&mut self, origin: InstanceId, error: &ChartError) {
        self.reports.push((origin, error.to_string()));
    }
}

#[test]
fn every_peer_applies_exactly_once_with_connected_flag() {
    let mut connector = ChartConnector::new();
    let probes: Vec<_> = (0..4).map(|_| Probe::shared()).collect();
    let handles: Vec<_> = probes.iter().map(|probe| connector.register(probe)).collect();
    connector.connect(&handles).expect("connect");

    let report = connector
        .dispatch(&handles[1], ActionRecord::data_zoom(10.0, 60.0))
        .expect("dispatch");

    assert!(report.is_clean());
    assert_eq!(report.applied, vec![handles[0].id(), handles[2].id(), handles[3].id()]);
    for (index, probe) in probes.iter().enumerate() {
        let probe = probe.borrow();
        assert_eq!(probe.count(), 1, "instance {index}");
        let (record, propagation) = &probe.received[0];
        assert_eq!(record.kind, ActionKind::DataZoom);
        assert_eq!(record.origin, Some(handles[1].id()));
        assert_eq!(record.generation, report.generation);
        let expected = if index == 1 {
            Propagation::Origin
        } else {
            Propagation::Connected
        };
        assert_eq!(*propagation, expected);
    }
}

#[test]
fn ungrouped_dispatch_is_plain_local_apply() {
    let mut connector = ChartConnector::new();
    let (a, b) = (Probe::shared(), Probe::shared());
    let ha = connector.register(&a);
    let _hb = connector.register(&b);

    let report = connector
        .dispatch(&ha, ActionRecord::restore())
        .expect("dispatch");
    assert!(report.applied.is_empty());
    assert_eq!(a.borrow().count(), 1);
    assert_eq!(b.borrow().count(), 0);
}

#[test]
fn disconnected_instance_no_longer_receives_actions() {
    let mut connector = ChartConnector::new();
    let probes: Vec<_> = (0..3).map(|_| Probe::shared()).collect();
    let h: Vec<_> = probes.iter().map(|probe| connector.register(probe)).collect();
    connector.connect(&h).expect("connect");
    connector.disconnect(&h[0]);

    connector
        .dispatch(&h[1], ActionRecord::hide_tip())
        .expect("dispatch");
    assert_eq!(probes[0].borrow().count(), 0);
    assert_eq!(probes[2].borrow().count(), 1);
}

#[test]
fn failing_peer_does_not_block_the_rest() {
    let mut registry = GroupRegistry::new();
    let mut connector = ChartConnector::new();
    let origin = Probe::shared();
    let broken = Probe::failing("renderer lost");
    let healthy = Probe::shared();
    let handles = vec![
        connector.register(&origin),
        connector.register(&broken),
        connector.register(&healthy),
    ];
    registry.connect(&handles).expect("connect");

    let mut sink = CollectingSink::default();
    let mut broadcaster = ActionBroadcaster::new();
    let report = broadcaster
        .dispatch(&mut registry, &handles[0], ActionRecord::highlight(0, 3), &mut sink)
        .expect("origin applies");

    assert_eq!(report.applied, vec![handles[2].id()]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0],
        ChartError::PeerDispatch { peer, generation: 1, .. } if *peer == handles[1].id()
    ));
    assert_eq!(sink.reports.len(), 1);
    assert_eq!(sink.reports[0].0, handles[0].id());
    assert!(sink.reports[0].1.contains("renderer lost"));
    assert_eq!(origin.borrow().count(), 1);
    assert_eq!(healthy.borrow().count(), 1);
    assert_eq!(report.summary().failed, 1);
}

#[test]
fn origin_failure_aborts_before_fan_out() {
    let mut connector = ChartConnector::new();
    let origin = Probe::failing("bad params");
    let peer = Probe::shared();
    let handles = vec![connector.register(&origin), connector.register(&peer)];
    connector.connect(&handles).expect("connect");

    let err = connector
        .dispatch(&handles[0], ActionRecord::restore())
        .expect_err("origin fails");
    assert!(matches!(err, ChartError::InvalidData(_)));
    assert_eq!(peer.borrow().count(), 0);
}

#[test]
fn peer_disposed_mid_broadcast_is_skipped_and_pruned() {
    let mut connector = ChartConnector::new();
    let origin = Probe::shared();
    let dropper = Probe::shared();
    let victim = Probe::shared();
    let handles = vec![
        connector.register(&origin),
        connector.register(&dropper),
        connector.register(&victim),
    ];
    connector.connect(&handles).expect("connect");
    dropper.borrow_mut().victim = Some(victim);

    let report = connector
        .dispatch(&handles[0], ActionRecord::show_tip(4.0, 5.0))
        .expect("dispatch");

    assert_eq!(report.applied, vec![handles[1].id()]);
    assert_eq!(report.skipped, vec![handles[2].id()]);
    assert!(!handles[2].is_alive());
    assert_eq!(
        connector
            .members_of(&handles[0])
            .iter()
            .map(|handle| handle.id())
            .collect::<Vec<_>>(),
        vec![handles[1].id()]
    );
}

#[test]
fn dispatch_from_disposed_origin_fails() {
    let mut connector = ChartConnector::new();
    let (a, b) = (Probe::shared(), Probe::shared());
    let handles = vec![connector.register(&a), connector.register(&b)];
    connector.connect(&handles).expect("connect");
    connector.dispose(&handles[0]);

    let err = connector
        .dispatch(&handles[0], ActionRecord::restore())
        .expect_err("disposed");
    assert!(matches!(err, ChartError::DisposedInstance(id) if id == handles[0].id()));
    assert_eq!(a.borrow().count(), 0);
    assert_eq!(b.borrow().count(), 0);
}

#[test]
fn generations_increase_per_dispatch() {
    let mut connector = ChartConnector::new();
    let (a, b) = (Probe::shared(), Probe::shared());
    let handles = vec![connector.register(&a), connector.register(&b)];
    connector.connect(&handles).expect("connect");

    let first = connector
        .dispatch(&handles[0], ActionRecord::new("legendToggleSelect"))
        .expect("first");
    let second = connector
        .dispatch(&handles[1], ActionRecord::new("legendToggleSelect"))
        .expect("second");
    assert_eq!(second.generation, first.generation + 1);
    assert_eq!(a.borrow().count(), 2);
    assert_eq!(
        b.borrow().received[0].0.kind,
        ActionKind::Custom("legendToggleSelect".to_owned())
    );
}

use std::cell::RefCell;
use std::rc::Rc;

use chart_connect::api::{ChartConnector, SceneChart, SceneChartConfig};
use chart_connect::core::{ActionRecord, Viewport};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = chart_connect::telemetry::init_default_tracing();

    let mut connector = ChartConnector::new();
    let charts: Vec<_> = (0..3)
        .map(|i| {
            let config = SceneChartConfig::new(Viewport::new(320, 200)).at(f64::from(i) * 320.0, 0.0);
            SceneChart::new(config).map(|chart| Rc::new(RefCell::new(chart)))
        })
        .collect::<Result<_, _>>()?;
    let handles: Vec<_> = charts.iter().map(|chart| connector.register(chart)).collect();
    connector.connect(&handles)?;

    let report = connector.dispatch(&handles[0], ActionRecord::data_zoom(25.0, 75.0))?;
    println!("generation {} mirrored to {} peers", report.generation, report.applied.len());

    connector.disconnect(&handles[2]);
    connector.dispatch(&handles[1], ActionRecord::show_tip(120.0, 80.0))?;

    for (handle, chart) in handles.iter().zip(&charts) {
        let chart = chart.borrow();
        println!(
            "{}: zoom={:?} tooltip={:?} actions={}",
            handle.id(),
            chart.interaction().zoom(),
            chart.interaction().tooltip(),
            chart.apply_count()
        );
    }

    Ok(())
}

use std::cell::RefCell;
use std::rc::Rc;

use chart_connect::api::{ChartConnector, DataUrl, ExportOptions, SceneChart, SceneChartConfig};
use chart_connect::core::{RendererKind, Viewport};
use chart_connect::render::{Color, LinePrimitive, RenderFrame};

fn line_chart(x: f64, background: &str, phase: f64) -> Result<SceneChart, Box<dyn std::error::Error>> {
    let viewport = Viewport::new(400, 300);
    let config = SceneChartConfig::new(viewport)
        .at(x, 0.0)
        .with_renderer(RendererKind::Raster)
        .with_background(Color::parse_css(background)?);
    let mut chart = SceneChart::new(config)?;

    let mut frame = RenderFrame::new(viewport);
    let stroke = Color::rgb(1.0, 1.0, 1.0);
    let mut previous = (0.0, 150.0);
    for step in 1..=40 {
        let px = f64::from(step) * 10.0;
        let py = 150.0 + (px / 40.0 + phase).sin() * 90.0;
        frame.lines.push(LinePrimitive::new(previous.0, previous.1, px, py, 2.0, stroke));
        previous = (px, py);
    }
    chart.set_content(frame)?;
    Ok(chart)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = chart_connect::telemetry::init_default_tracing();

    let mut connector = ChartConnector::new();
    let left = Rc::new(RefCell::new(line_chart(0.0, "red", 0.0)?));
    let right = Rc::new(RefCell::new(line_chart(400.0, "green", 1.5)?));
    let handles = vec![connector.register(&left), connector.register(&right)];
    connector.connect(&handles)?;

    let options = ExportOptions::png().with_background_css("pink")?;
    let result = connector.export_connected(&handles[1], &options)?;
    println!("composite: {}x{} {}", result.width, result.height, result.mime_type);
    println!("data url prefix: {}", &result.data_url[..40.min(result.data_url.len())]);

    let path = std::env::temp_dir().join("chart-connect-composite.png");
    std::fs::write(&path, DataUrl::parse(&result.data_url)?.bytes)?;
    println!("wrote {}", path.display());

    Ok(())
}

use std::cell::RefCell;
use std::rc::Rc;

use chart_connect::ChartError;
use chart_connect::api::{
    ChartConnector, DataUrl, ExportOptions, ImageType, SceneChart, SceneChartConfig, SurfacePayload,
};
use chart_connect::core::{RendererKind, Viewport};
use chart_connect::render::{Color, RasterImage, RectPrimitive, RenderFrame};

fn chart(config: SceneChartConfig) -> Rc<RefCell<SceneChart>> {
    Rc::new(RefCell::new(SceneChart::new(config).expect("scene chart")))
}

fn decode(url: &str) -> RasterImage {
    let data = DataUrl::parse(url).expect("data url");
    RasterImage::decode(&data.bytes).expect("decodable image")
}

#[test]
fn raster_export_fills_unset_pixels_with_background() {
    let mut connector = ChartConnector::new();
    let viewport = Viewport::new(40, 20);
    let a = chart(SceneChartConfig::new(viewport).at(100.0, 50.0));
    a.borrow_mut()
        .set_content(RenderFrame::new(viewport).with_rect(RectPrimitive::new(
            0.0,
            0.0,
            10.0,
            10.0,
            Color::rgb(0.0, 0.0, 1.0),
        )))
        .expect("content");
    let handle = connector.register(&a);

    let options = ExportOptions::png()
        .with_background_css("red")
        .expect("css color");
    let url = connector.get_data_url(&handle, &options).expect("export");
    assert!(url.starts_with("data:image/png;base64,"));

    let image = decode(&url);
    assert_eq!((image.width(), image.height()), (40, 20));
    assert_eq!(image.pixel(5, 5), Some([0, 0, 255, 255]));
    assert_eq!(image.pixel(30, 15), Some([255, 0, 0, 255]));
}

#[test]
fn raster_export_without_background_stays_transparent() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(8, 8)));
    let handle = connector.register(&a);

    let url = connector
        .get_data_url(&handle, &ExportOptions::png())
        .expect("export");
    assert_eq!(decode(&url).pixel(3, 3), Some([0, 0, 0, 0]));
}

#[test]
fn instance_background_is_used_unless_overridden() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(8, 8)).with_background(Color::rgb(0.0, 1.0, 0.0)));
    let handle = connector.register(&a);

    let own = decode(&connector.get_data_url(&handle, &ExportOptions::png()).expect("own"));
    assert_eq!(own.pixel(0, 0), Some([0, 255, 0, 255]));

    let overridden = decode(
        &connector
            .get_data_url(&handle, &ExportOptions::png().with_background(Color::WHITE))
            .expect("override"),
    );
    assert_eq!(overridden.pixel(0, 0), Some([255, 255, 255, 255]));
}

#[test]
fn pixel_ratio_scales_raster_dimensions() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(30, 20)).at(7.0, 9.0));
    let handle = connector.register(&a);

    let surface = connector
        .export_surface(&handle, &ExportOptions::png().with_pixel_ratio(2.0))
        .expect("export");
    assert_eq!((surface.width, surface.height), (60, 40));
    assert_eq!((surface.offset_x, surface.offset_y), (0.0, 0.0));
    assert!(matches!(surface.payload, SurfacePayload::Raster(_)));
}

#[test]
fn vector_export_embeds_background_rect() {
    let mut connector = ChartConnector::new();
    let a = chart(
        SceneChartConfig::new(Viewport::new(120, 80)).with_renderer(RendererKind::Vector),
    );
    let handle = connector.register(&a);

    let options = ExportOptions::svg().with_background_css("#336699").expect("hex");
    let surface = connector.export_surface(&handle, &options).expect("surface");
    let SurfacePayload::Vector(markup) = &surface.payload else {
        panic!("expected vector payload");
    };
    assert!(markup.starts_with("<svg"));
    assert!(markup.contains(r##"<rect x="0" y="0" width="120" height="80" fill="#336699"/>"##));
    assert_eq!((surface.width, surface.height), (120, 80));

    let url = connector.get_data_url(&handle, &options).expect("url");
    assert!(url.starts_with("data:image/svg+xml;charset=UTF-8,%3Csvg"));
    let text = DataUrl::parse(&url).expect("parse");
    assert_eq!(text.text().expect("utf8"), markup);
}

#[test]
fn jpeg_export_flattens_over_white() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(16, 16)));
    let handle = connector.register(&a);

    let url = connector
        .get_data_url(&handle, &ExportOptions::new(ImageType::Jpeg))
        .expect("jpeg");
    assert!(url.starts_with("data:image/jpeg;base64,"));
    let [red, green, blue, alpha] = decode(&url).pixel(8, 8).expect("pixel");
    assert_eq!(alpha, 255);
    assert!(red > 245 && green > 245 && blue > 245);
}

#[test]
fn disposed_instance_cannot_export() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(8, 8)));
    let handle = connector.register(&a);
    connector.dispose(&handle);

    let err = connector
        .get_data_url(&handle, &ExportOptions::png())
        .expect_err("disposed");
    assert!(matches!(err, ChartError::DisposedInstance(id) if id == handle.id()));
}

#[test]
fn oversized_surface_is_rejected_before_reading_pixels() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(10, 10)));
    let handle = connector.register(&a);

    let err = connector
        .get_data_url(&handle, &ExportOptions::png().with_pixel_ratio(1.0e8))
        .expect_err("canvas too large");
    assert!(matches!(
        err,
        ChartError::InvalidViewport {
            width: 1_000_000_000,
            height: 1_000_000_000
        }
    ));
}

#[test]
fn invalid_options_are_rejected() {
    let mut connector = ChartConnector::new();
    let a = chart(SceneChartConfig::new(Viewport::new(8, 8)));
    let handle = connector.register(&a);

    let err = connector
        .get_data_url(&handle, &ExportOptions::png().with_pixel_ratio(0.0))
        .expect_err("zero pixel ratio");
    assert!(matches!(err, ChartError::InvalidData(_)));
    assert!(ExportOptions::png().with_background_css("not-a-color").is_err());
}

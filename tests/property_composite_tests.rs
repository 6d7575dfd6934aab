use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use chart_connect::api::{ChartConnector, ExportOptions, SceneChart, SceneChartConfig};
use chart_connect::core::{BoundingBox, ContainerRect, Viewport};
use proptest::prelude::*;

fn layout() -> impl Strategy<Value = Vec<(i16, i16, u16, u16)>> {
    prop::collection::vec((-200i16..200, -200i16..200, 1u16..64, 1u16..64), 2..5)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn composite_dimensions_match_member_bounding_box(rects in layout(), ratio in 1u8..4) {
        let mut connector = ChartConnector::new();
        let charts: Vec<_> = rects
            .iter()
            .map(|&(x, y, width, height)| {
                let config = SceneChartConfig::new(Viewport::new(u32::from(width), u32::from(height)))
                    .at(f64::from(x), f64::from(y));
                Rc::new(RefCell::new(SceneChart::new(config).expect("chart")))
            })
            .collect();
        let handles: Vec<_> = charts.iter().map(|chart| connector.register(chart)).collect();
        connector.connect(&handles).expect("connect");

        let bbox = BoundingBox::enclosing(rects.iter().map(|&(x, y, width, height)| {
            ContainerRect::new(f64::from(x), f64::from(y), f64::from(width), f64::from(height))
        }))
        .expect("non-empty");
        let pixel_ratio = f64::from(ratio);

        let raster = connector
            .export_connected(&handles[0], &ExportOptions::png().with_pixel_ratio(pixel_ratio))
            .expect("png");
        prop_assert_eq!(f64::from(raster.width), bbox.width() * pixel_ratio);
        prop_assert_eq!(f64::from(raster.height), bbox.height() * pixel_ratio);
    }

    #[test]
    fn offsets_are_relative_to_bounding_box_origin(x in -500.0f64..500.0, y in -500.0f64..500.0, dx in 0.0f64..300.0) {
        let a = ContainerRect::new(x, y, 100.0, 50.0);
        let b = ContainerRect::new(x + dx, y + 10.0, 100.0, 50.0);
        let bbox = BoundingBox::enclosing([a, b]).expect("non-empty");
        let (ax, ay) = bbox.offset_of(a);
        let (bx, by) = bbox.offset_of(b);
        assert_relative_eq!(ax, 0.0);
        assert_relative_eq!(ay, 0.0);
        assert_relative_eq!(bx, dx, epsilon = 1e-9);
        assert_relative_eq!(by, 10.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.width(), 100.0 + dx, epsilon = 1e-9);
    }
}

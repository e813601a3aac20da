//! Sessions spanning several views of the same item.

use proptest::prelude::*;

use crate::config::EditorConfig;
use crate::geometry::{Point, ViewDimensions};
use crate::session::EditingSession;
use crate::shape::{Features, ShapeGeometry, ShapeType};

fn two_views() -> EditingSession {
    EditingSession::open(
        "item",
        [
            ("rgb", ViewDimensions::new(400, 300)),
            ("depth", ViewDimensions::new(200, 150)),
        ],
        EditorConfig::default(),
    )
}

#[test]
fn test_zoom_keeps_stored_geometry() {
    let mut session = two_views();
    session.start_shape(ShapeType::Rectangle, "rgb").unwrap();
    session.pointer_down("rgb", Point::new(40.0, 30.0)).unwrap();
    session.pointer_move("rgb", Point::new(240.0, 130.0)).unwrap();
    let before = session.active_shape().unwrap().part("rgb").cloned();

    session.set_zoom("rgb", 3.0).unwrap();
    session.pan_by("rgb", -25.0, 10.0).unwrap();
    assert_eq!(session.active_shape().unwrap().part("rgb").cloned(), before);

    // (695, 400) maps back to stage (240, 130) under the new transform
    session.pointer_up("rgb", Point::new(695.0, 400.0)).unwrap();
    let id = session.commit(Features::new()).unwrap().remove(0);
    let coords = session.objects().get(&id).unwrap().bbox.coords;
    for (got, want) in coords.iter().zip([0.1, 0.1, 0.5, 1.0 / 3.0]) {
        assert!((got - want).abs() < 1e-5, "{coords:?}");
    }
}

#[test]
fn test_objects_are_tagged_with_their_view() {
    let mut session = two_views();
    for view in ["rgb", "depth"] {
        session.start_shape(ShapeType::Rectangle, view).unwrap();
        session.pointer_down(view, Point::new(0.0, 0.0)).unwrap();
        session.pointer_up(view, Point::new(100.0, 75.0)).unwrap();
        session.commit(Features::new()).unwrap();
    }

    let depth: Vec<_> = session.objects().for_view("depth").collect();
    assert_eq!(depth.len(), 1);
    assert_eq!(depth[0].bbox.coords, [0.0, 0.0, 0.5, 0.5]);
    assert_eq!(session.objects().for_view("rgb").count(), 1);
}

#[test]
fn test_stereo_pair_commits_a_box_per_view() {
    let mut session = two_views();
    session.set_zoom("depth", 2.0).unwrap();
    session.pan_by("depth", 20.0, 10.0).unwrap();

    session.start_shape(ShapeType::Rectangle, "rgb").unwrap();
    session.pointer_down("rgb", Point::new(40.0, 30.0)).unwrap();
    session.pointer_up("rgb", Point::new(240.0, 180.0)).unwrap();
    // Stage (50, 30) to (150, 120) on the zoomed and panned depth view
    session.pointer_down("depth", Point::new(120.0, 70.0)).unwrap();
    session.pointer_move("rgb", Point::new(0.0, 0.0)).unwrap();
    session.pointer_up("depth", Point::new(320.0, 250.0)).unwrap();

    let shape = session.active_shape().unwrap();
    assert_eq!(shape.views().collect::<Vec<_>>(), vec!["depth", "rgb"]);
    let Some(ShapeGeometry::Rectangle { bbox: Some(depth) }) = shape.part("depth") else {
        panic!("expected a rectangle on the depth view");
    };
    assert_eq!(
        (depth.x, depth.y, depth.width, depth.height),
        (50.0, 30.0, 100.0, 90.0)
    );

    let ids = session.commit(Features::new()).unwrap();
    assert_eq!(ids.len(), 2);
    let rgb: Vec<_> = session.objects().for_view("rgb").collect();
    let depth: Vec<_> = session.objects().for_view("depth").collect();
    assert_eq!(rgb.len(), 1);
    assert_eq!(depth.len(), 1);
    for (got, want) in rgb[0].bbox.coords.iter().zip([0.1, 0.1, 0.5, 0.5]) {
        assert!((got - want).abs() < 1e-6, "{:?}", rgb[0].bbox.coords);
    }
    for (got, want) in depth[0].bbox.coords.iter().zip([0.25, 0.2, 0.5, 0.6]) {
        assert!((got - want).abs() < 1e-6, "{:?}", depth[0].bbox.coords);
    }
    assert_eq!(rgb[0].item_id, depth[0].item_id);
    assert_ne!(rgb[0].id, depth[0].id);
}

proptest! {
    #[test]
    fn test_rectangle_coords_stay_normalized(
        x1 in -500.0f32..900.0,
        y1 in -500.0f32..900.0,
        x2 in -500.0f32..900.0,
        y2 in -500.0f32..900.0,
        zoom in 0.25f32..4.0,
    ) {
        let mut session = two_views();
        session.set_zoom("rgb", zoom).unwrap();
        session.start_shape(ShapeType::Rectangle, "rgb").unwrap();
        session.pointer_down("rgb", Point::new(x1, y1)).unwrap();
        session.pointer_up("rgb", Point::new(x2, y2)).unwrap();

        if let Ok(ids) = session.commit(Features::new()) {
            let [x, y, w, h] = session.objects().get(&ids[0]).unwrap().bbox.coords;
            for value in [x, y, w, h] {
                prop_assert!((0.0..=1.0).contains(&value));
            }
            prop_assert!(x + w <= 1.0 + 1e-5);
            prop_assert!(y + h <= 1.0 + 1e-5);
        }
    }
}

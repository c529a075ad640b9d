use super::*;

fn gradient(w: u32, h: u32) -> FrameRGBA {
    let mut data = Vec::new();
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[x as u8, y as u8, 7, 255]);
        }
    }
    FrameRGBA::new(w, h, data).unwrap()
}

#[test]
fn pick_reads_rgb_at_coordinate() {
    let f = gradient(4, 3);
    assert_eq!(pick(&f, 2, 1).unwrap(), Rgb8::new(2, 1, 7));
    assert_eq!(pick(&f, 3, 2).unwrap(), Rgb8::new(3, 2, 7));
}

#[test]
fn pick_out_of_bounds_is_validation_error() {
    let f = gradient(4, 3);
    assert!(matches!(pick(&f, 4, 0), Err(KeyError::Validation(_))));
    assert!(matches!(pick(&f, 0, 3), Err(KeyError::Validation(_))));
}

#[test]
fn stretch_mapping_scales_each_axis() {
    let m = DisplayMapping::new(200.0, 50.0, 100, 100, DisplayFit::Stretch).unwrap();
    assert_eq!(m.to_frame(0.0, 0.0), Some((0, 0)));
    assert_eq!(m.to_frame(199.9, 49.9), Some((99, 99)));
    assert_eq!(m.to_frame(100.0, 25.0), Some((50, 50)));
    assert_eq!(m.to_frame(200.0, 10.0), None);
}

#[test]
fn contain_mapping_letterboxes() {
    // 1920x1080 frame shown in a 960x960 box: scale 0.5, 420px bars top and bottom.
    let m = DisplayMapping::new(960.0, 960.0, 1920, 1080, DisplayFit::Contain).unwrap();
    assert_eq!(m.to_frame(480.0, 100.0), None);
    assert_eq!(m.to_frame(480.0, 210.0), Some((960, 0)));
    assert_eq!(m.to_frame(0.0, 749.9), Some((0, 1079)));
    assert_eq!(m.to_frame(480.0, 750.0), None);
    assert_eq!(m.to_frame(-1.0, 480.0), None);
}

#[test]
fn mapping_rejects_degenerate_sizes() {
    assert!(DisplayMapping::new(0.0, 10.0, 10, 10, DisplayFit::Contain).is_err());
    assert!(DisplayMapping::new(10.0, f64::NAN, 10, 10, DisplayFit::Contain).is_err());
    assert!(DisplayMapping::new(10.0, 10.0, 0, 10, DisplayFit::Stretch).is_err());
}

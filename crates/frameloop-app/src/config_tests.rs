// SPDX-License-Identifier: CEPL-1.0
use super::*;

#[test]
fn empty_file_is_all_defaults() {
    let cfg = AppCfg::parse("").unwrap();
    assert_eq!(cfg, AppCfg::default());
    let present = cfg.present_config();
    assert_eq!(present.frames_in_flight, 2);
    assert_eq!(present.preferred_image_count, 4);
    assert_eq!(present.validation, cfg!(debug_assertions));
    assert_eq!(present.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
    assert_eq!(cfg.render.content, ContentKind::Triangle);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let cfg = AppCfg::parse(
        r#"
        [window]
        width = 640
        fullscreen = true

        [render]
        frames_in_flight = 3
        validation = false
        "#,
    )
    .unwrap();
    assert_eq!(cfg.window.width, 640);
    assert_eq!(cfg.window.height, 720);
    assert!(cfg.window.fullscreen);
    assert_eq!(cfg.render.frames_in_flight, 3);
    assert_eq!(cfg.render.clear_color, [0.02, 0.02, 0.04, 1.0]);

    let present = cfg.present_config();
    assert!(!present.validation);
    assert_eq!(present.frames_in_flight, 3);

    let opts = cfg.window_options();
    assert_eq!(opts.size, RenderSize::new(640, 720));
    assert!(opts.fullscreen);
}

#[test]
fn transfer_dst_adds_usage() {
    let cfg = AppCfg::parse("[render]\ntransfer_dst = true\n").unwrap();
    assert_eq!(
        cfg.present_config().image_usage,
        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST
    );
}

#[test]
fn pixel_content_needs_transfer_dst() {
    let cfg = AppCfg::parse("[render]\ncontent = \"pixels\"\ntransfer_dst = true\n").unwrap();
    assert_eq!(cfg.render.content, ContentKind::Pixels);
    assert!(cfg
        .present_config()
        .image_usage
        .contains(vk::ImageUsageFlags::TRANSFER_DST));

    let err = AppCfg::parse("[render]\ncontent = \"pixels\"\n").unwrap_err();
    assert!(format!("{err:#}").contains("transfer_dst"));
    assert!(AppCfg::parse("[render]\ncontent = \"video\"\n").is_err());
}

#[test]
fn shader_dir_is_a_path() {
    let cfg = AppCfg::parse("[render]\nshader_dir = \"assets/spv\"\n").unwrap();
    assert_eq!(cfg.render.shader_dir, Some(PathBuf::from("assets/spv")));
}

#[test]
fn rejects_bad_values() {
    for text in [
        "[render]\nframes_in_flight = 0\n",
        "[render]\npreferred_image_count = 0\n",
        "[window]\ntitle = \"\"\n",
        "[window]\nwidth = -1\n",
        "[render]\nvsync = true\n",
        "not toml at all",
    ] {
        assert!(AppCfg::parse(text).is_err(), "{text:?} should be rejected");
    }
}

#[test]
fn missing_file_means_defaults() {
    let path = std::env::temp_dir().join("frameloop-config-that-does-not-exist.toml");
    let cfg = AppCfg::load(&path).unwrap();
    assert_eq!(cfg, AppCfg::default());
}

#[test]
fn malformed_file_is_an_error() {
    let path = std::env::temp_dir().join(format!("frameloop-bad-{}.toml", std::process::id()));
    fs::write(&path, "[render]\nframes_in_flight = \"two\"\n").unwrap();
    let err = AppCfg::load(&path).unwrap_err();
    let _ = fs::remove_file(&path);
    assert!(format!("{err:#}").contains("invalid configuration"));
}

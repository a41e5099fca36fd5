mod common;

use boop::{
    ConfigError, Scene, SceneConfigurator, SettingsIssue,
    data_structures::{
        color::Color,
        light::{AmbientLight, Light},
        scene_graph::{DEFAULT_BACKGROUND, SceneNode},
    },
    error::ValueKind,
    settings::{AssetFormat, AssetRequest},
};
use cgmath::{Deg, Rotation3};
use futures::executor::block_on;

use crate::common::test_utils::{MemoryLoader, assert_close, assert_quat_close, assert_vec3_close};

fn configurator() -> SceneConfigurator<MemoryLoader> {
    SceneConfigurator::new(MemoryLoader::new())
}

#[test]
fn ambient_light_adds_exactly_one_light() {
    let mut config = configurator();
    let report = config.load("ambient-light: 0.5 #FFFFFF").unwrap();

    assert_eq!(report.applied, 1);
    assert!(report.issues.is_empty());
    let lights: Vec<&Light> = config.scene().lights().collect();
    assert_eq!(
        lights,
        vec![&Light::Ambient(AmbientLight {
            color: Color::WHITE,
            intensity: 0.5,
        })]
    );
}

#[test]
fn directional_light_adds_target_before_light() {
    let mut config = configurator();
    config
        .load("directional-light: 1.0 #00FF00 0 0 -5")
        .unwrap();

    let nodes = config.scene().nodes();
    assert_eq!(nodes.len(), 2);
    let SceneNode::Target(target) = &nodes[0] else {
        panic!("expected the target first, got {:?}", nodes[0]);
    };
    assert_vec3_close(target.position, [0.0, 0.0, -5.0]);

    let SceneNode::Light(Light::Directional(light)) = &nodes[1] else {
        panic!("expected a directional light, got {:?}", nodes[1]);
    };
    assert_eq!(light.color, Color::new(0.0, 1.0, 0.0));
    assert_close(light.intensity, 1.0);
    assert_vec3_close(light.position, [0.0, 1.0, 0.0]);
    assert_eq!(light.target.index(), 0);
}

#[test]
fn directional_light_shines_from_its_position_towards_its_target() {
    let mut config = configurator();
    config.load("directional-light: 1 #FFFFFF 0 1 -5").unwrap();
    let (scene, _) = config.scene_and_camera_mut();
    scene.update_world_transforms();

    let light = scene
        .lights()
        .find_map(|l| match l {
            Light::Directional(d) => Some(d.clone()),
            _ => None,
        })
        .unwrap();
    assert_vec3_close(scene.light_direction(&light), [0.0, 0.0, -1.0]);
}

#[test]
fn line_without_separator_is_malformed_and_changes_nothing() {
    let mut config = configurator();
    let report = config.load("background-color #000000").unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(
        report.issues,
        vec![SettingsIssue::MalformedLine {
            line: 1,
            text: "background-color #000000".to_string(),
        }]
    );
    assert_eq!(config.scene(), &Scene::new());
}

#[test]
fn line_with_two_separators_is_malformed() {
    let mut config = configurator();
    let report = config.load("a: b: c").unwrap();

    assert!(matches!(
        report.issues.as_slice(),
        [SettingsIssue::MalformedLine { line: 1, .. }]
    ));
    assert_eq!(config.scene(), &Scene::new());
}

#[test]
fn unknown_key_is_reported_and_later_lines_still_apply() {
    let mut config = configurator();
    let report = config
        .load("sky-color: #000000\nbackground-color: #000000")
        .unwrap();

    assert_eq!(
        report.issues,
        vec![SettingsIssue::UnknownDirective {
            line: 1,
            key: "sky-color".to_string(),
        }]
    );
    assert_eq!(report.applied, 1);
    assert_eq!(config.scene().background, Color::BLACK);
}

#[test]
fn rotations_are_read_in_degrees() {
    let mut config = configurator();
    config
        .load("model-rotation: 0 90 0\ncamera-rotation: 45 0 0")
        .unwrap();

    assert_quat_close(
        config.scene().model_group().transform.rotation,
        cgmath::Quaternion::from_angle_y(Deg(90.0)),
    );
    assert_quat_close(
        config.camera().rotation,
        cgmath::Quaternion::from_angle_x(Deg(45.0)),
    );
}

#[test]
fn last_model_translation_wins() {
    let mut config = configurator();
    let report = config
        .load("model-translation: 1 2 3\nmodel-translation: 4 5 6")
        .unwrap();

    assert_eq!(report.applied, 2);
    assert_vec3_close(
        config.scene().model_group().transform.position,
        [4.0, 5.0, 6.0],
    );
}

#[test]
fn model_scale_and_camera_translation_are_applied() {
    let mut config = configurator();
    config
        .load("model-scale: 2 2 2\ncamera-translation: 0 1.5 4")
        .unwrap();

    assert_vec3_close(config.scene().model_group().transform.scale, [2.0, 2.0, 2.0]);
    assert_vec3_close(config.camera().position, [0.0, 1.5, 4.0]);
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let text = "# a comment: with a separator\n\n   \nbackground-color: #000000\n# another";
    let mut config = configurator();
    let report = config.load(text).unwrap();

    assert_eq!(report.applied, 1);
    assert!(report.issues.is_empty());
    assert_eq!(config.scene().background, Color::BLACK);
}

#[test]
fn windows_line_endings_are_tolerated() {
    let mut config = configurator();
    let report = config
        .load("background-color: #000000\r\nmodel-scale: 1 2 3\r\n")
        .unwrap();

    assert!(report.issues.is_empty());
    assert_eq!(config.scene().background, Color::BLACK);
    assert_vec3_close(config.scene().model_group().transform.scale, [1.0, 2.0, 3.0]);
}

#[test]
fn empty_settings_text_is_unreadable() {
    assert!(matches!(configurator().load(""), Err(ConfigError::Unreadable)));
    assert!(matches!(
        configurator().load("  \n\t\n"),
        Err(ConfigError::Unreadable)
    ));
}

#[test]
fn invalid_and_missing_numbers_read_as_zero() {
    let mut config = configurator();
    let report = config.load("model-translation: 1 abc").unwrap();

    assert_eq!(report.applied, 1);
    assert_vec3_close(
        config.scene().model_group().transform.position,
        [1.0, 0.0, 0.0],
    );
    assert_eq!(
        report.issues,
        vec![
            SettingsIssue::InvalidValue {
                line: 1,
                kind: ValueKind::Number,
                token: "abc".to_string(),
            },
            SettingsIssue::InvalidValue {
                line: 1,
                kind: ValueKind::Number,
                token: String::new(),
            },
        ]
    );
}

#[test]
fn invalid_hex_colour_reads_as_black() {
    let mut config = configurator();
    let report = config.load("ambient-light: 1 zz").unwrap();

    assert_eq!(report.applied, 1);
    let Some(Light::Ambient(light)) = config.scene().lights().next() else {
        panic!("expected an ambient light");
    };
    assert_eq!(light.color, Color::BLACK);
    assert!(matches!(
        report.issues.as_slice(),
        [SettingsIssue::InvalidValue {
            kind: ValueKind::Hex,
            ..
        }]
    ));
}

#[test]
fn background_defaults_and_css_colours() {
    let mut config = configurator();
    assert_eq!(
        config.scene().background,
        Color::from_hex(DEFAULT_BACKGROUND)
    );
    assert_eq!(DEFAULT_BACKGROUND, 0x99DDFF);

    config.load("background-color: rgb(255, 0, 0)").unwrap();
    assert_eq!(config.scene().background, Color::new(1.0, 0.0, 0.0));

    config.load("background-color: navy").unwrap();
    assert_eq!(config.scene().background, Color::from_hex(0x000080));

    let report = config.load("background-color: not-a-colour").unwrap();
    assert_eq!(config.scene().background, Color::BLACK);
    assert!(matches!(
        report.issues.as_slice(),
        [SettingsIssue::InvalidValue {
            kind: ValueKind::Color,
            ..
        }]
    ));
}

#[test]
fn area_light_reads_every_field() {
    let mut config = configurator();
    let report = config
        .load("area-light: rect 1 2 3 0 90 0 1 0.5 0 4 2 3 Ceiling Lamp")
        .unwrap();

    assert!(report.issues.is_empty());
    let Some(Light::Area(light)) = config.scene().lights().next() else {
        panic!("expected an area light");
    };
    assert_eq!(light.name, "Ceiling Lamp");
    assert_vec3_close(light.position, [1.0, 2.0, 3.0]);
    assert_quat_close(light.rotation, cgmath::Quaternion::from_angle_y(Deg(90.0)));
    assert_eq!(light.color, Color::new(1.0, 0.5, 0.0));
    assert_close(light.width, 4.0);
    assert_close(light.height, 2.0);
    assert_close(light.intensity, 3.0);
}

#[test]
fn area_light_shape_is_case_insensitive_and_name_defaults() {
    let mut config = configurator();
    config
        .load("area-light: RECT 0 0 0 0 0 0 1 1 1 1 1 1")
        .unwrap();

    let Some(Light::Area(light)) = config.scene().lights().next() else {
        panic!("expected an area light");
    };
    assert_eq!(light.name, "AreaLight");
}

#[test]
fn area_light_of_other_shape_is_skipped() {
    let mut config = configurator();
    let report = config
        .load("area-light: disc 0 0 0 0 0 0 1 1 1 1 1 1")
        .unwrap();

    assert_eq!(report.applied, 0);
    assert_eq!(config.scene().lights().count(), 0);
    assert_eq!(
        report.issues,
        vec![SettingsIssue::InvalidValue {
            line: 1,
            kind: ValueKind::Shape,
            token: "disc".to_string(),
        }]
    );
}

#[test]
fn model_directives_queue_loads_without_blocking() {
    let mut config = configurator();
    let report = config
        .load("model-obj: models/cube.obj\nmodel-glb: models/duck.glb")
        .unwrap();

    assert_eq!(
        report.requested_assets,
        vec![
            AssetRequest {
                format: AssetFormat::Obj,
                path: "models/cube.obj".to_string(),
            },
            AssetRequest {
                format: AssetFormat::Glb,
                path: "models/duck.glb".to_string(),
            },
        ]
    );
    // Nothing is fetched until the host runs the tasks.
    assert!(config.loader().requests().is_empty());
    assert_eq!(config.take_asset_tasks().len(), 2);
    assert!(config.take_asset_tasks().is_empty());
    assert!(config.scene().model_group().models().is_empty());
}

#[test]
fn fetch_and_load_reads_through_the_loader() {
    let loader = MemoryLoader::new().with_file(
        "scenes/lit.txt",
        "background-color: #000000\nambient-light: 1 #FFFFFF\n",
    );
    let mut config = SceneConfigurator::new(loader);
    let report = block_on(config.fetch_and_load("scenes/lit.txt")).unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(config.loader().requests(), vec!["scenes/lit.txt"]);
    assert_eq!(config.scene().background, Color::BLACK);
}

#[test]
fn fetch_and_load_reports_missing_settings_file() {
    let mut config = configurator();
    let result = block_on(config.fetch_and_load("missing.txt"));

    match result {
        Err(ConfigError::Fetch { path, .. }) => assert_eq!(path, "missing.txt"),
        other => panic!("expected a fetch error, got {:?}", other),
    }
    assert_eq!(config.scene(), &Scene::new());
}

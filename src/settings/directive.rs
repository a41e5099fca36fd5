//! The directive table: which keys exist and how their values are read.

use crate::{data_structures::color::Color, settings::values::Diagnostics};

/// Every key a settings file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKey {
    BackgroundColor,
    ModelObj,
    ModelGlb,
    ModelTranslation,
    ModelRotation,
    ModelScale,
    CameraTranslation,
    CameraRotation,
    AmbientLight,
    DirectionalLight,
    AreaLight,
}

impl DirectiveKey {
    pub const ALL: [DirectiveKey; 11] = [
        DirectiveKey::BackgroundColor,
        DirectiveKey::ModelObj,
        DirectiveKey::ModelGlb,
        DirectiveKey::ModelTranslation,
        DirectiveKey::ModelRotation,
        DirectiveKey::ModelScale,
        DirectiveKey::CameraTranslation,
        DirectiveKey::CameraRotation,
        DirectiveKey::AmbientLight,
        DirectiveKey::DirectionalLight,
        DirectiveKey::AreaLight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKey::BackgroundColor => "background-color",
            DirectiveKey::ModelObj => "model-obj",
            DirectiveKey::ModelGlb => "model-glb",
            DirectiveKey::ModelTranslation => "model-translation",
            DirectiveKey::ModelRotation => "model-rotation",
            DirectiveKey::ModelScale => "model-scale",
            DirectiveKey::CameraTranslation => "camera-translation",
            DirectiveKey::CameraRotation => "camera-rotation",
            DirectiveKey::AmbientLight => "ambient-light",
            DirectiveKey::DirectionalLight => "directional-light",
            DirectiveKey::AreaLight => "area-light",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

/// Arguments of an `area-light` line.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaLightSpec {
    pub position: [f32; 3],
    /// Degrees.
    pub rotation: [f32; 3],
    pub color: Color,
    pub width: f32,
    pub height: f32,
    pub intensity: f32,
    pub name: String,
}

pub const AREA_LIGHT_SHAPE: &str = "rect";
pub const DEFAULT_AREA_LIGHT_NAME: &str = "AreaLight";

/// One parsed `key: value` line. Rotations are still in degrees here.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    BackgroundColor(Color),
    ModelObj(String),
    ModelGlb(String),
    ModelTranslation([f32; 3]),
    ModelRotation([f32; 3]),
    ModelScale([f32; 3]),
    CameraTranslation([f32; 3]),
    CameraRotation([f32; 3]),
    AmbientLight {
        intensity: f32,
        color: u32,
    },
    DirectionalLight {
        intensity: f32,
        color: u32,
        target: [f32; 3],
    },
    AreaLight(AreaLightSpec),
}

impl Directive {
    /// Reads the value of `key`. Bad tokens are reported to `diag` and read as zero.
    ///
    /// Returns `None` only when the line cannot describe anything at all, e.g. an
    /// area light of an unsupported shape.
    pub(crate) fn parse(key: DirectiveKey, value: &str, diag: &mut Diagnostics) -> Option<Self> {
        let tokens: Vec<&str> = value.split_whitespace().collect();
        let directive = match key {
            DirectiveKey::BackgroundColor => Directive::BackgroundColor(diag.css_color(value)),
            DirectiveKey::ModelObj => Directive::ModelObj(value.trim().to_string()),
            DirectiveKey::ModelGlb => Directive::ModelGlb(value.trim().to_string()),
            DirectiveKey::ModelTranslation => Directive::ModelTranslation(diag.vector3(&tokens)),
            DirectiveKey::ModelRotation => Directive::ModelRotation(diag.vector3(&tokens)),
            DirectiveKey::ModelScale => Directive::ModelScale(diag.vector3(&tokens)),
            DirectiveKey::CameraTranslation => Directive::CameraTranslation(diag.vector3(&tokens)),
            DirectiveKey::CameraRotation => Directive::CameraRotation(diag.vector3(&tokens)),
            DirectiveKey::AmbientLight => Directive::AmbientLight {
                intensity: diag.number(tokens.first().copied()),
                color: diag.hex(tokens.get(1).copied()),
            },
            DirectiveKey::DirectionalLight => Directive::DirectionalLight {
                intensity: diag.number(tokens.first().copied()),
                color: diag.hex(tokens.get(1).copied()),
                target: diag.vector3(tokens.get(2..).unwrap_or_default()),
            },
            DirectiveKey::AreaLight => {
                let shape = tokens.first().copied().unwrap_or("");
                if !shape.eq_ignore_ascii_case(AREA_LIGHT_SHAPE) {
                    diag.invalid_shape(shape);
                    return None;
                }
                let rest = &tokens[1..];
                let position = diag.vector3(rest);
                let rotation = diag.vector3(rest.get(3..).unwrap_or_default());
                let [r, g, b] = diag.vector3(rest.get(6..).unwrap_or_default());
                let width = diag.number(rest.get(9).copied());
                let height = diag.number(rest.get(10).copied());
                let intensity = diag.number(rest.get(11).copied());
                let name = match rest.get(12..) {
                    Some(name) if !name.is_empty() => name.join(" "),
                    _ => DEFAULT_AREA_LIGHT_NAME.to_string(),
                };
                Directive::AreaLight(AreaLightSpec {
                    position,
                    rotation,
                    color: Color::new(r, g, b),
                    width,
                    height,
                    intensity,
                    name,
                })
            }
        };
        Some(directive)
    }

    pub fn key(&self) -> DirectiveKey {
        match self {
            Directive::BackgroundColor(_) => DirectiveKey::BackgroundColor,
            Directive::ModelObj(_) => DirectiveKey::ModelObj,
            Directive::ModelGlb(_) => DirectiveKey::ModelGlb,
            Directive::ModelTranslation(_) => DirectiveKey::ModelTranslation,
            Directive::ModelRotation(_) => DirectiveKey::ModelRotation,
            Directive::ModelScale(_) => DirectiveKey::ModelScale,
            Directive::CameraTranslation(_) => DirectiveKey::CameraTranslation,
            Directive::CameraRotation(_) => DirectiveKey::CameraRotation,
            Directive::AmbientLight { .. } => DirectiveKey::AmbientLight,
            Directive::DirectionalLight { .. } => DirectiveKey::DirectionalLight,
            Directive::AreaLight(_) => DirectiveKey::AreaLight,
        }
    }
}

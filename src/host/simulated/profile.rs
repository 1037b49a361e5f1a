//! Serializable description of a simulated device.
//!
//! Sections missing from a profile file fall back to [`DeviceProfile::default`].
//! A section that is present replaces the default section as a whole; its own
//! missing fields read as `undefined`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FplabError, Result};
use crate::host::{
    DebugRendererInfo, IntlFormatter, JsValue, NavigatorSnapshot, Orientation, ScreenSnapshot,
    TouchSnapshot, ViewportSnapshot,
};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub name: String,
    /// `None` makes every navigator read fail.
    pub navigator: Option<NavigatorSnapshot>,
    pub intl: IntlProfile,
    pub screen: ScreenSnapshot,
    /// `None` when `window.visualViewport` is absent.
    pub visual_viewport: Option<ViewportSnapshot>,
    pub canvas: CanvasProfile,
    pub audio: AudioProfile,
    /// `None` when no WebGL context can be created.
    pub webgl: Option<GlProfile>,
    pub webgl2: Option<GlProfile>,
    pub fonts: FontProfile,
    pub touch: TouchSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntlProfile {
    /// Locale every formatter resolves to unless overridden.
    pub locale: JsValue,
    pub overrides: Vec<LocaleOverride>,
    /// Formatters whose constructor throws.
    pub unsupported: Vec<IntlFormatter>,
    /// Formatters that construct to a falsy value.
    pub falsy: Vec<IntlFormatter>,
    /// Formatted sample date; `None` makes formatting throw.
    pub date_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleOverride {
    pub formatter: IntlFormatter,
    #[serde(default)]
    pub locale: JsValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasProfile {
    /// Whether `getContext('2d')` yields a context.
    pub supported: bool,
    /// Identifies the rasterizer; folded into the encoded image.
    pub rasterizer: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfile {
    pub supported: bool,
    pub gain_reduction: f64,
    pub amplitude: f64,
    /// Whether the analyser exposes `getFloatTimeDomainData`.
    pub time_domain: bool,
    /// Completion fires but data extraction throws.
    pub extraction_fails: bool,
    /// Rendering starts but never completes.
    pub never_completes: bool,
    /// Rendering starts but the completion signal is dropped.
    pub abandons_render: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlProfile {
    pub debug_renderer_info: Option<DebugRendererInfo>,
    pub version: JsValue,
    pub shading_language_version: JsValue,
    pub vendor: JsValue,
    pub renderer: JsValue,
    pub max_texture_size: JsValue,
    pub max_draw_buffers: JsValue,
    pub context_attributes: Vec<(String, JsValue)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontProfile {
    pub installed: Vec<String>,
    /// Width of `ww` at 10px in the generic sans-serif face.
    pub sans_width: f64,
    /// Width of `ww` at 10px in the generic monospace face.
    pub mono_width: f64,
}

impl DeviceProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            FplabError::DeviceProfile(format!("{}: {}", path.display(), e))
        })
    }

    /// A device without any optional capability.
    pub fn bare() -> Self {
        Self {
            name: "bare".to_string(),
            visual_viewport: None,
            canvas: CanvasProfile {
                supported: false,
                ..CanvasProfile::default()
            },
            audio: AudioProfile {
                supported: false,
                ..AudioProfile::default()
            },
            webgl: None,
            webgl2: None,
            ..Self::default()
        }
    }

    /// Width of the installed face for `family`, if installed.
    pub fn installed_width(&self, family: &str) -> Option<f64> {
        self.fonts
            .installed
            .iter()
            .find(|f| f.as_str() == family)
            .map(|f| 10.0 + (f.len() % 9) as f64)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            name: "linux-chrome".to_string(),
            navigator: Some(default_navigator()),
            intl: IntlProfile::default(),
            screen: default_screen(),
            visual_viewport: Some(ViewportSnapshot {
                width: 1920u32.into(),
                height: 963u32.into(),
                scale: 1u32.into(),
            }),
            canvas: CanvasProfile::default(),
            audio: AudioProfile::default(),
            webgl: Some(GlProfile::default()),
            webgl2: Some(GlProfile::webgl2()),
            fonts: FontProfile::default(),
            touch: TouchSnapshot {
                max_touch_points: 0u32.into(),
                ms_max_touch_points: JsValue::undefined(),
                touch_event: false,
                touch_start: false,
            },
        }
    }
}

fn default_navigator() -> NavigatorSnapshot {
    let plugins = [
        "PDF Viewer",
        "Chrome PDF Viewer",
        "Chromium PDF Viewer",
        "Microsoft Edge PDF Viewer",
        "WebKit built-in PDF",
    ];

    NavigatorSnapshot {
        plugins: Some(plugins.iter().map(|p| JsValue::from(*p)).collect()),
        hardware_concurrency: 8u32.into(),
        device_memory: 8u32.into(),
        language: "en-US".into(),
        languages: Some(vec!["en-US".into(), "en".into()]),
        platform: "Linux x86_64".into(),
        user_agent: DEFAULT_USER_AGENT.into(),
        app_version: app_version(DEFAULT_USER_AGENT).into(),
        vendor: "Google Inc.".into(),
        product_sub: "20030107".into(),
    }
}

fn default_screen() -> ScreenSnapshot {
    ScreenSnapshot {
        width: 1920u32.into(),
        height: 1080u32.into(),
        avail_height: 1050u32.into(),
        avail_width: 1920u32.into(),
        avail_left: 0u32.into(),
        avail_top: 0u32.into(),
        inner_height: 963u32.into(),
        inner_width: 1920u32.into(),
        outer_width: 1920u32.into(),
        outer_height: 1050u32.into(),
        screen_x: 0u32.into(),
        screen_left: 0u32.into(),
        screen_y: 0u32.into(),
        screen_top: 0u32.into(),
        is_extended: false.into(),
        color_depth: 24u32.into(),
        pixel_depth: 24u32.into(),
        device_pixel_ratio: 1u32.into(),
        orientation: Some(Orientation {
            kind: "landscape-primary".into(),
        }),
    }
}

/// `navigator.appVersion` is the user agent without its `Mozilla/` prefix.
pub fn app_version(user_agent: &str) -> String {
    user_agent
        .strip_prefix("Mozilla/")
        .unwrap_or(user_agent)
        .to_string()
}

impl Default for IntlProfile {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            overrides: Vec::new(),
            unsupported: Vec::new(),
            falsy: Vec::new(),
            date_text: Some("July Coordinated Universal Time".to_string()),
        }
    }
}

impl Default for CanvasProfile {
    fn default() -> Self {
        Self {
            supported: true,
            rasterizer: "skia/linux/mesa-intel".to_string(),
            width: 300,
            height: 150,
        }
    }
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            supported: true,
            gain_reduction: -20.538286209106445,
            amplitude: 0.3,
            time_domain: true,
            extraction_fails: false,
            never_completes: false,
            abandons_render: false,
        }
    }
}

impl Default for GlProfile {
    fn default() -> Self {
        Self {
            debug_renderer_info: Some(DebugRendererInfo {
                vendor: "Google Inc. (Intel)".into(),
                renderer: "ANGLE (Intel, Mesa Intel(R) UHD Graphics 630 (CFL GT2), OpenGL 4.6)"
                    .into(),
            }),
            version: "WebGL 1.0 (OpenGL ES 2.0 Chromium)".into(),
            shading_language_version: "WebGL GLSL ES 1.0 (OpenGL ES GLSL ES 1.0 Chromium)".into(),
            vendor: "WebKit".into(),
            renderer: "WebKit WebGL".into(),
            max_texture_size: 16384u32.into(),
            max_draw_buffers: 8u32.into(),
            context_attributes: default_context_attributes(),
        }
    }
}

impl GlProfile {
    pub fn webgl2() -> Self {
        Self {
            version: "WebGL 2.0 (OpenGL ES 3.0 Chromium)".into(),
            shading_language_version: "WebGL GLSL ES 3.00 (OpenGL ES GLSL ES 3.0 Chromium)".into(),
            ..Self::default()
        }
    }
}

fn default_context_attributes() -> Vec<(String, JsValue)> {
    let attributes = json!([
        ["alpha", true],
        ["antialias", true],
        ["depth", true],
        ["desynchronized", false],
        ["failIfMajorPerformanceCaveat", false],
        ["powerPreference", "default"],
        ["premultipliedAlpha", true],
        ["preserveDrawingBuffer", false],
        ["stencil", false],
        ["xrCompatible", false]
    ]);

    serde_json::from_value(attributes).unwrap_or_default()
}

impl Default for FontProfile {
    fn default() -> Self {
        Self {
            installed: [
                "DejaVu LGC Sans Mono",
                "KacstOne",
                "Lohit Gujarati",
                "Loma",
                "Rachana",
                "Sawasdee",
                "TlwgMono",
                "Ubuntu",
                "Umpush",
            ]
            .iter()
            .map(|f| f.to_string())
            .collect(),
            sans_width: 17.0,
            mono_width: 12.0,
        }
    }
}

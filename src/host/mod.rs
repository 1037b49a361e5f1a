//! The capability surface collectors read from.
//!
//! A [`Host`] is the environment being fingerprinted. [`cdp::CdpHost`] drives a
//! real browser page over CDP, [`simulated::SimulatedHost`] answers from a
//! [`simulated::DeviceProfile`]. Collectors only ever see `&dyn Host`.

pub mod cdp;
pub mod js;
pub mod simulated;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

pub use js::JsValue;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// A script-level exception; the message is what `err.message` reads.
    #[error("{0}")]
    Script(String),

    #[error("CDP transport error: {0}")]
    Transport(String),

    #[error("Host call timed out after {0} ms")]
    Timeout(u64),

    #[error("Unknown surface: {0}")]
    UnknownSurface(u64),

    #[error("{0}")]
    Simulated(String),
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Raw navigator reads. `None` lists mean the list itself was not readable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigatorSnapshot {
    pub plugins: Option<Vec<JsValue>>,
    pub hardware_concurrency: JsValue,
    pub device_memory: JsValue,
    pub language: JsValue,
    pub languages: Option<Vec<JsValue>>,
    pub platform: JsValue,
    pub user_agent: JsValue,
    pub app_version: JsValue,
    pub vendor: JsValue,
    pub product_sub: JsValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenSnapshot {
    pub width: JsValue,
    pub height: JsValue,
    pub avail_height: JsValue,
    pub avail_width: JsValue,
    pub avail_left: JsValue,
    pub avail_top: JsValue,
    pub inner_height: JsValue,
    pub inner_width: JsValue,
    pub outer_width: JsValue,
    pub outer_height: JsValue,
    pub screen_x: JsValue,
    pub screen_left: JsValue,
    pub screen_y: JsValue,
    pub screen_top: JsValue,
    pub is_extended: JsValue,
    pub color_depth: JsValue,
    pub pixel_depth: JsValue,
    pub device_pixel_ratio: JsValue,
    pub orientation: Option<Orientation>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Orientation {
    #[serde(rename = "type")]
    pub kind: JsValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportSnapshot {
    pub width: JsValue,
    pub height: JsValue,
    pub scale: JsValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchSnapshot {
    pub max_touch_points: JsValue,
    pub ms_max_touch_points: JsValue,
    /// Whether constructing a legacy `TouchEvent` succeeded.
    pub touch_event: bool,
    /// Whether `ontouchstart` is present on the window.
    pub touch_start: bool,
}

/// The `Intl` formatter families whose resolved locale is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntlFormatter {
    Collator,
    DateTimeFormat,
    DisplayNames,
    ListFormat,
    NumberFormat,
    PluralRules,
    RelativeTimeFormat,
}

impl IntlFormatter {
    pub const ALL: [IntlFormatter; 7] = [
        IntlFormatter::Collator,
        IntlFormatter::DateTimeFormat,
        IntlFormatter::DisplayNames,
        IntlFormatter::ListFormat,
        IntlFormatter::NumberFormat,
        IntlFormatter::PluralRules,
        IntlFormatter::RelativeTimeFormat,
    ];

    pub fn constructor(&self) -> &'static str {
        match self {
            IntlFormatter::Collator => "Collator",
            IntlFormatter::DateTimeFormat => "DateTimeFormat",
            IntlFormatter::DisplayNames => "DisplayNames",
            IntlFormatter::ListFormat => "ListFormat",
            IntlFormatter::NumberFormat => "NumberFormat",
            IntlFormatter::PluralRules => "PluralRules",
            IntlFormatter::RelativeTimeFormat => "RelativeTimeFormat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// Dimensions and visibility of an offscreen drawing surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum DrawOp {
    TextBaseline(String),
    Font(String),
    FillStyle(String),
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    FillText { text: String, x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlContextKind {
    WebGl,
    WebGl2,
}

impl GlContextKind {
    /// Context names tried in order until one succeeds.
    pub fn context_names(&self) -> &'static [&'static str] {
        match self {
            GlContextKind::WebGl => &["webgl", "experimental-webgl"],
            GlContextKind::WebGl2 => &["webgl2"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlParameter {
    Version,
    ShadingLanguageVersion,
    Vendor,
    Renderer,
    MaxTextureSize,
    MaxDrawBuffers,
}

impl GlParameter {
    pub fn constant(&self) -> &'static str {
        match self {
            GlParameter::Version => "VERSION",
            GlParameter::ShadingLanguageVersion => "SHADING_LANGUAGE_VERSION",
            GlParameter::Vendor => "VENDOR",
            GlParameter::Renderer => "RENDERER",
            GlParameter::MaxTextureSize => "MAX_TEXTURE_SIZE",
            GlParameter::MaxDrawBuffers => "MAX_DRAW_BUFFERS",
        }
    }
}

/// Values read through the `WEBGL_debug_renderer_info` extension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugRendererInfo {
    pub vendor: JsValue,
    pub renderer: JsValue,
}

/// Offline audio context parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioContextSpec {
    pub channels: u32,
    pub length: u32,
    pub sample_rate: f64,
}

/// Oscillator → compressor → analyser/destination graph.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioGraph {
    pub oscillator_type: &'static str,
    pub frequency: f64,
    pub threshold: f64,
    pub knee: f64,
    pub attack: f64,
}

/// What the completion handler extracts after rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedAudio {
    pub frequency_data: Option<Vec<f32>>,
    /// `None` when the analyser has no time-domain accessor.
    pub time_domain_data: Option<Vec<f32>>,
    pub channel_data: Vec<f32>,
    pub gain_reduction: f64,
}

/// Completion signal of an offline render. `None` means extraction failed.
pub type RenderCompletion = oneshot::Receiver<Option<RenderedAudio>>;

#[async_trait]
pub trait OfflineAudioContext: Send {
    /// Wires the graph, starts the oscillator at 0 and starts rendering.
    /// The receiver resolves once, when rendering completes.
    async fn start_rendering(&mut self, graph: &AudioGraph) -> HostResult<RenderCompletion>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeBatch(pub u64);

/// Widths of one font candidate: the `sans-serif` probe and the `monospace` probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeWidths {
    pub sans: f64,
    pub mono: f64,
}

#[async_trait]
pub trait Host: Send + Sync {
    fn name(&self) -> &str;

    async fn navigator(&self) -> HostResult<NavigatorSnapshot>;

    /// Constructs the formatter with no arguments and reads `resolvedOptions().locale`.
    /// `Ok(None)` when the constructed object is falsy.
    async fn resolved_locale(&self, formatter: IntlFormatter) -> HostResult<Option<JsValue>>;

    /// Formats `timestamp` with `{ month: "long", timeZoneName: "long" }`.
    async fn format_date(&self, timestamp: f64) -> HostResult<String>;

    async fn screen(&self) -> HostResult<ScreenSnapshot>;

    async fn visual_viewport(&self) -> HostResult<Option<ViewportSnapshot>>;

    async fn create_surface(&self, spec: SurfaceSpec) -> HostResult<SurfaceId>;

    async fn attach_surface(&self, id: SurfaceId) -> HostResult<()>;

    async fn detach_surface(&self, id: SurfaceId) -> HostResult<()>;

    /// Drops the surface and any context it holds.
    async fn release_surface(&self, id: SurfaceId) -> HostResult<()>;

    async fn context_2d(&self, id: SurfaceId) -> HostResult<bool>;

    async fn draw(&self, id: SurfaceId, ops: &[DrawOp]) -> HostResult<()>;

    async fn to_data_url(&self, id: SurfaceId) -> HostResult<String>;

    async fn webgl_context(&self, id: SurfaceId, kind: GlContextKind) -> HostResult<bool>;

    async fn debug_renderer_info(&self, id: SurfaceId) -> HostResult<Option<DebugRendererInfo>>;

    async fn gl_parameter(&self, id: SurfaceId, parameter: GlParameter) -> HostResult<JsValue>;

    /// Context attributes in host enumeration order.
    async fn gl_context_attributes(&self, id: SurfaceId) -> HostResult<Vec<(String, JsValue)>>;

    /// `Ok(None)` when no offline audio context can be constructed.
    async fn offline_audio_context(
        &self,
        spec: AudioContextSpec,
    ) -> HostResult<Option<Box<dyn OfflineAudioContext>>>;

    async fn mount_font_probes(&self, families: &[String]) -> HostResult<ProbeBatch>;

    /// Widths in mount order, one entry per family.
    async fn measure_font_probes(&self, batch: ProbeBatch) -> HostResult<Vec<ProbeWidths>>;

    async fn unmount_font_probes(&self, batch: ProbeBatch) -> HostResult<()>;

    async fn touch(&self) -> HostResult<TouchSnapshot>;
}

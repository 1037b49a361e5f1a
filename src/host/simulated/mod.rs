//! A host that answers from a [`DeviceProfile`] instead of a browser.
//!
//! Surfaces, attached elements and font probes are tracked so cleanup can be
//! checked after a run. Individual collector areas can be made to fail or to
//! panic.

pub mod generator;
pub mod profile;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::sync::oneshot;

pub use generator::DeviceGenerator;
pub use profile::DeviceProfile;

use self::profile::{AudioProfile, GlProfile};
use super::{
    AudioContextSpec, AudioGraph, DebugRendererInfo, DrawOp, GlContextKind, GlParameter, Host,
    HostError, HostResult, IntlFormatter, JsValue, NavigatorSnapshot, OfflineAudioContext,
    ProbeBatch, ProbeWidths, RenderCompletion, RenderedAudio, ScreenSnapshot, SurfaceId,
    SurfaceSpec, TouchSnapshot, ViewportSnapshot,
};
use crate::collect::CollectorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceContext {
    TwoD,
    Gl(GlContextKind),
}

#[derive(Debug)]
struct SimSurface {
    spec: SurfaceSpec,
    context: Option<SurfaceContext>,
    ops: Vec<DrawOp>,
}

#[derive(Debug, Default)]
struct SimState {
    next_id: u64,
    surfaces: HashMap<u64, SimSurface>,
    attached: HashSet<u64>,
    probes: HashMap<u64, Vec<String>>,
}

pub struct SimulatedHost {
    profile: DeviceProfile,
    failing: HashSet<CollectorKind>,
    panicking: HashSet<CollectorKind>,
    state: Mutex<SimState>,
}

impl SimulatedHost {
    pub fn new(profile: DeviceProfile) -> Self {
        Self {
            profile,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Host calls in `kind`'s area return an error.
    pub fn failing_on(mut self, kind: CollectorKind) -> Self {
        self.failing.insert(kind);
        self
    }

    /// Host calls in `kind`'s area panic.
    pub fn panicking_on(mut self, kind: CollectorKind) -> Self {
        self.panicking.insert(kind);
        self
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn live_surfaces(&self) -> usize {
        self.state().surfaces.len()
    }

    pub fn attached_surfaces(&self) -> usize {
        self.state().attached.len()
    }

    pub fn mounted_probe_batches(&self) -> usize {
        self.state().probes.len()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn trip(&self, kind: CollectorKind) {
        if self.panicking.contains(&kind) {
            panic!("simulated {} capability panicked", kind);
        }
    }

    fn check(&self, kind: CollectorKind) -> HostResult<()> {
        self.trip(kind);
        if self.failing.contains(&kind) {
            return Err(HostError::Simulated(format!("simulated {} failure", kind)));
        }
        Ok(())
    }

    fn gl_profile(&self, kind: GlContextKind) -> Option<&GlProfile> {
        match kind {
            GlContextKind::WebGl => self.profile.webgl.as_ref(),
            GlContextKind::WebGl2 => self.profile.webgl2.as_ref(),
        }
    }

    /// The GL profile behind a surface with a live GL context.
    fn gl_for(&self, id: SurfaceId) -> HostResult<&GlProfile> {
        let kind = {
            let state = self.state();
            let surface = state
                .surfaces
                .get(&id.0)
                .ok_or(HostError::UnknownSurface(id.0))?;
            match surface.context {
                Some(SurfaceContext::Gl(kind)) => kind,
                _ => return Err(HostError::Script("no WebGL context on surface".to_string())),
            }
        };

        self.check(gl_collector(kind))?;
        self.gl_profile(kind)
            .ok_or_else(|| HostError::Script("WebGL is not supported".to_string()))
    }

    fn encode_canvas(&self, surface: &SimSurface) -> HostResult<String> {
        let ops = serde_json::to_string(&surface.ops)
            .map_err(|e| HostError::Simulated(e.to_string()))?;
        let width = surface.spec.width.unwrap_or(self.profile.canvas.width);
        let height = surface.spec.height.unwrap_or(self.profile.canvas.height);
        let image = format!(
            "{}|{}x{}|{}",
            self.profile.canvas.rasterizer, width, height, ops
        );

        Ok(format!("data:image/png;base64,{}", STANDARD.encode(image)))
    }
}

fn gl_collector(kind: GlContextKind) -> CollectorKind {
    match kind {
        GlContextKind::WebGl => CollectorKind::Webgl,
        GlContextKind::WebGl2 => CollectorKind::Webgl2,
    }
}

#[async_trait]
impl Host for SimulatedHost {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn navigator(&self) -> HostResult<NavigatorSnapshot> {
        self.check(CollectorKind::Navigator)?;
        self.profile
            .navigator
            .clone()
            .ok_or_else(|| HostError::Script("navigator is not defined".to_string()))
    }

    async fn resolved_locale(&self, formatter: IntlFormatter) -> HostResult<Option<JsValue>> {
        self.check(CollectorKind::Intl)?;
        let intl = &self.profile.intl;
        if intl.unsupported.contains(&formatter) {
            return Err(HostError::Script(format!(
                "Intl.{} is not a constructor",
                formatter.constructor()
            )));
        }
        if intl.falsy.contains(&formatter) {
            return Ok(None);
        }

        let locale = intl
            .overrides
            .iter()
            .find(|o| o.formatter == formatter)
            .map(|o| o.locale.clone())
            .unwrap_or_else(|| intl.locale.clone());
        Ok(Some(locale))
    }

    async fn format_date(&self, _timestamp: f64) -> HostResult<String> {
        self.check(CollectorKind::Intl)?;
        self.profile
            .intl
            .date_text
            .clone()
            .ok_or_else(|| HostError::Script("Incorrect locale information provided".to_string()))
    }

    async fn screen(&self) -> HostResult<ScreenSnapshot> {
        self.check(CollectorKind::Screen)?;
        Ok(self.profile.screen.clone())
    }

    async fn visual_viewport(&self) -> HostResult<Option<ViewportSnapshot>> {
        self.check(CollectorKind::Viewport)?;
        Ok(self.profile.visual_viewport.clone())
    }

    async fn create_surface(&self, spec: SurfaceSpec) -> HostResult<SurfaceId> {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.surfaces.insert(
            id,
            SimSurface {
                spec,
                context: None,
                ops: Vec::new(),
            },
        );
        Ok(SurfaceId(id))
    }

    async fn attach_surface(&self, id: SurfaceId) -> HostResult<()> {
        let mut state = self.state();
        if !state.surfaces.contains_key(&id.0) {
            return Err(HostError::UnknownSurface(id.0));
        }
        state.attached.insert(id.0);
        Ok(())
    }

    async fn detach_surface(&self, id: SurfaceId) -> HostResult<()> {
        self.state().attached.remove(&id.0);
        Ok(())
    }

    async fn release_surface(&self, id: SurfaceId) -> HostResult<()> {
        let mut state = self.state();
        state.attached.remove(&id.0);
        state
            .surfaces
            .remove(&id.0)
            .map(|_| ())
            .ok_or(HostError::UnknownSurface(id.0))
    }

    async fn context_2d(&self, id: SurfaceId) -> HostResult<bool> {
        self.check(CollectorKind::Canvas)?;
        let supported = self.profile.canvas.supported;
        let mut state = self.state();
        let surface = state
            .surfaces
            .get_mut(&id.0)
            .ok_or(HostError::UnknownSurface(id.0))?;

        match surface.context {
            Some(SurfaceContext::TwoD) => Ok(true),
            Some(SurfaceContext::Gl(_)) => Ok(false),
            None if supported => {
                surface.context = Some(SurfaceContext::TwoD);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn draw(&self, id: SurfaceId, ops: &[DrawOp]) -> HostResult<()> {
        self.check(CollectorKind::Canvas)?;
        let mut state = self.state();
        let surface = state
            .surfaces
            .get_mut(&id.0)
            .ok_or(HostError::UnknownSurface(id.0))?;
        if surface.context != Some(SurfaceContext::TwoD) {
            return Err(HostError::Script(
                "Cannot draw without a 2d context".to_string(),
            ));
        }
        surface.ops.extend_from_slice(ops);
        Ok(())
    }

    async fn to_data_url(&self, id: SurfaceId) -> HostResult<String> {
        self.check(CollectorKind::Canvas)?;
        let state = self.state();
        let surface = state
            .surfaces
            .get(&id.0)
            .ok_or(HostError::UnknownSurface(id.0))?;
        self.encode_canvas(surface)
    }

    async fn webgl_context(&self, id: SurfaceId, kind: GlContextKind) -> HostResult<bool> {
        self.trip(gl_collector(kind));
        let available = self.gl_profile(kind).is_some();
        let mut state = self.state();
        let surface = state
            .surfaces
            .get_mut(&id.0)
            .ok_or(HostError::UnknownSurface(id.0))?;

        match surface.context {
            Some(SurfaceContext::Gl(existing)) => Ok(existing == kind),
            Some(SurfaceContext::TwoD) => Ok(false),
            None if available => {
                surface.context = Some(SurfaceContext::Gl(kind));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn debug_renderer_info(&self, id: SurfaceId) -> HostResult<Option<DebugRendererInfo>> {
        Ok(self.gl_for(id)?.debug_renderer_info.clone())
    }

    async fn gl_parameter(&self, id: SurfaceId, parameter: GlParameter) -> HostResult<JsValue> {
        let gl = self.gl_for(id)?;
        Ok(match parameter {
            GlParameter::Version => gl.version.clone(),
            GlParameter::ShadingLanguageVersion => gl.shading_language_version.clone(),
            GlParameter::Vendor => gl.vendor.clone(),
            GlParameter::Renderer => gl.renderer.clone(),
            GlParameter::MaxTextureSize => gl.max_texture_size.clone(),
            GlParameter::MaxDrawBuffers => gl.max_draw_buffers.clone(),
        })
    }

    async fn gl_context_attributes(&self, id: SurfaceId) -> HostResult<Vec<(String, JsValue)>> {
        Ok(self.gl_for(id)?.context_attributes.clone())
    }

    async fn offline_audio_context(
        &self,
        spec: AudioContextSpec,
    ) -> HostResult<Option<Box<dyn OfflineAudioContext>>> {
        self.check(CollectorKind::Audio)?;
        if !self.profile.audio.supported {
            return Ok(None);
        }

        Ok(Some(Box::new(SimulatedAudioContext {
            spec,
            profile: self.profile.audio.clone(),
            pending: None,
        })))
    }

    async fn mount_font_probes(&self, families: &[String]) -> HostResult<ProbeBatch> {
        self.trip(CollectorKind::Fonts);
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.probes.insert(id, families.to_vec());
        Ok(ProbeBatch(id))
    }

    async fn measure_font_probes(&self, batch: ProbeBatch) -> HostResult<Vec<ProbeWidths>> {
        self.check(CollectorKind::Fonts)?;
        let state = self.state();
        let families = state
            .probes
            .get(&batch.0)
            .ok_or_else(|| HostError::Script("font probes are not mounted".to_string()))?;

        let fonts = &self.profile.fonts;
        Ok(families
            .iter()
            .map(|family| match self.profile.installed_width(family) {
                Some(width) => ProbeWidths {
                    sans: width,
                    mono: width,
                },
                None => ProbeWidths {
                    sans: fonts.sans_width,
                    mono: fonts.mono_width,
                },
            })
            .collect())
    }

    async fn unmount_font_probes(&self, batch: ProbeBatch) -> HostResult<()> {
        self.state().probes.remove(&batch.0);
        Ok(())
    }

    async fn touch(&self) -> HostResult<TouchSnapshot> {
        self.check(CollectorKind::Touch)?;
        Ok(self.profile.touch.clone())
    }
}

struct SimulatedAudioContext {
    spec: AudioContextSpec,
    profile: AudioProfile,
    /// Held so the completion signal stays pending instead of being dropped.
    pending: Option<oneshot::Sender<Option<RenderedAudio>>>,
}

impl SimulatedAudioContext {
    fn render(&self, graph: &AudioGraph) -> RenderedAudio {
        let length = self.spec.length as usize;
        let step = graph.frequency / self.spec.sample_rate;
        let amplitude = self.profile.amplitude;

        let channel_data: Vec<f32> = (0..length)
            .map(|i| {
                let phase = (i as f64 * step).fract();
                ((1.0 - 4.0 * (phase - 0.5).abs()) * amplitude) as f32
            })
            .collect();

        let frequency_data: Vec<f32> = (0..1024)
            .map(|bin| (-100.0 - (bin % 64) as f64 * 0.5 + amplitude) as f32)
            .collect();

        let time_domain_data = self
            .profile
            .time_domain
            .then(|| channel_data[length.saturating_sub(2048)..].to_vec());

        RenderedAudio {
            frequency_data: Some(frequency_data),
            time_domain_data,
            channel_data,
            gain_reduction: self.profile.gain_reduction,
        }
    }
}

#[async_trait]
impl OfflineAudioContext for SimulatedAudioContext {
    async fn start_rendering(&mut self, graph: &AudioGraph) -> HostResult<RenderCompletion> {
        let (tx, rx) = oneshot::channel();

        if self.profile.never_completes {
            self.pending = Some(tx);
        } else if self.profile.abandons_render {
            drop(tx);
        } else if self.profile.extraction_fails {
            let _ = tx.send(None);
        } else {
            let _ = tx.send(Some(self.render(graph)));
        }

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn release_forgets_surface_and_attachment() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let id = host.create_surface(SurfaceSpec::default()).await.unwrap();
        host.attach_surface(id).await.unwrap();
        assert_eq!(host.live_surfaces(), 1);
        assert_eq!(host.attached_surfaces(), 1);

        host.release_surface(id).await.unwrap();
        assert_eq!(host.live_surfaces(), 0);
        assert_eq!(host.attached_surfaces(), 0);
        assert_eq!(
            host.release_surface(id).await,
            Err(HostError::UnknownSurface(id.0))
        );
    }

    #[tokio::test]
    async fn surface_holds_one_context_kind() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let id = host.create_surface(SurfaceSpec::default()).await.unwrap();

        assert!(host.webgl_context(id, GlContextKind::WebGl).await.unwrap());
        assert!(!host.context_2d(id).await.unwrap());
        assert!(!host.webgl_context(id, GlContextKind::WebGl2).await.unwrap());
    }

    #[tokio::test]
    async fn canvas_encoding_depends_on_rasterizer() {
        let ops = [DrawOp::FillStyle("#069".to_string())];
        let mut other = DeviceProfile::default();
        other.canvas.rasterizer = "skia/win/d3d11".to_string();

        let mut urls = Vec::new();
        for profile in [DeviceProfile::default(), other] {
            let host = SimulatedHost::new(profile);
            let id = host.create_surface(SurfaceSpec::default()).await.unwrap();
            assert!(host.context_2d(id).await.unwrap());
            host.draw(id, &ops).await.unwrap();
            urls.push(host.to_data_url(id).await.unwrap());
        }

        assert!(urls[0].starts_with("data:image/png;base64,"));
        assert_ne!(urls[0], urls[1]);
    }

    #[tokio::test]
    async fn failing_area_reports_simulated_error() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Screen);
        assert!(matches!(host.screen().await, Err(HostError::Simulated(_))));
        assert!(host.touch().await.is_ok());
    }

    #[tokio::test]
    async fn pending_render_never_resolves() {
        let mut profile = DeviceProfile::default();
        profile.audio.never_completes = true;
        let host = SimulatedHost::new(profile);

        let spec = AudioContextSpec {
            channels: 1,
            length: 5000,
            sample_rate: 44100.0,
        };
        let mut context = host.offline_audio_context(spec).await.unwrap().unwrap();
        let graph = crate::collect::audio::graph();
        let rx = context.start_rendering(&graph).await.unwrap();

        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), rx).await;
        assert!(waited.is_err());
    }
}

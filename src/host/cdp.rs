//! [`Host`] backed by a live browser page.
//!
//! Every call is one `Runtime.evaluate` round trip. Scripts run inside a
//! try/catch envelope so a thrown exception comes back as
//! [`HostError::Script`] carrying `err.message`. Surfaces, audio contexts and
//! font probes live in a registry on `window.__fplab`, keyed by the ids handed
//! back to collectors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;

use super::js::number_to_js;
use super::{
    AudioContextSpec, AudioGraph, DebugRendererInfo, DrawOp, GlContextKind, GlParameter, Host,
    HostError, HostResult, IntlFormatter, JsValue, NavigatorSnapshot, OfflineAudioContext,
    ProbeBatch, ProbeWidths, RenderCompletion, RenderedAudio, ScreenSnapshot, SurfaceId,
    SurfaceSpec, TouchSnapshot, ViewportSnapshot,
};
use crate::browser::page::PageConnection;

const REGISTRY: &str = "const R = (window.__fplab = window.__fplab || { next: 0, surfaces: new Map(), probes: new Map(), audio: new Map(), renders: new Map() });";

const NAVIGATOR_SCRIPT: &str = r#"(() => {
  const n = navigator;
  const list = (l) => (l && typeof l.length === 'number' ? Array.from(l) : null);
  return {
    plugins: n.plugins ? Array.from(n.plugins).map((p) => p.name) : null,
    hardwareConcurrency: n.hardwareConcurrency,
    deviceMemory: n.deviceMemory,
    language: n.language,
    languages: list(n.languages),
    platform: n.platform,
    userAgent: n.userAgent,
    appVersion: n.appVersion,
    vendor: n.vendor,
    productSub: n.productSub,
  };
})()"#;

const SCREEN_SCRIPT: &str = r#"(() => ({
  width: screen.width,
  height: screen.height,
  availHeight: screen.availHeight,
  availWidth: screen.availWidth,
  availLeft: screen.availLeft,
  availTop: screen.availTop,
  innerHeight: window.innerHeight,
  innerWidth: window.innerWidth,
  outerWidth: window.outerWidth,
  outerHeight: window.outerHeight,
  screenX: window.screenX,
  screenLeft: window.screenLeft,
  screenY: window.screenY,
  screenTop: window.screenTop,
  isExtended: screen.isExtended,
  colorDepth: screen.colorDepth,
  pixelDepth: screen.pixelDepth,
  devicePixelRatio: window.devicePixelRatio,
  orientation: screen.orientation ? { type: screen.orientation.type } : null,
}))()"#;

const VIEWPORT_SCRIPT: &str = r#"(() => {
  const v = window.visualViewport;
  return v ? { width: v.width, height: v.height, scale: v.scale } : null;
})()"#;

const TOUCH_SCRIPT: &str = r#"(() => {
  let touchEvent;
  try {
    document.createEvent('TouchEvent');
    touchEvent = true;
  } catch (e) {
    touchEvent = false;
  }
  return {
    maxTouchPoints: navigator.maxTouchPoints,
    msMaxTouchPoints: navigator.msMaxTouchPoints,
    touchEvent,
    touchStart: 'ontouchstart' in window,
  };
})()"#;

const PROBE_STYLE: &str = "position: absolute; visibility: hidden; display: block !important";

const PROBE_TEMPLATE: &str = "<b style=\"display:inline !important; width:auto !important; font:normal 10px/1 'X',sans-serif !important\">ww</b><b style=\"display:inline !important; width:auto !important; font:normal 10px/1 'X',monospace !important\">ww</b>";

pub struct CdpHost {
    page: Arc<PageConnection>,
    probe_timeout: Duration,
}

impl CdpHost {
    /// `probe_timeout` bounds each individual evaluation.
    pub fn new(page: Arc<PageConnection>, probe_timeout: Duration) -> Self {
        Self {
            page,
            probe_timeout,
        }
    }

    pub fn page(&self) -> &Arc<PageConnection> {
        &self.page
    }

    async fn eval_raw(&self, expression: &str) -> HostResult<Option<Value>> {
        evaluate_guarded(&self.page, expression, Some(self.probe_timeout)).await
    }

    async fn eval<T: DeserializeOwned>(&self, expression: &str) -> HostResult<T> {
        let value = self.eval_raw(expression).await?.unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| HostError::Transport(format!("unexpected reply: {}", e)))
    }

    async fn eval_js(&self, expression: &str) -> HostResult<JsValue> {
        Ok(match self.eval_raw(expression).await? {
            Some(value) => JsValue::from(value),
            None => JsValue::undefined(),
        })
    }

    async fn on_surface<T: DeserializeOwned>(&self, id: SurfaceId, body: &str) -> HostResult<T> {
        self.eval(&surface_script(id, body)).await
    }
}

/// Wraps `expression` so exceptions and rejections resolve to `{ ok: false }`.
fn guard(expression: &str) -> String {
    format!(
        "(async () => {{ try {{ return {{ ok: true, value: await ({}) }}; }} catch (e) {{ return {{ ok: false, message: String(e && e.message !== undefined ? e.message : e) }}; }} }})()",
        expression
    )
}

fn registry_script(body: &str) -> String {
    format!("(() => {{ {} {} }})()", REGISTRY, body)
}

fn surface_script(id: SurfaceId, body: &str) -> String {
    registry_script(&format!(
        "const s = R.surfaces.get({id}); if (!s) throw new Error('unknown surface {id}'); {body}",
        id = id.0,
        body = body
    ))
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> HostResult<String> {
    serde_json::to_string(value).map_err(|e| HostError::Transport(e.to_string()))
}

async fn evaluate_guarded(
    page: &PageConnection,
    expression: &str,
    limit: Option<Duration>,
) -> HostResult<Option<Value>> {
    let script = guard(expression);
    let reply = match limit {
        Some(limit) => tokio::time::timeout(limit, page.evaluate(&script))
            .await
            .map_err(|_| HostError::Timeout(limit.as_millis() as u64))?,
        None => page.evaluate(&script).await,
    };

    let envelope = reply
        .map_err(|e| HostError::Transport(e.to_string()))?
        .unwrap_or(Value::Null);

    if envelope.get("ok").and_then(|v| v.as_bool()) == Some(true) {
        Ok(envelope.get("value").cloned())
    } else {
        let message = envelope
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("script evaluation failed");
        Err(HostError::Script(message.to_string()))
    }
}

#[derive(Deserialize)]
struct LocaleRead {
    present: bool,
    #[serde(default)]
    locale: JsValue,
}

#[async_trait]
impl Host for CdpHost {
    fn name(&self) -> &str {
        self.page.ws_url()
    }

    async fn navigator(&self) -> HostResult<NavigatorSnapshot> {
        self.eval(NAVIGATOR_SCRIPT).await
    }

    async fn resolved_locale(&self, formatter: IntlFormatter) -> HostResult<Option<JsValue>> {
        let read: LocaleRead = self
            .eval(&format!(
                "(() => {{ const obj = new Intl.{}(); if (!obj) return {{ present: false }}; return {{ present: true, locale: obj.resolvedOptions().locale }}; }})()",
                formatter.constructor()
            ))
            .await?;
        Ok(read.present.then_some(read.locale))
    }

    async fn format_date(&self, timestamp: f64) -> HostResult<String> {
        self.eval(&format!(
            "new Intl.DateTimeFormat(undefined, {{ month: 'long', timeZoneName: 'long' }}).format({})",
            number_to_js(timestamp)
        ))
        .await
    }

    async fn screen(&self) -> HostResult<ScreenSnapshot> {
        self.eval(SCREEN_SCRIPT).await
    }

    async fn visual_viewport(&self) -> HostResult<Option<ViewportSnapshot>> {
        self.eval(VIEWPORT_SCRIPT).await
    }

    async fn create_surface(&self, spec: SurfaceSpec) -> HostResult<SurfaceId> {
        let id: u64 = self
            .eval(&registry_script(&format!(
                "const c = document.createElement('canvas'); const w = {}; const h = {}; if (w !== null) c.width = w; if (h !== null) c.height = h; if ({}) c.style.display = 'none'; const id = ++R.next; R.surfaces.set(id, {{ canvas: c, ctx: null }}); return id;",
                json(&spec.width)?,
                json(&spec.height)?,
                spec.hidden
            )))
            .await?;
        Ok(SurfaceId(id))
    }

    async fn attach_surface(&self, id: SurfaceId) -> HostResult<()> {
        self.on_surface::<Value>(id, "document.body.appendChild(s.canvas); return true;")
            .await
            .map(|_| ())
    }

    async fn detach_surface(&self, id: SurfaceId) -> HostResult<()> {
        self.on_surface::<Value>(
            id,
            "if (s.canvas.parentNode) s.canvas.parentNode.removeChild(s.canvas); return true;",
        )
        .await
        .map(|_| ())
    }

    async fn release_surface(&self, id: SurfaceId) -> HostResult<()> {
        self.on_surface::<Value>(
            id,
            &format!(
                "if (s.ctx && typeof s.ctx.getExtension === 'function') {{ const lose = s.ctx.getExtension('WEBGL_lose_context'); if (lose) lose.loseContext(); }} if (s.canvas.parentNode) s.canvas.parentNode.removeChild(s.canvas); R.surfaces.delete({}); return true;",
                id.0
            ),
        )
        .await
        .map(|_| ())
    }

    async fn context_2d(&self, id: SurfaceId) -> HostResult<bool> {
        self.on_surface(id, "s.ctx = s.canvas.getContext('2d'); return !!s.ctx;")
            .await
    }

    async fn draw(&self, id: SurfaceId, ops: &[DrawOp]) -> HostResult<()> {
        self.on_surface::<Value>(
            id,
            &format!(
                "const ctx = s.ctx; for (const {{ op, args }} of {}) {{ if (op === 'text_baseline') ctx.textBaseline = args; else if (op === 'font') ctx.font = args; else if (op === 'fill_style') ctx.fillStyle = args; else if (op === 'fill_rect') ctx.fillRect(args.x, args.y, args.w, args.h); else if (op === 'fill_text') ctx.fillText(args.text, args.x, args.y); }} return true;",
                json(ops)?
            ),
        )
        .await
        .map(|_| ())
    }

    async fn to_data_url(&self, id: SurfaceId) -> HostResult<String> {
        self.on_surface(id, "return s.canvas.toDataURL();").await
    }

    async fn webgl_context(&self, id: SurfaceId, kind: GlContextKind) -> HostResult<bool> {
        self.on_surface(
            id,
            &format!(
                "for (const name of {}) {{ const gl = s.canvas.getContext(name); if (gl) {{ s.ctx = gl; return true; }} }} return false;",
                json(kind.context_names())?
            ),
        )
        .await
    }

    async fn debug_renderer_info(&self, id: SurfaceId) -> HostResult<Option<DebugRendererInfo>> {
        self.on_surface(
            id,
            "const gl = s.ctx; const ext = gl.getExtension('WEBGL_debug_renderer_info'); return ext ? { vendor: gl.getParameter(ext.UNMASKED_VENDOR_WEBGL), renderer: gl.getParameter(ext.UNMASKED_RENDERER_WEBGL) } : null;",
        )
        .await
    }

    async fn gl_parameter(&self, id: SurfaceId, parameter: GlParameter) -> HostResult<JsValue> {
        self.eval_js(&surface_script(
            id,
            &format!("return s.ctx.getParameter(s.ctx.{});", parameter.constant()),
        ))
        .await
    }

    async fn gl_context_attributes(&self, id: SurfaceId) -> HostResult<Vec<(String, JsValue)>> {
        self.on_surface(
            id,
            "const a = s.ctx.getContextAttributes(); return a ? Object.keys(a).map((k) => [k, a[k]]) : [];",
        )
        .await
    }

    async fn offline_audio_context(
        &self,
        spec: AudioContextSpec,
    ) -> HostResult<Option<Box<dyn OfflineAudioContext>>> {
        let id: Option<u64> = self
            .eval(&registry_script(&format!(
                "const Ctor = window.OfflineAudioContext || window.webkitOfflineAudioContext; if (!Ctor) return null; const ctx = new Ctor({}, {}, {}); if (!ctx) return null; const id = ++R.next; R.audio.set(id, ctx); return id;",
                spec.channels,
                spec.length,
                number_to_js(spec.sample_rate)
            )))
            .await?;

        Ok(id.map(|id| {
            Box::new(CdpAudioContext {
                page: Arc::clone(&self.page),
                id,
                probe_timeout: self.probe_timeout,
            }) as Box<dyn OfflineAudioContext>
        }))
    }

    async fn mount_font_probes(&self, families: &[String]) -> HostResult<ProbeBatch> {
        let id: u64 = self
            .eval(&registry_script(&format!(
                "const style = {style}; const template = {template}; const fragment = document.createDocumentFragment(); const divs = []; for (const font of {families}) {{ const div = document.createElement('div'); div.innerHTML = template.split('X').join(font); div.style.cssText = style; fragment.appendChild(div); divs.push(div); }} document.body.appendChild(fragment); const id = ++R.next; R.probes.set(id, divs); return id;",
                style = json(PROBE_STYLE)?,
                template = json(PROBE_TEMPLATE)?,
                families = json(families)?
            )))
            .await?;
        Ok(ProbeBatch(id))
    }

    async fn measure_font_probes(&self, batch: ProbeBatch) -> HostResult<Vec<ProbeWidths>> {
        let widths: Vec<(f64, f64)> = self
            .eval(&registry_script(&format!(
                "const divs = R.probes.get({id}); if (!divs) throw new Error('unknown probe batch {id}'); return divs.map((d) => {{ const b = d.getElementsByTagName('b'); return [b[0].offsetWidth, b[1].offsetWidth]; }});",
                id = batch.0
            )))
            .await?;

        Ok(widths
            .into_iter()
            .map(|(sans, mono)| ProbeWidths { sans, mono })
            .collect())
    }

    async fn unmount_font_probes(&self, batch: ProbeBatch) -> HostResult<()> {
        self.eval::<Value>(&registry_script(&format!(
            "for (const d of R.probes.get({id}) || []) {{ if (d.parentNode) d.parentNode.removeChild(d); }} R.probes.delete({id}); return true;",
            id = batch.0
        )))
        .await
        .map(|_| ())
    }

    async fn touch(&self) -> HostResult<TouchSnapshot> {
        self.eval(TOUCH_SCRIPT).await
    }
}

/// An `OfflineAudioContext` living in the page registry.
struct CdpAudioContext {
    page: Arc<PageConnection>,
    id: u64,
    probe_timeout: Duration,
}

#[async_trait]
impl OfflineAudioContext for CdpAudioContext {
    async fn start_rendering(&mut self, graph: &AudioGraph) -> HostResult<RenderCompletion> {
        evaluate_guarded(
            &self.page,
            &render_setup_script(self.id, graph)?,
            Some(self.probe_timeout),
        )
        .await?;

        // The render is awaited on its own connection so a render that never
        // completes cannot hold the page socket.
        let (tx, rx) = oneshot::channel();
        tokio::spawn(relay_render(
            tx,
            watch_render(self.page.ws_url().to_string(), self.id),
        ));

        Ok(rx)
    }
}

async fn watch_render(ws_url: String, id: u64) -> HostResult<Option<Value>> {
    let connection = PageConnection::connect(&ws_url)
        .await
        .map_err(|e| HostError::Transport(e.to_string()))?;
    evaluate_guarded(&connection, &render_wait_script(id), None).await
}

/// Forwards the render to `tx`, giving up as soon as the receiver is gone.
async fn relay_render<F>(mut tx: oneshot::Sender<Option<RenderedAudio>>, watch: F)
where
    F: Future<Output = HostResult<Option<Value>>>,
{
    tokio::select! {
        _ = tx.closed() => tracing::debug!("audio render no longer awaited, dropping watcher"),
        result = watch => match result {
            Ok(payload) => {
                let _ = tx.send(decode_render(payload));
            }
            Err(e) => tracing::debug!("audio render wait failed: {}", e),
        },
    }
}

fn render_setup_script(id: u64, graph: &AudioGraph) -> HostResult<String> {
    Ok(registry_script(&format!(
        r#"const ctx = R.audio.get({id});
if (!ctx) throw new Error('unknown audio context {id}');
R.audio.delete({id});
const osc = ctx.createOscillator();
osc.type = {kind};
osc.frequency.value = {frequency};
const comp = ctx.createDynamicsCompressor();
comp.threshold.value = {threshold};
comp.knee.value = {knee};
comp.attack.value = {attack};
const analyser = ctx.createAnalyser();
osc.connect(comp);
comp.connect(analyser);
comp.connect(ctx.destination);
osc.start(0);
const enc = (a) => {{
  const b = new Uint8Array(a.buffer, a.byteOffset, a.byteLength);
  let s = '';
  for (let i = 0; i < b.length; i += 0x8000) s += String.fromCharCode.apply(null, b.subarray(i, i + 0x8000));
  return btoa(s);
}};
R.renders.set({id}, new Promise((resolve) => {{
  ctx.oncomplete = (event) => {{
    try {{
      comp.disconnect();
      osc.disconnect();
      const frequency = new Float32Array(analyser.frequencyBinCount);
      analyser.getFloatFrequencyData(frequency);
      let timeDomain = null;
      if (typeof analyser.getFloatTimeDomainData === 'function') {{
        timeDomain = new Float32Array(analyser.fftSize);
        analyser.getFloatTimeDomainData(timeDomain);
      }}
      const buffer = event.renderedBuffer;
      const channel = new Float32Array(buffer.length);
      buffer.copyFromChannel(channel, 0);
      const reduction = typeof comp.reduction === 'number' ? comp.reduction : comp.reduction.value;
      resolve({{
        frequency: enc(frequency),
        timeDomain: timeDomain && enc(timeDomain),
        channel: enc(channel),
        gainReduction: reduction,
      }});
    }} catch (e) {{
      resolve(null);
    }}
  }};
}}));
ctx.startRendering();
return true;"#,
        id = id,
        kind = json(graph.oscillator_type)?,
        frequency = number_to_js(graph.frequency),
        threshold = number_to_js(graph.threshold),
        knee = number_to_js(graph.knee),
        attack = number_to_js(graph.attack),
    )))
}

fn render_wait_script(id: u64) -> String {
    format!(
        "(async () => {{ const R = window.__fplab; const p = R && R.renders.get({id}); if (!p) return null; R.renders.delete({id}); return await p; }})()",
        id = id
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderPayload {
    frequency: Option<String>,
    time_domain: Option<String>,
    channel: String,
    gain_reduction: Option<f64>,
}

fn decode_render(payload: Option<Value>) -> Option<RenderedAudio> {
    let payload: RenderPayload = match serde_json::from_value(payload?) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("audio render payload unreadable: {}", e);
            return None;
        }
    };

    let frequency_data = match payload.frequency {
        Some(encoded) => Some(decode_f32(&encoded)?),
        None => None,
    };
    let time_domain_data = match payload.time_domain {
        Some(encoded) => Some(decode_f32(&encoded)?),
        None => None,
    };

    Some(RenderedAudio {
        frequency_data,
        time_domain_data,
        channel_data: decode_f32(&payload.channel)?,
        gain_reduction: payload.gain_reduction.unwrap_or(f64::NAN),
    })
}

/// Decodes base64 of little-endian `Float32Array` bytes.
fn decode_f32(encoded: &str) -> Option<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[f32]) -> String {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn guard_awaits_the_expression() {
        let script = guard("navigator.platform");
        assert!(script.starts_with("(async () => { try { return { ok: true, value: await (navigator.platform) }; }"));
        assert!(script.contains("e.message"));
    }

    #[test]
    fn surface_scripts_look_up_the_registry() {
        let script = surface_script(SurfaceId(7), "return s.canvas.toDataURL();");
        assert!(script.contains("window.__fplab"));
        assert!(script.contains("R.surfaces.get(7)"));
        assert!(script.ends_with("return s.canvas.toDataURL(); })()"));
    }

    #[test]
    fn float_arrays_decode_little_endian() {
        let samples = [0.5f32, -1.25, 3.0e-7];
        assert_eq!(decode_f32(&encode(&samples)), Some(samples.to_vec()));
        assert_eq!(decode_f32("AAA="), None);
        assert_eq!(decode_f32("not base64!"), None);
    }

    #[test]
    fn render_payload_decodes() {
        let payload = serde_json::json!({
            "frequency": encode(&[-100.0, -90.5]),
            "timeDomain": null,
            "channel": encode(&[0.25, -0.25]),
            "gainReduction": -20.5,
        });

        let rendered = decode_render(Some(payload)).unwrap();
        assert_eq!(rendered.frequency_data, Some(vec![-100.0, -90.5]));
        assert_eq!(rendered.time_domain_data, None);
        assert_eq!(rendered.channel_data, vec![0.25, -0.25]);
        assert_eq!(rendered.gain_reduction, -20.5);
    }

    #[test]
    fn failed_extraction_is_none() {
        assert_eq!(decode_render(None), None);
        assert_eq!(decode_render(Some(Value::Null)), None);
    }

    #[tokio::test]
    async fn relay_delivers_the_decoded_render() {
        let (tx, rx) = oneshot::channel();
        let payload = serde_json::json!({
            "frequency": null,
            "timeDomain": null,
            "channel": encode(&[0.5]),
            "gainReduction": -1.0,
        });

        relay_render(tx, async move { Ok(Some(payload)) }).await;

        let rendered = rx.await.unwrap().unwrap();
        assert_eq!(rendered.channel_data, vec![0.5]);
    }

    #[tokio::test]
    async fn relay_stops_once_the_receiver_is_dropped() {
        let (tx, rx) = oneshot::channel();
        let watcher = tokio::spawn(relay_render(
            tx,
            futures::future::pending::<HostResult<Option<Value>>>(),
        ));

        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher kept running")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_wait_drops_the_sender() {
        let (tx, rx) = oneshot::channel();

        relay_render(tx, async { Err(HostError::Transport("socket closed".into())) }).await;

        assert!(rx.await.is_err());
    }

    #[test]
    fn render_setup_wires_the_graph() {
        let graph = AudioGraph {
            oscillator_type: "triangle",
            frequency: 10000.0,
            threshold: -50.0,
            knee: 40.0,
            attack: 0.0,
        };
        let script = render_setup_script(3, &graph).unwrap();
        assert!(script.contains("osc.type = \"triangle\";"));
        assert!(script.contains("osc.frequency.value = 10000;"));
        assert!(script.contains("comp.threshold.value = -50;"));
        assert!(script.contains("comp.knee.value = 40;"));
        assert!(script.contains("comp.attack.value = 0;"));
        assert!(!script.contains("setValueAtTime"));
        assert!(script.contains("R.renders.set(3,"));
    }
}

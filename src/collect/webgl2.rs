use super::{with_cleanup, Failure, Finding, UNAVAILABLE};
use crate::host::{
    GlContextKind, GlParameter, Host, HostError, HostResult, SurfaceId, SurfaceSpec,
};

const SURFACE: SurfaceSpec = SurfaceSpec {
    width: Some(256),
    height: Some(128),
    hidden: true,
};

pub async fn collect(host: &dyn Host) -> Finding {
    let surface = match host.create_surface(SURFACE).await {
        Ok(surface) => surface,
        Err(e) => return Finding::Failed(Failure::Detail(e.to_string())),
    };

    let work = async {
        match host.attach_surface(surface).await {
            Ok(()) => report(host, surface).await,
            Err(e) => Err(e),
        }
    };
    let reported = with_cleanup(work, async {
        if let Err(e) = host.detach_surface(surface).await {
            tracing::debug!("webgl2 surface detach failed: {}", e);
        }
        if let Err(e) = host.release_surface(surface).await {
            tracing::debug!("webgl2 surface release failed: {}", e);
        }
    })
    .await;

    match reported {
        Ok(text) => Finding::Value(text),
        Err(e) => Finding::Failed(Failure::Detail(e.to_string())),
    }
}

async fn report(host: &dyn Host, surface: SurfaceId) -> HostResult<String> {
    if !host.webgl_context(surface, GlContextKind::WebGl2).await? {
        return Err(HostError::Script("WebGL2 is not supported".to_string()));
    }

    let (vendor, renderer) = match host.debug_renderer_info(surface).await? {
        Some(info) => (info.vendor.to_js_string(), info.renderer.to_js_string()),
        None => (UNAVAILABLE.to_string(), UNAVAILABLE.to_string()),
    };
    let version = host.gl_parameter(surface, GlParameter::Version).await?;
    let max_texture_size = host
        .gl_parameter(surface, GlParameter::MaxTextureSize)
        .await?;
    let max_draw_buffers = host
        .gl_parameter(surface, GlParameter::MaxDrawBuffers)
        .await?;

    Ok(format!(
        "WebGL2 Vendor: {}<br><br>WebGL2 Renderer: {}<br><br>WebGL2 Version: {}<br><br>Max Texture Size: {}<br><br>Max Draw Buffers: {}<br><br>",
        vendor,
        renderer,
        version.to_js_string(),
        max_texture_size.to_js_string(),
        max_draw_buffers.to_js_string()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};

    #[tokio::test]
    async fn reports_five_lines() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let text = collect(&host).await.render();

        assert!(text.starts_with("WebGL2 Vendor: Google Inc. (Intel)<br><br>"));
        assert!(text.contains("WebGL2 Version: WebGL 2.0 (OpenGL ES 3.0 Chromium)<br><br>"));
        assert!(text.ends_with("Max Texture Size: 16384<br><br>Max Draw Buffers: 8<br><br>"));
        assert_eq!(host.live_surfaces(), 0);
        assert_eq!(host.attached_surfaces(), 0);
    }

    #[tokio::test]
    async fn vendor_falls_back_to_marker() {
        let mut profile = DeviceProfile::default();
        if let Some(gl) = profile.webgl2.as_mut() {
            gl.debug_renderer_info = None;
        }
        let host = SimulatedHost::new(profile);

        assert!(collect(&host).await.render().starts_with(
            "WebGL2 Vendor: Not available<br><br>WebGL2 Renderer: Not available<br><br>"
        ));
    }

    #[tokio::test]
    async fn unsupported_context_detaches_surface() {
        let host = SimulatedHost::new(DeviceProfile::bare());
        assert_eq!(
            collect(&host).await.render(),
            "error: WebGL2 is not supported"
        );
        assert_eq!(host.live_surfaces(), 0);
        assert_eq!(host.attached_surfaces(), 0);
    }

    #[tokio::test]
    async fn failing_query_detaches_surface() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Webgl2);
        assert_eq!(
            collect(&host).await.render(),
            "error: simulated webgl2 failure"
        );
        assert_eq!(host.attached_surfaces(), 0);
    }
}

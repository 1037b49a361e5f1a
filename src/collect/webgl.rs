use super::{with_cleanup, Failure, Finding};
use crate::host::{GlContextKind, GlParameter, Host, HostResult, SurfaceId, SurfaceSpec};

const PARAMETERS: [(&str, GlParameter); 4] = [
    ("GL Version", GlParameter::Version),
    ("Shading Language Version", GlParameter::ShadingLanguageVersion),
    ("Vendor", GlParameter::Vendor),
    ("Renderer", GlParameter::Renderer),
];

pub async fn collect(host: &dyn Host) -> Finding {
    let surface = match host.create_surface(SurfaceSpec::default()).await {
        Ok(surface) => surface,
        Err(e) => return Finding::Failed(Failure::Detail(e.to_string())),
    };

    // Queries after context creation may throw; the surface goes away either way.
    let reported = with_cleanup(report(host, surface), async {
        if let Err(e) = host.release_surface(surface).await {
            tracing::debug!("webgl surface release failed: {}", e);
        }
    })
    .await;

    match reported {
        Ok(Some(text)) => Finding::Value(text),
        Ok(None) => Finding::Notice("WebGL is not supported.".to_string()),
        Err(e) => Finding::Failed(Failure::Detail(e.to_string())),
    }
}

async fn report(host: &dyn Host, surface: SurfaceId) -> HostResult<Option<String>> {
    if !host.webgl_context(surface, GlContextKind::WebGl).await? {
        return Ok(None);
    }

    let mut out = String::new();
    if let Some(info) = host.debug_renderer_info(surface).await? {
        out.push_str(&format!(
            "Unmasked Vendor: {}<br><br>",
            info.vendor.to_js_string()
        ));
        out.push_str(&format!(
            "Unmasked Renderer: {}<br><br>",
            info.renderer.to_js_string()
        ));
    }

    for (label, parameter) in PARAMETERS {
        let value = host.gl_parameter(surface, parameter).await?;
        out.push_str(&format!("{}: {}<br><br>", label, value.to_js_string()));
    }

    out.push_str("Context Attributes:<br>");
    for (name, value) in host.gl_context_attributes(surface).await? {
        out.push_str(&format!("  {}: {}<br>", name, value.to_js_string()));
    }

    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};

    #[tokio::test]
    async fn full_report_with_debug_info() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let text = collect(&host).await.render();

        assert!(text.starts_with("Unmasked Vendor: Google Inc. (Intel)<br><br>Unmasked Renderer: ANGLE"));
        assert!(text.contains("GL Version: WebGL 1.0 (OpenGL ES 2.0 Chromium)<br><br>"));
        assert!(text.contains("Vendor: WebKit<br><br>Renderer: WebKit WebGL<br><br>"));
        assert!(text.contains("Context Attributes:<br>  alpha: true<br>  antialias: true<br>"));
        assert!(text.ends_with("  xrCompatible: false<br>"));
        assert_eq!(host.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn debug_lines_are_omitted_without_extension() {
        let mut profile = DeviceProfile::default();
        if let Some(gl) = profile.webgl.as_mut() {
            gl.debug_renderer_info = None;
        }
        let host = SimulatedHost::new(profile);

        assert!(collect(&host).await.render().starts_with("GL Version: "));
    }

    #[tokio::test]
    async fn missing_webgl_is_a_notice() {
        let host = SimulatedHost::new(DeviceProfile::bare());
        assert_eq!(
            collect(&host).await,
            Finding::Notice("WebGL is not supported.".to_string())
        );
        assert_eq!(host.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn failing_query_is_detailed_and_cleaned_up() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Webgl);
        assert_eq!(
            collect(&host).await.render(),
            "error: simulated webgl failure"
        );
        assert_eq!(host.live_surfaces(), 0);
    }
}

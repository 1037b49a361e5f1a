use super::{Failure, Finding, UNAVAILABLE};
use crate::host::{Host, JsValue, ScreenSnapshot};

pub async fn collect(host: &dyn Host) -> Finding {
    match host.screen().await {
        Ok(screen) => Finding::Value(describe(&screen)),
        Err(e) => {
            tracing::debug!("screen read failed: {}", e);
            Finding::Failed(Failure::Token("error"))
        }
    }
}

fn describe(s: &ScreenSnapshot) -> String {
    let orientation = match &s.orientation {
        Some(orientation) => orientation.kind.to_js_string(),
        None => UNAVAILABLE.to_string(),
    };

    let fields = [
        ("screen.width", s.width.or_marker(UNAVAILABLE)),
        ("screen.height", s.height.or_marker(UNAVAILABLE)),
        ("screen.availHeight", s.avail_height.or_marker(UNAVAILABLE)),
        ("screen.availWidth", s.avail_width.or_marker(UNAVAILABLE)),
        ("screen.availLeft", s.avail_left.or_marker(UNAVAILABLE)),
        ("screen.availTop", s.avail_top.or_marker(UNAVAILABLE)),
        ("innerHeight", s.inner_height.or_marker(UNAVAILABLE)),
        ("innerWidth", s.inner_width.or_marker(UNAVAILABLE)),
        ("outerWidth", s.outer_width.or_marker(UNAVAILABLE)),
        ("outerHeight", s.outer_height.or_marker(UNAVAILABLE)),
        ("screenX", first_truthy(&[&s.screen_x, &s.screen_left])),
        ("screenY", first_truthy(&[&s.screen_y, &s.screen_top])),
        ("screen.isExtended", s.is_extended.or_marker(UNAVAILABLE)),
        ("screen.colorDepth", s.color_depth.or_marker(UNAVAILABLE)),
        ("screen.pixelDepth", s.pixel_depth.or_marker(UNAVAILABLE)),
        (
            "window.devicePixelRatio",
            s.device_pixel_ratio.or_marker(UNAVAILABLE),
        ),
        ("screen.orientation", orientation),
    ];

    fields
        .iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("<br><br>")
}

/// `a || b || marker`
fn first_truthy(candidates: &[&JsValue]) -> String {
    candidates
        .iter()
        .find(|v| v.truthy())
        .map(|v| v.to_js_string())
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};

    #[tokio::test]
    async fn fields_follow_fixed_order_without_trailing_break() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let text = collect(&host).await.render();

        assert!(text.starts_with("screen.width: 1920<br><br>screen.height: 1080<br><br>"));
        assert!(text.ends_with("screen.orientation: landscape-primary"));
        assert_eq!(text.matches("<br><br>").count(), 16);
    }

    #[tokio::test]
    async fn zero_offsets_read_as_unavailable() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let text = collect(&host).await.render();

        // Known ambiguity: a genuine zero is indistinguishable from a missing value.
        assert!(text.contains("screen.availLeft: Not available<br><br>"));
        assert!(text.contains("screenX: Not available<br><br>"));
        assert!(text.contains("screen.isExtended: Not available<br><br>"));
    }

    #[tokio::test]
    async fn screen_x_falls_back_to_screen_left() {
        let mut profile = DeviceProfile::default();
        profile.screen.screen_left = 64u32.into();
        profile.screen.screen_top = 32u32.into();
        let host = SimulatedHost::new(profile);
        let text = collect(&host).await.render();

        assert!(text.contains("screenX: 64<br><br>screenY: 32<br><br>"));
    }

    #[tokio::test]
    async fn orientation_without_type_prints_undefined() {
        let mut profile = DeviceProfile::default();
        profile.screen.orientation = Some(Default::default());
        let host = SimulatedHost::new(profile);
        assert!(collect(&host)
            .await
            .render()
            .ends_with("screen.orientation: undefined"));

        let mut profile = DeviceProfile::default();
        profile.screen.orientation = None;
        let host = SimulatedHost::new(profile);
        assert!(collect(&host)
            .await
            .render()
            .ends_with("screen.orientation: Not available"));
    }

    #[tokio::test]
    async fn host_failure_is_bare_error() {
        let host = SimulatedHost::new(DeviceProfile::default())
            .failing_on(crate::collect::CollectorKind::Screen);
        assert_eq!(collect(&host).await.render(), "error");
    }
}

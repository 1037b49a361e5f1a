use super::{Failure, Finding};
use crate::host::Host;

pub async fn collect(host: &dyn Host) -> Finding {
    match host.visual_viewport().await {
        Ok(Some(viewport)) => Finding::Value(format!(
            "visualViewport.width: {}<br><br>visualViewport.height: {}<br><br>visualViewport.scale: {}<br><br>",
            viewport.width.to_js_string(),
            viewport.height.to_js_string(),
            viewport.scale.to_js_string()
        )),
        Ok(None) => Finding::Failed(Failure::Detail(
            "Visual viewport is not supported".to_string(),
        )),
        Err(e) => Finding::Failed(Failure::Detail(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};
    use crate::host::{JsValue, ViewportSnapshot};

    #[tokio::test]
    async fn reports_size_and_scale() {
        let host = SimulatedHost::new(DeviceProfile::default());
        assert_eq!(
            collect(&host).await.render(),
            "visualViewport.width: 1920<br><br>visualViewport.height: 963<br><br>visualViewport.scale: 1<br><br>"
        );
    }

    #[tokio::test]
    async fn values_are_not_replaced_by_marker() {
        let mut profile = DeviceProfile::default();
        profile.visual_viewport = Some(ViewportSnapshot {
            width: 0u32.into(),
            height: JsValue::undefined(),
            scale: 1.5.into(),
        });
        let host = SimulatedHost::new(profile);

        assert_eq!(
            collect(&host).await.render(),
            "visualViewport.width: 0<br><br>visualViewport.height: undefined<br><br>visualViewport.scale: 1.5<br><br>"
        );
    }

    #[tokio::test]
    async fn missing_viewport_is_detailed_error() {
        let host = SimulatedHost::new(DeviceProfile::bare());
        assert_eq!(
            collect(&host).await.render(),
            "error: Visual viewport is not supported"
        );
    }

    #[tokio::test]
    async fn host_error_carries_its_message() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Viewport);
        assert_eq!(
            collect(&host).await.render(),
            "error: simulated viewport failure"
        );
    }
}

use super::{Failure, Finding};
use crate::host::js::number_to_js;
use crate::host::{Host, TouchSnapshot};

pub async fn collect(host: &dyn Host) -> Finding {
    match host.touch().await {
        Ok(touch) => Finding::Value(format!(
            "maxTouchPoints: {}<br><br>touchEvent: {}<br><br>touchStart: {}<br><br>",
            max_touch_points(&touch),
            touch.touch_event,
            touch.touch_start
        )),
        Err(e) => Finding::Failed(Failure::Detail(e.to_string())),
    }
}

/// `maxTouchPoints` parsed as an integer, else the legacy `msMaxTouchPoints`, else 0.
fn max_touch_points(touch: &TouchSnapshot) -> String {
    if !touch.max_touch_points.is_undefined() {
        number_to_js(touch.max_touch_points.parse_int())
    } else if !touch.ms_max_touch_points.is_undefined() {
        touch.ms_max_touch_points.to_js_string()
    } else {
        "0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};
    use crate::host::JsValue;

    fn host_with(touch: TouchSnapshot) -> SimulatedHost {
        let mut profile = DeviceProfile::default();
        profile.touch = touch;
        SimulatedHost::new(profile)
    }

    #[tokio::test]
    async fn desktop_reports_no_touch() {
        let host = SimulatedHost::new(DeviceProfile::default());
        assert_eq!(
            collect(&host).await.render(),
            "maxTouchPoints: 0<br><br>touchEvent: false<br><br>touchStart: false<br><br>"
        );
    }

    #[tokio::test]
    async fn touch_device_reports_points() {
        let host = host_with(TouchSnapshot {
            max_touch_points: "5".into(),
            ms_max_touch_points: JsValue::undefined(),
            touch_event: true,
            touch_start: true,
        });
        assert_eq!(
            collect(&host).await.render(),
            "maxTouchPoints: 5<br><br>touchEvent: true<br><br>touchStart: true<br><br>"
        );
    }

    #[tokio::test]
    async fn legacy_points_are_used_when_standard_is_undefined() {
        let host = host_with(TouchSnapshot {
            max_touch_points: JsValue::undefined(),
            ms_max_touch_points: 10u32.into(),
            touch_event: false,
            touch_start: false,
        });
        assert!(collect(&host)
            .await
            .render()
            .starts_with("maxTouchPoints: 10<br><br>"));
    }

    #[tokio::test]
    async fn neither_property_defaults_to_zero() {
        let host = host_with(TouchSnapshot::default());
        assert!(collect(&host)
            .await
            .render()
            .starts_with("maxTouchPoints: 0<br><br>"));
    }

    #[tokio::test]
    async fn non_numeric_points_parse_to_nan() {
        let host = host_with(TouchSnapshot {
            max_touch_points: JsValue::null(),
            ..TouchSnapshot::default()
        });
        assert!(collect(&host)
            .await
            .render()
            .starts_with("maxTouchPoints: NaN<br><br>"));
    }

    #[tokio::test]
    async fn host_failure_is_detailed() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Touch);
        assert_eq!(
            collect(&host).await.render(),
            "error: simulated touch failure"
        );
    }
}

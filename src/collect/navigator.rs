use super::{Failure, Finding, UNAVAILABLE};
use crate::host::js::join_js;
use crate::host::{Host, NavigatorSnapshot};

pub async fn collect(host: &dyn Host) -> Finding {
    let snapshot = match host.navigator().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::debug!("navigator read failed: {}", e);
            return Finding::Failed(Failure::Token("error"));
        }
    };

    match describe(&snapshot) {
        Some(text) => Finding::Value(text),
        None => Finding::Failed(Failure::Token("error")),
    }
}

/// `None` when the plugin or language list cannot be read.
fn describe(navigator: &NavigatorSnapshot) -> Option<String> {
    let plugins = or_fallback(join_js(navigator.plugins.as_ref()?, ", "), "No plugins found");
    let languages = or_fallback(
        join_js(navigator.languages.as_ref()?, ", "),
        "No languages found",
    );

    let fields = [
        ("plugins", plugins),
        (
            "hardwareConcurrency",
            navigator.hardware_concurrency.or_marker(UNAVAILABLE),
        ),
        ("deviceMemory", navigator.device_memory.or_marker(UNAVAILABLE)),
        ("language", navigator.language.or_marker(UNAVAILABLE)),
        ("languages", languages),
        ("platform", navigator.platform.or_marker(UNAVAILABLE)),
        ("userAgent", navigator.user_agent.or_marker(UNAVAILABLE)),
        ("appVersion", navigator.app_version.or_marker(UNAVAILABLE)),
        ("vendor", navigator.vendor.or_marker(UNAVAILABLE)),
        ("productSub", navigator.product_sub.or_marker(UNAVAILABLE)),
    ];

    Some(
        fields
            .iter()
            .map(|(name, value)| format!("navigator.{}: {}<br><br>", name, value))
            .collect(),
    )
}

fn or_fallback(joined: String, fallback: &str) -> String {
    if joined.is_empty() {
        fallback.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};
    use crate::host::JsValue;

    fn host_with(edit: impl FnOnce(&mut NavigatorSnapshot)) -> SimulatedHost {
        let mut profile = DeviceProfile::default();
        if let Some(navigator) = profile.navigator.as_mut() {
            edit(navigator);
        }
        SimulatedHost::new(profile)
    }

    #[tokio::test]
    async fn lists_ten_fields_in_order() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let text = collect(&host).await.render();

        let labels: Vec<&str> = text
            .split("<br><br>")
            .filter(|s| !s.is_empty())
            .filter_map(|line| line.split(": ").next())
            .collect();
        assert_eq!(
            labels,
            vec![
                "navigator.plugins",
                "navigator.hardwareConcurrency",
                "navigator.deviceMemory",
                "navigator.language",
                "navigator.languages",
                "navigator.platform",
                "navigator.userAgent",
                "navigator.appVersion",
                "navigator.vendor",
                "navigator.productSub",
            ]
        );
        assert!(text.contains("navigator.languages: en-US, en<br><br>"));
        assert!(text.ends_with("navigator.productSub: 20030107<br><br>"));
    }

    #[tokio::test]
    async fn falsy_fields_show_marker_in_place() {
        let host = host_with(|n| {
            n.device_memory = JsValue::undefined();
            n.vendor = "".into();
            n.hardware_concurrency = 0u32.into();
        });
        let text = collect(&host).await.render();

        assert!(text.contains("navigator.hardwareConcurrency: Not available<br><br>"));
        assert!(text.contains("navigator.deviceMemory: Not available<br><br>"));
        assert!(text.contains("navigator.vendor: Not available<br><br>navigator.productSub"));
    }

    #[tokio::test]
    async fn empty_lists_use_their_own_markers() {
        let host = host_with(|n| {
            n.plugins = Some(Vec::new());
            n.languages = Some(Vec::new());
        });
        let text = collect(&host).await.render();

        assert!(text.starts_with("navigator.plugins: No plugins found<br><br>"));
        assert!(text.contains("navigator.languages: No languages found<br><br>"));
    }

    #[tokio::test]
    async fn unreadable_languages_is_an_error() {
        let host = host_with(|n| n.languages = None);
        assert_eq!(collect(&host).await, Finding::Failed(Failure::Token("error")));
    }

    #[tokio::test]
    async fn host_failure_is_an_error() {
        let mut profile = DeviceProfile::default();
        profile.navigator = None;
        let host = SimulatedHost::new(profile);
        assert_eq!(collect(&host).await.render(), "error");
    }
}

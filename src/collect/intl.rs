use super::{Failure, Finding};
use crate::host::js::join_js;
use crate::host::{Host, IntlFormatter, JsValue};

/// 2000-07-15T07:00:00Z
pub const SAMPLE_TIMESTAMP: f64 = 963_644_400_000.0;

pub async fn collect(host: &dyn Host) -> Finding {
    let locales = resolved_locales(host).await;

    match host.format_date(SAMPLE_TIMESTAMP).await {
        Ok(date) => Finding::Value(format!(
            "Locale: {}<br><br>DateTimeFormat: {}<br><br>",
            join_js(&locales, ", "),
            date
        )),
        Err(e) => Finding::Failed(Failure::Detail(e.to_string())),
    }
}

/// Unique resolved locales in first-seen order. Formatters that fail are skipped.
async fn resolved_locales(host: &dyn Host) -> Vec<JsValue> {
    let mut locales: Vec<JsValue> = Vec::new();

    for formatter in IntlFormatter::ALL {
        match host.resolved_locale(formatter).await {
            Ok(Some(locale)) => {
                if !locales.contains(&locale) {
                    locales.push(locale);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!("Intl.{} skipped: {}", formatter.constructor(), e),
        }
    }

    locales
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::profile::LocaleOverride;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};

    #[tokio::test]
    async fn same_locale_collapses_to_one() {
        let host = SimulatedHost::new(DeviceProfile::default());
        assert_eq!(
            collect(&host).await.render(),
            "Locale: en-US<br><br>DateTimeFormat: July Coordinated Universal Time<br><br>"
        );
    }

    #[tokio::test]
    async fn distinct_locales_keep_first_seen_order() {
        let mut profile = DeviceProfile::default();
        profile.intl.overrides = vec![
            LocaleOverride {
                formatter: IntlFormatter::Collator,
                locale: "de-DE".into(),
            },
            LocaleOverride {
                formatter: IntlFormatter::PluralRules,
                locale: "de-DE".into(),
            },
        ];
        profile.intl.unsupported = vec![IntlFormatter::DisplayNames];
        let host = SimulatedHost::new(profile);

        assert!(collect(&host)
            .await
            .render()
            .starts_with("Locale: de-DE, en-US<br><br>"));
    }

    #[tokio::test]
    async fn undefined_locale_renders_empty_entry() {
        let mut profile = DeviceProfile::default();
        profile.intl.overrides = vec![LocaleOverride {
            formatter: IntlFormatter::ListFormat,
            locale: JsValue::undefined(),
        }];
        profile.intl.falsy = vec![IntlFormatter::Collator];
        let host = SimulatedHost::new(profile);

        assert!(collect(&host)
            .await
            .render()
            .starts_with("Locale: en-US, <br><br>"));
    }

    #[tokio::test]
    async fn date_failure_is_detailed() {
        let mut profile = DeviceProfile::default();
        profile.intl.date_text = None;
        let host = SimulatedHost::new(profile);

        assert_eq!(
            collect(&host).await.render(),
            "error: Incorrect locale information provided"
        );
    }

    #[tokio::test]
    async fn host_failure_is_detailed() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Intl);
        assert_eq!(
            collect(&host).await.render(),
            "error: simulated intl failure"
        );
    }
}

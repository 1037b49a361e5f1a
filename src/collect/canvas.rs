use super::{with_cleanup, Failure, Finding};
use crate::host::{DrawOp, Host, HostError, HostResult, SurfaceId, SurfaceSpec};

/// Pangram plus every printable ASCII symbol.
pub const SAMPLE_TEXT: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ`~1!2@3#4$5%6^7&8*9(0)-_=+[{]}|;:',<.>/?";

pub fn draw_ops() -> Vec<DrawOp> {
    vec![
        DrawOp::TextBaseline("top".to_string()),
        DrawOp::Font("14px 'Arial'".to_string()),
        DrawOp::TextBaseline("alphabetic".to_string()),
        DrawOp::FillStyle("#f60".to_string()),
        DrawOp::FillRect {
            x: 125.0,
            y: 1.0,
            w: 62.0,
            h: 20.0,
        },
        DrawOp::FillStyle("#069".to_string()),
        DrawOp::FillText {
            text: SAMPLE_TEXT.to_string(),
            x: 2.0,
            y: 15.0,
        },
        DrawOp::FillStyle("rgba(102, 204, 0, 0.7)".to_string()),
        DrawOp::FillText {
            text: SAMPLE_TEXT.to_string(),
            x: 4.0,
            y: 17.0,
        },
    ]
}

pub async fn collect(host: &dyn Host) -> Finding {
    let surface = match host.create_surface(SurfaceSpec::default()).await {
        Ok(surface) => surface,
        Err(e) => return error(e),
    };

    let rendered = with_cleanup(render(host, surface), async {
        if let Err(e) = host.release_surface(surface).await {
            tracing::debug!("canvas surface release failed: {}", e);
        }
    })
    .await;

    match rendered {
        Ok(data_url) => Finding::Value(data_url),
        Err(e) => error(e),
    }
}

async fn render(host: &dyn Host, surface: SurfaceId) -> HostResult<String> {
    if !host.context_2d(surface).await? {
        return Err(HostError::Script("2d context is unavailable".to_string()));
    }
    host.draw(surface, &draw_ops()).await?;
    host.to_data_url(surface).await
}

fn error(e: HostError) -> Finding {
    tracing::debug!("canvas fingerprint failed: {}", e);
    Finding::Failed(Failure::Token("Error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::CollectorKind;
    use crate::host::simulated::{DeviceProfile, SimulatedHost};

    #[test]
    fn sample_text_is_94_characters() {
        assert_eq!(SAMPLE_TEXT.chars().count(), 94);
    }

    #[tokio::test]
    async fn same_host_gives_identical_data_url() {
        let host = SimulatedHost::new(DeviceProfile::default());
        let first = collect(&host).await;
        let second = collect(&host).await;

        assert!(matches!(&first, Finding::Value(url) if url.starts_with("data:image/png;base64,")));
        assert_eq!(first, second);
        assert_eq!(host.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn missing_2d_context_is_error() {
        let host = SimulatedHost::new(DeviceProfile::bare());
        assert_eq!(collect(&host).await.render(), "Error");
        assert_eq!(host.live_surfaces(), 0);
    }

    #[tokio::test]
    async fn failing_encode_still_releases_surface() {
        let host = SimulatedHost::new(DeviceProfile::default()).failing_on(CollectorKind::Canvas);
        assert_eq!(collect(&host).await, Finding::Failed(Failure::Token("Error")));
        assert_eq!(host.live_surfaces(), 0);
    }
}

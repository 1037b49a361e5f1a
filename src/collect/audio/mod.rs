//! Offline audio rendering fingerprint.
//!
//! Renders a 10 kHz triangle wave through a dynamics compressor in an offline
//! context, then sums the rendered tail and compares it with known outputs for
//! the compressor's gain reduction.

pub mod reference;

use std::time::Duration;

use self::reference::{ReferenceTable, KNOWN_AUDIO};
use super::{Failure, Finding};
use crate::host::js::number_to_js;
use crate::host::{AudioContextSpec, AudioGraph, Host, RenderedAudio};

pub const CONTEXT: AudioContextSpec = AudioContextSpec {
    channels: 1,
    length: 5000,
    sample_rate: 44100.0,
};

/// First channel sample included in the sample sum.
pub const SNAPSHOT_START: usize = 4500;

pub fn graph() -> AudioGraph {
    AudioGraph {
        oscillator_type: "triangle",
        frequency: 10_000.0,
        threshold: -50.0,
        knee: 40.0,
        attack: 0.0,
    }
}

pub async fn collect(host: &dyn Host, timeout: Duration) -> Finding {
    collect_with(host, timeout, &KNOWN_AUDIO).await
}

pub async fn collect_with(
    host: &dyn Host,
    timeout: Duration,
    table: &ReferenceTable<'_>,
) -> Finding {
    let mut context = match host.offline_audio_context(CONTEXT).await {
        Ok(Some(context)) => context,
        Ok(None) => {
            return Finding::Notice("OfflineAudioContext is not supported.<br><br>".to_string())
        }
        Err(e) => return failed(e.to_string()),
    };

    let completion = match context.start_rendering(&graph()).await {
        Ok(completion) => completion,
        Err(e) => return failed(e.to_string()),
    };

    let rendered = match tokio::time::timeout(timeout, completion).await {
        Ok(Ok(Some(rendered))) => rendered,
        Ok(Ok(None)) => return Finding::Notice("Audio rendering failed.<br><br>".to_string()),
        Ok(Err(_)) => return failed("rendering was abandoned before completion".to_string()),
        Err(_) => {
            tracing::debug!("Offline audio render exceeded {:?}", timeout);
            return failed(format!(
                "rendering did not complete within {} ms",
                timeout.as_millis()
            ));
        }
    };

    Finding::Value(describe(&rendered, table))
}

fn failed(message: String) -> Finding {
    Finding::Failed(Failure::Audio(message))
}

fn describe(rendered: &RenderedAudio, table: &ReferenceTable<'_>) -> String {
    let frequency_sum = abs_sum(rendered.frequency_data.as_deref());
    let time_domain_sum = abs_sum(rendered.time_domain_data.as_deref());
    let sample_sum = sample_sum(&rendered.channel_data);
    let matches = table.matches(rendered.gain_reduction, sample_sum);

    let mut out = String::new();
    out.push_str(&format!("Sum: {}<br>", or_na(sample_sum)));
    out.push_str(&format!(
        "Gain Reduction: {}<br>",
        or_na(rendered.gain_reduction)
    ));
    out.push_str(&format!("Frequency Data Sum: {}<br>", or_na(frequency_sum)));
    out.push_str(&format!(
        "Time Domain Data Sum: {}<br>",
        or_na(time_domain_sum)
    ));
    out.push_str(&format!(
        "Matches Known Audio: {}<br><br>",
        if matches { "Yes" } else { "No" }
    ));
    out
}

/// Σ|x| over the rendered tail `[SNAPSHOT_START, length)`.
pub fn sample_sum(channel_data: &[f32]) -> f64 {
    let end = channel_data.len().min(CONTEXT.length as usize);
    let start = SNAPSHOT_START.min(end);
    abs_sum(Some(&channel_data[start..end]))
}

/// Absolute sum accumulated in `f64`, in order; 0 when there is no data.
pub fn abs_sum(values: Option<&[f32]>) -> f64 {
    values
        .unwrap_or(&[])
        .iter()
        .fold(0.0, |acc, v| acc + f64::from(v.abs()))
}

/// Zero and NaN read as missing, matching `value || "N/A"`.
fn or_na(value: f64) -> String {
    if value == 0.0 || value.is_nan() {
        "N/A".to_string()
    } else {
        number_to_js(value)
    }
}

//! Runs collectors in their fixed order and writes findings into slots.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;

use crate::collect::{self, CollectSettings, CollectorKind, Finding};
use crate::host::Host;
use crate::surface::{RenderSurface, SlotWrite};

/// Everything one run produced, in run order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub host: String,
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub collector: CollectorKind,
    pub slot: &'static str,
    pub status: &'static str,
    /// The collector's display string.
    pub text: String,
    /// What gets written into the slot.
    pub html: String,
    #[serde(skip)]
    pub finding: Finding,
}

impl Report {
    pub fn get(&self, kind: CollectorKind) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.collector == kind)
    }

    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.finding.is_failure()).count()
    }
}

pub struct Orchestrator {
    kinds: Vec<CollectorKind>,
    settings: CollectSettings,
    canvas_image: bool,
}

impl Orchestrator {
    pub fn new(settings: CollectSettings) -> Self {
        Self {
            kinds: CollectorKind::ALL.to_vec(),
            settings,
            canvas_image: false,
        }
    }

    /// Restricts the run to `kinds`. The fixed order still applies; an empty
    /// selection keeps every collector.
    pub fn only(mut self, kinds: &[CollectorKind]) -> Self {
        if !kinds.is_empty() {
            self.kinds = CollectorKind::ALL
                .iter()
                .copied()
                .filter(|k| kinds.contains(k))
                .collect();
        }
        self
    }

    /// Show the canvas result as an image instead of its data URL text.
    pub fn canvas_image(mut self, enabled: bool) -> Self {
        self.canvas_image = enabled;
        self
    }

    pub fn kinds(&self) -> &[CollectorKind] {
        &self.kinds
    }

    /// Runs every selected collector against `host`, one at a time.
    pub async fn collect(&self, host: &dyn Host) -> Report {
        let mut entries = Vec::with_capacity(self.kinds.len());

        for &kind in &self.kinds {
            let finding = guarded(kind, host, &self.settings).await;
            tracing::debug!("{} collector finished: {}", kind, finding.status());

            entries.push(ReportEntry {
                collector: kind,
                slot: kind.slot(),
                status: finding.status(),
                text: finding.render(),
                html: self.slot_markup(kind, &finding),
                finding,
            });
        }

        Report {
            host: host.name().to_string(),
            entries,
        }
    }

    /// Writes each entry into its slot. Returns how many slots were written.
    pub async fn render(&self, report: &Report, surface: &mut dyn RenderSurface) -> usize {
        let mut written = 0;

        for entry in &report.entries {
            match surface.write_slot(entry.slot, &entry.html).await {
                Ok(SlotWrite::Written) => written += 1,
                Ok(SlotWrite::Missing) => {
                    tracing::error!("Element with id '{}' not found", entry.slot);
                }
                Err(e) => {
                    tracing::error!("Failed to write slot '{}': {}", entry.slot, e);
                }
            }
        }

        written
    }

    pub async fn run(&self, host: &dyn Host, surface: &mut dyn RenderSurface) -> Report {
        let report = self.collect(host).await;
        self.render(&report, surface).await;
        report
    }

    fn slot_markup(&self, kind: CollectorKind, finding: &Finding) -> String {
        match (kind, finding) {
            (CollectorKind::Webgl, _) => format!("<pre>{}</pre>", finding.render()),
            (CollectorKind::Canvas, Finding::Value(url)) if self.canvas_image => {
                format!("<img src=\"{}\">", url)
            }
            _ => finding.render(),
        }
    }
}

/// Runs one collector, turning a panic into that collector's failure.
async fn guarded(kind: CollectorKind, host: &dyn Host, settings: &CollectSettings) -> Finding {
    match AssertUnwindSafe(collect::run(kind, host, settings))
        .catch_unwind()
        .await
    {
        Ok(finding) => finding,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("{} collector panicked: {}", kind, message);
            Finding::Failed(kind.failure(message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "collector panicked".to_string()
    }
}

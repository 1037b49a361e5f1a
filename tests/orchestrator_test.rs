//! End-to-end runs of the orchestrator against simulated devices.

use fplab::collect::{CollectSettings, CollectorKind, Finding};
use fplab::host::simulated::{DeviceGenerator, DeviceProfile, SimulatedHost};
use fplab::orchestrator::Orchestrator;
use fplab::surface::MemorySurface;

const SLOTS: [&str; 10] = [
    "navigator", "intl", "screen", "viewport", "canvas", "audio", "webgl", "webgl2", "fonts",
    "mobile",
];

#[tokio::test]
async fn capable_device_fills_ten_slots_in_order() {
    let host = SimulatedHost::new(DeviceProfile::default());
    let orchestrator = Orchestrator::new(CollectSettings::default());
    let mut surface = MemorySurface::new();

    let report = orchestrator.run(&host, &mut surface).await;

    let written: Vec<&str> = surface.slots().iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(written, SLOTS);
    assert_eq!(report.failures(), 0);
    for entry in &report.entries {
        assert!(
            matches!(entry.finding, Finding::Value(_)),
            "{} produced {:?}",
            entry.collector,
            entry.finding
        );
    }
}

#[tokio::test]
async fn one_panicking_capability_leaves_nine_slots() {
    for kind in CollectorKind::ALL {
        let host = SimulatedHost::new(DeviceProfile::default()).panicking_on(kind);
        let orchestrator = Orchestrator::new(CollectSettings::default());
        let mut surface = MemorySurface::new();

        let report = orchestrator.run(&host, &mut surface).await;

        assert_eq!(surface.slots().len(), 10, "{} panic stopped the run", kind);
        assert_eq!(host.live_surfaces(), 0, "{} panic leaked a surface", kind);
        assert_eq!(host.attached_surfaces(), 0, "{} panic left a surface attached", kind);
        assert_eq!(host.mounted_probe_batches(), 0, "{} panic left font probes", kind);
        assert_eq!(report.failures(), 1, "{}", kind);
        assert!(report.get(kind).unwrap().finding.is_failure());
        for other in CollectorKind::ALL.iter().filter(|k| **k != kind) {
            assert!(
                !report.get(*other).unwrap().finding.is_failure(),
                "{} failed after {} panicked",
                other,
                kind
            );
        }
    }
}

#[tokio::test]
async fn panicking_audio_keeps_its_failure_shape() {
    let host = SimulatedHost::new(DeviceProfile::default()).panicking_on(CollectorKind::Audio);
    let report = Orchestrator::new(CollectSettings::default())
        .collect(&host)
        .await;

    assert_eq!(
        report.get(CollectorKind::Audio).unwrap().text,
        "Audio fingerprinting failed: simulated audio capability panicked<br><br>"
    );
}

#[tokio::test]
async fn failing_capabilities_use_collector_markers() {
    let mut host = SimulatedHost::new(DeviceProfile::default());
    for kind in CollectorKind::ALL {
        host = host.failing_on(kind);
    }
    let report = Orchestrator::new(CollectSettings::default())
        .collect(&host)
        .await;

    assert_eq!(report.get(CollectorKind::Navigator).unwrap().text, "error");
    assert_eq!(report.get(CollectorKind::Screen).unwrap().text, "error");
    assert_eq!(report.get(CollectorKind::Canvas).unwrap().text, "Error");
    assert_eq!(report.get(CollectorKind::Fonts).unwrap().text, "Error");
    assert_eq!(
        report.get(CollectorKind::Touch).unwrap().text,
        "error: simulated touch failure"
    );
}

#[tokio::test]
async fn missing_slots_do_not_stop_rendering() {
    let host = SimulatedHost::new(DeviceProfile::default());
    let orchestrator = Orchestrator::new(CollectSettings::default());
    let mut surface = MemorySurface::with_slots(["navigator", "audio", "mobile"]);

    let report = orchestrator.run(&host, &mut surface).await;

    assert_eq!(report.entries.len(), 10);
    let written: Vec<&str> = surface.slots().iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(written, ["navigator", "audio", "mobile"]);
}

#[tokio::test]
async fn selection_keeps_fixed_order() {
    let host = SimulatedHost::new(DeviceProfile::default());
    let orchestrator = Orchestrator::new(CollectSettings::default()).only(&[
        CollectorKind::Fonts,
        CollectorKind::Intl,
        CollectorKind::Canvas,
    ]);
    let mut surface = MemorySurface::new();

    orchestrator.run(&host, &mut surface).await;

    let written: Vec<&str> = surface.slots().iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(written, ["intl", "canvas", "fonts"]);
}

#[tokio::test]
async fn surfaces_and_probes_are_released() {
    let host = SimulatedHost::new(DeviceProfile::default());
    Orchestrator::new(CollectSettings::default())
        .collect(&host)
        .await;

    assert_eq!(host.live_surfaces(), 0);
    assert_eq!(host.attached_surfaces(), 0);
    assert_eq!(host.mounted_probe_batches(), 0);

    let failing = SimulatedHost::new(DeviceProfile::default())
        .failing_on(CollectorKind::Canvas)
        .failing_on(CollectorKind::Webgl)
        .failing_on(CollectorKind::Webgl2)
        .failing_on(CollectorKind::Fonts);
    Orchestrator::new(CollectSettings::default())
        .collect(&failing)
        .await;

    assert_eq!(failing.live_surfaces(), 0);
    assert_eq!(failing.attached_surfaces(), 0);
    assert_eq!(failing.mounted_probe_batches(), 0);
}

#[tokio::test]
async fn bare_device_reports_markers() {
    let host = SimulatedHost::new(DeviceProfile::bare());
    let report = Orchestrator::new(CollectSettings::default())
        .collect(&host)
        .await;

    assert_eq!(
        report.get(CollectorKind::Viewport).unwrap().text,
        "error: Visual viewport is not supported"
    );
    assert_eq!(
        report.get(CollectorKind::Audio).unwrap().text,
        "OfflineAudioContext is not supported.<br><br>"
    );
    assert_eq!(
        report.get(CollectorKind::Webgl2).unwrap().text,
        "error: WebGL2 is not supported"
    );
    assert_eq!(report.entries.len(), 10);
    assert_eq!(host.live_surfaces(), 0);
}

#[tokio::test]
async fn generated_devices_run_clean() {
    for seed in 0..8 {
        let profile = DeviceGenerator::with_seed(seed).generate();
        let host = SimulatedHost::new(profile);
        let report = Orchestrator::new(CollectSettings::default())
            .collect(&host)
            .await;

        assert_eq!(report.failures(), 0, "seed {}", seed);
    }
}

#[tokio::test]
async fn identical_devices_give_identical_reports() {
    let orchestrator = Orchestrator::new(CollectSettings::default());
    let first = orchestrator
        .collect(&SimulatedHost::new(DeviceGenerator::with_seed(42).generate()))
        .await;
    let second = orchestrator
        .collect(&SimulatedHost::new(DeviceGenerator::with_seed(42).generate()))
        .await;

    let texts = |r: &fplab::orchestrator::Report| -> Vec<String> {
        r.entries.iter().map(|e| e.text.clone()).collect()
    };
    assert_eq!(texts(&first), texts(&second));
}

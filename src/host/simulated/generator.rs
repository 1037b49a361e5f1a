//! Generator for statistically plausible simulated devices.
//!
//! Picks an OS by market share, then a screen, GPU, hardware tier and Chrome
//! version that fit that OS, and assembles a [`DeviceProfile`] whose platform,
//! user agent, GPU strings and fonts agree with each other.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::profile::{
    app_version, CanvasProfile, DeviceProfile, FontProfile, GlProfile, IntlProfile,
};
use crate::host::{
    DebugRendererInfo, JsValue, NavigatorSnapshot, Orientation, ScreenSnapshot, ViewportSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingSystem {
    Windows,
    MacOsIntel,
    MacOsArm,
    Linux,
}

impl OperatingSystem {
    /// `navigator.platform`
    pub fn platform(&self) -> &'static str {
        match self {
            Self::Windows => "Win32",
            Self::MacOsIntel | Self::MacOsArm => "MacIntel",
            Self::Linux => "Linux x86_64",
        }
    }

    pub fn user_agent(&self, chrome_version: u32) -> String {
        let system = match self {
            Self::Windows => "Windows NT 10.0; Win64; x64",
            Self::MacOsIntel | Self::MacOsArm => "Macintosh; Intel Mac OS X 10_15_7",
            Self::Linux => "X11; Linux x86_64",
        };

        format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
            system, chrome_version
        )
    }

    /// Sample date formatted in the OS's most common time zone.
    pub fn date_text(&self) -> &'static str {
        match self {
            Self::Windows | Self::Linux => "July Eastern Daylight Time",
            Self::MacOsIntel | Self::MacOsArm => "July Pacific Daylight Time",
        }
    }

    pub fn device_pixel_ratio(&self) -> u32 {
        match self {
            Self::MacOsIntel | Self::MacOsArm => 2,
            Self::Windows | Self::Linux => 1,
        }
    }

    /// Candidate families commonly installed on this OS.
    pub fn typical_fonts(&self) -> &'static [&'static str] {
        match self {
            Self::Windows => &[
                "Arial",
                "Arial Black",
                "Calibri",
                "Calibri Light",
                "Cambria",
                "Cambria Math",
                "Candara",
                "Comic Sans MS",
                "Consolas",
                "Constantia",
                "Corbel",
                "Courier New",
                "Ebrima",
                "Gabriola",
                "Georgia",
                "Impact",
                "Lucida Console",
                "Lucida Sans Unicode",
                "Malgun Gothic",
                "Microsoft Sans Serif",
                "Microsoft YaHei",
                "MS Gothic",
                "Palatino Linotype",
                "Segoe Print",
                "Segoe Script",
                "Segoe UI",
                "Segoe UI Light",
                "Segoe UI Semibold",
                "Segoe UI Symbol",
                "SimSun",
                "Sylfaen",
                "Symbol",
                "Tahoma",
                "Times New Roman",
                "Trebuchet MS",
                "Verdana",
                "Webdings",
                "Wingdings",
            ],
            Self::MacOsIntel | Self::MacOsArm => &[
                "Arial",
                "Arial Black",
                "Chalkduster",
                "Comic Sans MS",
                "Courier New",
                "Georgia",
                "Hiragino Sans GB",
                "Impact",
                "Menlo",
                "Papyrus",
                "Symbol",
                "Tahoma",
                "Times New Roman",
                "Trebuchet MS",
                "Verdana",
                "Webdings",
                "Wingdings",
            ],
            Self::Linux => &[
                "DejaVu LGC Sans Mono",
                "KacstOne",
                "Lohit Gujarati",
                "Loma",
                "Rachana",
                "Sawasdee",
                "TlwgMono",
                "Ubuntu",
                "Umpush",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenResolution {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
}

impl ScreenResolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            avail_width: width,
            avail_height: height.saturating_sub(if height > 1000 { 40 } else { 30 }),
        }
    }

    pub fn for_os(os: OperatingSystem) -> Vec<(Self, f64)> {
        match os {
            OperatingSystem::Windows => vec![
                (Self::new(1920, 1080), 23.0),
                (Self::new(1366, 768), 19.0),
                (Self::new(1440, 900), 9.0),
                (Self::new(1536, 864), 8.0),
                (Self::new(1280, 720), 7.0),
                (Self::new(2560, 1440), 6.0),
                (Self::new(1600, 900), 5.0),
                (Self::new(1280, 1024), 4.0),
                (Self::new(1920, 1200), 3.5),
                (Self::new(3840, 2160), 2.5),
            ],
            OperatingSystem::MacOsIntel | OperatingSystem::MacOsArm => vec![
                (Self::new(1440, 900), 25.0),
                (Self::new(1512, 982), 25.0),
                (Self::new(1728, 1117), 20.0),
                (Self::new(1920, 1080), 15.0),
                (Self::new(2560, 1440), 15.0),
            ],
            OperatingSystem::Linux => vec![
                (Self::new(1920, 1080), 40.0),
                (Self::new(2560, 1440), 25.0),
                (Self::new(1366, 768), 15.0),
                (Self::new(3840, 2160), 10.0),
                (Self::new(1680, 1050), 10.0),
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Gpu {
    /// Short vendor name as ANGLE reports it.
    pub vendor: &'static str,
    pub model: &'static str,
}

impl Gpu {
    pub fn for_os(os: OperatingSystem) -> Vec<(Self, f64)> {
        let gpu = |vendor, model| Gpu { vendor, model };
        match os {
            OperatingSystem::Windows => vec![
                (gpu("NVIDIA", "NVIDIA GeForce RTX 3060"), 12.0),
                (gpu("NVIDIA", "NVIDIA GeForce RTX 4060"), 10.0),
                (gpu("NVIDIA", "NVIDIA GeForce GTX 1660"), 6.0),
                (gpu("Intel", "Intel(R) UHD Graphics 630"), 15.0),
                (gpu("Intel", "Intel(R) Iris(R) Xe Graphics"), 12.0),
                (gpu("AMD", "AMD Radeon RX 6800"), 8.0),
            ],
            OperatingSystem::MacOsIntel => vec![
                (gpu("Intel", "Intel(R) Iris(TM) Plus Graphics 655"), 60.0),
                (gpu("AMD", "AMD Radeon Pro 5500M"), 40.0),
            ],
            OperatingSystem::MacOsArm => vec![
                (gpu("Apple", "Apple M1"), 20.0),
                (gpu("Apple", "Apple M1 Pro"), 10.0),
                (gpu("Apple", "Apple M2"), 20.0),
                (gpu("Apple", "Apple M2 Pro"), 15.0),
                (gpu("Apple", "Apple M3 Pro"), 25.0),
                (gpu("Apple", "Apple M3 Max"), 10.0),
            ],
            OperatingSystem::Linux => vec![
                (gpu("Intel", "Mesa Intel(R) UHD Graphics 630 (CFL GT2)"), 25.0),
                (gpu("Intel", "Mesa Intel(R) Xe Graphics (TGL GT2)"), 10.0),
                (gpu("NVIDIA", "NVIDIA GeForce RTX 3060/PCIe/SSE2"), 20.0),
                (gpu("AMD", "AMD Radeon RX 6800 (radeonsi, navi21, LLVM 15.0.7)"), 15.0),
            ],
        }
    }

    pub fn unmasked_vendor(&self) -> String {
        format!("Google Inc. ({})", self.vendor)
    }

    pub fn unmasked_renderer(&self, os: OperatingSystem) -> String {
        match os {
            OperatingSystem::Windows => format!(
                "ANGLE ({}, {} Direct3D11 vs_5_0 ps_5_0, D3D11)",
                self.vendor, self.model
            ),
            OperatingSystem::MacOsIntel | OperatingSystem::MacOsArm => format!(
                "ANGLE ({}, ANGLE Metal Renderer: {}, Unspecified Version)",
                self.vendor, self.model
            ),
            OperatingSystem::Linux => {
                format!("ANGLE ({}, {}, OpenGL 4.6)", self.vendor, self.model)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HardwareConfig {
    pub cpu_cores: u32,
    pub device_memory: u32,
}

impl HardwareConfig {
    pub fn common_configs() -> Vec<(Self, f64)> {
        let hw = |cpu_cores, device_memory| HardwareConfig {
            cpu_cores,
            device_memory,
        };
        vec![
            (hw(8, 8), 25.0),
            (hw(6, 8), 20.0),
            (hw(4, 8), 18.0),
            (hw(12, 8), 12.0),
            (hw(16, 8), 10.0),
            (hw(4, 4), 10.0),
            (hw(2, 4), 5.0),
        ]
    }
}

/// Produces [`DeviceProfile`]s; a fixed seed gives a fixed sequence.
pub struct DeviceGenerator {
    rng: StdRng,
}

impl DeviceGenerator {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> DeviceProfile {
        let os = self.weighted_choice(&[
            (OperatingSystem::Windows, 75.0),
            (OperatingSystem::MacOsArm, 12.0),
            (OperatingSystem::MacOsIntel, 8.0),
            (OperatingSystem::Linux, 5.0),
        ]);
        self.generate_for(os)
    }

    pub fn generate_for(&mut self, os: OperatingSystem) -> DeviceProfile {
        let screen = self.weighted_choice(&ScreenResolution::for_os(os));
        let gpu = self.weighted_choice(&Gpu::for_os(os));
        let hardware = self.weighted_choice(&HardwareConfig::common_configs());
        let chrome_version = self.weighted_choice(&[
            (131u32, 30.0),
            (130, 25.0),
            (129, 20.0),
            (128, 15.0),
            (127, 10.0),
        ]);

        assemble(os, screen, &gpu, hardware, chrome_version)
    }

    fn weighted_choice<T: Clone>(&mut self, choices: &[(T, f64)]) -> T {
        let weights = choices.iter().map(|(_, weight)| *weight);
        let idx = WeightedIndex::new(weights)
            .map(|dist| dist.sample(&mut self.rng))
            .unwrap_or(0);

        choices[idx].0.clone()
    }
}

fn assemble(
    os: OperatingSystem,
    screen: ScreenResolution,
    gpu: &Gpu,
    hardware: HardwareConfig,
    chrome_version: u32,
) -> DeviceProfile {
    let user_agent = os.user_agent(chrome_version);
    let defaults = DeviceProfile::default();
    // Browser chrome takes roughly 87px of the available height.
    let inner_height = screen.avail_height.saturating_sub(87);

    let navigator = NavigatorSnapshot {
        hardware_concurrency: hardware.cpu_cores.into(),
        device_memory: hardware.device_memory.into(),
        platform: os.platform().into(),
        app_version: app_version(&user_agent).into(),
        user_agent: user_agent.into(),
        ..defaults.navigator.clone().unwrap_or_default()
    };

    let screen_snapshot = ScreenSnapshot {
        width: screen.width.into(),
        height: screen.height.into(),
        avail_height: screen.avail_height.into(),
        avail_width: screen.avail_width.into(),
        avail_left: 0u32.into(),
        avail_top: 0u32.into(),
        inner_height: inner_height.into(),
        inner_width: screen.avail_width.into(),
        outer_width: screen.avail_width.into(),
        outer_height: screen.avail_height.into(),
        screen_x: 0u32.into(),
        screen_left: 0u32.into(),
        screen_y: 0u32.into(),
        screen_top: 0u32.into(),
        is_extended: false.into(),
        color_depth: 24u32.into(),
        pixel_depth: 24u32.into(),
        device_pixel_ratio: os.device_pixel_ratio().into(),
        orientation: Some(Orientation {
            kind: "landscape-primary".into(),
        }),
    };

    let debug_renderer_info = Some(DebugRendererInfo {
        vendor: gpu.unmasked_vendor().into(),
        renderer: gpu.unmasked_renderer(os).into(),
    });

    DeviceProfile {
        name: format!("{}-chrome{}", os.platform(), chrome_version),
        navigator: Some(navigator),
        intl: IntlProfile {
            date_text: Some(os.date_text().to_string()),
            ..IntlProfile::default()
        },
        screen: screen_snapshot,
        visual_viewport: Some(ViewportSnapshot {
            width: screen.avail_width.into(),
            height: inner_height.into(),
            scale: JsValue::from(1u32),
        }),
        canvas: CanvasProfile {
            rasterizer: format!("skia/{}", gpu.model),
            ..defaults.canvas.clone()
        },
        webgl: Some(GlProfile {
            debug_renderer_info: debug_renderer_info.clone(),
            ..GlProfile::default()
        }),
        webgl2: Some(GlProfile {
            debug_renderer_info,
            ..GlProfile::webgl2()
        }),
        fonts: FontProfile {
            installed: os.typical_fonts().iter().map(|f| f.to_string()).collect(),
            ..FontProfile::default()
        },
        ..defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_profile_is_complete() {
        let profile = DeviceGenerator::with_seed(7).generate();
        let navigator = profile.navigator.as_ref().unwrap();

        assert!(navigator.user_agent.truthy());
        assert!(navigator.platform.truthy());
        assert!(navigator.hardware_concurrency.truthy());
        assert!(profile.screen.width.truthy());
        assert!(profile.webgl.is_some());
        assert!(!profile.fonts.installed.is_empty());
    }

    #[test]
    fn mac_profiles_get_apple_gpus_on_arm() {
        let profile = DeviceGenerator::with_seed(1).generate_for(OperatingSystem::MacOsArm);
        let info = profile.webgl.unwrap().debug_renderer_info.unwrap();

        assert_eq!(info.vendor.to_js_string(), "Google Inc. (Apple)");
        assert!(info.renderer.to_js_string().contains("Metal"));
        assert_eq!(
            profile.navigator.unwrap().platform.to_js_string(),
            "MacIntel"
        );
    }

    #[test]
    fn windows_profiles_are_consistent() {
        let profile = DeviceGenerator::with_seed(3).generate_for(OperatingSystem::Windows);
        let navigator = profile.navigator.unwrap();

        assert_eq!(navigator.platform.to_js_string(), "Win32");
        assert!(navigator.user_agent.to_js_string().contains("Windows"));
        assert!(profile.fonts.installed.iter().any(|f| f == "Segoe UI"));
    }

    #[test]
    fn same_seed_same_device() {
        let a = DeviceGenerator::with_seed(42).generate();
        let b = DeviceGenerator::with_seed(42).generate();

        assert_eq!(a.name, b.name);
        assert_eq!(a.screen.width, b.screen.width);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn seeds_produce_diverse_devices() {
        let mut generator = DeviceGenerator::with_seed(99);
        let mut platforms = std::collections::HashSet::new();
        let mut resolutions = std::collections::HashSet::new();

        for _ in 0..50 {
            let profile = generator.generate();
            platforms.insert(profile.navigator.unwrap().platform.to_js_string());
            resolutions.insert(profile.screen.width.to_js_string());
        }

        assert!(platforms.len() > 1, "Should generate different platforms");
        assert!(resolutions.len() > 3, "Should generate different resolutions");
    }

    #[test]
    fn typical_fonts_are_candidates() {
        use crate::collect::fonts::CANDIDATES;

        for os in [
            OperatingSystem::Windows,
            OperatingSystem::MacOsArm,
            OperatingSystem::Linux,
        ] {
            for font in os.typical_fonts() {
                assert!(CANDIDATES.contains(font), "{} is not a candidate", font);
            }
        }
    }
}

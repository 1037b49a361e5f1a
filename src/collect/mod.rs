//! Collectors and the tagged result they hand back.
//!
//! Each collector reads one area of the host and returns a [`Finding`]. A
//! collector never returns an error: host failures are folded into the
//! failure shape that collector is known for.

pub mod audio;
pub mod canvas;
pub mod fonts;
pub mod intl;
pub mod navigator;
pub mod screen;
pub mod touch;
pub mod viewport;
pub mod webgl;
pub mod webgl2;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use clap::ValueEnum;
use futures::FutureExt;
use serde::Serialize;

use crate::host::Host;

/// Marker used when a property is missing or falsy.
pub const UNAVAILABLE: &str = "Not available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorKind {
    Navigator,
    Intl,
    Screen,
    Viewport,
    Canvas,
    Audio,
    Webgl,
    Webgl2,
    Fonts,
    Touch,
}

impl CollectorKind {
    /// Run order.
    pub const ALL: [CollectorKind; 10] = [
        CollectorKind::Navigator,
        CollectorKind::Intl,
        CollectorKind::Screen,
        CollectorKind::Viewport,
        CollectorKind::Canvas,
        CollectorKind::Audio,
        CollectorKind::Webgl,
        CollectorKind::Webgl2,
        CollectorKind::Fonts,
        CollectorKind::Touch,
    ];

    /// Id of the output slot this collector writes to.
    pub fn slot(&self) -> &'static str {
        match self {
            CollectorKind::Navigator => "navigator",
            CollectorKind::Intl => "intl",
            CollectorKind::Screen => "screen",
            CollectorKind::Viewport => "viewport",
            CollectorKind::Canvas => "canvas",
            CollectorKind::Audio => "audio",
            CollectorKind::Webgl => "webgl",
            CollectorKind::Webgl2 => "webgl2",
            CollectorKind::Fonts => "fonts",
            CollectorKind::Touch => "mobile",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CollectorKind::Navigator => "Navigator",
            CollectorKind::Intl => "Internationalization",
            CollectorKind::Screen => "Screen",
            CollectorKind::Viewport => "Visual Viewport",
            CollectorKind::Canvas => "Canvas",
            CollectorKind::Audio => "Audio",
            CollectorKind::Webgl => "WebGL",
            CollectorKind::Webgl2 => "WebGL2",
            CollectorKind::Fonts => "Fonts",
            CollectorKind::Touch => "Touch Support",
        }
    }

    /// Whether the collector awaits something beyond plain host reads.
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            CollectorKind::Intl | CollectorKind::Audio | CollectorKind::Webgl2
        )
    }

    /// The failure this collector reports when it cannot finish.
    pub fn failure(&self, message: impl Into<String>) -> Failure {
        match self {
            CollectorKind::Navigator | CollectorKind::Screen => Failure::Token("error"),
            CollectorKind::Canvas | CollectorKind::Fonts => Failure::Token("Error"),
            CollectorKind::Audio => Failure::Audio(message.into()),
            CollectorKind::Intl
            | CollectorKind::Viewport
            | CollectorKind::Webgl
            | CollectorKind::Webgl2
            | CollectorKind::Touch => Failure::Detail(message.into()),
        }
    }
}

impl std::fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CollectorKind::Navigator => "navigator",
            CollectorKind::Intl => "intl",
            CollectorKind::Screen => "screen",
            CollectorKind::Viewport => "viewport",
            CollectorKind::Canvas => "canvas",
            CollectorKind::Audio => "audio",
            CollectorKind::Webgl => "webgl",
            CollectorKind::Webgl2 => "webgl2",
            CollectorKind::Fonts => "fonts",
            CollectorKind::Touch => "touch",
        })
    }
}

/// Collector result.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Value(String),
    /// Capability missing or rendering failed; shown as a plain sentence.
    Notice(String),
    Failed(Failure),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// Bare `error` / `Error`.
    Token(&'static str),
    /// `error: <message>`.
    Detail(String),
    /// The audio failure line. The report lines are only assembled once
    /// every host call has succeeded, so nothing precedes it.
    Audio(String),
}

impl Finding {
    /// The display string written into the slot.
    pub fn render(&self) -> String {
        match self {
            Finding::Value(text) | Finding::Notice(text) => text.clone(),
            Finding::Failed(failure) => failure.render(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Finding::Failed(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Finding::Value(_) => "value",
            Finding::Notice(_) => "notice",
            Finding::Failed(_) => "failed",
        }
    }
}

impl Failure {
    pub fn render(&self) -> String {
        match self {
            Failure::Token(token) => token.to_string(),
            Failure::Detail(message) => format!("error: {}", message),
            Failure::Audio(message) => {
                format!("Audio fingerprinting failed: {}<br><br>", message)
            }
        }
    }
}

/// Knobs that change how collectors behave, taken from `[collect]`.
#[derive(Debug, Clone)]
pub struct CollectSettings {
    pub audio_timeout: Duration,
}

impl Default for CollectSettings {
    fn default() -> Self {
        Self {
            audio_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Runs a single collector against the host.
pub async fn run(kind: CollectorKind, host: &dyn Host, settings: &CollectSettings) -> Finding {
    match kind {
        CollectorKind::Navigator => navigator::collect(host).await,
        CollectorKind::Intl => intl::collect(host).await,
        CollectorKind::Screen => screen::collect(host).await,
        CollectorKind::Viewport => viewport::collect(host).await,
        CollectorKind::Canvas => canvas::collect(host).await,
        CollectorKind::Audio => audio::collect(host, settings.audio_timeout).await,
        CollectorKind::Webgl => webgl::collect(host).await,
        CollectorKind::Webgl2 => webgl2::collect(host).await,
        CollectorKind::Fonts => fonts::collect(host).await,
        CollectorKind::Touch => touch::collect(host).await,
    }
}

/// Awaits `work`, then `cleanup`, even when `work` panics. A panic resumes
/// once cleanup is done.
pub(crate) async fn with_cleanup<T>(
    work: impl Future<Output = T>,
    cleanup: impl Future<Output = ()>,
) -> T {
    let outcome = AssertUnwindSafe(work).catch_unwind().await;
    cleanup.await;
    match outcome {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

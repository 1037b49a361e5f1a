use std::io::Write;

use async_trait::async_trait;
use colored::Colorize;

use super::{RenderSurface, SlotWrite};
use crate::collect::CollectorKind;
use crate::error::Result;

/// Prints each slot as a titled block of plain text.
pub struct TerminalSurface {
    out: Box<dyn Write + Send>,
}

impl TerminalSurface {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::stdout()
    }
}

#[async_trait]
impl RenderSurface for TerminalSurface {
    async fn write_slot(&mut self, slot: &str, html: &str) -> Result<SlotWrite> {
        let title = CollectorKind::ALL
            .iter()
            .find(|k| k.slot() == slot)
            .map(|k| k.title())
            .unwrap_or(slot);

        writeln!(self.out, "{} {}", title.bold().cyan(), format!("#{}", slot).dimmed())?;
        for line in to_plain_text(html).lines() {
            writeln!(self.out, "  {}", line)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;

        Ok(SlotWrite::Written)
    }
}

/// Turns slot markup into terminal text: breaks become newlines, wrappers go.
pub fn to_plain_text(html: &str) -> String {
    let text = html
        .replace("<pre>", "")
        .replace("</pre>", "")
        .replace("<br>", "\n");

    let text = match text
        .strip_prefix("<img src=\"")
        .and_then(|rest| rest.strip_suffix("\">"))
    {
        Some(src) => src.to_string(),
        None => text,
    };

    text.trim_end_matches('\n').to_string()
}

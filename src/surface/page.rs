use std::sync::Arc;

use async_trait::async_trait;

use super::{RenderSurface, SlotWrite};
use crate::browser::page::PageConnection;
use crate::error::Result;

/// Writes slots into the page's DOM: each slot is the element with that id.
pub struct PageSurface {
    page: Arc<PageConnection>,
}

impl PageSurface {
    pub fn new(page: Arc<PageConnection>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl RenderSurface for PageSurface {
    async fn write_slot(&mut self, slot: &str, html: &str) -> Result<SlotWrite> {
        let written = self.page.evaluate(&inject_script(slot, html)?).await?;

        Ok(match written.and_then(|v| v.as_bool()) {
            Some(true) => SlotWrite::Written,
            _ => SlotWrite::Missing,
        })
    }
}

fn inject_script(slot: &str, html: &str) -> Result<String> {
    Ok(format!(
        "(() => {{ const el = document.getElementById({}); if (!el) return false; el.innerHTML = {}; return true; }})()",
        serde_json::to_string(slot)?,
        serde_json::to_string(html)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_and_markup_are_quoted() {
        let script = inject_script("fonts", "Arial | \"Quoted\"<br>").unwrap();
        assert!(script.contains("getElementById(\"fonts\")"));
        assert!(script.contains("el.innerHTML = \"Arial | \\\"Quoted\\\"<br>\""));
    }
}

//! Destinations for collector output, addressed by slot id.

pub mod page;
pub mod terminal;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;

pub use page::PageSurface;
pub use terminal::TerminalSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWrite {
    Written,
    /// The surface has no slot with that id.
    Missing,
}

#[async_trait]
pub trait RenderSurface: Send {
    /// Replaces the content of `slot` with `html`.
    async fn write_slot(&mut self, slot: &str, html: &str) -> Result<SlotWrite>;
}

/// Keeps written slots in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySurface {
    slots: Vec<(String, String)>,
    known: Option<HashSet<String>>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface that only has the given slots; writes to others are missing.
    pub fn with_slots<I, S>(slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: Vec::new(),
            known: Some(slots.into_iter().map(Into::into).collect()),
        }
    }

    pub fn slots(&self) -> &[(String, String)] {
        &self.slots
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(id, _)| id == slot)
            .map(|(_, html)| html.as_str())
    }
}

#[async_trait]
impl RenderSurface for MemorySurface {
    async fn write_slot(&mut self, slot: &str, html: &str) -> Result<SlotWrite> {
        if let Some(known) = &self.known {
            if !known.contains(slot) {
                return Ok(SlotWrite::Missing);
            }
        }

        match self.slots.iter_mut().find(|(id, _)| id == slot) {
            Some(entry) => entry.1 = html.to_string(),
            None => self.slots.push((slot.to_string(), html.to_string())),
        }
        Ok(SlotWrite::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rewriting_a_slot_replaces_content() {
        let mut surface = MemorySurface::new();
        surface.write_slot("audio", "first").await.unwrap();
        surface.write_slot("audio", "second").await.unwrap();

        assert_eq!(surface.slots().len(), 1);
        assert_eq!(surface.get("audio"), Some("second"));
    }

    #[tokio::test]
    async fn unknown_slot_is_missing() {
        let mut surface = MemorySurface::with_slots(["navigator"]);
        assert_eq!(
            surface.write_slot("fonts", "x").await.unwrap(),
            SlotWrite::Missing
        );
        assert_eq!(
            surface.write_slot("navigator", "x").await.unwrap(),
            SlotWrite::Written
        );
        assert!(surface.get("fonts").is_none());
    }
}

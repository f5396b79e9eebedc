//! Discovered-element channel.
//!
//! Element discovery (scanning a page for diagram script elements) happens
//! outside this crate. Discovered elements arrive in batches over an
//! unbounded channel; the pipeline drains whatever is queued and treats
//! each drained chunk as one batch.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::events::ElementId;

/// One diagram element found on a page: its source text plus the raw
/// attributes it carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderableElement {
    pub id: ElementId,
    /// Raw diagram source, exactly as it appeared on the page.
    pub text: String,
    /// Attribute name/value pairs from the element tag.
    pub attrs: HashMap<String, String>,
}

impl RenderableElement {
    #[must_use]
    pub fn new(id: ElementId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            attrs: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

/// Create a discovery channel pair.
#[must_use]
pub fn discovery_channel() -> (DiscoverySender, DiscoveryReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DiscoverySender { tx }, DiscoveryReceiver { rx })
}

/// Producer half handed to whatever scans pages for diagram elements.
#[derive(Clone)]
pub struct DiscoverySender {
    tx: mpsc::UnboundedSender<RenderableElement>,
}

impl DiscoverySender {
    /// Queue one discovered element.
    ///
    /// Returns `false` when the pipeline has shut down and the element was
    /// dropped.
    pub fn send(&self, element: RenderableElement) -> bool {
        self.tx.send(element).is_ok()
    }
}

/// Consumer half held by the pipeline.
pub struct DiscoveryReceiver {
    rx: mpsc::UnboundedReceiver<RenderableElement>,
}

impl DiscoveryReceiver {
    /// Wait for at least one element, then drain everything already
    /// queued into a single batch.
    ///
    /// Returns `None` when every sender is dropped.
    pub async fn next_batch(&mut self) -> Option<Vec<RenderableElement>> {
        let first = self.rx.recv().await?;
        let mut batch = vec![first];
        while let Ok(element) = self.rx.try_recv() {
            batch.push(element);
        }
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_queued_elements_arrive_as_one_batch() {
        let (tx, mut rx) = discovery_channel();

        assert!(tx.send(RenderableElement::new(ElementId(1), "a")));
        assert!(tx.send(RenderableElement::new(ElementId(2), "b")));
        assert!(tx.send(RenderableElement::new(ElementId(3), "c")));

        let batch = rx.next_batch().await.unwrap();
        let ids: Vec<_> = batch.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![ElementId(1), ElementId(2), ElementId(3)]);
    }

    #[tokio::test]
    async fn test_later_send_forms_a_new_batch() {
        let (tx, mut rx) = discovery_channel();

        tx.send(RenderableElement::new(ElementId(1), "a"));
        let first = rx.next_batch().await.unwrap();
        assert_eq!(first.len(), 1);

        tx.send(RenderableElement::new(ElementId(2), "b"));
        let second = rx.next_batch().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, ElementId(2));
    }

    #[tokio::test]
    async fn test_next_batch_ends_when_senders_dropped() {
        let (tx, mut rx) = discovery_channel();
        drop(tx);
        assert!(rx.next_batch().await.is_none());
    }

    #[test]
    fn test_send_after_shutdown_reports_failure() {
        let (tx, rx) = discovery_channel();
        drop(rx);
        assert!(!tx.send(RenderableElement::new(ElementId(1), "a")));
    }

    #[test]
    fn test_with_attr_builder() {
        let element = RenderableElement::new(ElementId(1), "\\draw;")
            .with_attr("data-libs", "arrows")
            .with_attr("width", "120");

        assert_eq!(element.attrs.get("data-libs").unwrap(), "arrows");
        assert_eq!(element.attrs.get("width").unwrap(), "120");
    }
}

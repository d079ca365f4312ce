//! Dimension prober and DOM normalizer.
//!
//! `measure` finds the authoritative content region, expands it so a single
//! viewport-sized capture contains all of it, and converts fixed/sticky elements so
//! they render once at their natural position. `restore` reverts every change using
//! only what is stored on the mutated nodes.

use serde_json::Value;
use tracing::{debug, info, warn};

use fullshot_core::{CaptureError, PageDimensions};

use crate::page_agent::{
    request, AncestorInfo, DomCall, Extents, Marker, MarkedNode, NodeId, PageDom,
    PositionedNode, Restoration, SavedStyles, ScrollCandidate, StyleMutation, StyleRestore,
    StyleSet,
};
use crate::page_scripts::SCROLLBAR_STYLE_ID;

/// Properties saved on every expanded node. Overflow is kept as its longhands so a
/// shorthand/longhand mix restores exactly.
pub const EXPANSION_PROPS: &[&str] = &["overflow-x", "overflow-y", "height", "max-height", "bottom"];

pub const POSITION_PROPS: &[&str] = &["position"];

/// Computed `overflow-y` values that give an element its own scrollbar.
const SCROLLING_OVERFLOW: &[&str] = &["auto", "scroll", "overlay"];

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub dimensions: PageDimensions,
    /// The nested scroll container that was expanded, if any.
    pub expanded_container: Option<NodeId>,
    pub expanded_ancestors: usize,
    pub repositioned: usize,
}

impl Measurement {
    pub fn is_complex(&self) -> bool {
        self.expanded_container.is_some()
    }
}

/// The tallest candidate whose overflow exceeds `slack` and that scrolls on its own.
/// Ties keep the first candidate in document order.
pub fn select_scroll_container(candidates: &[ScrollCandidate], slack: f64) -> Option<&ScrollCandidate> {
    candidates
        .iter()
        .filter(|c| c.scroll_height - c.client_height > slack)
        .filter(|c| SCROLLING_OVERFLOW.contains(&c.overflow_y.as_str()))
        .fold(None, |best: Option<&ScrollCandidate>, c| match best {
            Some(b) if b.scroll_height >= c.scroll_height => Some(b),
            _ => Some(c),
        })
}

/// Declarations that lift an element's size constraints.
pub fn expansion_styles(clear_bottom: bool) -> Vec<StyleSet> {
    let mut set = vec![
        StyleSet::important("overflow-x", "visible"),
        StyleSet::important("overflow-y", "visible"),
        StyleSet::important("height", "auto"),
        StyleSet::important("max-height", "none"),
    ];
    if clear_bottom {
        set.push(StyleSet::important("bottom", "auto"));
    }
    set
}

/// fixed → absolute, sticky → relative; anything else stays put.
pub fn replacement_position(computed: &str) -> Option<&'static str> {
    match computed {
        "fixed" => Some("absolute"),
        "sticky" => Some("relative"),
        _ => None,
    }
}

/// Declarations that put `saved` back: empty values are removed, others re-set with
/// their original priority.
pub fn restore_declarations(props: &[&str], saved: &SavedStyles) -> Vec<StyleRestore> {
    props
        .iter()
        .map(|prop| {
            let original = saved.get(*prop).cloned().unwrap_or_default();
            StyleRestore {
                prop: prop.to_string(),
                value: original.value,
                priority: original.priority,
            }
        })
        .collect()
}

fn encode_saved(saved: &SavedStyles) -> Result<String, CaptureError> {
    serde_json::to_string(saved).map_err(|e| CaptureError::InvalidResult {
        step: "save inline styles".into(),
        detail: e.to_string(),
    })
}

pub struct Normalizer<'a> {
    dom: &'a dyn PageDom,
    slack: f64,
}

impl<'a> Normalizer<'a> {
    pub fn new(dom: &'a dyn PageDom, slack: f64) -> Self {
        Self { dom, slack }
    }

    pub async fn measure(&self) -> Result<Measurement, CaptureError> {
        // Markers left by an abandoned capture would otherwise be re-saved as originals.
        let leftovers = self.restore().await?;
        if leftovers > 0 {
            warn!(leftovers, "Reverted markers left by an earlier capture");
        }

        request::<Value>(self.dom, DomCall::BeginScan).await?;
        let extents: Extents = request(self.dom, DomCall::Extents).await?;
        let (width, height) = extents.baseline();

        let candidates: Vec<ScrollCandidate> = request(self.dom, DomCall::ScrollCandidates).await?;
        let Some(container) = select_scroll_container(&candidates, self.slack).cloned() else {
            debug!(width, height, "No nested scroll container; using document extents");
            return Ok(Measurement {
                dimensions: PageDimensions::new(width, height),
                expanded_container: None,
                expanded_ancestors: 0,
                repositioned: 0,
            });
        };

        info!(
            node = container.node,
            scroll_height = container.scroll_height,
            client_height = container.client_height,
            "Expanding nested scroll container"
        );

        request::<Value>(self.dom, DomCall::ScrollToTop { node: container.node }).await?;

        let ancestors: Vec<AncestorInfo> =
            request(self.dom, DomCall::Ancestors { node: container.node }).await?;
        let clipping: Vec<NodeId> = ancestors.iter().filter(|a| a.clips()).map(|a| a.node).collect();
        let positioned: Vec<PositionedNode> = request(self.dom, DomCall::Positioned).await?;

        let mut expand_nodes = vec![container.node];
        expand_nodes.extend(&clipping);
        let expand_saved = self.inline_styles(&expand_nodes, EXPANSION_PROPS).await?;

        let position_nodes: Vec<NodeId> = positioned.iter().map(|p| p.node).collect();
        let position_saved = self.inline_styles(&position_nodes, POSITION_PROPS).await?;

        let mut mutations = Vec::with_capacity(expand_nodes.len() + positioned.len());
        for (i, (node, saved)) in expand_nodes.iter().zip(&expand_saved).enumerate() {
            mutations.push(StyleMutation {
                node: *node,
                marker: Marker::Expanded,
                saved: encode_saved(saved)?,
                // Ancestors are often drawers pinned by top and bottom.
                set: expansion_styles(i > 0),
            });
        }
        for (target, saved) in positioned.iter().zip(&position_saved) {
            let Some(position) = replacement_position(&target.position) else {
                continue;
            };
            mutations.push(StyleMutation {
                node: target.node,
                marker: Marker::Repositioned,
                saved: encode_saved(saved)?,
                set: vec![StyleSet::important("position", position)],
            });
        }
        request::<Value>(self.dom, DomCall::Mutate { mutations }).await?;

        // Repositioned elements drop out of scrollHeight; the container's own box still counts.
        let bottom: f64 = request(self.dom, DomCall::BottomEdge { node: container.node }).await?;
        let after: Extents = request(self.dom, DomCall::Extents).await?;
        let (width_after, height_after) = after.baseline();
        let height = height_after.max(bottom);

        debug!(height, bottom, ancestors = clipping.len(), repositioned = positioned.len(), "Re-measured page");

        Ok(Measurement {
            dimensions: PageDimensions::new(width_after, height),
            expanded_container: Some(container.node),
            expanded_ancestors: clipping.len(),
            repositioned: positioned.len(),
        })
    }

    /// Whether the document currently carries any expansion marker.
    pub async fn has_expansion(&self) -> Result<bool, CaptureError> {
        Ok(self.marked().await?.iter().any(|m| m.expanded.is_some()))
    }

    /// Revert every marked node. Safe to call repeatedly, before `measure`, or after a
    /// partial failure: it only acts on markers present in the document.
    pub async fn restore(&self) -> Result<usize, CaptureError> {
        let _: Option<bool> = request(
            self.dom,
            DomCall::RemoveElement { id: SCROLLBAR_STYLE_ID.to_string() },
        )
        .await?;

        let marked = self.marked().await?;
        if marked.is_empty() {
            return Ok(0);
        }

        let mut restorations = Vec::with_capacity(marked.len());
        for node in &marked {
            if let Some(saved) = &node.repositioned {
                restorations.push(self.restoration(node.node, Marker::Repositioned, saved, POSITION_PROPS));
            }
        }
        for node in &marked {
            if let Some(saved) = &node.expanded {
                restorations.push(self.restoration(node.node, Marker::Expanded, saved, EXPANSION_PROPS));
            }
        }

        let count = restorations.len();
        request::<Value>(self.dom, DomCall::Unmark { restorations }).await?;
        debug!(restored = count, "Restored page styles");
        Ok(count)
    }

    async fn marked(&self) -> Result<Vec<MarkedNode>, CaptureError> {
        // A document without the agent cannot carry markers.
        let marked: Option<Vec<MarkedNode>> = request(self.dom, DomCall::Marked).await?;
        Ok(marked.unwrap_or_default())
    }

    fn restoration(&self, node: NodeId, marker: Marker, saved: &str, props: &[&str]) -> Restoration {
        let props = match serde_json::from_str::<SavedStyles>(saved) {
            Ok(saved) => restore_declarations(props, &saved),
            Err(e) => {
                // Unreadable saved values: drop the marker, leave the styles alone.
                warn!(node, ?marker, error = %e, "Saved styles unreadable");
                Vec::new()
            }
        };
        Restoration { node, marker, props }
    }

    async fn inline_styles(&self, nodes: &[NodeId], props: &[&str]) -> Result<Vec<SavedStyles>, CaptureError> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let styles: Vec<SavedStyles> = request(
            self.dom,
            DomCall::InlineStyles {
                nodes: nodes.to_vec(),
                props: props.iter().map(|p| p.to_string()).collect(),
            },
        )
        .await?;
        if styles.len() != nodes.len() {
            return Err(CaptureError::InvalidResult {
                step: DomCall::InlineStyles { nodes: Vec::new(), props: Vec::new() }.step(),
                detail: format!("expected {} entries, got {}", nodes.len(), styles.len()),
            });
        }
        Ok(styles)
    }
}

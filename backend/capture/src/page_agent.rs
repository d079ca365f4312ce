//! Page-side agent protocol.
//!
//! The agent (`scripts/page_agent.js`) is installed once per document as
//! `window.__fullshotDom` and only performs primitive reads and writes; every
//! decision about what to expand or reposition is made on the Rust side. Nodes are
//! addressed by ids the agent hands out during a scan (`beginScan` resets them).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fullshot_core::{CaptureError, CaptureHost, DebugHandle};

pub const PAGE_AGENT_JS: &str = include_str!("scripts/page_agent.js");

/// Evaluates to `true` when the current document already carries the agent.
pub const AGENT_PROBE_JS: &str =
    "!!(window.__fullshotDom && window.__fullshotDom.version === 1)";

pub type NodeId = u32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DomCall {
    BeginScan,
    Extents,
    ScrollCandidates,
    Ancestors { node: NodeId },
    Positioned,
    InlineStyles { nodes: Vec<NodeId>, props: Vec<String> },
    ScrollToTop { node: NodeId },
    BottomEdge { node: NodeId },
    Mutate { mutations: Vec<StyleMutation> },
    Marked,
    Unmark { restorations: Vec<Restoration> },
    RemoveElement { id: String },
}

impl DomCall {
    pub fn op_name(&self) -> &'static str {
        match self {
            DomCall::BeginScan => "beginScan",
            DomCall::Extents => "extents",
            DomCall::ScrollCandidates => "scrollCandidates",
            DomCall::Ancestors { .. } => "ancestors",
            DomCall::Positioned => "positioned",
            DomCall::InlineStyles { .. } => "inlineStyles",
            DomCall::ScrollToTop { .. } => "scrollToTop",
            DomCall::BottomEdge { .. } => "bottomEdge",
            DomCall::Mutate { .. } => "mutate",
            DomCall::Marked => "marked",
            DomCall::Unmark { .. } => "unmark",
            DomCall::RemoveElement { .. } => "removeElement",
        }
    }

    /// Name used in error messages when this call fails.
    pub fn step(&self) -> String {
        format!("page agent `{}`", self.op_name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    Expanded,
    Repositioned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoxExtent {
    pub scroll_width: f64,
    pub scroll_height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Extents {
    pub doc_scroll_width: f64,
    pub doc_scroll_height: f64,
    pub body: Option<BoxExtent>,
}

impl Extents {
    /// max(documentElement, body) per axis.
    pub fn baseline(&self) -> (f64, f64) {
        let (body_w, body_h) = self
            .body
            .as_ref()
            .map(|b| (b.scroll_width, b.scroll_height))
            .unwrap_or((0.0, 0.0));
        (self.doc_scroll_width.max(body_w), self.doc_scroll_height.max(body_h))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScrollCandidate {
    pub node: NodeId,
    pub scroll_height: f64,
    pub client_height: f64,
    pub overflow_y: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AncestorInfo {
    pub node: NodeId,
    pub overflow_x: String,
    pub overflow_y: String,
}

impl AncestorInfo {
    /// Hidden overflow on either axis clips the expanded descendant.
    pub fn clips(&self) -> bool {
        self.overflow_x == "hidden" || self.overflow_y == "hidden"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionedNode {
    pub node: NodeId,
    pub position: String,
}

/// One inline declaration as read from `element.style`. Empty `value` means unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineValue {
    pub value: String,
    #[serde(default)]
    pub priority: String,
}

/// Original inline declarations, stored JSON-encoded on the node itself.
pub type SavedStyles = BTreeMap<String, InlineValue>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleSet {
    pub prop: String,
    pub value: String,
    pub important: bool,
}

impl StyleSet {
    pub fn important(prop: &str, value: &str) -> Self {
        Self { prop: prop.to_string(), value: value.to_string(), important: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleMutation {
    pub node: NodeId,
    pub marker: Marker,
    /// JSON-encoded [`SavedStyles`]; the agent keeps an existing value instead of overwriting it.
    pub saved: String,
    pub set: Vec<StyleSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkedNode {
    pub node: NodeId,
    pub expanded: Option<String>,
    pub repositioned: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleRestore {
    pub prop: String,
    pub value: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restoration {
    pub node: NodeId,
    pub marker: Marker,
    pub props: Vec<StyleRestore>,
}

/// Anything that can answer agent calls: the live page, or a fake in tests.
///
/// Returns `Value::Null` when the agent is not installed in the document.
#[async_trait]
pub trait PageDom: Send + Sync {
    async fn call(&self, call: DomCall) -> Result<Value, CaptureError>;
}

/// Issue `call` and validate the result's shape.
pub async fn request<T: DeserializeOwned>(
    dom: &dyn PageDom,
    call: DomCall,
) -> Result<T, CaptureError> {
    let step = call.step();
    let value = dom.call(call).await?;
    serde_json::from_value(value).map_err(|e| CaptureError::InvalidResult {
        step,
        detail: e.to_string(),
    })
}

/// Script text that forwards `call` to the installed agent.
pub fn dispatch_source(call: &DomCall) -> Result<String, CaptureError> {
    let json = serde_json::to_string(call).map_err(|e| CaptureError::InvalidResult {
        step: call.step(),
        detail: format!("cannot encode call: {e}"),
    })?;
    Ok(format!(
        "(() => {{\n  const call = {json};\n  const agent = window.__fullshotDom;\n  return agent ? agent.dispatch(call) : null;\n}})()"
    ))
}

#[cfg(test)]
pub(crate) fn parse_dispatch(source: &str) -> Option<DomCall> {
    let start = source.find("const call = ")? + "const call = ".len();
    let end = start + source[start..].find(";\n")?;
    serde_json::from_str(&source[start..end]).ok()
}

/// [`PageDom`] backed by script evaluation under exclusive debug control.
pub struct ScriptedDom<'a> {
    host: &'a dyn CaptureHost,
    handle: &'a DebugHandle,
}

impl<'a> ScriptedDom<'a> {
    pub fn new(host: &'a dyn CaptureHost, handle: &'a DebugHandle) -> Self {
        Self { host, handle }
    }

    /// Install the agent unless this document already has it.
    pub async fn ensure_installed(&self) -> Result<bool, CaptureError> {
        let present = self
            .host
            .evaluate_script(self.handle, AGENT_PROBE_JS)
            .await?
            .into_result("probe page agent")?;
        if present.as_bool() == Some(true) {
            return Ok(false);
        }
        let installed = self
            .host
            .evaluate_script(self.handle, PAGE_AGENT_JS)
            .await?
            .into_result("install page agent")?;
        if installed.as_bool() != Some(true) {
            return Err(CaptureError::InvalidResult {
                step: "install page agent".into(),
                detail: format!("expected true, got {installed}"),
            });
        }
        Ok(true)
    }
}

#[async_trait]
impl PageDom for ScriptedDom<'_> {
    async fn call(&self, call: DomCall) -> Result<Value, CaptureError> {
        let source = dispatch_source(&call)?;
        self.host
            .evaluate_script(self.handle, &source)
            .await?
            .into_result(&call.step())
    }
}

//! In-memory stand-ins for the host, the page document and the delivery surfaces.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use fullshot_core::{
    CaptureArtifact, CaptureError, CaptureHost, CaptureStatus, ClipRect, ClipboardSink,
    DebugHandle, LayoutMetrics, PreviewSurface, ScriptException, ScriptOutcome, StatusIndicator,
    TargetId, TargetInfo, ViewportOverride,
};

use crate::page_agent::{
    parse_dispatch, DomCall, Marker, PageDom, AGENT_PROBE_JS, PAGE_AGENT_JS,
};
use crate::page_scripts::{
    DEVICE_PIXEL_RATIO_JS, HIDE_SCROLLBARS_JS, INSTALL_RESIZE_GUARD_JS, REMOVE_RESIZE_GUARD_JS,
    REMOVE_SCROLLBAR_STYLE_JS, SCROLLBAR_STYLE_ID,
};

fn marker_names(marker: Marker) -> (&'static str, &'static str) {
    match marker {
        Marker::Expanded => ("fullshot-expanded", "data-fullshot-expand-saved"),
        Marker::Repositioned => ("fullshot-repositioned", "data-fullshot-position-saved"),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeElement {
    pub parent: Option<usize>,
    pub scroll_height: f64,
    pub client_height: f64,
    pub rect_top: f64,
    pub scroll_top: f64,
    pub computed: BTreeMap<String, String>,
    pub inline: BTreeMap<String, (String, String)>,
    pub classes: BTreeSet<String>,
    pub attrs: BTreeMap<String, String>,
}

impl FakeElement {
    pub fn block(parent: Option<usize>) -> Self {
        Self { parent, ..Self::default() }
    }

    pub fn scroller(parent: Option<usize>, scroll_height: f64, client_height: f64) -> Self {
        Self { parent, scroll_height, client_height, ..Self::default() }.computed("overflow-y", "auto")
    }

    pub fn top(mut self, top: f64) -> Self {
        self.rect_top = top;
        self
    }

    pub fn scrolled(mut self, offset: f64) -> Self {
        self.scroll_top = offset;
        self
    }

    pub fn computed(mut self, prop: &str, value: &str) -> Self {
        self.computed.insert(prop.into(), value.into());
        self
    }

    pub fn inline(mut self, prop: &str, value: &str, priority: &str) -> Self {
        self.inline.insert(prop.into(), (value.into(), priority.into()));
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn inline_value(&self, prop: &str) -> String {
        self.inline.get(prop).map(|(v, _)| v.clone()).unwrap_or_default()
    }

    pub fn inline_priority(&self, prop: &str) -> String {
        self.inline.get(prop).map(|(_, p)| p.clone()).unwrap_or_default()
    }

    /// Inline declarations win over the stylesheet value, as in a real cascade.
    pub fn computed_value(&self, prop: &str) -> String {
        if let Some((value, _)) = self.inline.get(prop) {
            return value.clone();
        }
        if let Some(value) = self.computed.get(prop) {
            return value.clone();
        }
        match prop {
            "position" => "static".into(),
            _ => "visible".into(),
        }
    }

    fn box_height(&self) -> f64 {
        if self.inline_value("height") == "auto" {
            self.scroll_height
        } else {
            self.client_height
        }
    }
}

fn check(elements: &[FakeElement], node: u32) -> Result<usize, String> {
    let index = node as usize;
    if index < elements.len() {
        Ok(index)
    } else {
        Err(format!("node {node} is no longer in the document"))
    }
}

#[derive(Debug, Default)]
struct DomState {
    elements: Vec<FakeElement>,
    viewport_width: f64,
    has_body: bool,
    agent: bool,
    installs: usize,
    mutation_calls: usize,
    injected: BTreeSet<String>,
}

/// Document model answering the page-agent protocol. Node ids are element indices;
/// index 0 is the document element and index 1 the body.
#[derive(Debug, Default)]
pub struct FakeDom {
    state: Mutex<DomState>,
}

impl FakeDom {
    pub fn standard(width: f64, height: f64) -> Self {
        let root = FakeElement { scroll_height: height, client_height: height, ..FakeElement::default() };
        let body = FakeElement {
            parent: Some(0),
            scroll_height: height,
            client_height: height,
            ..FakeElement::default()
        };
        Self {
            state: Mutex::new(DomState {
                elements: vec![root, body],
                viewport_width: width,
                has_body: true,
                agent: true,
                ..DomState::default()
            }),
        }
    }

    pub fn bodiless(width: f64, height: f64) -> Self {
        let dom = Self::standard(width, height);
        {
            let mut state = dom.state();
            state.elements.truncate(1);
            state.has_body = false;
        }
        dom
    }

    pub fn without_agent(self) -> Self {
        self.state().agent = false;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DomState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, element: FakeElement) -> usize {
        let mut state = self.state();
        state.elements.push(element);
        state.elements.len() - 1
    }

    pub fn node_id(&self, index: usize) -> u32 {
        index as u32
    }

    pub fn element(&self, index: usize) -> FakeElement {
        self.state().elements[index].clone()
    }

    /// Everything a capture may touch except scroll offsets.
    pub fn snapshot(&self) -> Vec<FakeElement> {
        self.state()
            .elements
            .iter()
            .cloned()
            .map(|mut e| {
                e.scroll_top = 0.0;
                e
            })
            .collect()
    }

    pub fn mutation_calls(&self) -> usize {
        self.state().mutation_calls
    }

    pub fn installs(&self) -> usize {
        self.state().installs
    }

    pub fn agent_installed(&self) -> bool {
        self.state().agent
    }

    pub fn install_agent(&self) {
        let mut state = self.state();
        if !state.agent {
            state.agent = true;
            state.installs += 1;
        }
    }

    pub fn inject(&self, id: &str) {
        self.state().injected.insert(id.into());
    }

    pub fn remove_injected(&self, id: &str) -> bool {
        self.state().injected.remove(id)
    }

    pub fn has_injected(&self, id: &str) -> bool {
        self.state().injected.contains(id)
    }

    /// Answer one agent call the way the page script would.
    pub fn dispatch(&self, call: DomCall) -> Result<Value, String> {
        let mut state = self.state();
        if !state.agent {
            return Ok(Value::Null);
        }

        match call {
            DomCall::BeginScan => Ok(Value::Null),
            DomCall::Extents => {
                let root = &state.elements[0];
                let body = state.has_body.then(|| {
                    json!({"scrollWidth": state.viewport_width, "scrollHeight": state.elements[1].scroll_height})
                });
                Ok(json!({
                    "docScrollWidth": state.viewport_width,
                    "docScrollHeight": root.scroll_height,
                    "body": body,
                }))
            }
            DomCall::ScrollCandidates => {
                let out: Vec<Value> = state
                    .elements
                    .iter()
                    .enumerate()
                    .skip(1)
                    .filter(|(_, e)| e.scroll_height > e.box_height())
                    .map(|(i, e)| {
                        json!({
                            "node": i,
                            "scrollHeight": e.scroll_height,
                            "clientHeight": e.box_height(),
                            "overflowY": e.computed_value("overflow-y"),
                        })
                    })
                    .collect();
                Ok(Value::Array(out))
            }
            DomCall::Ancestors { node } => {
                let index = check(&state.elements, node)?;
                let mut out = Vec::new();
                let mut parent = state.elements[index].parent;
                while let Some(p) = parent.filter(|p| *p != 0) {
                    let e = &state.elements[p];
                    out.push(json!({
                        "node": p,
                        "overflowX": e.computed_value("overflow-x"),
                        "overflowY": e.computed_value("overflow-y"),
                    }));
                    parent = e.parent;
                }
                Ok(Value::Array(out))
            }
            DomCall::Positioned => {
                let out: Vec<Value> = state
                    .elements
                    .iter()
                    .enumerate()
                    .filter_map(|(i, e)| {
                        let position = e.computed_value("position");
                        matches!(position.as_str(), "fixed" | "sticky")
                            .then(|| json!({"node": i, "position": position}))
                    })
                    .collect();
                Ok(Value::Array(out))
            }
            DomCall::InlineStyles { nodes, props } => {
                let mut out = Vec::new();
                for node in nodes {
                    let e = &state.elements[check(&state.elements, node)?];
                    let map: serde_json::Map<String, Value> = props
                        .iter()
                        .map(|p| {
                            (p.clone(), json!({"value": e.inline_value(p), "priority": e.inline_priority(p)}))
                        })
                        .collect();
                    out.push(Value::Object(map));
                }
                Ok(Value::Array(out))
            }
            DomCall::ScrollToTop { node } => {
                let index = check(&state.elements, node)?;
                state.elements[index].scroll_top = 0.0;
                Ok(Value::Null)
            }
            DomCall::BottomEdge { node } => {
                let e = &state.elements[check(&state.elements, node)?];
                Ok(json!(e.rect_top + e.box_height()))
            }
            DomCall::Mutate { mutations } => {
                state.mutation_calls += 1;
                let applied = mutations.len();
                for m in mutations {
                    let index = check(&state.elements, m.node)?;
                    let (class, attr) = marker_names(m.marker);
                    let e = &mut state.elements[index];
                    e.attrs.entry(attr.into()).or_insert(m.saved);
                    e.classes.insert(class.into());
                    for s in m.set {
                        let priority = if s.important { "important" } else { "" };
                        e.inline.insert(s.prop, (s.value, priority.into()));
                    }
                }
                Ok(json!(applied))
            }
            DomCall::Marked => {
                let out: Vec<Value> = state
                    .elements
                    .iter()
                    .enumerate()
                    .filter_map(|(i, e)| {
                        let read = |marker| {
                            let (class, attr) = marker_names(marker);
                            (e.classes.contains(class) || e.attrs.contains_key(attr))
                                .then(|| e.attrs.get(attr).cloned().unwrap_or_default())
                        };
                        let expanded = read(Marker::Expanded);
                        let repositioned = read(Marker::Repositioned);
                        (expanded.is_some() || repositioned.is_some())
                            .then(|| json!({"node": i, "expanded": expanded, "repositioned": repositioned}))
                    })
                    .collect();
                Ok(Value::Array(out))
            }
            DomCall::Unmark { restorations } => {
                state.mutation_calls += 1;
                let count = restorations.len();
                for r in restorations {
                    let Some(e) = state.elements.get_mut(r.node as usize) else { continue };
                    for p in r.props {
                        if p.value.is_empty() {
                            e.inline.remove(&p.prop);
                        } else {
                            e.inline.insert(p.prop, (p.value, p.priority));
                        }
                    }
                    let (class, attr) = marker_names(r.marker);
                    e.classes.remove(class);
                    e.attrs.remove(attr);
                }
                Ok(json!(count))
            }
            DomCall::RemoveElement { id } => Ok(json!(state.injected.remove(&id))),
        }
    }
}

#[async_trait]
impl PageDom for FakeDom {
    async fn call(&self, call: DomCall) -> Result<Value, CaptureError> {
        let step = call.step();
        self.dispatch(call).map_err(|description| CaptureError::Script {
            step,
            description,
            line: None,
            column: None,
        })
    }
}

#[derive(Debug, Default)]
struct HostState {
    calls: Vec<String>,
    attached: HashSet<TargetId>,
    last_override: Option<ViewportOverride>,
    guard: bool,
    failures: HashMap<String, CaptureError>,
    throwing_scripts: HashSet<String>,
    page_scripts: Vec<String>,
    page_script_result: Option<Value>,
}

/// Scriptable [`CaptureHost`] over a [`FakeDom`].
pub struct MockHost {
    pub dom: FakeDom,
    target: TargetId,
    url: String,
    pixel_ratio: f64,
    viewport_width: f64,
    foreign_debugger: bool,
    size_indicator: bool,
    state: Mutex<HostState>,
}

impl MockHost {
    pub fn new(url: &str) -> Self {
        Self {
            dom: FakeDom::standard(1280.0, 800.0).without_agent(),
            target: TargetId::from("tab-1"),
            url: url.to_string(),
            pixel_ratio: 1.0,
            viewport_width: 1280.0,
            foreign_debugger: false,
            size_indicator: true,
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn with_document(mut self, width: f64, height: f64) -> Self {
        self.dom = FakeDom::standard(width, height).without_agent();
        self
    }

    pub fn with_viewport_width(mut self, width: f64) -> Self {
        self.viewport_width = width;
        self
    }

    pub fn with_pixel_ratio(mut self, ratio: f64) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    pub fn with_foreign_debugger(mut self) -> Self {
        self.foreign_debugger = true;
        self
    }

    pub fn without_size_indicator(mut self) -> Self {
        self.size_indicator = false;
        self
    }

    pub fn target(&self) -> TargetId {
        self.target.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    pub fn fail_method(&self, method: &str, error: CaptureError) {
        self.state().failures.insert(method.into(), error);
    }

    /// Make the script with this label report an exception.
    pub fn throw_in_script(&self, label: &str) {
        self.state().throwing_scripts.insert(label.into());
    }

    pub fn set_page_script_result(&self, value: Value) {
        self.state().page_script_result = Some(value);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn page_scripts(&self) -> Vec<String> {
        self.state().page_scripts.clone()
    }

    pub fn last_override(&self) -> Option<ViewportOverride> {
        self.state().last_override
    }

    pub fn guard_installed(&self) -> bool {
        self.state().guard
    }

    pub fn scrollbar_style_present(&self) -> bool {
        self.dom.has_injected(SCROLLBAR_STYLE_ID)
    }

    pub fn is_attached(&self) -> bool {
        !self.state().attached.is_empty()
    }

    fn record(&self, call: &str) -> Result<(), CaptureError> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        match state.failures.get(call) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn script_label(source: &str) -> String {
        let label = match source {
            AGENT_PROBE_JS => "probe agent",
            PAGE_AGENT_JS => "install agent",
            HIDE_SCROLLBARS_JS => "hide scrollbars",
            REMOVE_SCROLLBAR_STYLE_JS => "remove scrollbar style",
            INSTALL_RESIZE_GUARD_JS => "install resize guard",
            REMOVE_RESIZE_GUARD_JS => "remove resize guard",
            DEVICE_PIXEL_RATIO_JS => "read device pixel ratio",
            _ => {
                return match parse_dispatch(source) {
                    Some(call) => format!("dom {}", call.op_name()),
                    None => "unknown".into(),
                }
            }
        };
        label.into()
    }
}

#[async_trait]
impl CaptureHost for MockHost {
    async fn active_target(&self) -> Result<TargetInfo, CaptureError> {
        self.record("active_target")?;
        Ok(TargetInfo { id: self.target.clone(), url: Some(self.url.clone()), title: "Fake".into() })
    }

    async fn target_info(&self, target: &TargetId) -> Result<TargetInfo, CaptureError> {
        self.record("target_info")?;
        Ok(TargetInfo { id: target.clone(), url: Some(self.url.clone()), title: "Fake".into() })
    }

    async fn capture_visible_region(&self, _target: &TargetId) -> Result<Vec<u8>, CaptureError> {
        self.record("capture_visible_region")?;
        Ok(b"visible".to_vec())
    }

    async fn attach_debug_control(&self, target: &TargetId) -> Result<DebugHandle, CaptureError> {
        self.record("attach")?;
        let mut state = self.state();
        if self.foreign_debugger || state.attached.contains(target) {
            return Err(CaptureError::DebuggerAttached(target.to_string()));
        }
        state.attached.insert(target.clone());
        Ok(DebugHandle { target: target.clone(), session_id: "session-1".into() })
    }

    async fn detach_debug_control(&self, handle: &DebugHandle) -> Result<(), CaptureError> {
        let result = self.record("detach");
        self.state().attached.remove(&handle.target);
        result
    }

    async fn evaluate_script(&self, _handle: &DebugHandle, source: &str) -> Result<ScriptOutcome, CaptureError> {
        let label = Self::script_label(source);
        self.record(&format!("script:{label}"))?;
        if self.state().throwing_scripts.contains(&label) {
            return Ok(ScriptOutcome {
                value: Value::Null,
                exception: Some(ScriptException {
                    description: format!("Error: {label} exploded"),
                    line: Some(1),
                    column: Some(0),
                }),
            });
        }

        let value = match label.as_str() {
            "probe agent" => json!(self.dom.agent_installed()),
            "install agent" => {
                self.dom.install_agent();
                json!(true)
            }
            "hide scrollbars" => {
                self.dom.inject(SCROLLBAR_STYLE_ID);
                json!(true)
            }
            "remove scrollbar style" => json!(self.dom.remove_injected(SCROLLBAR_STYLE_ID)),
            "install resize guard" => {
                self.state().guard = true;
                json!(true)
            }
            "remove resize guard" => {
                let mut state = self.state();
                let was = state.guard;
                state.guard = false;
                json!(was)
            }
            "read device pixel ratio" => json!(self.pixel_ratio),
            _ => match parse_dispatch(source) {
                Some(call) => match self.dom.dispatch(call) {
                    Ok(value) => value,
                    Err(description) => {
                        return Ok(ScriptOutcome {
                            value: Value::Null,
                            exception: Some(ScriptException { description, line: None, column: None }),
                        })
                    }
                },
                None => {
                    return Ok(ScriptOutcome {
                        value: Value::Null,
                        exception: Some(ScriptException {
                            description: "SyntaxError: unexpected script".into(),
                            line: None,
                            column: None,
                        }),
                    })
                }
            },
        };
        Ok(ScriptOutcome::value(value))
    }

    async fn layout_metrics(&self, _handle: &DebugHandle) -> Result<LayoutMetrics, CaptureError> {
        self.record("layout_metrics")?;
        Ok(LayoutMetrics { viewport_width: self.viewport_width })
    }

    async fn override_viewport(&self, _handle: &DebugHandle, viewport: ViewportOverride) -> Result<(), CaptureError> {
        self.record("override_viewport")?;
        self.state().last_override = Some(viewport);
        Ok(())
    }

    async fn clear_viewport_override(&self, _handle: &DebugHandle) -> Result<(), CaptureError> {
        self.record("clear_viewport_override")
    }

    async fn capture_clipped_region(&self, _handle: &DebugHandle, clip: ClipRect) -> Result<Vec<u8>, CaptureError> {
        self.record("capture_clipped_region")?;
        Ok(format!("clip:{}x{}", clip.width, clip.height).into_bytes())
    }

    async fn suppress_viewport_size_indicator(&self, _handle: &DebugHandle) -> Result<bool, CaptureError> {
        self.record("suppress_viewport_size_indicator")?;
        Ok(self.size_indicator)
    }

    async fn run_page_script(&self, _target: &TargetId, source: &str) -> Result<Value, CaptureError> {
        self.record("run_page_script")?;
        let mut state = self.state();
        state.page_scripts.push(source.to_string());
        Ok(state.page_script_result.clone().unwrap_or(json!(true)))
    }
}

/// Clipboard whose first write can be held open to interleave captures.
#[derive(Default)]
pub struct MockClipboard {
    unfocused: AtomicBool,
    hold_first_write: AtomicBool,
    held_failure: Mutex<Option<CaptureError>>,
    writes: Mutex<Vec<Vec<u8>>>,
    pub entered: Notify,
    pub release: Notify,
}

impl MockClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding_first_write() -> Self {
        let clipboard = Self::default();
        clipboard.hold_first_write.store(true, Ordering::SeqCst);
        clipboard
    }

    pub fn set_focused(&self, focused: bool) {
        self.unfocused.store(!focused, Ordering::SeqCst);
    }

    /// The held first write fails with `error` once released.
    pub fn fail_held_write(&self, error: CaptureError) {
        *self.held_failure.lock().unwrap() = Some(error);
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClipboardSink for MockClipboard {
    async fn has_focus(&self, _target: &TargetId) -> Result<bool, CaptureError> {
        Ok(!self.unfocused.load(Ordering::SeqCst))
    }

    async fn write_image(&self, _target: &TargetId, image: &[u8]) -> Result<(), CaptureError> {
        if self.hold_first_write.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
            let failure = self.held_failure.lock().unwrap().take();
            if let Some(error) = failure {
                return Err(error);
            }
        }
        self.writes.lock().unwrap().push(image.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingIndicator {
    shown: Mutex<Vec<(TargetId, CaptureStatus)>>,
}

impl RecordingIndicator {
    pub fn shown(&self) -> Vec<CaptureStatus> {
        self.shown.lock().unwrap().iter().map(|(_, s)| s.clone()).collect()
    }

    pub fn successes(&self) -> usize {
        self.shown()
            .iter()
            .filter(|s| matches!(s, CaptureStatus::Succeeded { .. }))
            .count()
    }
}

impl StatusIndicator for RecordingIndicator {
    fn show(&self, target: &TargetId, status: CaptureStatus) {
        self.shown.lock().unwrap().push((target.clone(), status));
    }
}

#[derive(Default)]
pub struct RecordingPreview {
    events: Mutex<Vec<String>>,
}

impl RecordingPreview {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl PreviewSurface for RecordingPreview {
    async fn show_capture(&self, _target: &TargetId, artifact: &CaptureArtifact) -> Result<(), CaptureError> {
        self.events.lock().unwrap().push(format!("capture:{}", artifact.pixel_data.len()));
        Ok(())
    }

    async fn show_message(&self, _target: &TargetId, message: &str, persistent: bool) -> Result<(), CaptureError> {
        let kind = if persistent { "persistent" } else { "transient" };
        self.events.lock().unwrap().push(format!("message:{kind}:{message}"));
        Ok(())
    }

    async fn remove(&self, _target: &TargetId) -> Result<(), CaptureError> {
        self.events.lock().unwrap().push("remove".into());
        Ok(())
    }
}

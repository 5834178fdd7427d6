//! Headless document model: an HTML page reduced to its `<body>` tree.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::layout::{self, Layout};
use crate::segment::{escape_html, WordGroup, GROUP_CLASS};
use crate::surface::{
    GroupScope, Surface, SurfaceError, TextUnit, CLOSE_BUTTON_ID, CONTENT_ID, HIGHLIGHT_CLASS,
    OVERLAY_ID,
};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Child indices leading from the body to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, index: usize) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    pub fn steps(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for NodePath {
    fn from(steps: Vec<usize>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    fn is_group(&self) -> bool {
        self.as_element().is_some_and(|el| el.has_class(GROUP_CLASS))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{existing} {class}"),
            _ => class.to_string(),
        };
        self.set_attr("class", classes);
    }

    fn remove_class(&mut self, class: &str) {
        let Some(existing) = self.attr("class") else {
            return;
        };
        let kept: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        let kept = kept.join(" ");
        self.set_attr("class", kept);
    }

    /// Value of an inline style property, lowercased.
    pub fn style_value(&self, property: &str) -> Option<String> {
        let style = self.attr("style")?;
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .filter(|(name, _)| name.trim().eq_ignore_ascii_case(property))
            .map(|(_, value)| {
                value
                    .trim()
                    .trim_end_matches("!important")
                    .trim()
                    .to_ascii_lowercase()
            })
            .last()
    }

    fn set_style_value(&mut self, property: &str, value: Option<&str>) {
        let mut decls: Vec<String> = self
            .attr("style")
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|decl| !decl.is_empty())
            .filter(|decl| {
                decl.split_once(':')
                    .map_or(true, |(name, _)| !name.trim().eq_ignore_ascii_case(property))
            })
            .map(str::to_string)
            .collect();
        if let Some(value) = value {
            decls.push(format!("{property}: {value}"));
        }
        if decls.is_empty() {
            self.remove_attr("style");
        } else {
            self.set_attr("style", format!("{};", decls.join("; ")));
        }
    }

    /// Whether this element and, by extension, its subtree is displayed.
    pub fn is_rendered(&self) -> bool {
        let tag = self.tag.as_str();
        if SKIPPED_TAGS.contains(&tag) || self.attr("hidden").is_some() {
            return false;
        }
        if self.style_value("display").as_deref() == Some("none") {
            return false;
        }
        !matches!(
            self.style_value("visibility").as_deref(),
            Some("hidden") | Some("collapse")
        )
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    fn write_markup(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_html(value));
            out.push('"');
        }
        out.push('>');
        if VOID_TAGS.contains(&self.tag.as_str()) {
            return;
        }
        write_children_markup(&self.children, out);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

fn collect_text(el: &Element, out: &mut String) {
    for child in &el.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => collect_text(inner, out),
        }
    }
}

fn write_children_markup(children: &[Node], out: &mut String) {
    for child in children {
        match child {
            Node::Text(text) => out.push_str(&escape_html(text)),
            Node::Element(el) => el.write_markup(out),
        }
    }
}

fn group_element(group: &WordGroup) -> Node {
    Node::Element(
        Element::new("span")
            .with_attr("class", GROUP_CLASS)
            .with_child(Node::Text(group.text())),
    )
}

fn convert_element(element: ElementRef<'_>) -> Element {
    let value = element.value();
    let mut out = Element::new(value.name());
    out.attrs = value
        .attrs()
        .map(|(name, v)| (name.to_string(), v.to_string()))
        .collect();
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.children.push(Node::Text(String::from(&**text)));
        } else if let Some(inner) = ElementRef::wrap(child) {
            out.children.push(Node::Element(convert_element(inner)));
        }
    }
    out
}

/// Terminal area the document is laid out into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 80,
            height: 24,
        }
    }
}

/// Verbatim copy of a document body, tagged with the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySnapshot {
    generation: u64,
    body: Element,
}

#[derive(Debug, Clone)]
pub struct Document {
    body: Element,
    generation: u64,
    scroll: usize,
    viewport: Viewport,
}

impl Document {
    pub fn parse_html(source: &str) -> Self {
        let html = Html::parse_document(source);
        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| html.select(&selector).next().map(convert_element))
            .unwrap_or_else(|| Element::new("body"));
        Self::from_body(body)
    }

    pub fn from_body(body: Element) -> Self {
        Self {
            body,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            scroll: 0,
            viewport: Viewport::default(),
        }
    }

    /// Navigate to a new page. Snapshots of the previous page become stale.
    pub fn load(&mut self, source: &str) {
        let viewport = self.viewport;
        *self = Self::parse_html(source);
        self.viewport = viewport;
    }

    pub fn body(&self) -> &Element {
        &self.body
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Serialized body content, the equivalent of `body.innerHTML`.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        write_children_markup(&self.body.children, &mut out);
        out
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.layout().lines.len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    pub fn layout(&self) -> Layout {
        layout::layout(&self.body, usize::from(self.viewport.width.max(1)))
    }

    pub fn node(&self, path: &NodePath) -> Option<&Node> {
        let (first, rest) = path.steps().split_first()?;
        let mut node = self.body.children.get(*first)?;
        for step in rest {
            node = node.as_element()?.children.get(*step)?;
        }
        Some(node)
    }

    fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let mut el = &mut self.body;
        for step in path.steps() {
            el = match el.children.get_mut(*step)? {
                Node::Element(inner) => inner,
                Node::Text(_) => return None,
            };
        }
        Some(el)
    }

    fn parent_mut(&mut self, path: &NodePath) -> Option<(&mut Element, usize)> {
        let (last, parent_steps) = path.steps().split_last()?;
        let parent = self.element_mut(&NodePath(parent_steps.to_vec()))?;
        Some((parent, *last))
    }

    fn find_element(&self, id: &str) -> Option<NodePath> {
        fn walk(el: &Element, path: &NodePath, id: &str) -> Option<NodePath> {
            el.children.iter().enumerate().find_map(|(i, child)| {
                let child_path = path.child(i);
                let inner = child.as_element()?;
                if inner.id() == Some(id) {
                    Some(child_path)
                } else {
                    walk(inner, &child_path, id)
                }
            })
        }
        walk(&self.body, &NodePath::root(), id)
    }
}

fn visible_text(el: &Element, path: &NodePath, out: &mut Vec<TextUnit<NodePath>>) {
    for (i, child) in el.children.iter().enumerate() {
        match child {
            Node::Text(text) if !text.trim().is_empty() => out.push(TextUnit {
                locator: path.child(i),
                text: text.clone(),
            }),
            Node::Text(_) => {}
            Node::Element(inner) if inner.is_rendered() => visible_text(inner, &path.child(i), out),
            Node::Element(_) => {}
        }
    }
}

fn group_paths(el: &Element, path: &NodePath, out: &mut Vec<NodePath>) {
    for (i, child) in el.children.iter().enumerate() {
        if child.is_group() {
            out.push(path.child(i));
        } else if let Node::Element(inner) = child {
            group_paths(inner, &path.child(i), out);
        }
    }
}

impl Surface for Document {
    type Snapshot = BodySnapshot;
    type Locator = NodePath;
    type Group = NodePath;
    type Scroll = usize;

    fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            generation: self.generation,
            body: self.body.clone(),
        }
    }

    fn restore(&mut self, snapshot: BodySnapshot) -> Result<(), SurfaceError> {
        if snapshot.generation != self.generation {
            return Err(SurfaceError::StaleSnapshot {
                taken: snapshot.generation,
                current: self.generation,
            });
        }
        self.body = snapshot.body;
        Ok(())
    }

    fn visible_text_units(&self) -> Vec<TextUnit<NodePath>> {
        let mut units = Vec::new();
        if self.body.is_rendered() {
            visible_text(&self.body, &NodePath::root(), &mut units);
        }
        units
    }

    fn wrap_text_unit(
        &mut self,
        unit: &TextUnit<NodePath>,
        groups: &[WordGroup],
    ) -> Result<(), SurfaceError> {
        let detached = || SurfaceError::Detached {
            expected: "text unit",
            location: unit.locator.to_string(),
        };
        let (parent, index) = self.parent_mut(&unit.locator).ok_or_else(detached)?;
        match parent.children.get(index) {
            Some(Node::Text(text)) if *text == unit.text => {}
            _ => return Err(detached()),
        }
        parent
            .children
            .splice(index..=index, groups.iter().map(group_element));
        Ok(())
    }

    fn mount_reader(&mut self, groups: &[WordGroup]) -> Result<(), SurfaceError> {
        let close = Element::new("button")
            .with_attr("id", CLOSE_BUTTON_ID)
            .with_child(Node::Text("Close Reader".to_string()));
        let mut content = Element::new("div").with_attr("id", CONTENT_ID);
        content.children = groups.iter().map(group_element).collect();
        let overlay = Element::new("div")
            .with_attr("id", OVERLAY_ID)
            .with_child(Node::Element(close))
            .with_child(Node::Element(content));

        self.body.children = vec![Node::Element(overlay)];
        Ok(())
    }

    fn collect_groups(&self, scope: GroupScope) -> Vec<NodePath> {
        let mut out = Vec::new();
        match scope {
            GroupScope::Region => group_paths(&self.body, &NodePath::root(), &mut out),
            GroupScope::Reader => {
                if let Some(path) = self.find_element(CONTENT_ID) {
                    if let Some(Node::Element(content)) = self.node(&path) {
                        group_paths(content, &path, &mut out);
                    }
                }
            }
        }
        out
    }

    fn set_highlight(&mut self, group: &NodePath, color: Option<&str>) -> Result<(), SurfaceError> {
        let el = self
            .element_mut(group)
            .filter(|el| el.has_class(GROUP_CLASS))
            .ok_or_else(|| SurfaceError::Detached {
                expected: "word group",
                location: group.to_string(),
            })?;
        match color {
            Some(color) => {
                el.add_class(HIGHLIGHT_CLASS);
                el.set_style_value("background-color", Some(color));
            }
            None => {
                el.remove_class(HIGHLIGHT_CLASS);
                el.set_style_value("background-color", None);
            }
        }
        Ok(())
    }

    fn scroll_into_view(&mut self, group: &NodePath) {
        let Some(line) = self.layout().line_of(group) else {
            return;
        };
        let height = usize::from(self.viewport.height.max(1));
        if line < self.scroll || line >= self.scroll + height {
            self.scroll = line.saturating_sub(height / 2);
        }
    }

    fn scroll_position(&self) -> usize {
        self.scroll
    }

    fn set_scroll_position(&mut self, position: usize) {
        self.scroll = position;
    }

    fn remove_group(&mut self, group: &NodePath) {
        if !self.node(group).is_some_and(Node::is_group) {
            debug!(path = %group, "group already gone");
            return;
        }
        if let Some((parent, index)) = self.parent_mut(group) {
            parent.children.remove(index);
        }
    }

    fn remove_reader(&mut self) {
        if let Some(path) = self.find_element(OVERLAY_ID) {
            if let Some((parent, index)) = self.parent_mut(&path) {
                parent.children.remove(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::num::NonZeroUsize;

    use crate::segment::segment;

    const PAGE: &str = r#"<html><head><title>t</title></head><body>
<h1>Title here</h1>
<p>First <b>bold</b> para.</p>
<script>var x = "<ignored>";</script>
<div style="display: none">secret</div>
<p hidden>also secret</p>
<span style="visibility:hidden"><em>nope</em></span>
<noscript>no js</noscript>
</body></html>"#;

    fn two() -> NonZeroUsize {
        NonZeroUsize::new(2).unwrap()
    }

    #[test]
    fn parses_body_and_serializes_markup() {
        let doc = Document::parse_html("<body><p class=\"x\">a &amp; b<br>c</p></body>");
        assert_eq!(doc.to_markup(), r#"<p class="x">a &amp; b<br>c</p>"#);
    }

    #[test]
    fn enumerates_only_visible_text() {
        let doc = Document::parse_html(PAGE);
        let texts: Vec<String> = doc
            .visible_text_units()
            .into_iter()
            .map(|unit| unit.text)
            .collect();
        assert_eq!(texts, vec!["Title here", "First ", "bold", " para."]);
    }

    #[test]
    fn style_values_are_resolved_case_insensitively() {
        let el = Element::new("div").with_attr("style", "color: red; DISPLAY : None !important");
        assert_eq!(el.style_value("display").as_deref(), Some("none"));
        assert!(!el.is_rendered());
    }

    #[test]
    fn wraps_text_units_in_place() {
        let mut doc = Document::parse_html("<body><p>Hi, world!</p></body>");
        let unit = doc.visible_text_units().remove(0);
        doc.wrap_text_unit(&unit, &segment(&unit.text, two()))
            .unwrap();
        assert_eq!(
            doc.to_markup(),
            r#"<p><span class="flashread-group">Hi,</span><span class="flashread-group"> world</span><span class="flashread-group">!</span></p>"#
        );
        assert_eq!(doc.collect_groups(GroupScope::Region).len(), 3);
    }

    #[test]
    fn wrapping_a_changed_unit_is_refused() {
        let mut doc = Document::parse_html("<body><p>one</p></body>");
        let mut unit = doc.visible_text_units().remove(0);
        unit.text = "two".to_string();
        let err = doc
            .wrap_text_unit(&unit, &segment("two", two()))
            .unwrap_err();
        assert!(matches!(err, SurfaceError::Detached { .. }));
    }

    #[test]
    fn reader_overlay_escapes_pasted_markup() {
        let mut doc = Document::parse_html(PAGE);
        let groups = segment("<b>bold?</b> & done", two());
        doc.mount_reader(&groups).unwrap();

        let reader = doc.collect_groups(GroupScope::Reader);
        assert_eq!(reader.len(), groups.len());
        assert_eq!(groups[0].text(), "<b");
        let markup = doc.to_markup();
        assert!(markup.contains(r#"<span class="flashread-group">&lt;b</span>"#));
        assert!(markup.contains("&amp;"));
        assert!(!markup.contains("<b>"));
        assert!(markup.contains(&crate::segment::render_markup(&groups)));
    }

    #[test]
    fn highlight_sets_and_clears_style() {
        let mut doc = Document::parse_html(r#"<body><p style="margin: 0">word</p></body>"#);
        let unit = doc.visible_text_units().remove(0);
        doc.wrap_text_unit(&unit, &segment("word", two())).unwrap();
        let group = doc.collect_groups(GroupScope::Region).remove(0);

        doc.set_highlight(&group, Some("#add8e6")).unwrap();
        let el = doc.node(&group).and_then(Node::as_element).unwrap();
        assert!(el.has_class(HIGHLIGHT_CLASS));
        assert_eq!(el.style_value("background-color").as_deref(), Some("#add8e6"));

        doc.set_highlight(&group, None).unwrap();
        let el = doc.node(&group).and_then(Node::as_element).unwrap();
        assert!(!el.has_class(HIGHLIGHT_CLASS));
        assert_eq!(el.attr("style"), None);
    }

    #[test]
    fn snapshot_restores_exact_markup() {
        let mut doc = Document::parse_html(PAGE);
        let before = doc.to_markup();
        let snapshot = doc.snapshot();
        doc.mount_reader(&segment("pasted", two())).unwrap();
        assert_ne!(doc.to_markup(), before);
        doc.restore(snapshot).unwrap();
        assert_eq!(doc.to_markup(), before);
    }

    #[test]
    fn snapshot_from_previous_page_is_stale() {
        let mut doc = Document::parse_html(PAGE);
        let snapshot = doc.snapshot();
        doc.load("<body><p>another page</p></body>");
        assert!(matches!(
            doc.restore(snapshot),
            Err(SurfaceError::StaleSnapshot { .. })
        ));
    }

    #[test]
    fn fallback_removal_drops_groups_and_reader() {
        let mut doc = Document::parse_html("<body><p>x</p></body>");
        doc.mount_reader(&segment("a b c", two())).unwrap();
        for group in doc.collect_groups(GroupScope::Reader).iter().rev() {
            doc.remove_group(group);
        }
        assert!(doc.collect_groups(GroupScope::Region).is_empty());
        doc.remove_reader();
        assert_eq!(doc.to_markup(), "");
    }

    #[test]
    fn scrolls_far_groups_to_the_center() {
        let paragraphs: String = (0..40).map(|i| format!("<p>line {i}</p>")).collect();
        let mut doc = Document::parse_html(&format!("<body>{paragraphs}</body>"));
        doc.set_viewport(Viewport {
            width: 40,
            height: 10,
        });
        for unit in doc.visible_text_units().into_iter().rev() {
            let groups = segment(&unit.text, NonZeroUsize::new(8).unwrap());
            doc.wrap_text_unit(&unit, &groups).unwrap();
        }
        let groups = doc.collect_groups(GroupScope::Region);

        doc.scroll_into_view(&groups[1]);
        assert_eq!(doc.scroll_position(), 0, "visible group does not scroll");

        doc.scroll_into_view(&groups[30]);
        let line = doc.layout().line_of(&groups[30]).unwrap();
        assert_eq!(doc.scroll_position(), line - 5);
    }
}

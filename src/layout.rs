//! Flows a document body into wrapped terminal lines.

use std::collections::HashMap;

use unicode_width::UnicodeWidthStr;

use crate::document::{Element, Node, NodePath};
use crate::segment::GROUP_CLASS;

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "dialog", "div", "dl",
    "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tr", "ul",
];
const SPACED_TAGS: &[&str] = &[
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "ol", "p", "pre", "table", "ul",
];
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStyle {
    Plain,
    Heading,
    Control,
    Group,
    Highlight(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: SpanStyle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub lines: Vec<Line>,
    group_lines: HashMap<NodePath, usize>,
}

impl Layout {
    /// Line on which the group at `path` starts.
    pub fn line_of(&self, path: &NodePath) -> Option<usize> {
        self.group_lines.get(path).copied()
    }
}

pub fn layout(body: &Element, width: usize) -> Layout {
    let mut flow = Flow::new(width);
    if body.is_rendered() {
        flow.children(body, &NodePath::root(), &SpanStyle::Plain);
    }
    flow.finish()
}

struct Flow {
    width: usize,
    lines: Vec<Line>,
    current: Line,
    col: usize,
    pending_space: Option<SpanStyle>,
    pending_group: Option<NodePath>,
    group_lines: HashMap<NodePath, usize>,
}

impl Flow {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Line::default(),
            col: 0,
            pending_space: None,
            pending_group: None,
            group_lines: HashMap::new(),
        }
    }

    fn finish(mut self) -> Layout {
        self.break_line();
        while self.lines.last().is_some_and(Line::is_empty) {
            self.lines.pop();
        }
        Layout {
            lines: self.lines,
            group_lines: self.group_lines,
        }
    }

    fn children(&mut self, el: &Element, path: &NodePath, style: &SpanStyle) {
        for (i, child) in el.children.iter().enumerate() {
            match child {
                Node::Text(text) => self.text(text, style),
                Node::Element(inner) if inner.is_rendered() => {
                    self.element(inner, &path.child(i), style)
                }
                Node::Element(_) => {}
            }
        }
    }

    fn element(&mut self, el: &Element, path: &NodePath, inherited: &SpanStyle) {
        let tag = el.tag.as_str();
        match tag {
            "br" => {
                self.force_break();
                return;
            }
            "hr" => {
                self.break_line();
                self.push_word(&"─".repeat(self.width), &SpanStyle::Plain);
                self.break_line();
                return;
            }
            "button" => {
                self.push_word(&format!("[ {} ]", el.text_content().trim()), &SpanStyle::Control);
                self.break_line();
                self.blank_line();
                return;
            }
            _ => {}
        }

        let is_block = BLOCK_TAGS.contains(&tag);
        if is_block {
            self.break_line();
        }
        if tag == "li" {
            self.push_word("•", inherited);
            self.pending_space = Some(inherited.clone());
        }

        let style = if el.has_class(GROUP_CLASS) {
            self.pending_group = Some(path.clone());
            match el.style_value("background-color") {
                Some(color) => SpanStyle::Highlight(color),
                None => SpanStyle::Group,
            }
        } else if HEADING_TAGS.contains(&tag) {
            SpanStyle::Heading
        } else {
            inherited.clone()
        };

        self.children(el, path, &style);

        if let Some(group) = self.pending_group.take() {
            let line = self.lines.len();
            self.group_lines.insert(group, line);
        }
        if SPACED_TAGS.contains(&tag) {
            self.blank_line();
        } else if is_block {
            self.break_line();
        }
    }

    fn text(&mut self, text: &str, style: &SpanStyle) {
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            let is_space = c.is_whitespace();
            let end = rest
                .find(|ch: char| ch.is_whitespace() != is_space)
                .unwrap_or(rest.len());
            let (piece, tail) = rest.split_at(end);
            if is_space {
                if self.col > 0 {
                    self.pending_space = Some(style.clone());
                }
            } else {
                self.push_word(piece, style);
            }
            rest = tail;
        }
    }

    fn push_word(&mut self, word: &str, style: &SpanStyle) {
        let width = word.width();
        let space = usize::from(self.pending_space.is_some());
        if self.col > 0 && self.col + space + width > self.width {
            self.break_line();
        }
        if let Some(space_style) = self.pending_space.take() {
            if self.col > 0 {
                self.append(" ", &space_style);
                self.col += 1;
            }
        }
        if let Some(group) = self.pending_group.take() {
            self.group_lines.insert(group, self.lines.len());
        }
        self.append(word, style);
        self.col += width;
    }

    fn append(&mut self, text: &str, style: &SpanStyle) {
        match self.current.spans.last_mut() {
            Some(last) if last.style == *style => last.text.push_str(text),
            _ => self.current.spans.push(Span {
                text: text.to_string(),
                style: style.clone(),
            }),
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.force_break();
        }
        self.pending_space = None;
    }

    fn force_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.col = 0;
        self.pending_space = None;
    }

    fn blank_line(&mut self) {
        self.break_line();
        if self.lines.last().is_some_and(|line| !line.is_empty()) {
            self.lines.push(Line::default());
        }
    }
}

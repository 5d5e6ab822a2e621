use crate::error::{SyntaxError, SyntaxErrorKind};
use crate::ir::{
    DEFAULT_COMPONENT_TYPE, Direction, Edge, Graph, Group, GroupChild, Node, NodeShape,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)(flowchart|graph)(?:\s+(\S+))?\s*$").unwrap());
static SUBGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^subgraph(?:\s+(.*))?$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());
static NODE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_\-]*$").unwrap());
static PIPE_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<left>.+?)\s*(?P<arrow><?(?:-{2,}|={2,}|-\.+-)>?)\|(?P<label>[^|]*)\|\s*(?P<right>.+)$",
    )
    .unwrap()
});
static LABEL_ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<left>.+?)\s*<?(?:-{2}|={2}|-\.)\s+(?P<label>[^<>=|]+?)\s+(?:-{2,}|={2,}|\.+-)>?\s*(?P<right>.+)$",
    )
    .unwrap()
});
static ARROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<left>.+?)\s*(?P<arrow><?(?:-{2,}|={2,}|-\.+-)>?)\s*(?P<right>.+)$").unwrap()
});
static ARROW_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<?(?:-{2,}|={2,}|-\.+-)>?").unwrap());

const STYLE_DIRECTIVES: [&str; 8] = [
    "classDef ",
    "class ",
    "style ",
    "linkStyle ",
    "click ",
    "accTitle",
    "accDescr",
    "title ",
];

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub graph: Graph,
    pub init_config: Option<serde_json::Value>,
}

pub fn parse_flowchart(input: &str) -> Result<ParseOutput, SyntaxError> {
    let (lines, init_config) = preprocess_input(input);
    let mut builder = FlowchartBuilder::new();
    let mut saw_header = false;

    for (line_no, raw_line) in lines {
        for line in split_statements(&raw_line) {
            if !saw_header {
                let Some(caps) = HEADER_RE.captures(&line) else {
                    return Err(SyntaxError::new(line_no, SyntaxErrorKind::MissingHeader));
                };
                if let Some(token) = caps.get(2).map(|m| m.as_str()) {
                    builder.graph.direction = Direction::from_token(token).ok_or_else(|| {
                        SyntaxError::new(
                            line_no,
                            SyntaxErrorKind::UnknownDirection(token.to_string()),
                        )
                    })?;
                }
                saw_header = true;
                continue;
            }
            builder.statement(&line, line_no)?;
        }
    }

    if !saw_header {
        return Err(SyntaxError::new(1, SyntaxErrorKind::MissingHeader));
    }
    let graph = builder.finish()?;
    Ok(ParseOutput { graph, init_config })
}

struct OpenGroup {
    id: String,
    line: usize,
}

#[derive(Debug)]
struct NodeToken {
    id: Option<String>,
    label: Option<String>,
    shape: Option<NodeShape>,
}

struct FlowchartBuilder {
    graph: Graph,
    stack: Vec<OpenGroup>,
    // Nodes only ever seen as bare edge endpoints.
    implicit: HashSet<String>,
}

impl FlowchartBuilder {
    fn new() -> Self {
        Self {
            graph: Graph::new(),
            stack: Vec::new(),
            implicit: HashSet::new(),
        }
    }

    fn statement(&mut self, line: &str, line_no: usize) -> Result<(), SyntaxError> {
        if line == "end" {
            if self.stack.pop().is_none() {
                return Err(SyntaxError::new(line_no, SyntaxErrorKind::UnmatchedEnd));
            }
            return Ok(());
        }

        if let Some(caps) = SUBGRAPH_RE.captures(line) {
            let rest = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            self.open_group(rest, line_no)?;
            return Ok(());
        }

        if let Some(direction) = parse_direction_line(line) {
            if self.stack.is_empty() {
                self.graph.direction = direction;
            }
            return Ok(());
        }

        if is_style_directive(line) {
            return Ok(());
        }

        if self.add_edges(line, line_no)? {
            return Ok(());
        }

        let token = parse_node_token(line, line_no)?;
        self.reference_node(token, true, line_no)?;
        Ok(())
    }

    fn open_group(&mut self, header: &str, line_no: usize) -> Result<(), SyntaxError> {
        if !brackets_balanced(header) {
            return Err(SyntaxError::new(
                line_no,
                SyntaxErrorKind::UnbalancedBrackets(header.to_string()),
            ));
        }
        let (explicit_id, label) = parse_subgraph_header(header);
        let id = match explicit_id {
            Some(id) if !self.graph.contains_group(&id) && !self.is_declared_node(&id) => id,
            Some(id) => self.unique_id(&id),
            None => self.unique_id(&slugify(&label, "group")),
        };
        let parent_id = self.stack.last().map(|open| open.id.clone());
        if let Some(parent) = parent_id.as_deref().and_then(|pid| self.graph.group_mut(pid)) {
            parent.children.push(GroupChild::Group(id.clone()));
        }
        let group = Group {
            id: id.clone(),
            label,
            parent_id,
            children: Vec::new(),
            order: self.graph.groups.len(),
            depth: self.stack.len(),
        };
        self.graph.push_group(group);
        self.stack.push(OpenGroup { id, line: line_no });
        Ok(())
    }

    /// Returns `Ok(false)` when the statement holds no arrow at all.
    fn add_edges(&mut self, line: &str, line_no: usize) -> Result<bool, SyntaxError> {
        let masked = mask_bracket_content(line);
        if masked.contains("~~~") {
            // Invisible ordering links carry no data for the layout.
            return Ok(true);
        }

        if let Some(chain) = split_edge_chain(line) {
            for statement in chain {
                let Some(parts) = parse_edge_line(&statement) else {
                    return Err(SyntaxError::new(
                        line_no,
                        SyntaxErrorKind::MissingEndpoint(line.to_string()),
                    ));
                };
                self.push_edges(parts, line_no)?;
            }
            return Ok(true);
        }

        if let Some(parts) = parse_edge_line(line) {
            self.push_edges(parts, line_no)?;
            return Ok(true);
        }

        if ARROW_TOKEN_RE.is_match(&masked) {
            return Err(SyntaxError::new(
                line_no,
                SyntaxErrorKind::MissingEndpoint(line.to_string()),
            ));
        }
        Ok(false)
    }

    fn push_edges(
        &mut self,
        (left, label, right): (String, Option<String>, String),
        line_no: usize,
    ) -> Result<(), SyntaxError> {
        let mut source_ids = Vec::new();
        for part in split_top_level(&left, '&') {
            let token = parse_node_token(part, line_no)?;
            source_ids.push(self.reference_node(token, false, line_no)?);
        }
        let mut target_ids = Vec::new();
        for part in split_top_level(&right, '&') {
            let token = parse_node_token(part, line_no)?;
            target_ids.push(self.reference_node(token, false, line_no)?);
        }

        for source in &source_ids {
            for target in &target_ids {
                let id = format!("e{}", self.graph.edges.len());
                self.graph.edges.push(Edge {
                    id,
                    source: source.clone(),
                    target: target.clone(),
                    label: label.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolves a node token to an id, creating or updating the node.
    /// `declared` is false for bare edge endpoints.
    fn reference_node(
        &mut self,
        token: NodeToken,
        declared: bool,
        line_no: usize,
    ) -> Result<String, SyntaxError> {
        let has_body = token.label.is_some() || token.shape.is_some();
        let id = match token.id {
            Some(id) => {
                if !NODE_ID_RE.is_match(&id) {
                    return Err(SyntaxError::new(line_no, SyntaxErrorKind::InvalidNode(id)));
                }
                id
            }
            None => {
                let label = token.label.as_deref().unwrap_or_default();
                let base = slugify(label, "node");
                self.unique_id(&base)
            }
        };

        if let Some(node) = self.graph.node_mut(&id) {
            if let Some(label) = token.label {
                node.label = label;
            }
            if let Some(shape) = token.shape {
                node.shape = Some(shape);
                node.component_type = shape.component_hint().to_string();
            }
        } else {
            let order = self.graph.nodes.len();
            self.graph.push_node(Node {
                id: id.clone(),
                label: token.label.unwrap_or_else(|| id.clone()),
                component_type: token
                    .shape
                    .map(|shape| shape.component_hint())
                    .unwrap_or(DEFAULT_COMPONENT_TYPE)
                    .to_string(),
                shape: token.shape,
                group_id: None,
                order,
            });
            if !declared && !has_body {
                self.implicit.insert(id.clone());
            }
        }
        if declared || has_body {
            self.implicit.remove(&id);
        }

        self.claim_membership(&id);
        Ok(id)
    }

    fn claim_membership(&mut self, node_id: &str) {
        let Some(group_id) = self.stack.last().map(|open| open.id.clone()) else {
            return;
        };
        let Some(node) = self.graph.node_mut(node_id) else {
            return;
        };
        if node.group_id.is_some() {
            return;
        }
        node.group_id = Some(group_id.clone());
        if let Some(group) = self.graph.group_mut(&group_id) {
            group.children.push(GroupChild::Node(node_id.to_string()));
        }
    }

    fn is_declared_node(&self, id: &str) -> bool {
        self.graph.contains_node(id) && !self.implicit.contains(id)
    }

    fn unique_id(&self, base: &str) -> String {
        let taken = |id: &str| self.graph.contains_node(id) || self.graph.contains_group(id);
        if !taken(base) {
            return base.to_string();
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !taken(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    fn finish(mut self) -> Result<Graph, SyntaxError> {
        if let Some(open) = self.stack.first() {
            return Err(SyntaxError::new(
                open.line,
                SyntaxErrorKind::UnclosedSubgraph(open.id.clone()),
            ));
        }

        // Edges may point at a subgraph id; those endpoints are not nodes.
        let stray: HashSet<String> = self
            .implicit
            .iter()
            .filter(|id| self.graph.contains_group(id))
            .cloned()
            .collect();
        if !stray.is_empty() {
            tracing::debug!(count = stray.len(), "edge endpoints resolved to subgraph ids");
            self.graph.retain_nodes(|node| !stray.contains(&node.id));
            for group in &mut self.graph.groups {
                group
                    .children
                    .retain(|child| !matches!(child, GroupChild::Node(id) if stray.contains(id)));
            }
        }
        Ok(self.graph)
    }
}

fn preprocess_input(input: &str) -> (Vec<(usize, String)>, Option<serde_json::Value>) {
    let mut init_config: Option<serde_json::Value> = None;
    let mut lines = Vec::new();

    for (idx, raw_line) in input.lines().enumerate() {
        let trimmed_line = raw_line.trim();
        if trimmed_line.is_empty() {
            continue;
        }
        if let Some(caps) = INIT_RE.captures(trimmed_line) {
            if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else if let Ok(value) = json5::from_str::<serde_json::Value>(json_str) {
                    init_config = Some(value);
                } else {
                    tracing::warn!(line = idx + 1, "ignoring unreadable init directive");
                }
            }
            continue;
        }
        if trimmed_line.starts_with("%%") {
            continue;
        }
        let without_comment = strip_trailing_comment(trimmed_line);
        if without_comment.is_empty() {
            continue;
        }
        lines.push((idx + 1, without_comment));
    }

    (lines, init_config)
}

fn is_style_directive(line: &str) -> bool {
    STYLE_DIRECTIVES
        .iter()
        .any(|directive| line.starts_with(directive))
}

fn parse_direction_line(line: &str) -> Option<Direction> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() == 2 && parts[0] == "direction" {
        return Direction::from_token(parts[1]);
    }
    None
}

fn split_statements(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }

        match ch {
            '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' | '(' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' | '}' => {
                depth = (depth - 1).max(0);
                current.push(ch);
            }
            ';' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}

fn strip_trailing_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '%'
            && let Some('%') = chars.peek().copied()
        {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

/// Blanks out everything inside brackets and quotes so arrow detection only
/// sees the statement skeleton. Byte offsets are preserved so matches on the
/// masked text can slice the original.
fn mask_bracket_content(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut in_quote = false;

    for ch in line.chars() {
        let hidden = depth > 0 || in_quote;
        match ch {
            '"' => {
                in_quote = !in_quote;
                push_masked(&mut result, ch, hidden);
            }
            '[' | '(' | '{' if !in_quote => {
                depth += 1;
                result.push(ch);
            }
            ']' | ')' | '}' if !in_quote && depth > 0 => {
                depth -= 1;
                result.push(ch);
            }
            _ => push_masked(&mut result, ch, hidden),
        }
    }
    result
}

fn push_masked(out: &mut String, ch: char, hidden: bool) {
    if hidden {
        out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
    } else {
        out.push(ch);
    }
}

fn brackets_balanced(token: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut in_quote = false;
    for ch in token.chars() {
        if ch == '"' {
            in_quote = !in_quote;
            continue;
        }
        if in_quote {
            continue;
        }
        match ch {
            '[' | '(' | '{' => stack.push(ch),
            ']' | ')' | '}' => {
                let expected = match ch {
                    ']' => '[',
                    ')' => '(',
                    _ => '{',
                };
                // `id>label]` opens with `>`, so a lone `]` is tolerated there.
                if stack.last() == Some(&expected) {
                    stack.pop();
                } else if !(ch == ']' && stack.is_empty() && token.contains('>')) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty() && !in_quote
}

fn split_top_level(token: &str, sep: char) -> Vec<&str> {
    let masked = mask_bracket_content(token);
    let mut parts = Vec::new();
    let mut start = 0usize;
    for (idx, ch) in masked.char_indices() {
        if ch == sep {
            parts.push(token[start..idx].trim());
            start = idx + ch.len_utf8();
        }
    }
    parts.push(token[start..].trim());
    parts.into_iter().filter(|part| !part.is_empty()).collect()
}

fn extract_leading_decoration(right: &str) -> Option<&str> {
    let mut chars = right.chars();
    let first = chars.next()?;
    if first != 'o' && first != 'x' {
        return None;
    }
    let rest = chars.as_str();
    if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
        return Some(rest.trim_start());
    }
    None
}

fn split_edge_chain(line: &str) -> Option<Vec<String>> {
    let masked = mask_bracket_content(line);
    if label_arrow_captures(&masked).is_some() {
        return None;
    }

    let matches: Vec<regex::Match> = ARROW_TOKEN_RE.find_iter(&masked).collect();
    if matches.len() < 2 {
        return None;
    }

    let mut nodes: Vec<String> = Vec::with_capacity(matches.len() + 1);
    let mut arrows: Vec<String> = Vec::with_capacity(matches.len());
    let mut last_idx = 0usize;

    for m in matches {
        nodes.push(line[last_idx..m.start()].trim().to_string());
        arrows.push(line[m.start()..m.end()].trim().to_string());
        last_idx = m.end();
    }
    nodes.push(line[last_idx..].trim().to_string());

    // Pipe labels belong to the arrow on their left.
    for i in 1..nodes.len() {
        let trimmed = nodes[i].trim_start();
        if let Some(stripped) = trimmed.strip_prefix('|')
            && let Some(end_idx) = stripped.find('|')
        {
            let label_len = end_idx + 2;
            let label = trimmed[..label_len].to_string();
            let rest = trimmed[label_len..].trim_start().to_string();
            arrows[i - 1].push_str(&label);
            nodes[i] = rest;
        }
    }

    if nodes.iter().any(|node| node.is_empty()) {
        return None;
    }

    let statements = (0..arrows.len())
        .map(|i| format!("{} {} {}", nodes[i], arrows[i], nodes[i + 1]))
        .collect();
    Some(statements)
}

fn label_arrow_captures(masked: &str) -> Option<regex::Captures<'_>> {
    let caps = LABEL_ARROW_RE.captures(masked)?;
    let left = caps.name("left")?.as_str().trim_end();
    // `A --- B --- C` would otherwise read as a labelled edge from `A -`.
    if left.ends_with(['-', '=', '.']) {
        return None;
    }
    Some(caps)
}

fn slice_match<'a>(line: &'a str, m: regex::Match<'_>) -> &'a str {
    line[m.start()..m.end()].trim()
}

/// Endpoints that still touch arrow characters mean the regex split a
/// dangling arrow such as `A -->`.
fn endpoints_ok(left: &str, right: &str) -> bool {
    !left.is_empty()
        && !right.is_empty()
        && !left.ends_with(['-', '=', '.', '<'])
        && !right.starts_with(['-', '=', '.', '>'])
}

fn parse_edge_line(line: &str) -> Option<(String, Option<String>, String)> {
    let masked = mask_bracket_content(line);

    if let Some(caps) = PIPE_LABEL_RE.captures(&masked) {
        let left = slice_match(line, caps.name("left")?);
        let right = slice_match(line, caps.name("right")?);
        let label = strip_quotes(slice_match(line, caps.name("label")?));
        if endpoints_ok(left, right) {
            let label = (!label.is_empty()).then_some(label);
            return Some((left.to_string(), label, right.to_string()));
        }
    }

    if let Some(caps) = label_arrow_captures(&masked) {
        let left = slice_match(line, caps.name("left")?);
        let right = slice_match(line, caps.name("right")?);
        let label = strip_quotes(slice_match(line, caps.name("label")?));
        if !label.is_empty() && endpoints_ok(left, right) {
            return Some((left.to_string(), Some(label), right.to_string()));
        }
    }

    let caps = ARROW_RE.captures(&masked)?;
    let left = slice_match(line, caps.name("left")?);
    let mut right = slice_match(line, caps.name("right")?);
    if let Some(rest) = extract_leading_decoration(right) {
        right = rest;
    }
    if !endpoints_ok(left, right) {
        return None;
    }
    Some((left.to_string(), None, right.to_string()))
}

fn parse_subgraph_header(input: &str) -> (Option<String>, String) {
    let base = split_inline_classes(input);
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return (None, "Subgraph".to_string());
    }

    if let Some((Some(id), label, _shape)) = split_id_label(trimmed) {
        return (Some(id.to_string()), label);
    }

    if !trimmed.contains('"') && !trimmed.contains(char::is_whitespace) {
        return (Some(trimmed.to_string()), trimmed.to_string());
    }

    (None, strip_quotes(trimmed))
}

fn parse_node_token(token: &str, line_no: usize) -> Result<NodeToken, SyntaxError> {
    let base = split_inline_classes(token);
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return Err(SyntaxError::new(
            line_no,
            SyntaxErrorKind::MissingEndpoint(token.to_string()),
        ));
    }
    if !brackets_balanced(trimmed) {
        return Err(SyntaxError::new(
            line_no,
            SyntaxErrorKind::UnbalancedBrackets(trimmed.to_string()),
        ));
    }
    if let Some((id, label)) = split_asymmetric_label(trimmed) {
        return Ok(NodeToken {
            id: Some(id.to_string()),
            label: Some(label),
            shape: Some(NodeShape::Asymmetric),
        });
    }
    if let Some((id, label, shape)) = split_id_label(trimmed) {
        return Ok(NodeToken {
            id: id.map(str::to_string),
            label: Some(label),
            shape: Some(shape),
        });
    }
    Ok(NodeToken {
        id: Some(trimmed.to_string()),
        label: None,
        shape: None,
    })
}

fn split_asymmetric_label(token: &str) -> Option<(&str, String)> {
    if token.contains('[') || !token.ends_with(']') {
        return None;
    }
    let pos = token.find('>')?;
    let id = token[..pos].trim();
    let label = token[pos + 1..token.len() - 1].trim();
    if id.is_empty() || label.is_empty() {
        return None;
    }
    Some((id, clean_label(label)))
}

fn split_inline_classes(token: &str) -> String {
    token.split(":::").next().unwrap_or("").trim().to_string()
}

/// Splits `id<bracket>label<bracket>`; the id is `None` for anonymous
/// declarations such as `["Kafka"]`.
fn split_id_label(token: &str) -> Option<(Option<&str>, String, NodeShape)> {
    let start = token.find(['[', '(', '{'])?;
    let open = token[start..].chars().next()?;
    let close = match open {
        '[' => ']',
        '(' => ')',
        _ => '}',
    };
    if !token.ends_with(close) {
        return None;
    }
    let id = token[..start].trim();
    let raw = &token[start..];
    let (label, shape) = match open {
        '[' => parse_shape_from_brackets(raw),
        '(' => parse_shape_from_parens(raw),
        _ => parse_shape_from_braces(raw),
    };
    let id = (!id.is_empty()).then_some(id);
    Some((id, label, shape))
}

fn parse_shape_from_brackets(raw: &str) -> (String, NodeShape) {
    let inner_of = |skip: usize| clean_label(&raw[skip..raw.len() - skip]);
    if raw.len() >= 4 {
        if raw.starts_with("[/") && raw.ends_with("/]") {
            return (inner_of(2), NodeShape::Parallelogram);
        }
        if raw.starts_with("[\\") && raw.ends_with("\\]") {
            return (inner_of(2), NodeShape::ParallelogramAlt);
        }
        if raw.starts_with("[/") && raw.ends_with("\\]") {
            return (inner_of(2), NodeShape::Trapezoid);
        }
        if raw.starts_with("[\\") && raw.ends_with("/]") {
            return (inner_of(2), NodeShape::TrapezoidAlt);
        }
        if raw.starts_with("[[") && raw.ends_with("]]") {
            return (inner_of(2), NodeShape::Subroutine);
        }
        if raw.starts_with("[(") && raw.ends_with(")]") {
            return (inner_of(2), NodeShape::Cylinder);
        }
    }
    (inner_of(1), NodeShape::Rectangle)
}

fn parse_shape_from_parens(raw: &str) -> (String, NodeShape) {
    let inner_of = |skip: usize| clean_label(&raw[skip..raw.len() - skip]);
    if raw.len() >= 6 && raw.starts_with("(((") && raw.ends_with(")))") {
        return (inner_of(3), NodeShape::Circle);
    }
    if raw.len() >= 4 && raw.starts_with("((") && raw.ends_with("))") {
        return (inner_of(2), NodeShape::Circle);
    }
    if raw.len() >= 4 && raw.starts_with("([") && raw.ends_with("])") {
        return (inner_of(2), NodeShape::Stadium);
    }
    (inner_of(1), NodeShape::RoundRect)
}

fn parse_shape_from_braces(raw: &str) -> (String, NodeShape) {
    if raw.len() >= 4 && raw.starts_with("{{") && raw.ends_with("}}") {
        return (clean_label(&raw[2..raw.len() - 2]), NodeShape::Hexagon);
    }
    (clean_label(&raw[1..raw.len() - 1]), NodeShape::Diamond)
}

fn strip_quotes(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn clean_label(raw: &str) -> String {
    strip_quotes(raw)
        .replace("\\n", "\n")
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .trim()
        .to_string()
}

/// Lower-case ASCII slug; runs of other characters collapse to `_`.
pub fn slugify(text: &str, fallback: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

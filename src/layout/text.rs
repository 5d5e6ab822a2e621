use crate::config::LayoutConfig;

use super::TextBlock;

pub(super) fn measure_label(text: &str, config: &LayoutConfig) -> TextBlock {
    let font_size = config.font_size;
    let max_width_px = config.max_label_width_chars.max(1) as f32 * average_char_width(font_size);
    let mut lines = Vec::new();
    for line in split_lines(text) {
        lines.extend(wrap_line(&line, max_width_px, font_size));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    let width = lines
        .iter()
        .map(|line| text_width(line, font_size))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * font_size * config.label_line_height;
    TextBlock { width, height }
}

/// Node box for a label: text plus padding, clamped to the configured
/// bounds.
pub(super) fn node_size(text: &str, config: &LayoutConfig) -> (f32, f32) {
    let block = measure_label(text, config);
    let width = (block.width + config.node_padding_x * 2.0)
        .clamp(config.min_node_width, config.max_node_width.max(config.min_node_width));
    let height = (block.height + config.node_padding_y * 2.0).max(config.min_node_height);
    (width, height)
}

pub(super) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'i' | 'j' | 'l' | 'I' => 0.25,
        'f' | 't' | 'r' => 0.34,
        'm' | 'w' => 0.84,
        'M' | 'W' => 0.93,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '0'..='9' => 0.556,
        '-' | '_' | '/' => 0.4,
        '@' | '#' | '%' | '&' => 0.946,
        _ if !ch.is_ascii() && ch.len_utf8() > 2 => 1.0,
        _ => 0.568,
    }
}

pub(super) fn split_lines(text: &str) -> Vec<String> {
    let current = text
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("\\n", "\n");
    current
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

pub(super) fn wrap_line(line: &str, max_width: f32, font_size: f32) -> Vec<String> {
    if text_width(line, font_size) <= max_width {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if text_width(&candidate, font_size) > max_width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub(super) fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

fn average_char_width(font_size: f32) -> f32 {
    font_size * 0.56
}

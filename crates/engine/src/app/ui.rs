use super::rendering::text_width_px;
use super::scene::RenderableKind;

/// Screen-space rectangle in window pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x as f32
            && py >= self.y as f32
            && px < (self.x + self.width) as f32
            && py < (self.y + self.height) as f32
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiElement {
    Panel {
        rect: ScreenRect,
        fill: [u8; 4],
        border: Option<[u8; 4]>,
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        color: [u8; 4],
        scale: i32,
    },
    /// Drawn centered on the point and shrunk to fit `max_size_px` when set.
    Image {
        center_x: i32,
        center_y: i32,
        renderable: RenderableKind,
        scale: f32,
        max_size_px: Option<i32>,
    },
}

/// Screen-space UI description rebuilt by the active scene each tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiOverlay {
    elements: Vec<UiElement>,
}

impl UiOverlay {
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn push(&mut self, element: UiElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[UiElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|element| match element {
            UiElement::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// Greedy word wrap for the bitmap font. Words longer than a line are split.
pub fn wrap_text(text: &str, max_width_px: i32, scale: i32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if text_width_px(&candidate, scale) <= max_width_px {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            let mut rest = word;
            while text_width_px(rest, scale) > max_width_px {
                let fit = fitting_prefix_len(rest, max_width_px, scale);
                let (head, tail) = rest.split_at(fit);
                lines.push(head.to_string());
                rest = tail;
            }
            line = rest.to_string();
        }
        lines.push(line);
    }
    lines
}

fn fitting_prefix_len(word: &str, max_width_px: i32, scale: i32) -> usize {
    let mut end = 0;
    for (index, ch) in word.char_indices() {
        let next = index + ch.len_utf8();
        if text_width_px(&word[..next], scale) > max_width_px {
            break;
        }
        end = next;
    }
    if end == 0 {
        word.chars().next().map(char::len_utf8).unwrap_or(word.len())
    } else {
        end
    }
}

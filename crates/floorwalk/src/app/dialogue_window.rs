use engine::{
    line_height_px, text_width_px, wrap_text, InputSnapshot, ScreenRect, UiElement, UiOverlay,
};
use tracing::debug;

use crate::dialogue::{DialogueView, PresentationSurface};

const FALLBACK_VIEWPORT: (u32, u32) = (800, 600);
const BOX_WIDTH: i32 = 450;
const BOX_HEIGHT: i32 = 150;
const BOTTOM_MARGIN: i32 = 40;
const PADDING: i32 = 15;
const PORTRAIT_SIZE: i32 = 120;
const PORTRAIT_UPSCALE: f32 = 8.0;
const NAME_TAG_HEIGHT: i32 = 35;
const NAME_TAG_PADDING: i32 = 10;
const TEXT_SCALE: i32 = 2;
const CHOICE_GAP: i32 = 8;
const CHOICE_SPACING: i32 = 4;
const CHOICE_PADDING: i32 = 3;
const CONTINUE_MARKER: &str = ">>";

const BOX_FILL: [u8; 4] = [18, 18, 30, 235];
const BOX_BORDER: [u8; 4] = [235, 235, 245, 255];
const PORTRAIT_FILL: [u8; 4] = [44, 44, 64, 255];
const NAME_FILL: [u8; 4] = [70, 48, 110, 255];
const CHOICE_FILL: [u8; 4] = [40, 40, 70, 255];
const CHOICE_BORDER: [u8; 4] = [130, 130, 170, 255];
const TEXT_COLOR: [u8; 4] = [245, 245, 245, 255];
const MARKER_COLOR: [u8; 4] = [250, 210, 90, 255];

/// A choice picked on the window, tagged with the node it was shown for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChoiceActivation {
    pub(crate) node_key: String,
    pub(crate) index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChoiceRow {
    pub(crate) rect: ScreenRect,
    pub(crate) lines: Vec<String>,
}

/// Screen placement of everything in the window for one viewport size.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DialogueLayout {
    pub(crate) frame: ScreenRect,
    pub(crate) portrait: ScreenRect,
    pub(crate) name_tag: ScreenRect,
    pub(crate) text_origin: (i32, i32),
    pub(crate) text_lines: Vec<String>,
    pub(crate) choice_rows: Vec<ChoiceRow>,
    pub(crate) continue_marker: Option<(i32, i32)>,
}

impl DialogueLayout {
    pub(crate) fn compute(view: &DialogueView, viewport: (u32, u32)) -> Self {
        let (viewport_width, viewport_height) = effective_viewport(viewport);
        let line_height = line_height_px(TEXT_SCALE);
        let width = BOX_WIDTH
            .min(viewport_width)
            .max(PORTRAIT_SIZE + PADDING * 3 + 40);
        let text_width = width - PORTRAIT_SIZE - PADDING * 3;
        let row_text_width = text_width - CHOICE_PADDING * 2;

        let text_lines = wrap_text(&view.text, text_width, TEXT_SCALE);
        let labels: Vec<Vec<String>> = view
            .choices
            .iter()
            .enumerate()
            .map(|(index, label)| {
                wrap_text(&format!("{}. {label}", index + 1), row_text_width, TEXT_SCALE)
            })
            .collect();

        let text_height = text_lines.len() as i32 * line_height;
        let rows_height: i32 = labels
            .iter()
            .map(|lines| lines.len() as i32 * line_height + CHOICE_PADDING * 2)
            .sum::<i32>()
            + CHOICE_SPACING * (labels.len() as i32 - 1).max(0);
        let content_height = if labels.is_empty() {
            PADDING * 2 + text_height + line_height
        } else {
            PADDING * 2 + text_height + CHOICE_GAP + rows_height
        };
        let height = BOX_HEIGHT
            .max(content_height)
            .max(PORTRAIT_SIZE + PADDING * 2);

        let x = (viewport_width - width) / 2;
        let y = viewport_height - BOTTOM_MARGIN - height;
        let frame = ScreenRect::new(x, y, width, height);
        let portrait = ScreenRect::new(x + PADDING, y + PADDING, PORTRAIT_SIZE, PORTRAIT_SIZE);
        let name_tag = ScreenRect::new(
            x,
            y - NAME_TAG_HEIGHT,
            text_width_px(&view.speaker, TEXT_SCALE) + NAME_TAG_PADDING * 2,
            NAME_TAG_HEIGHT,
        );
        let text_x = x + PADDING * 2 + PORTRAIT_SIZE;
        let text_y = y + PADDING;

        let mut choice_rows = Vec::with_capacity(labels.len());
        let mut row_y = text_y + text_height + CHOICE_GAP;
        for lines in labels {
            let row_height = lines.len() as i32 * line_height + CHOICE_PADDING * 2;
            choice_rows.push(ChoiceRow {
                rect: ScreenRect::new(text_x, row_y, text_width, row_height),
                lines,
            });
            row_y += row_height + CHOICE_SPACING;
        }

        let continue_marker = view.choices.is_empty().then(|| {
            (
                x + width - PADDING - text_width_px(CONTINUE_MARKER, TEXT_SCALE),
                y + height - PADDING - line_height,
            )
        });

        Self {
            frame,
            portrait,
            name_tag,
            text_origin: (text_x, text_y),
            text_lines,
            choice_rows,
            continue_marker,
        }
    }

    pub(crate) fn choice_at(&self, px: f32, py: f32) -> Option<usize> {
        self.choice_rows
            .iter()
            .position(|row| row.rect.contains(px, py))
    }
}

fn effective_viewport(viewport: (u32, u32)) -> (i32, i32) {
    let (width, height) = if viewport.0 == 0 || viewport.1 == 0 {
        FALLBACK_VIEWPORT
    } else {
        viewport
    };
    (
        i32::try_from(width).unwrap_or(i32::MAX),
        i32::try_from(height).unwrap_or(i32::MAX),
    )
}

/// The on-screen dialogue box. Keeps only what it was last told to show.
#[derive(Debug, Default)]
pub(crate) struct DialogueWindow {
    view: Option<DialogueView>,
    pending: Option<ChoiceActivation>,
}

impl DialogueWindow {
    #[cfg(test)]
    pub(crate) fn view(&self) -> Option<&DialogueView> {
        self.view.as_ref()
    }

    /// Turns a digit key or a click on a row into a queued activation.
    pub(crate) fn handle_input(&mut self, input: &InputSnapshot) {
        let Some(view) = &self.view else {
            return;
        };
        if view.choices.is_empty() {
            return;
        }

        let mut picked = input
            .choice_pressed()
            .filter(|index| *index < view.choices.len());
        if picked.is_none() && input.left_click_pressed() {
            if let Some(cursor) = input.cursor_position_px() {
                picked = DialogueLayout::compute(view, input.window_size())
                    .choice_at(cursor.x, cursor.y);
            }
        }

        if let Some(index) = picked {
            debug!(node = %view.node_key, index, "dialogue_choice_activated");
            self.pending = Some(ChoiceActivation {
                node_key: view.node_key.clone(),
                index,
            });
        }
    }

    pub(crate) fn take_activation(&mut self) -> Option<ChoiceActivation> {
        self.pending.take()
    }

    pub(crate) fn draw(&self, overlay: &mut UiOverlay, viewport: (u32, u32)) {
        let Some(view) = &self.view else {
            return;
        };
        let layout = DialogueLayout::compute(view, viewport);
        let line_height = line_height_px(TEXT_SCALE);

        overlay.push(UiElement::Panel {
            rect: layout.frame,
            fill: BOX_FILL,
            border: Some(BOX_BORDER),
        });
        overlay.push(UiElement::Panel {
            rect: layout.portrait,
            fill: PORTRAIT_FILL,
            border: Some(BOX_BORDER),
        });
        overlay.push(UiElement::Image {
            center_x: layout.portrait.x + layout.portrait.width / 2,
            center_y: layout.portrait.y + layout.portrait.height / 2,
            renderable: view.portrait.renderable.clone(),
            scale: PORTRAIT_UPSCALE,
            max_size_px: Some(PORTRAIT_SIZE - PADDING),
        });
        overlay.push(UiElement::Panel {
            rect: layout.name_tag,
            fill: NAME_FILL,
            border: Some(BOX_BORDER),
        });
        overlay.push(UiElement::Text {
            x: layout.name_tag.x + NAME_TAG_PADDING,
            y: layout.name_tag.y + (NAME_TAG_HEIGHT - line_height) / 2,
            text: view.speaker.clone(),
            color: TEXT_COLOR,
            scale: TEXT_SCALE,
        });

        let (text_x, text_y) = layout.text_origin;
        for (row, line) in layout.text_lines.iter().enumerate() {
            overlay.push(UiElement::Text {
                x: text_x,
                y: text_y + row as i32 * line_height,
                text: line.clone(),
                color: TEXT_COLOR,
                scale: TEXT_SCALE,
            });
        }

        for choice in &layout.choice_rows {
            overlay.push(UiElement::Panel {
                rect: choice.rect,
                fill: CHOICE_FILL,
                border: Some(CHOICE_BORDER),
            });
            for (row, line) in choice.lines.iter().enumerate() {
                overlay.push(UiElement::Text {
                    x: choice.rect.x + CHOICE_PADDING,
                    y: choice.rect.y + CHOICE_PADDING + row as i32 * line_height,
                    text: line.clone(),
                    color: TEXT_COLOR,
                    scale: TEXT_SCALE,
                });
            }
        }

        if let Some((marker_x, marker_y)) = layout.continue_marker {
            overlay.push(UiElement::Text {
                x: marker_x,
                y: marker_y,
                text: CONTINUE_MARKER.to_string(),
                color: MARKER_COLOR,
                scale: TEXT_SCALE,
            });
        }
    }
}

impl PresentationSurface for DialogueWindow {
    fn render(&mut self, view: DialogueView) {
        self.view = Some(view);
    }

    fn clear_choices(&mut self) {
        if let Some(view) = &mut self.view {
            view.choices.clear();
        }
    }

    fn hide(&mut self) {
        self.view = None;
        self.pending = None;
    }

    fn is_visible(&self) -> bool {
        self.view.is_some()
    }
}

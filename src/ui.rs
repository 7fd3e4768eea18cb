//! Terminal rendering for the demo screen.
//!
//! Layout, top to bottom: text field, 5x5 button grid, status line, keymap.
//! Like the rest of the render side, this only reads a [`RenderState`]
//! snapshot; it never touches the owner-affine surface.
//!
//! [`layout`] is the single source of geometry: drawing and mouse
//! hit-testing both go through it.

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use crate::config::SubmitMode;
use crate::render::RenderState;
use crate::surface::{Argb, WidgetId, BUTTON_COUNT, GRID_SIZE};

const COLOR_TEXT_DIMMED: Color = Color::Gray;
const COLOR_TEXT_MUTED: Color = Color::DarkGray;
const COLOR_SEPARATOR: Color = Color::White;
const COLOR_RACY: Color = Color::Red;
const COLOR_FAILED: Color = Color::Yellow;

const TEXT_HEIGHT: u16 = 3;

/// Screen regions for a given terminal area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    pub text: Rect,
    pub separator: Rect,
    pub buttons: [Rect; BUTTON_COUNT],
    pub status: Rect,
    pub keys: Rect,
}

pub fn layout(area: Rect) -> ScreenLayout {
    let [text, separator, grid, status, keys] = Layout::vertical([
        Constraint::Length(TEXT_HEIGHT),
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let mut buttons = [Rect::default(); BUTTON_COUNT];
    let rows = Layout::vertical([Constraint::Ratio(1, GRID_SIZE as u32); GRID_SIZE])
        .spacing(1)
        .split(grid);
    for (r, row) in rows.iter().enumerate() {
        let cells = Layout::horizontal([Constraint::Ratio(1, GRID_SIZE as u32); GRID_SIZE])
            .spacing(1)
            .split(*row);
        for (c, cell) in cells.iter().enumerate() {
            buttons[r * GRID_SIZE + c] = *cell;
        }
    }

    ScreenLayout {
        text,
        separator,
        buttons,
        status,
        keys,
    }
}

/// Button under terminal cell (`column`, `row`), if any.
pub fn hit_test(area: Rect, column: u16, row: u16) -> Option<WidgetId> {
    let screen = layout(area);
    screen
        .buttons
        .iter()
        .position(|r| contains(*r, column, row))
        .map(WidgetId::wrapping)
}

fn contains(r: Rect, x: u16, y: u16) -> bool {
    !r.is_empty() && x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height
}

pub fn draw(frame: &mut Frame, state: &RenderState) {
    let screen = layout(frame.area());

    render_text_field(frame, state, screen.text);
    render_separator(frame, screen.separator);
    for widget in WidgetId::all() {
        render_button(frame, state, widget, screen.buttons[widget.index()]);
    }
    frame.render_widget(Paragraph::new(status_line(state)), screen.status);
    frame.render_widget(Paragraph::new(keymap_line()), screen.keys);
}

/// Text field with the cursor drawn as a reversed cell at the selection.
fn render_text_field(frame: &mut Frame, state: &RenderState, area: Rect) {
    let text = &state.surface.text;
    let selection = state.surface.selection;

    let before: String = text.chars().take(selection).collect();
    let at: String = text
        .chars()
        .nth(selection)
        .map(String::from)
        .unwrap_or_else(|| " ".to_string());
    let after: String = text.chars().skip(selection + 1).collect();

    let line = Line::from(vec![
        Span::styled("text ", Style::default().fg(COLOR_TEXT_MUTED)),
        Span::raw(before),
        Span::styled(at, Style::default().add_modifier(Modifier::REVERSED)),
        Span::raw(after),
    ]);
    frame.render_widget(Paragraph::new(line).wrap(Wrap { trim: false }), area);
}

fn render_separator(frame: &mut Frame, area: Rect) {
    let solid = "─".repeat(area.width as usize);
    let line = Line::from(Span::styled(solid, Style::default().fg(COLOR_SEPARATOR)));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_button(frame: &mut Frame, state: &RenderState, widget: WidgetId, area: Rect) {
    if area.is_empty() {
        return;
    }
    let color = state.surface.colors[widget.index()];
    let focused = state.surface.focus == widget;
    let clicked = state.surface.clicked[widget.index()];

    let mut style = Style::default()
        .bg(to_color(color))
        .fg(label_color(color));
    if focused {
        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    }

    let label = button_label(widget, focused, clicked);
    // Centre the label vertically.
    let pad = area.height.saturating_sub(1) / 2;
    let mut lines = vec![Line::raw(""); pad as usize];
    lines.push(Line::raw(label));

    frame.render_widget(
        Paragraph::new(lines)
            .style(style)
            .alignment(Alignment::Center),
        area,
    );
}

fn button_label(widget: WidgetId, focused: bool, clicked: bool) -> String {
    let n = format!("{}{}", widget.row() + 1, widget.col() + 1);
    let n = if clicked { format!("{}*", n) } else { n };
    if focused {
        format!("[{}]", n)
    } else {
        n
    }
}

pub fn to_color(c: Argb) -> Color {
    let (r, g, b) = c.rgb();
    Color::Rgb(r, g, b)
}

fn label_color(c: Argb) -> Color {
    if c.luma() < 128 {
        Color::White
    } else {
        Color::Black
    }
}

fn mode_span(name: &'static str, mode: SubmitMode) -> Vec<Span<'static>> {
    let style = match mode {
        SubmitMode::ViaQueue => Style::default().fg(COLOR_TEXT_DIMMED),
        SubmitMode::Direct => Style::default()
            .fg(COLOR_RACY)
            .add_modifier(Modifier::BOLD),
    };
    vec![
        Span::styled(format!("{} ", name), Style::default().fg(COLOR_TEXT_MUTED)),
        Span::styled(mode.label(), style),
    ]
}

pub fn status_line(state: &RenderState) -> Line<'static> {
    let muted = Style::default().fg(COLOR_TEXT_MUTED);
    let dimmed = Style::default().fg(COLOR_TEXT_DIMMED);

    let mut spans = mode_span("inserter", state.inserter_mode);
    spans.push(Span::raw("  "));
    spans.extend(mode_span("colorer", state.colorer_mode));
    spans.push(Span::raw("  "));

    let stats = state.stats;
    spans.push(Span::styled(format!("run {}", stats.executed), dimmed));
    let failed_style = if stats.failed > 0 {
        Style::default().fg(COLOR_FAILED)
    } else {
        dimmed
    };
    spans.push(Span::styled(" • ", muted));
    spans.push(Span::styled(format!("failed {}", stats.failed), failed_style));
    spans.push(Span::styled(" • ", muted));
    spans.push(Span::styled(format!("pending {}", stats.pending()), dimmed));

    spans.push(Span::raw("  "));
    let racy_style = if state.off_thread_writes > 0 {
        Style::default().fg(COLOR_RACY)
    } else {
        dimmed
    };
    spans.push(Span::styled(
        format!("racy writes {}", state.off_thread_writes),
        racy_style,
    ));

    Line::from(spans)
}

struct Keybinding(&'static str, &'static str);

const KEYMAP: [Keybinding; 4] = [
    Keybinding("click", "select"),
    Keybinding("←↑↓→", "focus"),
    Keybinding("enter", "select focused"),
    Keybinding("q", "quit"),
];

fn keymap_line() -> Line<'static> {
    let key_style = Style::default().fg(COLOR_TEXT_DIMMED);
    let desc_style = Style::default().fg(COLOR_TEXT_MUTED);

    let mut spans = Vec::new();
    for (i, binding) in KEYMAP.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", desc_style));
        }
        spans.push(Span::styled(binding.0, key_style));
        spans.push(Span::styled(format!(" {}", binding.1), desc_style));
    }
    Line::from(spans)
}

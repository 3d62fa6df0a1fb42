//! Chat history display component

use crate::store::{ChatRole, ChatTurn};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders the conversation log: user turns, assistant SQL blocks, and
/// assistant error turns, newest at the bottom.
pub struct ChatHistory<'a> {
    turns: &'a [ChatTurn],
    max_turns: usize,
    pending: bool,
}

impl<'a> ChatHistory<'a> {
    pub fn new(turns: &'a [ChatTurn], max_turns: usize, pending: bool) -> Self {
        Self {
            turns,
            max_turns,
            pending,
        }
    }

    /// Render a single turn into lines
    fn render_turn(&self, turn: &ChatTurn, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (label, label_style) = match turn.role {
            ChatRole::User => ("You", Style::default().fg(Color::Blue)),
            ChatRole::Assistant if turn.is_error() => {
                ("⚠ SQL Assistant", Style::default().fg(Color::Red))
            }
            ChatRole::Assistant => ("SQL Assistant", Style::default().fg(Color::Green)),
        };

        let timestamp = turn.timestamp.format("%H:%M:%S").to_string();
        lines.push(Line::from(vec![
            Span::styled(label.to_string(), label_style),
            Span::styled(format!("  {timestamp}"), Style::default().fg(Color::DarkGray)),
        ]));

        match turn.role {
            ChatRole::Assistant if turn.is_error() => {
                for content_line in wrap_text(&turn.content, width.saturating_sub(2) as usize) {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(content_line, Style::default().fg(Color::Red)),
                    ]));
                }
            }
            ChatRole::Assistant => {
                // SQL goes in a fenced block so it reads as copyable code.
                lines.push(Line::from(vec![Span::styled(
                    "  ┌─ sql ─",
                    Style::default().fg(Color::DarkGray),
                )]));
                for sql_line in turn.content.lines() {
                    lines.push(Line::from(vec![
                        Span::styled("  │ ", Style::default().fg(Color::DarkGray)),
                        Span::styled(sql_line.to_string(), Style::default().fg(Color::Cyan)),
                    ]));
                }
                lines.push(Line::from(vec![Span::styled(
                    "  └─",
                    Style::default().fg(Color::DarkGray),
                )]));
            }
            ChatRole::User => {
                for content_line in wrap_text(&turn.content, width.saturating_sub(2) as usize) {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(content_line, Style::default().fg(Color::White)),
                    ]));
                }
            }
        }

        lines
    }
}

impl Widget for ChatHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default().borders(Borders::ALL).title("SQL Assistant");

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.turns.is_empty() && !self.pending {
            let welcome_lines = vec![
                Line::from(vec![Span::styled(
                    "Hi! I can help you generate SQL queries from your schema.",
                    Style::default().fg(Color::Green),
                )]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Ask something like \"Show me all users\" or \"Find orders from last month\".",
                    Style::default().fg(Color::Gray),
                )]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Press Enter to send, / for commands, Tab for the schema panel.",
                    Style::default().fg(Color::DarkGray),
                )]),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        // Collect lines for the most recent turns, plus the pending indicator.
        let start = self.turns.len().saturating_sub(self.max_turns);
        let mut all_lines: Vec<Line> = Vec::new();
        for turn in &self.turns[start..] {
            let mut lines = self.render_turn(turn, inner_area.width);
            all_lines.append(&mut lines);
            all_lines.push(Line::from(vec![Span::raw("")]));
        }

        if self.pending {
            all_lines.push(Line::from(vec![
                Span::styled("SQL Assistant", Style::default().fg(Color::Green)),
            ]));
            all_lines.push(Line::from(vec![Span::styled(
                "  Generating SQL query with AI...",
                Style::default().fg(Color::DarkGray),
            )]));
        }

        // Show the tail that fits.
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let skip = total.saturating_sub(height);
        let visible = &all_lines[skip..];

        for (i, line) in visible.iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Wrap text to fit within the given width
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.len() + word.len() + 1 <= width {
            if !current_line.is_empty() {
                current_line.push(' ');
            }
            current_line.push_str(word);
        } else {
            if !current_line.is_empty() {
                lines.push(current_line);
                current_line = String::new();
            }
            current_line.push_str(word);
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

use super::theme::{ACCENT, DIM};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use std::collections::VecDeque;

/// 标准三段式布局：Header(3) + Content(弹性) + Footer(3)
pub fn main_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

/// 内容区左右分栏：条目列表 + 日志
pub fn content_columns(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area)
        .to_vec()
}

pub fn render_header(f: &mut Frame, title: &str, area: Rect) {
    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(header, area);
}

/// footer 两行：状态 + 快捷键
pub fn render_footer(f: &mut Frame, status: &str, keys: &str, area: Rect) {
    let lines = vec![
        Line::styled(format!(" {}", status), Style::default().fg(Color::Green)),
        Line::styled(format!(" {}", keys), Style::default().fg(DIM)),
    ];
    let footer = Paragraph::new(lines)
        .block(Block::default().borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM))
        .alignment(Alignment::Left);
    f.render_widget(footer, area);
}

/// 渲染日志区域，始终显示最后几行
pub fn render_log(f: &mut Frame, title: &str, lines: &VecDeque<String>, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let inner = block.inner(area);
    f.render_widget(block, area);

    // 内部水平边距
    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let total_lines = lines.len();
    let visible_height = padded.height as usize;
    let scroll = total_lines.saturating_sub(visible_height);

    let visible_content: Vec<Line> = lines
        .iter()
        .skip(scroll)
        .map(|line| Line::from(line.clone()))
        .collect();

    f.render_widget(Paragraph::new(visible_content), padded);

    // 滚动条
    if total_lines > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state = ScrollbarState::new(total_lines).position(scroll);

        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                horizontal: 0,
                vertical: 1,
            }),
            &mut scrollbar_state,
        );
    }
}

/// 让选中行保持可见的滚动偏移
pub fn list_scroll(selected: usize, visible_height: usize) -> usize {
    if visible_height == 0 {
        return 0;
    }
    if selected >= visible_height {
        selected + 1 - visible_height
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_scroll_keeps_selection_visible() {
        assert_eq!(list_scroll(0, 10), 0);
        assert_eq!(list_scroll(9, 10), 0);
        assert_eq!(list_scroll(10, 10), 1);
        assert_eq!(list_scroll(25, 10), 16);
        assert_eq!(list_scroll(5, 0), 0);
    }
}

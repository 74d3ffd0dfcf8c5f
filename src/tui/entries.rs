use super::layout;
use super::state::App;
use super::theme::{self, ACCENT, BRIGHT_WHITE, DESC_DIM, DIM, NAME, SEL_BG};
use crate::catalogue::{Catalogue, PackageEntry};
use ratatui::{
    layout::{Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};

/// 名称列宽
const NAME_WIDTH: usize = 28;

/// 渲染按分类分组的条目列表
pub fn render_entries(f: &mut Frame, app: &App, catalogue: &Catalogue, area: Rect) {
    let block = Block::default()
        .title(format!(" 软件包 ({}) ", app.order.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height == 0 {
        return;
    }

    // 分类标题也占一行，先算出选中条目所在的显示行
    let mut lines: Vec<Line> = Vec::new();
    let mut selected_line = 0;
    let mut current_category: Option<&str> = None;
    for (idx, id) in app.order.iter().enumerate() {
        let Some(entry) = catalogue.get(id) else {
            continue;
        };
        if current_category != Some(entry.category.as_str()) {
            current_category = Some(entry.category.as_str());
            lines.push(category_line(&entry.category));
        }
        if idx == app.selected {
            selected_line = lines.len();
        }
        lines.push(entry_line(app, entry, idx == app.selected));
    }

    let visible_height = padded.height as usize;
    let total = lines.len();
    let scroll = layout::list_scroll(selected_line, visible_height);
    let visible: Vec<Line> = lines.into_iter().skip(scroll).take(visible_height).collect();
    f.render_widget(Paragraph::new(visible), padded);

    if total > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut state = ScrollbarState::new(total).position(scroll);
        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                horizontal: 0,
                vertical: 1,
            }),
            &mut state,
        );
    }
}

fn category_line(category: &str) -> Line<'static> {
    let title = if category.is_empty() { "其他" } else { category };
    Line::from(vec![Span::styled(
        format!("── {} ──", title),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    )])
}

fn entry_line(app: &App, entry: &PackageEntry, selected: bool) -> Line<'static> {
    let view = app.view(&entry.id);
    let busy = view.map(|v| v.busy).unwrap_or(false);

    let (badge, badge_color) = if busy {
        (app.spinner_frame(), Color::Yellow)
    } else {
        theme::badge(entry.state)
    };
    let cursor = if selected { ">" } else { " " };

    let mut name = entry.name.clone();
    if let Some(label) = &entry.alternate_label {
        name.push_str(&format!(" [+{}]", label));
    }
    let name = format!("{:<width$}", name, width = NAME_WIDTH);

    // 最近一次操作结果优先于描述
    let detail = view
        .and_then(|v| v.message.clone())
        .unwrap_or_else(|| entry.description.clone());

    if selected {
        let bg = Style::default().bg(SEL_BG);
        Line::from(vec![
            Span::styled(format!("{} ", cursor), bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD)),
            Span::styled(format!("[{}] ", badge), bg.fg(badge_color)),
            Span::styled(name, bg.fg(BRIGHT_WHITE).add_modifier(Modifier::BOLD)),
            Span::styled(detail, bg.fg(DESC_DIM)),
        ])
    } else {
        Line::from(vec![
            Span::styled(format!("{} ", cursor), Style::default().fg(Color::White)),
            Span::styled(format!("[{}] ", badge), Style::default().fg(badge_color)),
            Span::styled(name, Style::default().fg(NAME)),
            Span::styled(detail, Style::default().fg(DIM)),
        ])
    }
}

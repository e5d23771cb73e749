use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use earnings_dashboard::{DashboardService, DashboardStatus, DashboardView, DisplayTable, YearMonth};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

const PAGE_JUMP: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Earnings,
    Rejected,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Earnings => Page::Rejected,
            Page::Rejected => Page::Earnings,
        }
    }

    pub fn previous(&self) -> Self {
        // Two pages: same as next
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Earnings => "Earnings",
            Page::Rejected => "Rejected Rows",
        }
    }
}

/// Result of the latest render pass. A failed pass shows only the error.
pub enum PassOutcome {
    Loaded(DashboardView),
    Failed(String),
}

pub struct App<'a> {
    service: &'a DashboardService,
    pub outcome: PassOutcome,
    pub requested: Option<YearMonth>,
    pub current_page: Page,
    pub state: TableState,
    pub rejected_state: TableState,
    pub refreshed_at: DateTime<Local>,
}

impl<'a> App<'a> {
    pub fn new(service: &'a DashboardService, requested: Option<YearMonth>) -> Self {
        let mut app = Self {
            service,
            outcome: PassOutcome::Failed(String::new()),
            requested,
            current_page: Page::Earnings,
            state: TableState::default(),
            rejected_state: TableState::default(),
            refreshed_at: Local::now(),
        };
        app.refresh();
        app
    }

    /// Re-run the whole pipeline from the source.
    pub fn refresh(&mut self) {
        self.outcome = match self.service.render(self.requested) {
            Ok(view) => {
                self.requested = view.selected();
                PassOutcome::Loaded(view)
            }
            Err(err) => PassOutcome::Failed(err.to_string()),
        };
        self.refreshed_at = Local::now();
        self.reset_selection();
    }

    fn reset_selection(&mut self) {
        let (visits, rejected) = self.table_lens();
        self.state.select(if visits > 0 { Some(0) } else { None });
        self.rejected_state.select(if rejected > 0 { Some(0) } else { None });
    }

    pub fn view(&self) -> Option<&DashboardView> {
        match &self.outcome {
            PassOutcome::Loaded(view) => Some(view),
            PassOutcome::Failed(_) => None,
        }
    }

    fn table_lens(&self) -> (usize, usize) {
        self.view()
            .map(|v| (v.table.rows.len(), v.rejected.rows.len()))
            .unwrap_or((0, 0))
    }

    /// Step through the month selector (newest first) and re-render.
    pub fn shift_month(&mut self, step: isize) {
        if let Some(month) = self.view().and_then(|v| v.neighbour_month(step)) {
            self.requested = Some(month);
            self.refresh();
        }
    }

    pub fn older_month(&mut self) {
        self.shift_month(1);
    }

    pub fn newer_month(&mut self) {
        self.shift_month(-1);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        let (visits, rejected) = self.table_lens();
        match self.current_page {
            Page::Earnings => (&mut self.state, visits),
            Page::Rejected => (&mut self.rejected_state, rejected),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) => len - 1,
            Some(i) => i - 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = state.selected().map(|i| (i + PAGE_JUMP).min(len - 1)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = state.selected().map(|i| i.saturating_sub(PAGE_JUMP)).unwrap_or(0);
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (state, len) = self.active_table();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (state, len) = self.active_table();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('r') => app.refresh(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Left | KeyCode::Char('h') => app.older_month(),
                KeyCode::Right | KeyCode::Char('l') => app.newer_month(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with month selector
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let service = app.service;
    let date_column = service.date_column();
    match &app.outcome {
        PassOutcome::Failed(message) => render_error(f, chunks[1], message),
        PassOutcome::Loaded(view) if !view.is_ready() && app.current_page == Page::Earnings => {
            render_empty(f, chunks[1], view)
        }
        PassOutcome::Loaded(view) => match app.current_page {
            Page::Earnings => {
                render_earnings(f, chunks[1], view, &mut app.state, date_column)
            }
            Page::Rejected => {
                render_rejected(f, chunks[1], view, &mut app.rejected_state, date_column)
            }
        },
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Earnings, Page::Rejected];

    let mut spans = vec![Span::styled(
        "Live EMG Earnings",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  |  "));

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(month) = app.view().and_then(|v| v.selected_month.as_ref()) {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled("◀ ", Style::default().fg(Color::DarkGray)));
        spans.push(Span::styled(
            month.label.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(" ▶", Style::default().fg(Color::DarkGray)));
    }

    spans.push(Span::raw("  |  "));
    spans.push(Span::styled(
        format!("Refreshed {}", app.refreshed_at.format("%H:%M:%S")),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_earnings(
    f: &mut Frame,
    area: Rect,
    view: &DashboardView,
    state: &mut TableState,
    date_column: &str,
) {
    let warning = view.rejection_warning(date_column);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),                                      // Metrics
            Constraint::Length(if warning.is_some() { 1 } else { 0 }), // Warning
            Constraint::Min(0),                                         // Visits
        ])
        .split(area);

    render_metrics(f, chunks[0], view);

    if let Some(text) = warning {
        let line = Paragraph::new(Line::from(vec![
            Span::styled(format!(" ⚠ {} ", text), Style::default().fg(Color::Yellow)),
            Span::styled("(Tab to inspect)", Style::default().fg(Color::DarkGray)),
        ]));
        f.render_widget(line, chunks[1]);
    }

    let title = view
        .selected_month
        .as_ref()
        .map(|m| format!(" {} ", m.label))
        .unwrap_or_default();
    let table = display_table(&view.table, &title, fee_column(&view.table));
    f.render_stateful_widget(table, chunks[2], state);
}

fn render_metrics(f: &mut Frame, area: Rect, view: &DashboardView) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    for (i, metric) in view.metrics.iter().enumerate().take(columns.len()) {
        let is_total = i == view.metrics.len() - 1;
        let color = if is_total { Color::Green } else { Color::White };

        let content = vec![
            Line::from(Span::styled(
                format!(" {}", metric.value),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!(" {}", metric.detail),
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let block = Paragraph::new(content).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(format!(" {} ", metric.label)),
        );
        f.render_widget(block, columns[i]);
    }
}

fn render_rejected(
    f: &mut Frame,
    area: Rect,
    view: &DashboardView,
    state: &mut TableState,
    date_column: &str,
) {
    if view.rejected_count == 0 {
        let ok = Paragraph::new("  Every named row has a valid date.")
            .style(Style::default().fg(Color::Green))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Rejected Rows "),
            );
        f.render_widget(ok, area);
        return;
    }

    let title = format!(
        " Rejected Rows - missing or broken '{}' ({}) ",
        date_column, view.rejected_count
    );
    let table = display_table(&view.rejected, &title, None);
    f.render_stateful_widget(table, area, state);
}

fn fee_column(table: &DisplayTable) -> Option<usize> {
    table.columns.iter().position(|c| c == earnings_dashboard::record::FEE_COLUMN)
}

/// Generic table widget; `highlight` colours one column (the fee).
fn display_table<'a>(table: &'a DisplayTable, title: &str, highlight: Option<usize>) -> Table<'a> {
    let header_cells = table.columns.iter().map(|h| {
        Cell::from(truncate(h, 24)).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = table.rows.iter().map(|row| {
        let cells = row.iter().enumerate().map(|(i, value)| {
            let cell = Cell::from(truncate(value, 30));
            if Some(i) == highlight {
                cell.style(Style::default().fg(Color::Green))
            } else {
                cell
            }
        });
        Row::new(cells).height(1)
    });

    let widths: Vec<Constraint> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if Some(i) == highlight {
                Constraint::Length(12)
            } else {
                Constraint::Min(10)
            }
        })
        .collect();

    Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title.to_string()),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("→ ")
}

fn render_error(f: &mut Frame, area: Rect, message: &str) {
    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  ❌ Could not load data",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("  {}", message)),
        Line::from(""),
        Line::from(Span::styled(
            "  Press r to retry",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let panel = Paragraph::new(content).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Error "),
    );
    f.render_widget(panel, area);
}

fn render_empty(f: &mut Frame, area: Rect, view: &DashboardView) {
    let mut content = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", view.status.message()),
            Style::default().fg(Color::Cyan),
        )),
    ];
    if view.status == DashboardStatus::NoValidDates && view.rejected_count > 0 {
        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            format!(
                "  {} rows were rejected for their date (Tab to inspect).",
                view.rejected_count
            ),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let panel = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title(" Dashboard "));
    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let (state, total) = match app.current_page {
        Page::Earnings => (&app.state, app.table_lens().0),
        Page::Rejected => (&app.rejected_state, app.table_lens().1),
    };
    let selected = state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(format!(" Row: {}/{} ", selected, total), Style::default().fg(Color::Cyan)),
        Span::raw(" | "),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(" Month | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

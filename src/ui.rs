use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use family_expenses::reports::{BAR_CHART_ID, PIE_CHART_ID, TREND_CHART_ID};
use family_expenses::{
    format_colones, render_report, ChartBoard, Expense, ExpenseDraft, Report, Session, UserEntry,
    UserOrigin,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use std::io;

/// Shown while nobody is logged in; the TUI has no login form.
const LOGIN_HINT: &str = "Not logged in. Start with --user <name> --password <pw> ui \
(or set FAMILY_EXPENSES_USER / FAMILY_EXPENSES_PASSWORD) to see your expenses";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Expenses,
    Reports,
    Users,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Expenses => Page::Reports,
            Page::Reports => Page::Users,
            Page::Users => Page::Expenses,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Expenses => Page::Users,
            Page::Reports => Page::Expenses,
            Page::Users => Page::Reports,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Expenses => "My Expenses",
            Page::Reports => "Reports",
            Page::Users => "Users",
        }
    }
}

/// Foreground/background pair for the current mode.
#[derive(Debug, Clone, Copy)]
struct Theme {
    fg: Color,
    bg: Color,
    accent: Color,
}

impl Theme {
    fn for_mode(dark: bool) -> Self {
        if dark {
            Theme {
                fg: Color::White,
                bg: Color::Black,
                accent: Color::Yellow,
            }
        } else {
            Theme {
                fg: Color::Black,
                bg: Color::White,
                accent: Color::Blue,
            }
        }
    }
}

pub struct App {
    session: Session,
    pub current_page: Page,
    pub expenses: Vec<Expense>,
    pub total: f64,
    pub report: Report,
    pub board: ChartBoard,
    pub users: Vec<UserEntry>,
    pub state: TableState,
    pub users_state: TableState,
    pub dark_mode: bool,
    /// Add-expense prompt; `Some` while the user is typing
    pub input: Option<String>,
    pub message: Option<String>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let dark_mode = session.dark_mode();

        let mut app = App {
            session,
            current_page: Page::Expenses,
            expenses: Vec::new(),
            total: 0.0,
            report: Report::build(&[], Utc::now().date_naive()),
            board: ChartBoard::default(),
            users: Vec::new(),
            state: TableState::default(),
            users_state: TableState::default(),
            dark_mode,
            input: None,
            message: None,
        };
        app.refresh();
        app
    }

    pub fn username(&self) -> Option<&str> {
        self.session.current_user().map(|u| u.username.as_str())
    }

    /// Reload everything shown on screen from the session.
    pub fn refresh(&mut self) {
        match self.session.expenses() {
            Ok(view) => {
                self.expenses = view.expenses;
                self.total = view.total;
            }
            Err(_) => {
                self.expenses.clear();
                self.total = 0.0;
            }
        }

        self.report = self.session.report(Utc::now().date_naive());
        render_report(&self.report, &mut self.board);
        self.users = self.session.users();

        clamp_selection(&mut self.state, self.expenses.len());
        clamp_selection(&mut self.users_state, self.users.len());
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn active_table(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Users => (&mut self.users_state, self.users.len()),
            _ => (&mut self.state, self.expenses.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn start_input(&mut self) {
        if self.username().is_none() {
            self.message = Some(LOGIN_HINT.to_string());
            return;
        }
        self.input = Some(String::new());
    }

    pub fn submit_input(&mut self) {
        let Some(line) = self.input.take() else {
            return;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let draft = ExpenseDraft::from_words(&words);

        self.message = Some(match self.session.add_expense(&draft) {
            Ok(e) => format!("✅ Added {} {}", e.icon(), format_colones(e.amount)),
            Err(e) => format!("❌ {}", e),
        });
        self.refresh();
    }

    /// Delete the selected expense, or the selected local user on the Users page.
    pub fn delete_selected(&mut self) {
        let outcome = match self.current_page {
            Page::Expenses => match self.state.selected() {
                Some(i) => self
                    .session
                    .delete_expense(i)
                    .map(|e| format!("🗑️  Deleted {}", e.description)),
                None => return,
            },
            Page::Users => {
                let Some(user) = self.users_state.selected().and_then(|i| self.users.get(i)) else {
                    return;
                };
                if user.origin != UserOrigin::Local {
                    self.message = Some("Cloud profiles are removed by their owner".to_string());
                    return;
                }
                let username = user.username.clone();
                self.session
                    .delete_user(&username)
                    .map(|_| format!("🗑️  Deleted user {}", username))
            }
            Page::Reports => return,
        };

        self.message = Some(match outcome {
            Ok(msg) => msg,
            Err(e) => format!("❌ {}", e),
        });
        self.refresh();
    }

    pub fn toggle_dark_mode(&mut self) {
        match self.session.toggle_dark_mode() {
            Ok(enabled) => self.dark_mode = enabled,
            Err(e) => self.message = Some(format!("❌ {}", e)),
        }
    }

    fn theme(&self) -> Theme {
        Theme::for_mode(self.dark_mode)
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    match state.selected() {
        _ if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None => state.select(Some(0)),
        _ => {}
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };

        // prompt mode swallows every key
        if let Some(input) = app.input.as_mut() {
            match key.code {
                KeyCode::Enter => app.submit_input(),
                KeyCode::Esc => app.input = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Tab => app.next_page(),
            KeyCode::BackTab => app.previous_page(),
            KeyCode::Char('a') if app.current_page == Page::Expenses => app.start_input(),
            KeyCode::Char('d') | KeyCode::Delete => app.delete_selected(),
            KeyCode::Char('m') => app.toggle_dark_mode(),
            KeyCode::Char('r') => app.refresh(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Down | KeyCode::Char('j') => app.next(),
            KeyCode::Up | KeyCode::Char('k') => app.previous(),
            _ => {}
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let theme = app.theme();
    f.render_widget(
        Block::default().style(Style::default().fg(theme.fg).bg(theme.bg)),
        f.size(),
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar or prompt
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Expenses => render_expenses(f, chunks[1], app),
        Page::Reports => render_reports(f, chunks[1], app),
        Page::Users => render_users(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();

    let mut tab_spans = vec![];
    for (i, page) in [Page::Expenses, Page::Reports, Page::Users].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        match app.username() {
            Some(name) => format!("👤 {}", name),
            None => "👤 not logged in".to_string(),
        },
        Style::default().fg(theme.fg),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Total: ₡{}", format_colones(app.total)),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_expenses(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = app.theme();

    if app.username().is_none() {
        let hint = Paragraph::new(LOGIN_HINT)
            .block(Block::default().borders(Borders::ALL).title(" My Expenses "));
        f.render_widget(hint, area);
        return;
    }

    let header_cells = ["#", "Date", "Category", "Description", "Type", "Amount"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.expenses.iter().enumerate().map(|(i, e)| {
        Row::new(vec![
            Cell::from((i + 1).to_string()),
            Cell::from(short_date(&e.date).to_string()),
            Cell::from(format!("{} {}", e.icon(), e.category)),
            Cell::from(truncate(&e.description, 32)),
            Cell::from(e.kind.as_str()),
            Cell::from(format!("₡{}", format_colones(e.amount))).style(Style::default().fg(Color::Red)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(12),
            Constraint::Length(22),
            Constraint::Length(34),
            Constraint::Length(10),
            Constraint::Length(16),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" My Expenses ({}) ", app.expenses.len())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_reports(f: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();

    if app.report.is_empty() {
        let empty = Paragraph::new("No expenses to report yet")
            .block(Block::default().borders(Borders::ALL).title(" Reports "));
        f.render_widget(empty, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let charts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(columns[1]);

    // by-category breakdown stands in for the pie
    if let Some(pie) = app.board.get(PIE_CHART_ID) {
        let total = app.report.total;
        let rows = pie.labels.iter().zip(&pie.values).zip(&pie.colors).map(|((label, value), color)| {
            let share = if total != 0.0 { value / total * 100.0 } else { 0.0 };
            Row::new(vec![
                Cell::from("●").style(Style::default().fg(hex_color(color))),
                Cell::from(format!("{} {}", family_expenses::entities::category_icon(label), label)),
                Cell::from(format!("₡{}", format_colones(*value))),
                Cell::from(format!("{:.1}%", share)),
            ])
        });
        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Length(22),
                Constraint::Length(16),
                Constraint::Length(7),
            ],
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" By category · ₡{} ", format_colones(total))),
        );
        f.render_widget(table, columns[0]);
    }

    if let Some(bar) = app.board.get(BAR_CHART_ID) {
        let labels: Vec<String> = bar.labels.iter().map(|m| m.get(2..).unwrap_or(m).to_string()).collect();
        let data: Vec<(&str, u64)> = labels
            .iter()
            .zip(&bar.values)
            .map(|(l, v)| (l.as_str(), v.max(0.0).round() as u64))
            .collect();
        let color = bar.colors.first().map(|c| hex_color(c)).unwrap_or(theme.accent);

        let chart = BarChart::default()
            .block(Block::default().borders(Borders::ALL).title(" Last 12 months "))
            .data(data.as_slice())
            .bar_width(5)
            .bar_gap(1)
            .bar_style(Style::default().fg(color))
            .value_style(Style::default().fg(theme.bg).bg(color));
        f.render_widget(chart, charts[0]);
    }

    if let Some(trend) = app.board.get(TREND_CHART_ID) {
        let data: Vec<u64> = trend.values.iter().map(|v| v.max(0.0).round() as u64).collect();
        let color = trend.colors.first().map(|c| hex_color(c)).unwrap_or(theme.accent);
        let title = format!(
            " Trend {} → {} ",
            trend.labels.first().map(String::as_str).unwrap_or(""),
            trend.labels.last().map(String::as_str).unwrap_or("")
        );

        let sparkline = Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(title))
            .data(&data)
            .style(Style::default().fg(color));
        f.render_widget(sparkline, charts[1]);
    }
}

fn render_users(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = app.theme();

    let header = Row::new(["Username", "Email", "Origin"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let rows = app.users.iter().map(|u| {
        let origin = match &u.origin {
            UserOrigin::Local => "local".to_string(),
            UserOrigin::Cloud { uid } => format!("cloud ({})", truncate(uid, 8)),
        };
        Row::new(vec![
            Cell::from(u.username.clone()),
            Cell::from(u.email.clone()),
            Cell::from(origin),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Length(20), Constraint::Length(32), Constraint::Length(20)],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(format!(" Users ({}) ", app.users.len())))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.users_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let theme = app.theme();

    if let Some(input) = &app.input {
        let prompt = Paragraph::new(Line::from(vec![
            Span::styled("amount category [fixed|variable] description: ", Style::default().fg(theme.accent)),
            Span::raw(input.clone()),
            Span::styled("█", Style::default().fg(theme.accent)),
        ]))
        .block(Block::default().borders(Borders::ALL).title(" New expense (Enter save, Esc cancel) "));
        f.render_widget(prompt, area);
        return;
    }

    let mut status_spans = Vec::new();
    if let Some(message) = &app.message {
        status_spans.push(Span::styled(format!(" {} ", message), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    let keys: &[(&str, &str)] = match app.current_page {
        Page::Expenses => &[("a", " Add | "), ("d", " Delete | ")],
        Page::Users => &[("d", " Delete | ")],
        Page::Reports => &[],
    };
    for (key, label) in keys.iter().chain(&[("Tab", " Page | "), ("m", " Dark mode | "), ("r", " Refresh | ")]) {
        status_spans.push(Span::styled(*key, Style::default().fg(theme.accent)));
        status_spans.push(Span::raw(*label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(Block::default().borders(Borders::ALL));
    f.render_widget(status_bar, area);
}

/// `YYYY-MM-DD` part of a stored RFC 3339 date.
fn short_date(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}

/// `#rrggbb` to a terminal color; anything else falls back to white.
fn hex_color(hex: &str) -> Color {
    let parse = |range: std::ops::Range<usize>| {
        hex.trim_start_matches('#')
            .get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
    };
    match (parse(0..2), parse(2..4), parse(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use family_expenses::LocalStore;

    fn create_test_app() -> App {
        let mut session = Session::new(LocalStore::open_in_memory().unwrap(), None, None);
        session.register("ana", "ana@example.com", "pw").unwrap();
        session.login("ana", "pw").unwrap();
        App::new(session)
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Expenses.next(), Page::Reports);
        assert_eq!(Page::Users.next(), Page::Expenses);
        assert_eq!(Page::Expenses.previous(), Page::Users);
    }

    #[test]
    fn test_prompt_adds_expense() {
        let mut app = create_test_app();
        app.start_input();
        app.input = Some("2500 Transport fixed Bus pass".to_string());
        app.submit_input();

        assert!(app.input.is_none());
        assert_eq!(app.expenses.len(), 1);
        assert_eq!(app.expenses[0].description, "Bus pass");
        assert_eq!(app.total, 2500.0);
        assert_eq!(app.state.selected(), Some(0));
        assert!(app.board.get(PIE_CHART_ID).is_some());
    }

    #[test]
    fn test_logged_out_app_points_at_login_flags() {
        let session = Session::new(LocalStore::open_in_memory().unwrap(), None, None);
        let mut app = App::new(session);
        app.start_input();

        assert!(app.input.is_none());
        assert_eq!(app.message.as_deref(), Some(LOGIN_HINT));
        assert!(LOGIN_HINT.contains("--user"));
        assert!(LOGIN_HINT.contains("FAMILY_EXPENSES_USER"));
    }

    #[test]
    fn test_bad_prompt_reports_error() {
        let mut app = create_test_app();
        app.input = Some("abc Food x".to_string());
        app.submit_input();

        assert!(app.expenses.is_empty());
        assert!(app.message.as_deref().unwrap_or_default().starts_with("❌"));
    }

    #[test]
    fn test_delete_selected_expense() {
        let mut app = create_test_app();
        for line in ["1 Food a", "2 Food b", "3 Food c"] {
            app.input = Some(line.to_string());
            app.submit_input();
        }
        app.next();
        app.delete_selected();

        let amounts: Vec<f64> = app.expenses.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![1.0, 3.0]);

        // empty report clears the charts
        app.state.select(Some(0));
        app.delete_selected();
        app.delete_selected();
        assert!(app.expenses.is_empty());
        assert!(app.board.charts().is_empty());
    }

    #[test]
    fn test_hex_color() {
        assert_eq!(hex_color("#3498db"), Color::Rgb(0x34, 0x98, 0xdb));
        assert_eq!(hex_color("nope"), Color::White);
    }
}

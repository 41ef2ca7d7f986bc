use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

use crate::api::{JobSource, PortalClient};
use crate::config::Config;
use crate::error::PortalError;
use crate::filters::FacetKey;
use crate::html;
use crate::listing::{FetchRequest, ListingController, Refresh};
use crate::models::Job;

type FetchOutcome = (u64, Result<Vec<Job>, PortalError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Filters,
    Chips,
    Jobs,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Filters => Focus::Chips,
            Focus::Chips => Focus::Jobs,
            Focus::Jobs => Focus::Filters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterRow {
    Section(FacetKey),
    Value(FacetKey, String),
}

struct AppState {
    controller: ListingController,
    focus: Focus,
    open: [bool; 5],
    filter_cursor: usize,
    chip_cursor: usize,
    selected: usize,
    scroll_offset: u16,
}

impl AppState {
    fn new(controller: ListingController) -> Self {
        Self {
            controller,
            focus: Focus::Jobs,
            // City and Department start expanded
            open: [true, true, false, false, false],
            filter_cursor: 0,
            chip_cursor: 0,
            selected: 0,
            scroll_offset: 0,
        }
    }

    fn is_open(&self, key: FacetKey) -> bool {
        self.open[key as usize]
    }

    fn filter_rows(&self) -> Vec<FilterRow> {
        let mut rows = Vec::new();
        for key in FacetKey::ALL {
            rows.push(FilterRow::Section(key));
            if self.is_open(key) {
                rows.extend(
                    self.controller
                        .options()
                        .get(key)
                        .iter()
                        .map(|v| FilterRow::Value(key, v.clone())),
                );
            }
        }
        rows
    }

    fn chips(&self) -> Vec<(FacetKey, String)> {
        self.controller
            .applied()
            .iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect()
    }

    fn current_job(&self) -> Option<&Job> {
        self.controller.page_jobs().get(self.selected)
    }

    fn move_cursor(&mut self, down: bool) {
        match self.focus {
            Focus::Filters => {
                let len = self.filter_rows().len();
                self.filter_cursor = step(self.filter_cursor, len, down);
            }
            Focus::Chips => {
                let len = self.chips().len();
                self.chip_cursor = step(self.chip_cursor, len, down);
            }
            Focus::Jobs => {
                let len = self.controller.page_jobs().len();
                let selected = step(self.selected, len, down);
                if selected != self.selected {
                    self.selected = selected;
                    self.scroll_offset = 0;
                }
            }
        }
    }

    /// Space/Enter on the focused row.
    fn activate(&mut self) -> Refresh {
        match self.focus {
            Focus::Filters => match self.filter_rows().get(self.filter_cursor).cloned() {
                Some(FilterRow::Section(key)) => {
                    self.open[key as usize] = !self.open[key as usize];
                    Refresh::None
                }
                Some(FilterRow::Value(key, value)) => self.controller.toggle_facet_value(key, &value),
                None => Refresh::None,
            },
            Focus::Chips => self.remove_chip(),
            Focus::Jobs => Refresh::None,
        }
    }

    fn remove_chip(&mut self) -> Refresh {
        let Some((key, value)) = self.chips().get(self.chip_cursor).cloned() else {
            return Refresh::None;
        };
        self.controller.remove_applied_value(key, &value)
    }

    /// Keeps every cursor inside its list after the data changed.
    fn settle(&mut self) {
        let rows = self.filter_rows().len();
        self.filter_cursor = self.filter_cursor.min(rows.saturating_sub(1));
        let chips = self.chips().len();
        self.chip_cursor = self.chip_cursor.min(chips.saturating_sub(1));
        let jobs = self.controller.page_jobs().len();
        if self.selected >= jobs {
            self.selected = jobs.saturating_sub(1);
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

fn step(cursor: usize, len: usize, down: bool) -> usize {
    if len == 0 {
        0
    } else if down {
        (cursor + 1).min(len - 1)
    } else {
        cursor.saturating_sub(1)
    }
}

struct Fetcher {
    runtime: Handle,
    client: PortalClient,
    tx: UnboundedSender<FetchOutcome>,
}

impl Fetcher {
    /// Sends the request in the background; the response comes back over
    /// the channel in whatever order the network delivers it.
    fn spawn(&self, request: FetchRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let outcome = client.list_jobs(&request.filters, &request.token).await;
            let _ = tx.send((request.seq, outcome));
        });
    }
}

/// Interactive listing browser. Returns the query string of the filters
/// applied when the user quit.
pub fn run_browse(runtime: Handle, client: PortalClient, controller: ListingController, config: &Config) -> Result<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let fetcher = Fetcher { runtime, client, tx };
    let mut state = AppState::new(controller);

    if let Some(request) = state.controller.begin_fetch() {
        fetcher.spawn(request);
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &fetcher, rx, config);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result.map(|_| state.controller.query_string())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    fetcher: &Fetcher,
    mut rx: UnboundedReceiver<FetchOutcome>,
    config: &Config,
) -> Result<()> {
    let mut filter_state = ListState::default();
    let mut chip_state = ListState::default();
    let mut job_state = ListState::default();

    loop {
        while let Ok((seq, outcome)) = rx.try_recv() {
            state.controller.finish_fetch(seq, outcome);
            state.settle();
        }

        filter_state.select(Some(state.filter_cursor));
        chip_state.select((!state.chips().is_empty()).then_some(state.chip_cursor));
        job_state.select((!state.controller.page_jobs().is_empty()).then_some(state.selected));

        let link = config
            .listing_url(&state.controller.query_string())
            .map(|u| u.to_string())
            .unwrap_or_default();
        terminal.draw(|frame| draw(frame, state, &link, &mut filter_state, &mut chip_state, &mut job_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let refresh = match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Tab => {
                state.focus = state.focus.next();
                Refresh::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                state.move_cursor(true);
                Refresh::None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.move_cursor(false);
                Refresh::None
            }
            KeyCode::Char('J') | KeyCode::PageDown => {
                state.scroll_down();
                Refresh::None
            }
            KeyCode::Char('K') | KeyCode::PageUp => {
                state.scroll_up();
                Refresh::None
            }
            KeyCode::Char(' ') | KeyCode::Enter => state.activate(),
            KeyCode::Char('x') | KeyCode::Delete => state.remove_chip(),
            KeyCode::Char('a') => state.controller.apply_pending_filters(),
            KeyCode::Char('c') => state.controller.clear_all_filters(),
            KeyCode::Char('n') | KeyCode::Right => state.controller.next_page(),
            KeyCode::Char('p') | KeyCode::Left => state.controller.prev_page(),
            _ => Refresh::None,
        };

        match refresh {
            Refresh::Fetch => {
                info!(filters = %state.controller.query_string(), "Applied filters changed");
                if let Some(request) = state.controller.begin_fetch() {
                    fetcher.spawn(request);
                }
                state.selected = 0;
                state.scroll_offset = 0;
            }
            Refresh::Page => {
                state.selected = 0;
                state.scroll_offset = 0;
            }
            Refresh::None => {}
        }
        state.settle();
    }
    Ok(())
}

fn panel(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

fn draw(
    frame: &mut Frame,
    state: &AppState,
    link: &str,
    filter_state: &mut ListState,
    chip_state: &mut ListState,
    job_state: &mut ListState,
) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(frame.area());

    // Left panel: facet filters
    let pending = state.controller.pending();
    let filter_items: Vec<ListItem> = state
        .filter_rows()
        .into_iter()
        .map(|row| match row {
            FilterRow::Section(key) => ListItem::new(Line::from(Span::styled(
                format!("{} {}", key.label().to_uppercase(), if state.is_open(key) { "-" } else { "+" }),
                Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            ))),
            FilterRow::Value(key, value) => {
                let selected = pending.contains(key, &value);
                let mark = if selected { "[x]" } else { "[ ]" };
                let style = if selected {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(Span::styled(format!("  {} {}", mark, value), style)))
            }
        })
        .collect();

    let filters = List::new(filter_items)
        .block(panel(" Filters (a:apply c:clear) ".to_string(), state.focus == Focus::Filters))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(filters, columns[0], filter_state);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Percentage(45),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(columns[1]);

    // Applied filter chips
    let chips: Vec<ListItem> = state
        .chips()
        .into_iter()
        .map(|(key, value)| ListItem::new(format!("{} x  ({})", value, key.label())))
        .collect();
    let chip_block = panel(" Applied ".to_string(), state.focus == Focus::Chips);
    if chips.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No filters applied", Style::default().fg(Color::DarkGray)))
                .block(chip_block),
            rows[0],
        );
    } else {
        let chip_list = List::new(chips)
            .block(chip_block)
            .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
            .highlight_symbol("> ");
        frame.render_stateful_widget(chip_list, rows[0], chip_state);
    }

    // Job list
    let jobs_block = panel(
        format!(" Jobs ({}) ", state.controller.jobs().len()),
        state.focus == Focus::Jobs,
    );
    let page_jobs = state.controller.page_jobs();
    if state.controller.is_loading() {
        frame.render_widget(Paragraph::new("Loading jobs...").block(jobs_block), rows[1]);
    } else if page_jobs.is_empty() {
        frame.render_widget(Paragraph::new("No jobs available").block(jobs_block), rows[1]);
    } else {
        let items: Vec<ListItem> = page_jobs
            .iter()
            .map(|job| {
                ListItem::new(vec![
                    Line::from(Span::styled(
                        job.display_title(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                    Line::from(format!(
                        "   {} | {} | {} | {}",
                        job.job_type.as_deref().unwrap_or_default(),
                        job.experience().unwrap_or_default(),
                        job.salary().unwrap_or("Not Disclosed"),
                        job.location()
                    )),
                ])
            })
            .collect();
        let list = List::new(items)
            .block(jobs_block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, rows[1], job_state);
    }

    // Detail
    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));
    frame.render_widget(detail, rows[2]);

    let page = Paragraph::new(format!(
        " Page {} of {}   {}",
        state.controller.current_page(),
        state.controller.total_pages(),
        link
    ))
    .style(Style::default().add_modifier(Modifier::BOLD));
    frame.render_widget(page, rows[3]);

    let help = Paragraph::new(
        " tab:focus  j/k:move  space:toggle  a:apply c:clear x:remove  n/p:page  J/K:scroll  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[4]);
}

fn build_detail(state: &AppState) -> Text<'static> {
    let Some(job) = state.current_job() else {
        return Text::raw("No job selected");
    };

    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(Span::styled(
        job.display_title(),
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let location = job.location();
    let facts = [
        ("Job Type", job.job_type.as_deref()),
        ("Department", job.department.as_deref()),
        ("Experience", job.experience()),
        ("Salary", Some(job.salary().unwrap_or("Not Disclosed"))),
        ("Location", Some(location.as_str())),
        ("Country", job.country.as_deref()),
        ("Status", job.status.as_deref()),
    ];
    for (label, value) in facts {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            lines.push(Line::from(format!("{}: {}", label, value)));
        }
    }

    let sections = [
        ("Job Description", &job.description),
        ("Responsibilities", &job.job_responsibilities),
        ("Skills Required", &job.skills_required),
        ("Educational Qualifications", &job.edu_qualifications),
    ];
    for (heading, body) in sections {
        let text = html::to_plain_text(body.as_deref().unwrap_or_default());
        if text.is_empty() {
            continue;
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            heading,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(&text, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
    }

    Text::from(lines)
}

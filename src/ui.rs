use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::{Comment, CommentSort, Post, PostId, User};
use crate::post_view::PostView;
use crate::relative_time;
use crate::route::{self, History};
use crate::store::{State, Store};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_LABEL_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_COACH_BG: Color = Color::Rgb(250, 179, 135);

const CAREER_COACH_TRACK: &str = "Career Coach";
const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const ICON_AVATAR: &str = "◉";
const ICON_LIKED: &str = "♥";
const ICON_NOT_LIKED: &str = "♡";
const ICON_COMMENTS: &str = "✎";
const COMMENT_PLACEHOLDER: &str = "How would you approach this question? Any advice or feedback?";
const PAGE_STEP: usize = 10;

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        if self.last_tick.elapsed() >= Duration::from_millis(80) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = Instant::now();
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

/// Size of the comments pane as last drawn.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct CommentScroll {
    pub lines: usize,
    pub visible: usize,
}

impl CommentScroll {
    pub fn max_offset(&self) -> usize {
        self.lines.saturating_sub(self.visible)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    Browse,
    Compose,
}

pub struct Options {
    pub post_id: PostId,
    pub store: Store,
    pub tick_rate: Duration,
    pub web_base_url: String,
    pub open_browser: bool,
}

pub struct Model {
    store: Store,
    view: PostView,
    history: History,
    mode: Mode,
    status_message: String,
    shown_error: Option<String>,
    comment_offset: usize,
    comment_scroll: CommentScroll,
    spinner: Spinner,
    needs_redraw: bool,
    tick_rate: Duration,
    web_base_url: String,
    open_browser: bool,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut store = opts.store;
        let view = PostView::mount(opts.post_id, &mut store);
        Self {
            store,
            view,
            history: History::new(route::post_route(opts.post_id)),
            mode: Mode::Browse,
            status_message: format!("Loading post {}…", opts.post_id),
            shown_error: None,
            comment_offset: 0,
            comment_scroll: CommentScroll::default(),
            spinner: Spinner::new(),
            needs_redraw: true,
            tick_rate: opts.tick_rate,
            web_base_url: opts.web_base_url,
            open_browser: opts.open_browser,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        self.store.cancel_pending();
        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();

        loop {
            if self.poll_store() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                tracing::warn!(error = %err, "key handler failed");
                                self.status_message = format!("Error: {err}");
                            }
                        }
                        self.mark_dirty();
                    }
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                last_tick = Instant::now();
                if self.store.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    /// Applies queued store results and re-derives view state from them.
    fn poll_store(&mut self) -> bool {
        if !self.store.poll() {
            return false;
        }
        self.view.sync(self.store.state());

        let state = self.store.state();
        if state.last_error != self.shown_error {
            self.shown_error = state.last_error.clone();
            if let Some(err) = &self.shown_error {
                self.status_message = err.clone();
            }
        } else if !self.store.is_loading() && self.status_message.starts_with("Loading") {
            self.status_message = match &state.current_post {
                Some(_) => "Ready. Press l to like, c to comment, s to change sort.".to_string(),
                None => "Post unavailable.".to_string(),
            };
        }
        true
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        match self.mode {
            Mode::Browse => self.handle_browse_key(code),
            Mode::Compose => {
                self.handle_compose_key(code);
                Ok(false)
            }
        }
    }

    fn handle_browse_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('l') | KeyCode::Char(' ') => self.toggle_like(),
            KeyCode::Char('c') | KeyCode::Char('i') => {
                if self.store.state().post_is_fetching {
                    self.status_message = "Wait for the post to load before commenting.".into();
                } else {
                    self.mode = Mode::Compose;
                    self.status_message = "Writing a comment. Enter sends, Esc cancels.".into();
                }
            }
            KeyCode::Char('1') => self.select_sort(CommentSort::Recent),
            KeyCode::Char('2') => self.select_sort(CommentSort::Popular),
            KeyCode::Char('s') => self.select_sort(self.view.sort_order().next()),
            KeyCode::Char('a') => self.open_author()?,
            KeyCode::Char('b') => {
                if let Some(current) = self.history.back() {
                    self.status_message = format!("Back at {current}");
                }
            }
            KeyCode::Char('j') | KeyCode::Down => self.scroll_comments(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_comments(-1),
            KeyCode::PageDown => self.scroll_comments(PAGE_STEP as i32),
            KeyCode::PageUp => self.scroll_comments(-(PAGE_STEP as i32)),
            _ => {}
        }
        Ok(false)
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.status_message = "Comment kept as draft.".into();
            }
            KeyCode::Enter => {
                let user = self.store.state().user.clone();
                if self.view.submit(user.as_ref(), &mut self.store) {
                    self.mode = Mode::Browse;
                    self.status_message = "Comment sent.".into();
                }
            }
            KeyCode::Backspace => self.view.pop_char(),
            KeyCode::Char(ch) => self.view.push_char(ch),
            _ => {}
        }
    }

    fn toggle_like(&mut self) {
        let has_like_control = self
            .store
            .state()
            .current_post
            .as_ref()
            .is_some_and(|post| post.likes.is_some());
        if !has_like_control {
            self.status_message = "This post cannot be liked yet.".into();
            return;
        }
        self.view.toggle_like(&mut self.store);
        self.status_message = if self.view.liked() {
            "Liked (sending…)".into()
        } else {
            "Unliked (sending…)".into()
        };
    }

    fn select_sort(&mut self, order: CommentSort) {
        if self.view.select_sort(order, &mut self.store) {
            self.comment_offset = 0;
            self.status_message = format!("Sorting comments by {}…", order.label());
        }
    }

    fn open_author(&mut self) -> Result<()> {
        let Some(target) = self.view.author_route(self.store.state()) else {
            self.status_message = "This post has no author profile.".into();
            return Ok(());
        };
        self.history.push(target.clone());
        tracing::info!(route = %target, "navigate");

        if self.open_browser && !self.web_base_url.trim().is_empty() {
            let url = format!("{}{}", self.web_base_url.trim_end_matches('/'), target);
            webbrowser::open(&url)?;
            self.status_message = format!("Opened {url}");
        } else {
            self.status_message = format!("Navigated to {target} (press b to go back)");
        }
        Ok(())
    }

    fn scroll_comments(&mut self, delta: i32) {
        let max = self.comment_scroll.max_offset();
        let next = self.comment_offset as i64 + delta as i64;
        self.comment_offset = next.clamp(0, max as i64) as usize;
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let spinner = if self.store.is_loading() {
            Some(self.spinner.frame())
        } else {
            None
        };
        let screen = Screen {
            state: self.store.state(),
            view: &self.view,
            history: &self.history,
            mode: self.mode,
            status: &self.status_message,
            spinner,
            comment_offset: self.comment_offset,
            now: Utc::now(),
        };
        self.comment_scroll = screen.draw(frame);
        self.comment_offset = self.comment_offset.min(self.comment_scroll.max_offset());
    }
}

/// Everything needed to paint one frame.
pub(crate) struct Screen<'a> {
    pub state: &'a State,
    pub view: &'a PostView,
    pub history: &'a History,
    pub mode: Mode,
    pub status: &'a str,
    pub spinner: Option<&'static str>,
    pub comment_offset: usize,
    pub now: DateTime<Utc>,
}

impl Screen<'_> {
    /// Paints the frame and reports the comments pane size for scrolling.
    pub fn draw(&self, frame: &mut Frame<'_>) -> CommentScroll {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(full);

        let header = Paragraph::new(header_line(self.history, self.state.user.as_ref(), full.width))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_PRIMARY)
                    .bg(COLOR_PANEL_FOCUSED_BG)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(header, layout[0]);

        let scroll = if self.state.post_is_fetching {
            let loading = Paragraph::new("Loading post…")
                .style(Style::default().fg(COLOR_TEXT_SECONDARY).bg(COLOR_BG))
                .alignment(Alignment::Center);
            frame.render_widget(loading, layout[1]);
            CommentScroll::default()
        } else {
            self.draw_body(frame, layout[1])
        };

        let status = match self.spinner {
            Some(glyph) => format!("{glyph} {}", self.status),
            None => self.status.to_string(),
        };
        let status_style = if self.state.last_error.as_deref() == Some(self.status) {
            Style::default().fg(COLOR_ERROR)
        } else {
            Style::default().fg(COLOR_TEXT_PRIMARY)
        };
        frame.render_widget(
            Paragraph::new(status).style(status_style.bg(COLOR_PANEL_BG)),
            layout[2],
        );

        let footer = Paragraph::new(footer_text(self.mode))
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center);
        frame.render_widget(footer, layout[3]);

        scroll
    }

    fn draw_body(&self, frame: &mut Frame<'_>, area: Rect) -> CommentScroll {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(area);

        let post_block = pane_block("Post", self.mode == Mode::Browse);
        let lines = match &self.state.current_post {
            Some(post) => post_lines(
                post,
                self.view,
                self.state.current_post_comments.len(),
                self.now,
            ),
            None => Vec::new(),
        };
        frame.render_widget(
            Paragraph::new(Text::from(lines))
                .block(post_block)
                .wrap(Wrap { trim: false }),
            columns[0],
        );

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(0)])
            .split(columns[1]);

        let form_block = pane_block("Comment", self.mode == Mode::Compose);
        frame.render_widget(
            Paragraph::new(Text::from(form_lines(self.view, self.mode)))
                .block(form_block)
                .wrap(Wrap { trim: false }),
            right[0],
        );

        let comments_block = pane_block("Comments", false).title(sort_line(self.view.sort_order()));
        let inner = comments_block.inner(right[1]);
        let body = comment_list_lines(self.state, inner.width.max(1) as usize, self.now);
        let scroll = CommentScroll {
            lines: body.len(),
            visible: inner.height as usize,
        };
        let offset = self.comment_offset.min(scroll.max_offset());
        frame.render_widget(
            Paragraph::new(Text::from(body))
                .block(comments_block)
                .scroll((offset.min(u16::MAX as usize) as u16, 0)),
            right[1],
        );
        scroll
    }
}

fn pane_block(title: &'static str, focused: bool) -> Block<'static> {
    let border = if focused {
        COLOR_BORDER_FOCUSED
    } else {
        COLOR_BORDER_IDLE
    };
    Block::default()
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(COLOR_PANEL_BG))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn fit_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn header_line(history: &History, user: Option<&User>, width: u16) -> String {
    let mut parts = vec!["coachfeed".to_string()];
    if let Some(current) = history.current() {
        parts.push(current.to_string());
    }
    if let Some(name) = user.and_then(|user| present(&user.display_name)) {
        parts.push(format!("signed in as {name}"));
    }
    fit_width(&format!(" {}", parts.join(" · ")), width as usize)
}

fn label_span(text: String, career_coach: bool) -> Span<'static> {
    let style = if career_coach {
        Style::default()
            .fg(COLOR_BG)
            .bg(COLOR_COACH_BG)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_TEXT_PRIMARY).bg(COLOR_LABEL_BG)
    };
    Span::styled(format!(" {text} "), style)
}

/// Post pane content. Optional fields are skipped entirely when absent.
pub(crate) fn post_lines(
    post: &Post,
    view: &PostView,
    comment_count: usize,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let mut author: Vec<Span<'static>> = Vec::new();
    if present(&post.profile_picture).is_some() {
        author.push(Span::styled(
            format!("{ICON_AVATAR} "),
            Style::default().fg(COLOR_ACCENT),
        ));
    }
    if let Some(name) = present(&post.display_name) {
        author.push(Span::styled(
            name.to_string(),
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ));
    }
    if let Some(created) = post.created_at {
        if !author.is_empty() {
            author.push(Span::raw("  "));
        }
        author.push(Span::styled(
            relative_time::from_now(created, now),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }
    if !author.is_empty() {
        lines.push(Line::from(author));
    }

    let mut labels: Vec<Span<'static>> = Vec::new();
    if let Some(track) = present(&post.track) {
        if track == CAREER_COACH_TRACK {
            labels.push(label_span("CAREER COACH".into(), true));
        } else {
            labels.push(label_span(track.to_uppercase(), false));
        }
    }
    if let Some(category) = present(&post.category) {
        if !labels.is_empty() {
            labels.push(Span::raw(" "));
        }
        labels.push(label_span(category.to_uppercase(), false));
    }
    if !labels.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(labels));
    }

    if let Some(question) = present(&post.question) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            question.to_string(),
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(answer) = present(&post.answer) {
        lines.push(Line::from(""));
        for paragraph in answer.lines() {
            lines.push(Line::from(Span::styled(
                paragraph.to_string(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
    }

    let mut activity: Vec<Span<'static>> = Vec::new();
    if post.likes.is_some() {
        let (icon, color) = if view.liked() {
            (ICON_LIKED, COLOR_ERROR)
        } else {
            (ICON_NOT_LIKED, COLOR_TEXT_SECONDARY)
        };
        activity.push(Span::styled(format!("{icon} "), Style::default().fg(color)));
        activity.push(Span::styled(
            view.likes().to_string(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        ));
        activity.push(Span::raw("   "));
    }
    activity.push(Span::styled(
        format!("{ICON_COMMENTS} "),
        Style::default().fg(COLOR_TEXT_SECONDARY),
    ));
    activity.push(Span::styled(
        comment_count.to_string(),
        Style::default().fg(COLOR_TEXT_PRIMARY),
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(activity));

    lines
}

fn form_lines(view: &PostView, mode: Mode) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if view.input().is_empty() && mode == Mode::Browse {
        lines.push(Line::from(Span::styled(
            COMMENT_PLACEHOLDER,
            Style::default()
                .fg(COLOR_TEXT_SECONDARY)
                .add_modifier(Modifier::ITALIC),
        )));
    } else {
        let cursor = if mode == Mode::Compose { "▏" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(
                view.input().to_string(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            ),
            Span::styled(cursor, Style::default().fg(COLOR_ACCENT)),
        ]));
    }
    if !view.error().is_empty() {
        lines.push(Line::from(Span::styled(
            view.error().to_string(),
            Style::default().fg(COLOR_ERROR).add_modifier(Modifier::BOLD),
        )));
    }
    lines
}

fn sort_line(active: CommentSort) -> Line<'static> {
    let mut spans = vec![Span::styled(
        "SORT ",
        Style::default().fg(COLOR_TEXT_SECONDARY),
    )];
    for (index, order) in CommentSort::ALL.iter().enumerate() {
        let style = if *order == active {
            Style::default()
                .fg(COLOR_SUCCESS)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        spans.push(Span::styled(
            format!("[{}] {}", index + 1, order.label()),
            style,
        ));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn comment_lines(comment: &Comment, width: usize, now: DateTime<Utc>) -> Vec<Line<'static>> {
    let mut meta: Vec<Span<'static>> = Vec::new();
    let author = present(&comment.display_name)
        .map(str::to_string)
        .or_else(|| comment.user_id.map(|id| format!("user {id}")))
        .unwrap_or_else(|| "anonymous".to_string());
    meta.push(Span::styled(
        author,
        Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
    ));
    if let Some(created) = comment.created_at {
        meta.push(Span::styled(
            format!(" · {}", relative_time::from_now(created, now)),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }
    if let Some(likes) = comment.likes {
        meta.push(Span::styled(
            format!(" · {ICON_NOT_LIKED} {likes}"),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }

    let mut lines = vec![Line::from(meta)];
    let options = WrapOptions::new(width.max(4))
        .initial_indent("  ")
        .subsequent_indent("  ");
    for row in wrap(&comment.comment, options) {
        lines.push(Line::from(Span::styled(
            row.into_owned(),
            Style::default().fg(COLOR_TEXT_PRIMARY),
        )));
    }
    lines.push(Line::from(""));
    lines
}

/// Comments pane content: loading marker, the comments, or the empty notice.
pub(crate) fn comment_list_lines(
    state: &State,
    width: usize,
    now: DateTime<Utc>,
) -> Vec<Line<'static>> {
    if state.comments_are_fetching {
        return vec![Line::from(Span::styled(
            "Loading",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ))];
    }
    if state.current_post_comments.is_empty() {
        return vec![Line::from(Span::styled(
            "! No comments yet",
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ))];
    }
    state
        .current_post_comments
        .iter()
        .flat_map(|comment| comment_lines(comment, width, now))
        .collect()
}

fn footer_text(mode: Mode) -> &'static str {
    match mode {
        Mode::Browse => {
            "l like/unlike · c comment · 1 recent · 2 popular · s switch sort · a author · j/k scroll · b back · q quit"
        }
        Mode::Compose => "Type your comment · Enter send · Backspace delete · Esc cancel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::anyhow;

    use crate::actions::testing::RecordingDispatcher;
    use crate::api::LikedPost;
    use crate::data::{CommentService, PostService, Services};
    use crate::post_view::EMPTY_COMMENT_ERROR;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;

    fn text_of(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn buffer_text(buffer: &Buffer) -> String {
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    fn full_post(now: DateTime<Utc>) -> Post {
        Post {
            id: 42,
            user_id: Some(7),
            display_name: Some("Grace".into()),
            profile_picture: Some("https://example.invalid/g.png".into()),
            created_at: Some(now - chrono::Duration::minutes(5)),
            track: Some("Career Coach".into()),
            category: Some("Behavioral".into()),
            question: Some("Why this company?".into()),
            answer: Some("Tie it to the mission.".into()),
            likes: Some(3),
        }
    }

    fn view_for(post_id: PostId) -> PostView {
        PostView::mount(post_id, &mut RecordingDispatcher::default())
    }

    #[test]
    fn all_present_fields_render() {
        let now = Utc::now();
        let post = full_post(now);
        let mut view = view_for(42);
        let mut state = State::default();
        state.set_current_post(Some(post.clone()));
        view.sync(&state);

        let lines = post_lines(&post, &view, 2, now);
        let text = text_of(&lines);
        assert!(text.contains(ICON_AVATAR));
        assert!(text.contains("Grace"));
        assert!(text.contains("5 minutes ago"));
        assert!(text.contains("CAREER COACH"));
        assert!(text.contains("BEHAVIORAL"));
        assert!(text.contains("Why this company?"));
        assert!(text.contains("Tie it to the mission."));
        assert!(text.contains(&format!("{ICON_NOT_LIKED} 3")));
        assert!(text.contains(&format!("{ICON_COMMENTS} 2")));
    }

    #[test]
    fn absent_fields_are_omitted() {
        let now = Utc::now();
        let post = Post {
            question: Some("Only a question".into()),
            display_name: Some(String::new()),
            ..Post::empty(1)
        };
        let view = view_for(1);
        let text = text_of(&post_lines(&post, &view, 0, now));

        assert!(text.contains("Only a question"));
        assert!(!text.contains(ICON_AVATAR));
        assert!(!text.contains("ago"));
        assert!(!text.contains(ICON_NOT_LIKED));
        assert!(!text.contains(ICON_LIKED));
        assert!(text.contains(&format!("{ICON_COMMENTS} 0")));
    }

    #[test]
    fn career_coach_track_is_styled_apart() {
        let now = Utc::now();
        let view = view_for(1);
        let coach = Post {
            track: Some("Career Coach".into()),
            ..Post::empty(1)
        };
        let other = Post {
            track: Some("Data Science".into()),
            ..Post::empty(1)
        };

        let coach_lines = post_lines(&coach, &view, 0, now);
        let other_lines = post_lines(&other, &view, 0, now);
        let badge = |lines: &[Line<'static>], label: &str| {
            lines
                .iter()
                .flat_map(|line| line.spans.iter())
                .find(|span| span.content.contains(label))
                .map(|span| span.style)
                .unwrap()
        };
        let coach_style = badge(&coach_lines, "CAREER COACH");
        let other_style = badge(&other_lines, "DATA SCIENCE");
        assert_eq!(coach_style.bg, Some(COLOR_COACH_BG));
        assert_ne!(coach_style.bg, other_style.bg);
    }

    #[test]
    fn like_icon_follows_liked_state() {
        let now = Utc::now();
        let post = full_post(now);
        let mut view = view_for(42);
        let mut state = State::default();
        state.set_current_post(Some(post.clone()));
        state.set_liked_posts(vec![LikedPost { post_id: 42 }]);
        view.sync(&state);

        let text = text_of(&post_lines(&post, &view, 0, now));
        assert!(text.contains(&format!("{ICON_LIKED} 3")));
    }

    #[test]
    fn comment_list_states() {
        let now = Utc::now();
        let mut state = State::default();
        assert_eq!(text_of(&comment_list_lines(&state, 40, now)), "! No comments yet");

        state.comments_are_fetching = true;
        assert_eq!(text_of(&comment_list_lines(&state, 40, now)), "Loading");

        state.comments_are_fetching = false;
        state.set_comments(vec![Comment {
            id: 1,
            post_id: Some(42),
            user_id: Some(9),
            display_name: None,
            profile_picture: None,
            comment: "Practice with a friend".into(),
            created_at: None,
            likes: Some(2),
        }]);
        let text = text_of(&comment_list_lines(&state, 40, now));
        assert!(text.contains("user 9"));
        assert!(text.contains("Practice with a friend"));
    }

    #[test]
    fn form_shows_validation_error() {
        let mut view = view_for(1);
        view.submit(None, &mut RecordingDispatcher::default());
        let text = text_of(&form_lines(&view, Mode::Compose));
        assert!(text.contains(crate::post_view::EMPTY_COMMENT_ERROR));
    }

    fn render(state: &State, view: &PostView) -> String {
        let history = History::new(route::post_route(view.post_id()));
        let screen = Screen {
            state,
            view,
            history: &history,
            mode: Mode::Browse,
            status: "",
            spinner: None,
            comment_offset: 0,
            now: Utc::now(),
        };
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal
            .draw(|frame| {
                screen.draw(frame);
            })
            .unwrap();
        buffer_text(terminal.backend().buffer())
    }

    #[test]
    fn post_body_hidden_while_fetching() {
        let view = view_for(42);
        let mut state = State::default();
        state.set_current_post(Some(full_post(Utc::now())));
        state.post_is_fetching = true;

        let screen = render(&state, &view);
        assert!(screen.contains("/post/42"));
        assert!(screen.contains("Loading post"));
        assert!(!screen.contains("Why this company?"));
        assert!(!screen.contains("SORT"));

        state.post_is_fetching = false;
        let screen = render(&state, &view);
        assert!(screen.contains("Why this company?"));
        assert!(screen.contains("CAREER COACH"));
        assert!(screen.contains("SORT"));
        assert!(screen.contains("No comments yet"));
    }

    #[test]
    fn header_is_truncated_to_width() {
        let history = History::new("/post/1234567890");
        let header = header_line(&history, None, 12);
        assert!(UnicodeWidthStr::width(header.as_str()) <= 12);
        assert!(header.ends_with('…'));
    }

    fn model_with(services: Services) -> Model {
        Model::new(Options {
            post_id: 1,
            store: Store::new(services),
            tick_rate: Duration::from_millis(50),
            web_base_url: String::new(),
            open_browser: false,
        })
    }

    fn settle(model: &mut Model, done: impl Fn(&State) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            model.poll_store();
            if done(model.store.state()) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for store");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn loaded(state: &State) -> bool {
        state.current_post.is_some()
            && !state.post_is_fetching
            && !state.comments_are_fetching
            && state.revisions().users_liked_posts > 0
    }

    fn press(model: &mut Model, codes: &[KeyCode]) {
        for code in codes {
            model.handle_key(*code).unwrap();
        }
    }

    #[test]
    fn enter_on_blank_comment_stays_in_compose_mode() {
        let mut model = model_with(Services::offline());
        settle(&mut model, loaded);

        press(&mut model, &[KeyCode::Char('c')]);
        assert_eq!(model.mode, Mode::Compose);
        press(&mut model, &[KeyCode::Char(' '), KeyCode::Enter]);

        assert_eq!(model.mode, Mode::Compose);
        assert_eq!(model.view.error(), EMPTY_COMMENT_ERROR);
    }

    #[test]
    fn enter_sends_comment_once_and_returns_to_browse() {
        let mut model = model_with(Services::offline());
        settle(&mut model, loaded);
        let count = model.store.state().current_post_comments.len();

        press(&mut model, &[KeyCode::Char('i')]);
        for ch in "hello".chars() {
            press(&mut model, &[KeyCode::Char(ch)]);
        }
        press(&mut model, &[KeyCode::Enter]);
        assert_eq!(model.mode, Mode::Browse);
        assert!(model.view.input().is_empty());
        assert!(model.view.error().is_empty());

        settle(&mut model, |state| state.current_post_comments.len() > count);
        std::thread::sleep(Duration::from_millis(50));
        model.poll_store();
        let comments = &model.store.state().current_post_comments;
        assert_eq!(comments.len(), count + 1);
        assert_eq!(comments[0].comment, "hello");
    }

    struct UncountedPosts;

    impl PostService for UncountedPosts {
        fn load_post(&self, id: PostId) -> Result<Post> {
            Ok(Post {
                user_id: Some(5),
                question: Some("Any tips?".into()),
                ..Post::empty(id)
            })
        }
    }

    #[test]
    fn like_key_is_refused_without_like_count() {
        let mut services = Services::offline();
        services.posts = Arc::new(UncountedPosts);
        let mut model = model_with(services);
        settle(&mut model, loaded);
        let liked_rev = model.store.state().revisions().users_liked_posts;

        press(&mut model, &[KeyCode::Char('l')]);
        assert!(!model.view.liked());
        assert_eq!(model.view.likes(), 0);
        assert!(model.status_message.contains("cannot be liked"));

        std::thread::sleep(Duration::from_millis(50));
        model.poll_store();
        assert_eq!(model.store.state().revisions().users_liked_posts, liked_rev);
    }

    #[test]
    fn like_key_toggles_counted_post() {
        let mut model = model_with(Services::offline());
        settle(&mut model, loaded);
        let likes = model.view.likes();

        press(&mut model, &[KeyCode::Char('l')]);
        assert!(model.view.liked());
        assert_eq!(model.view.likes(), likes + 1);
        settle(&mut model, |state| {
            state.users_liked_posts.iter().any(|entry| entry.post_id == 1)
        });
        assert!(model.view.liked());
        assert_eq!(model.view.likes(), likes + 1);
    }

    #[test]
    fn sort_keys_reset_comment_offset() {
        let mut model = model_with(Services::offline());
        settle(&mut model, loaded);

        model.comment_offset = 5;
        press(&mut model, &[KeyCode::Char('2')]);
        assert_eq!(model.view.sort_order(), CommentSort::Popular);
        assert_eq!(model.comment_offset, 0);

        model.comment_offset = 5;
        press(&mut model, &[KeyCode::Char('2')]);
        assert_eq!(model.comment_offset, 5);

        press(&mut model, &[KeyCode::Char('s')]);
        assert_eq!(model.view.sort_order(), CommentSort::Recent);
        assert_eq!(model.comment_offset, 0);

        model.comment_offset = 5;
        press(&mut model, &[KeyCode::Char('2'), KeyCode::Char('1')]);
        assert_eq!(model.view.sort_order(), CommentSort::Recent);
        assert_eq!(model.comment_offset, 0);
    }

    #[test]
    fn author_key_navigates_to_profile_route() {
        let mut model = model_with(Services::offline());
        settle(&mut model, loaded);

        press(&mut model, &[KeyCode::Char('a')]);
        assert_eq!(model.history.current(), Some("/user/101"));
        assert!(model.status_message.contains("/user/101"));

        press(&mut model, &[KeyCode::Char('b')]);
        assert_eq!(model.history.current(), Some("/post/1"));
    }

    struct LongComments;

    impl CommentService for LongComments {
        fn load_comments(&self, post_id: PostId, _: CommentSort) -> Result<Vec<Comment>> {
            Ok((1..=3)
                .map(|id| Comment {
                    id,
                    post_id: Some(post_id),
                    user_id: Some(id),
                    display_name: None,
                    profile_picture: None,
                    comment: format!("{}end{id}", "word ".repeat(200)),
                    created_at: None,
                    likes: None,
                })
                .collect())
        }

        fn create_comment(&self, _: Option<&User>, _: PostId, _: &str) -> Result<Comment> {
            Err(anyhow!("read only"))
        }
    }

    #[test]
    fn long_comments_scroll_to_the_last_line() {
        let mut services = Services::offline();
        services.comments = Arc::new(LongComments);
        let mut model = model_with(services);
        settle(&mut model, loaded);

        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| model.draw(frame)).unwrap();
        let scroll = model.comment_scroll;
        assert!(scroll.visible > 0);
        assert!(scroll.lines > scroll.visible + 3 * 4);

        press(&mut model, &[KeyCode::PageDown; 20]);
        assert_eq!(model.comment_offset, scroll.max_offset());

        terminal.draw(|frame| model.draw(frame)).unwrap();
        assert!(buffer_text(terminal.backend().buffer()).contains("end3"));

        press(&mut model, &[KeyCode::PageUp; 20]);
        assert_eq!(model.comment_offset, 0);
    }
}

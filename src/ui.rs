use std::collections::HashSet;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::{wrap, Options as WrapOptions};
use tracing::{info, warn};
use unicode_width::UnicodeWidthStr;

use crate::api::Post;
use crate::config::Source;
use crate::controller::{DetailController, DetailUpdate, SubmitOutcome};
use crate::data::{self, CommentService, FeedService, InteractionService};
use crate::filter::Debouncer;
use crate::media::{self, Classifier, ImageStatus, MediaKind};
use crate::state::{AppState, ViewState};
use crate::view::{self, ImageBook, ListBody};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_FOCUSED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(69, 71, 90);
const COLOR_BORDER_IDLE: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_FOCUSED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const CARD_BODY_LINES: usize = 3;

pub struct Options {
    pub status_message: String,
    pub source: Source,
    pub feed_service: Arc<dyn FeedService>,
    pub comment_service: Arc<dyn CommentService>,
    pub interaction_service: Arc<dyn InteractionService>,
    pub classifier: Classifier,
    pub search_debounce: Duration,
    pub poll_interval: Duration,
    pub prober: Option<media::Prober>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
    Compose,
}

struct PendingPosts {
    request_id: u64,
}

enum AsyncResponse {
    Posts {
        request_id: u64,
        fetched: data::Fetched<Post>,
    },
}

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
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    state: AppState,
    source: Source,
    status_message: String,
    feed_service: Arc<dyn FeedService>,
    detail: DetailController,
    classifier: Classifier,
    debouncer: Debouncer,
    input_mode: InputMode,
    prober: Option<media::Prober>,
    images: ImageBook,
    requested_images: HashSet<String>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    pending_posts: Option<PendingPosts>,
    awaiting_comments: bool,
    spinner: Spinner,
    needs_redraw: bool,
    detail_scroll: u16,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let detail = DetailController::new(
            opts.comment_service,
            opts.interaction_service,
            opts.poll_interval,
        );
        let images = ImageBook::new(opts.prober.is_some());
        let mut model = Self {
            state: AppState::default(),
            source: opts.source,
            status_message: opts.status_message,
            feed_service: opts.feed_service,
            detail,
            classifier: opts.classifier,
            debouncer: Debouncer::new(opts.search_debounce),
            input_mode: InputMode::Normal,
            prober: opts.prober,
            images,
            requested_images: HashSet::new(),
            response_tx,
            response_rx,
            next_request_id: 1,
            pending_posts: None,
            awaiting_comments: false,
            spinner: Spinner::new(),
            needs_redraw: true,
            detail_scroll: 0,
        };
        model.reload_posts();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        self.detail.close();
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let mut timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));
            if let Some(remaining) = self.debouncer.remaining(Instant::now()) {
                timeout = timeout.min(remaining);
            }

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                warn!(error = ?err, "key handling failed");
                                self.status_message = format!("Error: {}", err);
                            }
                        }
                        self.mark_dirty();
                    }
                    Event::Resize(_, _) => self.mark_dirty(),
                    _ => {}
                }
            }

            if self.debouncer.ready(Instant::now()) && self.state.apply_search() {
                self.after_search_applied();
                self.mark_dirty();
            }

            if self.detail.tick() {
                self.awaiting_comments = true;
                self.mark_dirty();
            }

            if self.poll_async() {
                self.mark_dirty();
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
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

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.pending_posts.is_some() || self.awaiting_comments
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(true);
        }
        match self.input_mode {
            InputMode::Search => {
                self.handle_search_key(key.code);
                Ok(false)
            }
            InputMode::Compose => {
                self.handle_compose_key(key.code);
                Ok(false)
            }
            InputMode::Normal => match self.state.view {
                ViewState::List => self.handle_list_key(key.code),
                ViewState::Detail { .. } => self.handle_detail_key(key.code),
            },
        }
    }

    fn handle_search_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Enter => {
                self.debouncer.cancel();
                if self.state.apply_search() {
                    self.after_search_applied();
                }
                self.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                if self.state.search_input.pop().is_some() {
                    self.debouncer.touch(Instant::now());
                }
            }
            KeyCode::Char(ch) => {
                self.state.search_input.push(ch);
                self.debouncer.touch(Instant::now());
            }
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.status_message = "Comment draft kept.".to_string();
            }
            KeyCode::Enter => self.submit_draft(),
            KeyCode::Backspace => {
                self.state.draft.pop();
            }
            KeyCode::Char(ch) => self.state.draft.push(ch),
            _ => {}
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc => {
                if self.state.search_term.is_empty() && self.state.search_input.is_empty() {
                    return Ok(true);
                }
                self.state.search_input.clear();
                self.debouncer.cancel();
                if self.state.apply_search() {
                    self.after_search_applied();
                }
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
                self.status_message = "Type to filter · Enter apply · Esc done".to_string();
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_selection(-1),
            KeyCode::PageDown => self.state.move_selection(10),
            KeyCode::PageUp => self.state.move_selection(-10),
            KeyCode::Home | KeyCode::Char('g') => self.state.selected = 0,
            KeyCode::End | KeyCode::Char('G') => {
                self.state.selected = self.state.visible_posts().len().saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Char('l') | KeyCode::Right => self.open_selected(),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload_posts(),
            KeyCode::Char('o') | KeyCode::Char('O') => {
                let url = self
                    .state
                    .selected_post()
                    .and_then(|post| post.image_url.clone());
                self.open_in_browser(url)?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_detail_key(&mut self, code: KeyCode) -> Result<bool> {
        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => {
                self.close_detail();
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.move_comment_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.state.move_comment_selection(-1),
            KeyCode::PageDown => self.detail_scroll = self.detail_scroll.saturating_add(5),
            KeyCode::PageUp => self.detail_scroll = self.detail_scroll.saturating_sub(5),
            KeyCode::Char('c') | KeyCode::Char('i') | KeyCode::Enter => {
                self.input_mode = InputMode::Compose;
                self.status_message = "Writing a comment · Enter send · Esc stop".to_string();
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.detail.refresh();
                self.awaiting_comments = true;
            }
            KeyCode::Char('o') | KeyCode::Char('O') => {
                let url = self.selected_link();
                self.open_in_browser(url)?;
            }
            _ => {}
        }
        Ok(false)
    }

    fn after_search_applied(&mut self) {
        let visible = self.state.visible_posts().len();
        self.status_message = if self.state.search_term.trim().is_empty() {
            format!("Showing all {} {}.", visible, self.noun())
        } else {
            format!(
                "{} of {} {} match \"{}\".",
                visible,
                self.state.posts.len(),
                self.noun(),
                self.state.search_term.trim()
            )
        };
    }

    fn noun(&self) -> &'static str {
        match self.source {
            Source::Board => "posts",
            Source::Store => "products",
        }
    }

    fn open_selected(&mut self) {
        let Some(post) = self.state.selected_post() else {
            self.status_message = "Nothing to open.".to_string();
            return;
        };
        let post_id = post.id;
        let image_url = post.image_url.clone();
        let title = post.title.clone();
        self.state.open_detail(post_id);
        self.detail.open(post_id);
        self.awaiting_comments = true;
        self.detail_scroll = 0;
        if let Some(url) = image_url {
            self.request_image(&url);
        }
        self.status_message = format!("Opened \"{}\" · comments refresh automatically.", title);
    }

    fn close_detail(&mut self) {
        self.detail.close();
        self.state.close_detail();
        self.awaiting_comments = false;
        self.input_mode = InputMode::Normal;
        self.status_message = format!("Back to {}.", self.noun());
    }

    fn submit_draft(&mut self) {
        match self.detail.submit(&self.state.draft) {
            SubmitOutcome::Empty => {
                self.status_message = "Write something before sending.".to_string();
            }
            SubmitOutcome::NoDetail => {
                self.input_mode = InputMode::Normal;
                self.status_message = "Open a post to comment on it.".to_string();
            }
            SubmitOutcome::Sent => {
                self.state.draft.clear();
                self.input_mode = InputMode::Normal;
                self.status_message = "Sending comment…".to_string();
            }
        }
    }

    fn selected_link(&self) -> Option<String> {
        let from_comment = self
            .state
            .comments
            .get(self.state.selected_comment)
            .and_then(|comment| {
                self.classifier
                    .attachments(&comment.text)
                    .into_iter()
                    .find(|preview| preview.kind != MediaKind::Text)
                    .map(|preview| preview.url)
            });
        from_comment.or_else(|| {
            self.state
                .detail_post_id()
                .and_then(|id| self.state.post(id))
                .and_then(|post| post.image_url.clone())
        })
    }

    fn open_in_browser(&mut self, url: Option<String>) -> Result<()> {
        let Some(url) = url.and_then(|raw| media::parse_lenient(&raw)) else {
            self.status_message = "No link to open here.".to_string();
            return Ok(());
        };
        if !media::is_fetchable(&url) {
            self.status_message = format!("Cannot open {} links.", url.scheme());
            return Ok(());
        }
        webbrowser::open(url.as_str()).with_context(|| format!("open {}", url))?;
        self.status_message = format!("Opened {} in your browser.", url);
        Ok(())
    }

    fn reload_posts(&mut self) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.pending_posts = Some(PendingPosts { request_id });
        self.spinner.reset();
        self.status_message = format!("Loading {}…", self.noun());

        let tx = self.response_tx.clone();
        let service = self.feed_service.clone();
        thread::spawn(move || {
            let fetched = data::fetch_posts(service.as_ref());
            let _ = tx.send(AsyncResponse::Posts {
                request_id,
                fetched,
            });
        });
    }

    fn request_image(&mut self, url: &str) {
        let Some(prober) = &self.prober else {
            return;
        };
        let key = url.trim();
        if key.is_empty() || self.requested_images.contains(key) {
            return;
        }
        self.requested_images.insert(key.to_string());
        match media::parse_lenient(key) {
            Some(url) if media::is_fetchable(&url) => prober.enqueue(key),
            Some(_) => {
                self.images.insert(key.to_string(), ImageStatus::Placeholder);
            }
            None => {}
        }
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }

        for update in self.detail.poll() {
            self.handle_detail_update(update);
            changed = true;
        }

        if let Some(prober) = &self.prober {
            for result in prober.drain() {
                self.images.insert(result.url, result.status);
                changed = true;
            }
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Posts {
                request_id,
                fetched,
            } => {
                match &self.pending_posts {
                    Some(pending) if pending.request_id == request_id => {}
                    _ => return,
                }
                self.pending_posts = None;
                let failed = fetched.failed();
                self.state.banner = if failed {
                    self.source.failure_banner().map(str::to_string)
                } else {
                    None
                };
                self.state.replace_posts(fetched.items);
                info!(count = self.state.posts.len(), failed, "posts loaded");
                let urls: Vec<String> = self
                    .state
                    .posts
                    .iter()
                    .filter_map(|post| post.image_url.clone())
                    .collect();
                for url in urls {
                    self.request_image(&url);
                }
                self.status_message = if self.state.posts.is_empty() {
                    format!("No {} to show. Press r to try again.", self.noun())
                } else {
                    format!(
                        "{} {} loaded · / search · Enter open · q quit",
                        self.state.posts.len(),
                        self.noun()
                    )
                };
            }
        }
    }

    fn handle_detail_update(&mut self, update: DetailUpdate) {
        match update {
            DetailUpdate::Comments { post_id, comments } => {
                if self.state.detail_post_id() != Some(post_id) {
                    return;
                }
                self.awaiting_comments = false;
                let urls: Vec<String> = comments
                    .iter()
                    .flat_map(|comment| self.classifier.attachments(&comment.text))
                    .filter(|preview| preview.kind == MediaKind::Image)
                    .map(|preview| preview.url)
                    .collect();
                self.state.set_comments(comments);
                for url in urls {
                    self.request_image(&url);
                }
            }
            DetailUpdate::Submitted { post_id, ok } => {
                if self.state.detail_post_id() != Some(post_id) {
                    return;
                }
                if ok {
                    self.awaiting_comments = true;
                    self.status_message = "Comment posted.".to_string();
                } else {
                    self.status_message = "Comment could not be sent.".to_string();
                }
            }
        }
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        let status_text = if self.is_loading() {
            format!("{} {}", self.spinner.frame(), self.status_message)
                .trim()
                .to_string()
        } else {
            self.status_message.clone()
        };
        let status_line = Paragraph::new(status_text).style(
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .bg(COLOR_PANEL_FOCUSED_BG)
                .add_modifier(Modifier::BOLD),
        );
        frame.render_widget(status_line, layout[0]);

        match self.state.view {
            ViewState::List => self.draw_list_view(frame, layout[1]),
            ViewState::Detail { post_id } => self.draw_detail_view(frame, layout[1], post_id),
        }

        let footer = Paragraph::new(self.footer_text())
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[2]);
    }

    fn panel_block(&self, title: String, focused: bool) -> Block<'static> {
        let border_style = if focused {
            Style::default().fg(COLOR_BORDER_FOCUSED)
        } else {
            Style::default().fg(COLOR_BORDER_IDLE)
        };
        let title_style = if focused {
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(COLOR_TEXT_SECONDARY)
        };
        Block::default()
            .title(Span::styled(title, title_style))
            .borders(Borders::ALL)
            .border_style(border_style)
            .style(Style::default().bg(COLOR_PANEL_BG))
            .padding(Padding::horizontal(1))
    }

    fn draw_list_view(&self, frame: &mut Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);
        self.draw_search(frame, chunks[0]);
        self.draw_cards(frame, chunks[1]);
    }

    fn draw_search(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.input_mode == InputMode::Search;
        let block = self.panel_block("Search (/)".to_string(), focused);
        let inner = block.inner(area);
        let text = if self.state.search_input.is_empty() && !focused {
            Span::styled(
                "type / to filter by title or text",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )
        } else {
            Span::styled(
                self.state.search_input.clone(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )
        };
        frame.render_widget(Paragraph::new(Line::from(text)).block(block), area);
        if focused {
            set_input_cursor(frame, inner, &self.state.search_input);
        }
    }

    fn draw_cards(&self, frame: &mut Frame<'_>, area: Rect) {
        let list_view = view::render_list(
            &self.state.posts,
            &self.state.search_term,
            self.state.selected,
            self.state.banner.as_deref(),
            &self.images,
        );
        let title = format!(
            "{} ({}/{})",
            self.source.display_name(),
            list_view.cards().len(),
            list_view.total
        );
        let block = self.panel_block(title, self.input_mode == InputMode::Normal);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        match &list_view.body {
            ListBody::Empty(message) => {
                let paragraph = Paragraph::new(*message)
                    .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                    .alignment(Alignment::Center)
                    .block(block);
                frame.render_widget(paragraph, area);
            }
            ListBody::Banner(message) => {
                let paragraph = Paragraph::new(message.clone())
                    .style(
                        Style::default()
                            .fg(COLOR_ERROR)
                            .add_modifier(Modifier::BOLD),
                    )
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(block);
                frame.render_widget(paragraph, area);
            }
            ListBody::Cards(cards) => {
                let mut selected_index = 0;
                let items: Vec<ListItem> = cards
                    .iter()
                    .enumerate()
                    .map(|(index, card)| {
                        if card.selected {
                            selected_index = index;
                        }
                        ListItem::new(card_lines(card, width, inner.width))
                    })
                    .collect();
                let list = List::new(items).block(block);
                let mut list_state = ListState::default();
                list_state.select(Some(selected_index));
                frame.render_stateful_widget(list, area, &mut list_state);
            }
        }
    }

    fn draw_detail_view(&self, frame: &mut Frame<'_>, area: Rect, post_id: i64) {
        let Some(post) = self.state.post(post_id) else {
            let paragraph = Paragraph::new("This post is no longer available. Press Esc.")
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(self.panel_block("Post".to_string(), true));
            frame.render_widget(paragraph, area);
            return;
        };
        let detail = view::render_detail(
            post,
            &self.state.comments,
            self.state.selected_comment,
            &self.classifier,
            &self.images,
        );

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(columns[1]);

        self.draw_post(frame, columns[0], &detail);
        self.draw_comments(frame, right[0], &detail);
        self.draw_compose(frame, right[1]);
    }

    fn draw_post(&self, frame: &mut Frame<'_>, area: Rect, detail: &view::DetailView) {
        let block = self.panel_block(format!("#{}", detail.post_id), false);
        let width = block.inner(area).width.max(1) as usize;
        let mut lines = wrap_plain(
            &detail.title,
            width,
            Style::default()
                .fg(COLOR_TEXT_PRIMARY)
                .add_modifier(Modifier::BOLD),
        );
        lines.push(Line::default());
        for paragraph in detail.body.split('\n') {
            lines.extend(wrap_plain(
                paragraph,
                width,
                Style::default().fg(COLOR_TEXT_SECONDARY),
            ));
        }
        if let Some(image) = detail.image.describe() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(image, image_style(&detail.image))));
        }
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .scroll((self.detail_scroll, 0));
        frame.render_widget(paragraph, area);
    }

    fn draw_comments(&self, frame: &mut Frame<'_>, area: Rect, detail: &view::DetailView) {
        let title = format!("Comments ({})", detail.comments.len());
        let block = self.panel_block(title, self.input_mode == InputMode::Normal);
        let inner = block.inner(area);
        let width = inner.width.max(1) as usize;

        if let Some(message) = detail.empty {
            let text = if self.awaiting_comments {
                "Loading comments…"
            } else {
                message
            };
            let paragraph = Paragraph::new(text)
                .style(Style::default().fg(COLOR_TEXT_SECONDARY))
                .block(block);
            frame.render_widget(paragraph, area);
            return;
        }

        let mut selected_index = 0;
        let items: Vec<ListItem> = detail
            .comments
            .iter()
            .enumerate()
            .map(|(index, comment)| {
                if comment.selected {
                    selected_index = index;
                }
                let background = if comment.selected {
                    COLOR_PANEL_SELECTED_BG
                } else {
                    COLOR_PANEL_BG
                };
                let meta_style = Style::default()
                    .fg(COLOR_ACCENT)
                    .bg(background)
                    .add_modifier(Modifier::BOLD);
                let body_style = Style::default().fg(COLOR_TEXT_PRIMARY).bg(background);
                let mut lines = vec![Line::from(Span::styled(comment.author.clone(), meta_style))];
                lines.extend(wrap_plain(&comment.text, width, body_style));
                for attachment in &comment.attachments {
                    let style = match attachment.preview.kind {
                        MediaKind::Image => image_style(&attachment.image).bg(background),
                        _ => Style::default().fg(COLOR_SUCCESS).bg(background),
                    };
                    lines.extend(wrap_with_prefix(
                        &view::attachment_line(attachment),
                        width,
                        "  ↳ ",
                        style,
                    ));
                }
                lines.push(Line::from(Span::styled(String::new(), body_style)));
                pad_lines_to_width(&mut lines, inner.width);
                ListItem::new(lines)
            })
            .collect();
        let list = List::new(items).block(block);
        let mut list_state = ListState::default();
        list_state.select(Some(selected_index));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_compose(&self, frame: &mut Frame<'_>, area: Rect) {
        let focused = self.input_mode == InputMode::Compose;
        let block = self.panel_block("New comment (c)".to_string(), focused);
        let inner = block.inner(area);
        let text = if self.state.draft.is_empty() && !focused {
            Span::styled(
                "press c to write · text, links and image URLs",
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )
        } else {
            Span::styled(
                self.state.draft.clone(),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )
        };
        frame.render_widget(Paragraph::new(Line::from(text)).block(block), area);
        if focused {
            set_input_cursor(frame, inner, &self.state.draft);
        }
    }

    fn footer_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        match (self.input_mode, self.state.view) {
            (InputMode::Search, _) => {
                parts.push("Searching: type to filter");
                parts.push("Enter apply now");
                parts.push("Esc done");
            }
            (InputMode::Compose, _) => {
                parts.push("Composing: Enter send");
                parts.push("Backspace delete");
                parts.push("Esc stop");
            }
            (InputMode::Normal, ViewState::List) => {
                if self.state.posts.is_empty() {
                    parts.push("Waiting for posts");
                } else {
                    parts.push("j/k move");
                    parts.push("Enter open");
                    parts.push("/ search");
                    parts.push("o open image");
                }
                if !self.state.search_term.is_empty() {
                    parts.push("Esc clear search");
                }
                parts.push("r refresh");
                parts.push("q quit");
            }
            (InputMode::Normal, ViewState::Detail { .. }) => {
                parts.push("j/k comments");
                parts.push("c comment");
                parts.push("o open link");
                parts.push("PgUp/PgDn scroll post");
                parts.push("r refresh");
                parts.push("Esc back");
                parts.push("q quit");
            }
        }
        parts.join(" · ")
    }
}

fn card_lines(card: &view::PostCard, width: usize, pad_width: u16) -> Vec<Line<'static>> {
    let background = if card.selected {
        COLOR_PANEL_SELECTED_BG
    } else {
        COLOR_PANEL_BG
    };
    let title_style = Style::default()
        .fg(if card.selected {
            COLOR_ACCENT
        } else {
            COLOR_TEXT_PRIMARY
        })
        .bg(background)
        .add_modifier(Modifier::BOLD);
    let body_style = Style::default().fg(COLOR_TEXT_SECONDARY).bg(background);

    let mut lines = wrap_plain(&card.title, width, title_style);
    let body: String = card
        .body
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let mut body_lines = wrap_plain(&body, width, body_style);
    if body_lines.len() > CARD_BODY_LINES {
        body_lines.truncate(CARD_BODY_LINES);
        if let Some(last) = body_lines.last_mut() {
            last.spans.push(Span::styled("…", body_style));
        }
    }
    lines.extend(body_lines);
    if let Some(image) = card.image.describe() {
        lines.push(Line::from(Span::styled(
            image,
            image_style(&card.image).bg(background),
        )));
    }
    lines.push(Line::from(Span::styled(String::new(), body_style)));
    pad_lines_to_width(&mut lines, pad_width);
    lines
}

fn image_style(slot: &view::ImageSlot) -> Style {
    match slot {
        view::ImageSlot::Loaded { .. } => Style::default().fg(COLOR_SUCCESS),
        view::ImageSlot::Placeholder { .. } => Style::default().fg(COLOR_ERROR),
        _ => Style::default().fg(COLOR_TEXT_SECONDARY),
    }
}

fn set_input_cursor(frame: &mut Frame<'_>, inner: Rect, value: &str) {
    if inner.width == 0 || inner.height == 0 {
        return;
    }
    let offset = UnicodeWidthStr::width(value).min(inner.width.saturating_sub(1) as usize);
    frame.set_cursor(inner.x + offset as u16, inner.y);
}

fn wrap_with_prefixes(
    text: &str,
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    style: Style,
) -> Vec<Line<'static>> {
    if text.trim().is_empty() {
        return vec![Line::from(Span::styled(String::new(), style))];
    }

    let min_width = first_prefix
        .chars()
        .count()
        .max(rest_prefix.chars().count())
        .saturating_add(1);
    let wrap_width = width.max(min_width);
    let options = WrapOptions::new(wrap_width)
        .break_words(true)
        .initial_indent(first_prefix)
        .subsequent_indent(rest_prefix);

    wrap(text, options)
        .into_iter()
        .map(|cow| Line::from(Span::styled(cow.into_owned(), style)))
        .collect()
}

fn wrap_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    wrap_with_prefixes(text, width, "", "", style)
}

fn wrap_with_prefix(text: &str, width: usize, prefix: &str, style: Style) -> Vec<Line<'static>> {
    let rest = " ".repeat(prefix.chars().count());
    wrap_with_prefixes(text, width, prefix, &rest, style)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let current_width: usize = line
            .spans
            .iter()
            .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
            .sum();
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

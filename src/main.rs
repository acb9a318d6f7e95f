use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tui_textarea::TextArea;

use haunted_raid::logging::{self, Sink};
use haunted_raid::validate::js_string;
use haunted_raid::{
    load_catalog, score, Answer, Catalog, Config, Puzzle, PuzzleKind, Submission, ValidationResult,
    Validator,
};

#[derive(Debug, Parser)]
#[command(name = "haunted-raid", about = "Escape the haunted house by fixing its JavaScript")]
struct Cli {
    /// Config file (defaults to ./haunted-raid.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of room_*.toml files, overrides the config
    #[arg(long, global = true)]
    puzzles: Option<PathBuf>,

    /// Write logs here while playing (the UI hides stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play in the terminal (default)
    Play,
    /// List rooms in order
    List,
    /// Validate one answer and print the verdict as JSON
    Check {
        /// Puzzle id
        #[arg(long)]
        puzzle: String,
        /// Option index for multiple-choice rooms
        #[arg(long, conflicts_with_all = ["code_file", "text"])]
        choice: Option<usize>,
        /// File holding the code answer
        #[arg(long, conflicts_with = "text")]
        code_file: Option<PathBuf>,
        /// Inline answer text
        #[arg(long)]
        text: Option<String>,
        /// Seconds spent in the room, for scoring
        #[arg(long, default_value_t = 0.0)]
        elapsed: f64,
        /// Hints revealed, for scoring
        #[arg(long, default_value_t = 0)]
        hints: u32,
    },
}

enum GameState {
    TitleScreen,
    Playing,
    RoomComplete,
    GameComplete,
}

enum MenuOption {
    NewGame,
    Quit,
}

impl MenuOption {
    fn next(&self) -> Self {
        match self {
            MenuOption::NewGame => MenuOption::Quit,
            MenuOption::Quit => MenuOption::NewGame,
        }
    }
}

struct App<'a> {
    catalog: Catalog,
    validator: Validator,
    runtime: Runtime,
    current_room: u32,
    editor: TextArea<'a>,
    selected_option: usize,
    message: String,
    message_style: Style,
    message_scroll: u16,
    state: GameState,
    menu_selection: MenuOption,
    score: i64,
    rooms_cleared: u32,
    hint_visible: bool,
    hints_used_room: u32,
    hints_used_total: u32,
    failed_runs_total: u32,
    room_started: Instant,
    room_time: Option<Duration>,
    command_mode: bool,
    command_buffer: String,
}

impl<'a> App<'a> {
    fn new(catalog: Catalog, validator: Validator, runtime: Runtime) -> Self {
        let first_room = catalog.first().map_or(1, |p| p.room);
        App {
            catalog,
            validator,
            runtime,
            current_room: first_room,
            editor: TextArea::default(),
            selected_option: 0,
            message: String::new(),
            message_style: Style::default().fg(Color::Yellow),
            message_scroll: 0,
            state: GameState::TitleScreen,
            menu_selection: MenuOption::NewGame,
            score: 0,
            rooms_cleared: 0,
            hint_visible: false,
            hints_used_room: 0,
            hints_used_total: 0,
            failed_runs_total: 0,
            room_started: Instant::now(),
            room_time: None,
            command_mode: false,
            command_buffer: String::new(),
        }
    }

    fn puzzle(&self) -> Option<&Puzzle> {
        self.catalog.find_by_room(self.current_room)
    }

    fn is_choice(&self) -> bool {
        self.puzzle()
            .is_some_and(|p| matches!(p.kind, PuzzleKind::MultipleChoice { .. }))
    }

    fn option_count(&self) -> usize {
        match self.puzzle().map(|p| &p.kind) {
            Some(PuzzleKind::MultipleChoice { options, .. }) => options.len(),
            _ => 0,
        }
    }

    fn start_game(&mut self) {
        self.score = 0;
        self.rooms_cleared = 0;
        self.hints_used_total = 0;
        self.failed_runs_total = 0;
        if let Some(first) = self.catalog.first().map(|p| p.room) {
            self.load_room(first);
        }
    }

    fn load_room(&mut self, room: u32) {
        let Some(puzzle) = self.catalog.find_by_room(room) else {
            warn!(room, "room missing from the catalog");
            self.finish_game();
            return;
        };
        info!(room, id = %puzzle.id, "entered room");
        let code = puzzle.initial_code().trim().to_string();
        self.current_room = room;

        self.editor = TextArea::from(code.lines());
        self.editor.set_block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Code [F5: Run | F1: Hint | :q Quit] "),
        );
        self.editor
            .set_line_number_style(Style::default().fg(Color::DarkGray));

        self.selected_option = 0;
        self.message = if self.is_choice() {
            String::from("Pick an answer with ↑/↓ and press ENTER...")
        } else {
            String::from("Fix the code and press F5. The house is listening...")
        };
        self.message_style = Style::default().fg(Color::Yellow);
        self.message_scroll = 0;
        self.state = GameState::Playing;
        self.hint_visible = false;
        self.hints_used_room = 0;
        self.room_started = Instant::now();
        self.room_time = None;
    }

    fn advance_room(&mut self) {
        match self.catalog.next(self.current_room).map(|p| p.room) {
            Some(next) => self.load_room(next),
            None => self.finish_game(),
        }
    }

    fn finish_game(&mut self) {
        self.state = GameState::GameComplete;
        let perfect = self.hints_used_total == 0 && self.failed_runs_total == 0;
        self.message = format!(
            "=== YOU ESCAPED THE HOUSE! ==={}\n\n\
            ╔══════════════════════════╗\n\
            ║  ESCAPE STATS            ║\n\
            ╠══════════════════════════╣\n\
            ║  Rooms cleared:    {:>4}  ║\n\
            ║  Failed runs:      {:>4}  ║\n\
            ║  Hints used:       {:>4}  ║\n\
            ║  Final score:      {:>4}  ║\n\
            ╚══════════════════════════╝\n\n\
            Press any key to exit...",
            if perfect { " FLAWLESS!" } else { "" },
            self.rooms_cleared,
            self.failed_runs_total,
            self.hints_used_total,
            self.score
        );
        self.message_style = Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD);
    }

    fn run_solution(&mut self) {
        self.message_scroll = 0;
        let Some(puzzle) = self.puzzle().cloned() else {
            return;
        };
        let answer = if self.is_choice() {
            Answer::Choice(self.selected_option)
        } else {
            let code = self.editor.lines().join("\n");
            if code.trim().is_empty() {
                self.message = "The editor is empty. Write something first.".to_string();
                self.message_style = Style::default().fg(Color::DarkGray);
                return;
            }
            Answer::Text(code)
        };

        let elapsed = self.room_started.elapsed();
        let submission = Submission::new(puzzle.id.clone(), answer, elapsed);
        let result = self
            .runtime
            .block_on(self.validator.validate(&puzzle, &submission));

        if result.correct {
            // Whole seconds, the way the room timer shows them.
            let earned = score(&puzzle, elapsed.as_secs() as f64, self.hints_used_room);
            self.score += earned;
            self.rooms_cleared += 1;
            self.room_time = Some(elapsed);
            self.state = GameState::RoomComplete;
            self.message = format!(
                "*** ROOM CLEARED! ***  {:+} points in {}{}  [ Press ENTER ]\n\n{}",
                earned,
                clock(elapsed),
                if self.hints_used_room == 0 { " (no hints!)" } else { "" },
                describe_result(&result)
            );
            self.message_style = Style::default().fg(Color::Yellow);
        } else {
            self.failed_runs_total += 1;
            self.message = describe_result(&result);
            self.message_style = Style::default().fg(Color::Red);
        }
    }

    fn toggle_hint(&mut self) {
        self.message_scroll = 0;
        let Some(hint) = self.puzzle().and_then(|p| p.hint.clone()) else {
            self.message = "No hint in this room. You're on your own...".to_string();
            self.message_style = Style::default().fg(Color::DarkGray);
            return;
        };

        self.hint_visible = !self.hint_visible;
        if !self.hint_visible {
            self.message = "The hint fades away.".to_string();
            self.message_style = Style::default().fg(Color::DarkGray);
            return;
        }
        if self.hints_used_room == 0 {
            self.hints_used_room = 1;
            self.hints_used_total += 1;
        }
        self.message = format!("HINT: {}", hint);
        self.message_style = Style::default().fg(Color::Cyan);
    }

    fn select_option(&mut self, delta: isize) {
        let count = self.option_count();
        if count > 0 {
            self.selected_option = (self.selected_option as isize + delta).rem_euclid(count as isize) as usize;
        }
    }
}

fn describe_result(result: &ValidationResult) -> String {
    let mut out = result.message.clone();
    if let Some(tests) = &result.test_results {
        out.push('\n');
        for (i, test) in tests.iter().enumerate() {
            out.push_str(&format!(
                "\n{} Test {}: ({})  expected {}",
                if test.passed { "✔" } else { "✘" },
                i + 1,
                test.input,
                js_string(&test.expected)
            ));
            if !test.passed {
                out.push_str(&format!(", got {}", test.actual_display()));
            }
        }
    }
    out
}

fn clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Play);

    let sink = match (&command, &cli.log_file) {
        (Command::Play, Some(path)) => Sink::File(path),
        (Command::Play, None) => Sink::Off,
        (_, Some(path)) => Sink::File(path),
        (_, None) => Sink::Stderr,
    };
    logging::init(sink)?;

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.puzzles {
        config.puzzles_dir = dir;
    }
    let catalog = load_catalog(&config.puzzles_dir)
        .with_context(|| format!("load rooms from {}", config.puzzles_dir.display()))?;
    let validator = Validator::new(config.sandbox.executor());
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    match command {
        Command::Play => play(catalog, validator, runtime),
        Command::List => {
            list(&catalog);
            Ok(())
        }
        Command::Check {
            puzzle,
            choice,
            code_file,
            text,
            elapsed,
            hints,
        } => {
            let answer = match (choice, code_file, text) {
                (Some(index), _, _) => Answer::Choice(index),
                (None, Some(path), _) => Answer::Text(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("read {}", path.display()))?,
                ),
                (None, None, Some(text)) => Answer::Text(text),
                (None, None, None) => bail!("give an answer with --choice, --code-file or --text"),
            };
            check(&catalog, &validator, &runtime, &puzzle, answer, elapsed, hints)
        }
    }
}

fn list(catalog: &Catalog) {
    for puzzle in catalog.iter() {
        println!(
            "{:>3}  {:<24} {:<16} {:>4} pts  {}",
            puzzle.room,
            puzzle.id,
            puzzle.type_name(),
            puzzle.points,
            puzzle.title
        );
    }
}

fn check(
    catalog: &Catalog,
    validator: &Validator,
    runtime: &Runtime,
    puzzle_id: &str,
    answer: Answer,
    elapsed: f64,
    hints: u32,
) -> Result<()> {
    let Some(puzzle) = catalog.find_by_id(puzzle_id) else {
        bail!("no puzzle with id `{puzzle_id}`");
    };
    let submission = Submission::new(
        puzzle.id.clone(),
        answer,
        Duration::try_from_secs_f64(elapsed).unwrap_or_default(),
    );
    let result = runtime.block_on(validator.validate(puzzle, &submission));
    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.correct {
        println!("score: {}", score(puzzle, elapsed, hints));
    }
    Ok(())
}

fn play(catalog: Catalog, validator: Validator, runtime: Runtime) -> Result<()> {
    if catalog.is_empty() {
        eprintln!("No rooms found. Point --puzzles at a directory of room_*.toml files.");
        return Ok(());
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(catalog, validator, runtime);
    let outcome = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    outcome?;

    if let GameState::GameComplete = app.state {
        println!(
            "\nYou escaped the haunted house with {} points.\n",
            app.score
        );
    }
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| draw_ui(f, app))?;

        // Poll so the room timer keeps ticking between key presses.
        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };

        match app.state {
            GameState::TitleScreen => {
                match key.code {
                    KeyCode::Up | KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('k') => {
                        app.menu_selection = app.menu_selection.next();
                    }
                    KeyCode::Enter => match app.menu_selection {
                        MenuOption::NewGame => app.start_game(),
                        MenuOption::Quit => break,
                    },
                    KeyCode::Char('q') => break,
                    _ => {}
                }
                continue;
            }
            GameState::RoomComplete => {
                if key.code == KeyCode::Enter {
                    app.advance_room();
                }
                continue;
            }
            GameState::GameComplete => break,
            GameState::Playing => {}
        }

        // Command mode handling (vim-style :q)
        if app.command_mode {
            match key.code {
                KeyCode::Esc => {
                    app.command_mode = false;
                    app.command_buffer.clear();
                }
                KeyCode::Enter => {
                    match app.command_buffer.as_str() {
                        "q" | "quit" => break,
                        "hint" => app.toggle_hint(),
                        "run" => app.run_solution(),
                        "help" => {
                            app.message = "Commands: :q (quit), :hint (toggle hint), :run (submit)"
                                .to_string();
                            app.message_style = Style::default().fg(Color::Cyan);
                        }
                        "" => {}
                        other => {
                            app.message = format!("Unknown command: {}", other);
                            app.message_style = Style::default().fg(Color::Red);
                        }
                    }
                    app.command_mode = false;
                    app.command_buffer.clear();
                }
                KeyCode::Backspace => {
                    app.command_buffer.pop();
                    if app.command_buffer.is_empty() {
                        app.command_mode = false;
                    }
                }
                KeyCode::Char(c) => app.command_buffer.push(c),
                _ => {}
            }
            continue;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char(':'), KeyModifiers::NONE) => {
                app.command_mode = true;
                app.command_buffer.clear();
            }
            (KeyCode::Esc, _) => {
                app.message = "Type :q to quit".to_string();
                app.message_style = Style::default().fg(Color::DarkGray);
                app.message_scroll = 0;
            }
            (KeyCode::PageDown, _) => {
                let lines = app.message.lines().count() as u16;
                if app.message_scroll < lines.saturating_sub(5) {
                    app.message_scroll += 3;
                }
            }
            (KeyCode::PageUp, _) => {
                app.message_scroll = app.message_scroll.saturating_sub(3);
            }
            (KeyCode::F(5), _) | (KeyCode::Char('r'), KeyModifiers::CONTROL) => {
                app.run_solution();
            }
            (KeyCode::F(1), _) => app.toggle_hint(),
            _ if app.is_choice() => match key.code {
                KeyCode::Up | KeyCode::Char('k') => app.select_option(-1),
                KeyCode::Down | KeyCode::Char('j') => app.select_option(1),
                KeyCode::Char(c @ '1'..='9') => {
                    let index = c as usize - '1' as usize;
                    if index < app.option_count() {
                        app.selected_option = index;
                    }
                }
                KeyCode::Enter => app.run_solution(),
                _ => {}
            },
            _ => {
                app.editor.input(key);
            }
        }
    }
    Ok(())
}

fn draw_ui(f: &mut Frame, app: &App) {
    if matches!(app.state, GameState::TitleScreen) {
        draw_title_screen(f, app);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(12),
        ])
        .split(f.area());

    let Some(puzzle) = app.puzzle() else {
        return;
    };
    let elapsed = app.room_time.unwrap_or_else(|| app.room_started.elapsed());
    let status = Line::from(vec![
        Span::styled(
            " HAUNTED RAID ",
            Style::default().fg(Color::Black).bg(Color::Magenta),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" {} ", puzzle.title),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" Room {}/{} ", puzzle.room, app.catalog.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" {} pts ", puzzle.points),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" Score: {} ", app.score),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" ⏱ {} ", clock(elapsed)),
            Style::default().fg(if elapsed.as_secs() < 60 {
                Color::Green
            } else {
                Color::Red
            }),
        ),
    ]);
    let status_block = Paragraph::new(status).block(Block::default().borders(Borders::BOTTOM));
    f.render_widget(status_block, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);

    let narrative = Paragraph::new(room_text(puzzle))
        .block(Block::default().borders(Borders::ALL).title(" The Room "))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(narrative, main_chunks[0]);

    if app.is_choice() {
        render_options(f, app, main_chunks[1]);
    } else {
        f.render_widget(&app.editor, main_chunks[1]);
    }

    let message_content = if app.command_mode {
        format!(":{}", app.command_buffer)
    } else {
        app.message.clone()
    };
    let (message_style, message_title) = if app.command_mode {
        (Style::default().fg(Color::White).bg(Color::DarkGray), " Command ")
    } else {
        match app.state {
            GameState::RoomComplete => (
                Style::default().fg(Color::Black).bg(Color::Green),
                " THE DOOR OPENS ",
            ),
            GameState::GameComplete => (
                Style::default().fg(Color::Black).bg(Color::Yellow),
                " ESCAPED! ",
            ),
            GameState::Playing | GameState::TitleScreen => (app.message_style, " Whispers "),
        }
    };
    let title = if app.message.lines().count() > 10 {
        format!("{} [PgUp/PgDn to scroll]", message_title)
    } else {
        message_title.to_string()
    };
    let message = Paragraph::new(message_content)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .style(message_style)
        .scroll((app.message_scroll, 0));
    f.render_widget(message, chunks[2]);
}

fn room_text(puzzle: &Puzzle) -> String {
    let mut text = String::new();
    if let Some(story) = &puzzle.story {
        text.push_str(story);
        text.push_str("\n\n");
    }
    text.push_str(&puzzle.description);
    match &puzzle.kind {
        PuzzleKind::MultipleChoice { question, .. } => {
            text.push_str("\n\n");
            text.push_str(question);
        }
        PuzzleKind::FixCode {
            bug_hint: Some(bug), ..
        } => {
            text.push_str("\n\nBug report: ");
            text.push_str(bug);
        }
        _ => {}
    }
    text
}

fn render_options(f: &mut Frame, app: &App, area: Rect) {
    let Some(PuzzleKind::MultipleChoice { options, .. }) = app.puzzle().map(|p| &p.kind) else {
        return;
    };
    let items: Vec<ListItem> = options
        .iter()
        .enumerate()
        .map(|(i, option)| ListItem::new(format!("{}. {}", i + 1, option)))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Choose [↑/↓ | ENTER: Submit | F1: Hint] "),
        )
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    let mut state = ListState::default().with_selected(Some(app.selected_option));
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_title_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let title_art = r#"
    ╔═══════════════════════════════════════════════════════════╗
    ║                                                           ║
    ║    ██╗  ██╗ █████╗ ██╗   ██╗███╗   ██╗████████╗███████╗   ║
    ║    ██║  ██║██╔══██╗██║   ██║████╗  ██║╚══██╔══╝██╔════╝   ║
    ║    ███████║███████║██║   ██║██╔██╗ ██║   ██║   █████╗     ║
    ║    ██╔══██║██╔══██║██║   ██║██║╚██╗██║   ██║   ██╔══╝     ║
    ║    ██║  ██║██║  ██║╚██████╔╝██║ ╚████║   ██║   ███████╗   ║
    ║    ╚═╝  ╚═╝╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═══╝   ╚═╝   ╚══════╝   ║
    ║                                                           ║
    ║              "The House of a Thousand Bugs"               ║
    ║                                                           ║
    ╚═══════════════════════════════════════════════════════════╝
"#;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(15),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
        ])
        .split(area);

    let title = Paragraph::new(title_art)
        .style(Style::default().fg(Color::Magenta))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let selected = Style::default()
        .fg(Color::Black)
        .bg(Color::Magenta)
        .add_modifier(Modifier::BOLD);
    let idle = Style::default().fg(Color::White);

    let new_game = Paragraph::new("  ENTER THE HOUSE  ")
        .style(if matches!(app.menu_selection, MenuOption::NewGame) { selected } else { idle })
        .alignment(Alignment::Center);
    f.render_widget(new_game, chunks[1]);

    let quit = Paragraph::new("  RUN AWAY  ")
        .style(if matches!(app.menu_selection, MenuOption::Quit) { selected } else { idle })
        .alignment(Alignment::Center);
    f.render_widget(quit, chunks[2]);

    let help = Paragraph::new(format!(
        "{} rooms await  •  ↑/↓ to select  •  ENTER to confirm  •  q to quit",
        app.catalog.len()
    ))
    .style(Style::default().fg(Color::DarkGray))
    .alignment(Alignment::Center);
    f.render_widget(help, chunks[3]);
}

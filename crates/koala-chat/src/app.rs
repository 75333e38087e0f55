use std::future::pending;
use std::io::{self, Stdout, Write as _};

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType};
use shared::conversation::{ConversationController, SubmitError, TurnOutcome};
use shared::llm::ChatCompletionGateway;
use shared::preferences::{FileStorage, PreferenceStore, Preferences};
use shared::settings::SettingsPanel;
use shared::transcript::Transcript;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::signal;
use tracing::{debug, info, warn};

use crate::layout::{self, Viewport};

const DEFAULT_COLUMNS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;
const PROMPT: &str = "> ";

type InputLines = Lines<BufReader<Stdin>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command<'a> {
    Quit,
    Settings,
    ScrollUp,
    ScrollDown,
    Submit(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "/quit" => Command::Quit,
        "/settings" => Command::Settings,
        "/up" => Command::ScrollUp,
        "/down" => Command::ScrollDown,
        _ => Command::Submit(line),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SettingsCommand<'a> {
    Context(&'a str),
    Spicyness(f64),
    Nudge(i32),
    Save,
    Close,
    Invalid,
}

fn parse_settings_command(line: &str) -> SettingsCommand<'_> {
    let line = line.trim();
    let (name, argument) = line.split_once(' ').unwrap_or((line, ""));
    let argument = argument.trim();

    match name {
        "context" => SettingsCommand::Context(argument),
        "spicyness" => argument
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map_or(SettingsCommand::Invalid, SettingsCommand::Spicyness),
        "+" if argument.is_empty() => SettingsCommand::Nudge(1),
        "-" if argument.is_empty() => SettingsCommand::Nudge(-1),
        "save" if argument.is_empty() => SettingsCommand::Save,
        "close" if argument.is_empty() => SettingsCommand::Close,
        _ => SettingsCommand::Invalid,
    }
}

/// Full-screen redraws on stdout; the prompt sits on the last row.
struct Screen {
    out: Stdout,
    scroll_offset: usize,
}

impl Screen {
    fn new() -> Self {
        Self {
            out: io::stdout(),
            scroll_offset: 0,
        }
    }

    fn viewport() -> Viewport {
        let (columns, rows) = terminal::size().unwrap_or((DEFAULT_COLUMNS, DEFAULT_ROWS));
        Viewport {
            width: usize::from(columns),
            height: usize::from(rows).saturating_sub(1),
        }
    }

    fn draw_transcript(&mut self, transcript: &Transcript) -> io::Result<()> {
        let lines = layout::render(transcript, Self::viewport(), self.scroll_offset);
        self.draw(&lines)
    }

    /// Redraw used while streaming, where a failed frame is not worth aborting
    /// the turn for.
    fn redraw_transcript(&mut self, transcript: &Transcript) {
        if let Err(err) = self.draw_transcript(transcript) {
            warn!(error = %err, "failed to redraw transcript");
        }
    }

    fn draw_settings(&mut self, preferences: &Preferences, notice: Option<&str>) -> io::Result<()> {
        let lines = layout::render_settings(preferences, Self::viewport(), notice);
        self.draw(&lines)
    }

    fn scroll(&mut self, transcript: &Transcript, up: bool) {
        let viewport = Self::viewport();
        let page = (viewport.height / 2).max(1);
        let limit = layout::max_scroll_offset(transcript, viewport);
        self.scroll_offset = if up {
            self.scroll_offset.saturating_add(page).min(limit)
        } else {
            self.scroll_offset.saturating_sub(page)
        };
    }

    fn draw(&mut self, lines: &[String]) -> io::Result<()> {
        execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        write!(self.out, "{PROMPT}")?;
        self.out.flush()
    }
}

/// Terminal chat session: one controller, its gateway and the preference
/// store backing the settings dialog.
pub struct App<G> {
    controller: ConversationController,
    gateway: G,
    store: PreferenceStore<FileStorage>,
    panel: SettingsPanel,
    screen: Screen,
}

impl<G: ChatCompletionGateway> App<G> {
    pub fn new(
        controller: ConversationController,
        gateway: G,
        store: PreferenceStore<FileStorage>,
    ) -> Self {
        Self {
            controller,
            gateway,
            store,
            panel: SettingsPanel::default(),
            screen: Screen::new(),
        }
    }

    pub async fn run(mut self) -> Result<(), AppError> {
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        self.screen.draw_transcript(self.controller.transcript())?;

        loop {
            let line = tokio::select! {
                line = input.next_line() => line?,
                Ok(()) = signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                break;
            };

            match parse_command(&line) {
                Command::Quit => break,
                Command::Settings => self.run_settings(&mut input).await?,
                Command::ScrollUp => self.screen.scroll(self.controller.transcript(), true),
                Command::ScrollDown => self.screen.scroll(self.controller.transcript(), false),
                Command::Submit(text) => self.submit(text).await,
            }
            self.screen.draw_transcript(self.controller.transcript())?;
        }

        info!("koala chat exiting");
        Ok(())
    }

    async fn submit(&mut self, text: &str) {
        self.screen.scroll_offset = 0;
        let screen = &mut self.screen;
        let cancel = async {
            if signal::ctrl_c().await.is_err() {
                pending::<()>().await;
            }
        };

        let outcome = self
            .controller
            .submit(
                &self.gateway,
                text,
                |transcript| screen.redraw_transcript(transcript),
                cancel,
            )
            .await;

        match outcome {
            Ok(TurnOutcome::Ignored) => debug!("ignoring empty conspiracy"),
            Ok(outcome) => debug!(?outcome, "conspiracy turn ended"),
            Err(SubmitError::Busy) => warn!("a conspiracy is already streaming"),
        }
    }

    /// Settings dialog: edits apply to the live preferences immediately; only
    /// `save` persists them.
    async fn run_settings(&mut self, input: &mut InputLines) -> Result<(), AppError> {
        self.panel.open();
        let mut notice = None;

        while self.panel.is_open() {
            self.screen
                .draw_settings(self.controller.preferences(), notice.as_deref())?;
            notice = None;

            let line = tokio::select! {
                line = input.next_line() => line?,
                Ok(()) = signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                self.panel.close();
                break;
            };

            match parse_settings_command(&line) {
                SettingsCommand::Context(context) => self
                    .panel
                    .edit_context(self.controller.preferences_mut(), context),
                SettingsCommand::Spicyness(position) => {
                    self.panel
                        .edit_spicyness(self.controller.preferences_mut(), position);
                }
                SettingsCommand::Nudge(steps) => {
                    let nudged = self.controller.preferences().spicyness.nudge(steps);
                    self.panel
                        .edit_spicyness(self.controller.preferences_mut(), nudged.value());
                }
                SettingsCommand::Save => {
                    if let Err(err) = self.panel.save(self.controller.preferences(), &mut self.store)
                    {
                        warn!(error = %err, "failed to save conspiracy settings");
                        notice = Some(format!("could not save settings: {err}"));
                    }
                }
                SettingsCommand::Close => {
                    self.panel.close();
                }
                SettingsCommand::Invalid => {
                    notice = Some(format!("unknown setting command: {}", line.trim()));
                }
            }
        }

        Ok(())
    }
}

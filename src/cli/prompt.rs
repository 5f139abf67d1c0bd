//! Single-choice selection prompt.
//!
//! On a terminal the list is drawn in raw mode and navigated with the arrow keys, five entries
//! at a time. When stdin is piped, a numbered list is printed and a line is read instead.

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::ops::Range;

use crate::error::{Result, TraderError};

pub const PAGE_SIZE: usize = 5;
const MORE_CHOICES: &str = "(Move up and down to reveal more choices)";

/// Cursor and scroll window over a list of choices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptState {
    len: usize,
    page_size: usize,
    cursor: usize,
    offset: usize,
}

impl PromptState {
    pub fn new(len: usize, page_size: usize) -> Self {
        Self {
            len,
            page_size: page_size.max(1),
            cursor: 0,
            offset: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Indexes currently on screen
    pub fn visible(&self) -> Range<usize> {
        self.offset..(self.offset + self.page_size).min(self.len)
    }

    /// Whether some choices are off screen
    pub fn has_more(&self) -> bool {
        self.len > self.page_size
    }

    pub fn up(&mut self) {
        if self.len == 0 {
            return;
        }
        self.cursor = if self.cursor == 0 {
            self.len - 1
        } else {
            self.cursor - 1
        };
        self.scroll();
    }

    pub fn down(&mut self) {
        if self.len == 0 {
            return;
        }
        self.cursor = (self.cursor + 1) % self.len;
        self.scroll();
    }

    fn scroll(&mut self) {
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.page_size {
            self.offset = self.cursor + 1 - self.page_size;
        }
    }
}

/// Ask the operator to pick one of `choices`
pub fn select(title: &str, choices: &[String]) -> Result<String> {
    if choices.is_empty() {
        return Err(TraderError::Selection(format!("nothing to choose for: {}", title)));
    }

    if io::stdin().is_terminal() && io::stdout().is_terminal() {
        interactive_select(title, choices)
    } else {
        let stdin = io::stdin();
        line_select(stdin.lock(), io::stdout(), title, choices)
    }
}

/// Leaves raw mode however the prompt ends
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), cursor::Show);
    }
}

fn interactive_select(title: &str, choices: &[String]) -> Result<String> {
    let mut stdout = io::stdout();
    let mut state = PromptState::new(choices.len(), PAGE_SIZE);
    let _raw = RawModeGuard::enable()?;
    execute!(stdout, cursor::Hide)?;

    let mut drawn = render(&mut stdout, title, choices, &state, 0)?;
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(stdout, Print("\r\n"))?;
                return Err(TraderError::Cancelled);
            }
            KeyCode::Esc => {
                execute!(stdout, Print("\r\n"))?;
                return Err(TraderError::Cancelled);
            }
            KeyCode::Up | KeyCode::Char('k') => state.up(),
            KeyCode::Down | KeyCode::Char('j') => state.down(),
            KeyCode::Enter => {
                let choice = choices[state.cursor()].clone();
                clear_lines(&mut stdout, drawn)?;
                execute!(
                    stdout,
                    Print(title),
                    Print(" "),
                    SetForegroundColor(Color::Cyan),
                    Print(&choice),
                    ResetColor,
                    Print("\r\n")
                )?;
                return Ok(choice);
            }
            _ => continue,
        }

        drawn = render(&mut stdout, title, choices, &state, drawn)?;
    }
}

fn clear_lines(stdout: &mut io::Stdout, lines: u16) -> io::Result<()> {
    if lines > 0 {
        queue!(stdout, cursor::MoveToPreviousLine(lines))?;
    }
    queue!(stdout, terminal::Clear(ClearType::FromCursorDown))?;
    Ok(())
}

/// Redraw the prompt over the previous frame; returns how many lines were drawn
fn render(
    stdout: &mut io::Stdout,
    title: &str,
    choices: &[String],
    state: &PromptState,
    previous: u16,
) -> io::Result<u16> {
    clear_lines(stdout, previous)?;

    queue!(stdout, SetForegroundColor(Color::Green), Print("? "), ResetColor)?;
    queue!(stdout, Print(title), Print("\r\n"))?;
    let mut lines = 1;

    for index in state.visible() {
        if index == state.cursor() {
            queue!(
                stdout,
                SetForegroundColor(Color::Cyan),
                Print("> "),
                Print(&choices[index]),
                ResetColor
            )?;
        } else {
            queue!(stdout, Print("  "), Print(&choices[index]))?;
        }
        queue!(stdout, Print("\r\n"))?;
        lines += 1;
    }

    if state.has_more() {
        queue!(
            stdout,
            SetForegroundColor(Color::DarkGrey),
            Print(MORE_CHOICES),
            ResetColor,
            Print("\r\n")
        )?;
        lines += 1;
    }

    stdout.flush()?;
    Ok(lines)
}

/// Numbered fallback. Accepts the entry number or its exact name, case-insensitively.
pub fn line_select<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    title: &str,
    choices: &[String],
) -> Result<String> {
    writeln!(writer, "{}", title)?;
    for (n, choice) in choices.iter().enumerate() {
        writeln!(writer, "  {}) {}", n + 1, choice)?;
    }

    let mut line = String::new();
    loop {
        write!(writer, "> ")?;
        writer.flush()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(TraderError::Cancelled);
        }
        let answer = line.trim();

        if let Ok(n) = answer.parse::<usize>() {
            if (1..=choices.len()).contains(&n) {
                return Ok(choices[n - 1].clone());
            }
        }
        if let Some(choice) = choices.iter().find(|c| c.eq_ignore_ascii_case(answer)) {
            return Ok(choice.clone());
        }

        writeln!(writer, "Pick a number between 1 and {}", choices.len())?;
    }
}

use crate::application::todo_service::{Prompter, TodoService};
use crate::domain::todo::TodoState;
use crate::infrastructure::calendar_gateway::CalendarGateway;
use crate::infrastructure::error::InfraError;
use log::debug;
use std::fmt;
use std::io::{BufRead, Write};

pub const PROMPT: &str = "> ";
pub const HELP: &str = "Valid commands: a, r, p, l, ok, re, rm, mk, al, q";
const FALLBACK_TERMINAL_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Back,
    Forward,
    PrintOffset,
    List,
    Mark(String),
    Reopen(String),
    Remove(String),
    Make(String),
    AllDay(String),
    Quit,
}

/// Malformed input; displays as the line to show the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageError(&'static str);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for UsageError {}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, UsageError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(None);
        };
        let args = tokens.collect::<Vec<_>>();

        let command = match name {
            "a" => Self::Back,
            "r" => Self::Forward,
            "p" => Self::PrintOffset,
            "l" => Self::List,
            "q" => Self::Quit,
            "ok" => Self::Mark(single_arg(&args, "ok <substring of event name to mark as done>")?),
            "re" => Self::Reopen(single_arg(&args, "re <substring of event name to reopen>")?),
            "rm" => Self::Remove(single_arg(&args, "rm <substring of event name to remove>")?),
            "al" => Self::AllDay(single_arg(
                &args,
                "al <substring of timed event name to convert>",
            )?),
            "mk" => {
                if args.is_empty() {
                    return Err(UsageError("mk <name of event to add>"));
                }
                Self::Make(args.join(" "))
            }
            _ => return Err(UsageError(HELP)),
        };
        Ok(Some(command))
    }
}

fn single_arg(args: &[&str], usage: &'static str) -> Result<String, UsageError> {
    match args {
        [value] => Ok((*value).to_string()),
        _ => Err(UsageError(usage)),
    }
}

/// Interactive state carried between commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    pub day_offset: i64,
}

/// Line-oriented terminal: the REPL reads commands and confirmations from it.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R, W> Console<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Writes `prompt` and reads one line without its terminator; `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, InfraError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn say(&mut self, message: impl fmt::Display) -> Result<(), InfraError> {
        writeln!(self.output, "{message}")?;
        Ok(())
    }
}

impl<R, W> Prompter for Console<R, W>
where
    R: BufRead,
    W: Write,
{
    fn confirm(&mut self, prompt: &str) -> Result<bool, InfraError> {
        Ok(self.ask(prompt)?.as_deref() == Some("y"))
    }
}

pub struct Repl<G, R, W>
where
    G: CalendarGateway,
{
    service: TodoService<G>,
    console: Console<R, W>,
    session: Session,
    terminal_width: fn() -> usize,
}

impl<G, R, W> Repl<G, R, W>
where
    G: CalendarGateway,
    R: BufRead,
    W: Write,
{
    pub fn new(service: TodoService<G>, console: Console<R, W>) -> Self {
        Self {
            service,
            console,
            session: Session::default(),
            terminal_width,
        }
    }

    pub fn with_terminal_width(mut self, terminal_width: fn() -> usize) -> Self {
        self.terminal_width = terminal_width;
        self
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn into_parts(self) -> (TodoService<G>, Console<R, W>) {
        (self.service, self.console)
    }

    /// Reads commands until `q` or end of input. Usage mistakes are reported
    /// and the loop continues; calendar and authorization errors end it.
    pub async fn run(&mut self) -> Result<(), InfraError> {
        while let Some(line) = self.console.ask(PROMPT)? {
            let command = match Command::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(usage) => {
                    self.console.say(usage)?;
                    continue;
                }
            };
            debug!("event=command status=start command={command:?} offset={}", self.session.day_offset);
            if command == Command::Quit {
                break;
            }
            self.execute(command).await?;
        }
        self.console.output.flush()?;
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<(), InfraError> {
        let offset = self.session.day_offset;
        let outcome = match command {
            Command::Back => {
                self.session.day_offset = offset.saturating_sub(1);
                return Ok(());
            }
            Command::Forward => {
                self.session.day_offset = offset.saturating_add(1);
                return Ok(());
            }
            Command::PrintOffset => return self.console.say(format_args!("delta = {offset}")),
            Command::List => {
                let state = self.service.snapshot(offset).await?;
                let width = (self.terminal_width)();
                render_state(&state, width, &mut self.console.output)?;
                return Ok(());
            }
            Command::Quit => return Ok(()),
            Command::Mark(needle) => self.service.mark(offset, &needle).await?,
            Command::Reopen(needle) => self.service.unmark(offset, &needle).await?,
            Command::Remove(needle) => self.service.remove(offset, &needle, &mut self.console).await?,
            Command::Make(name) => self.service.make(offset, &name).await?,
            Command::AllDay(needle) => self.service.normalize_all_day(offset, &needle).await?,
        };
        self.console.say(outcome)
    }
}

/// Done names, a dashed rule as wide as the terminal, then pending names.
pub fn render_state<W>(state: &TodoState, width: usize, out: &mut W) -> Result<(), InfraError>
where
    W: Write,
{
    for entry in &state.done {
        writeln!(out, "{}", entry.name())?;
    }
    writeln!(out, "{}", "-".repeat(width))?;
    for entry in &state.pending {
        writeln!(out, "{}", entry.name())?;
    }
    Ok(())
}

pub fn terminal_width() -> usize {
    match crossterm::terminal::size() {
        Ok((columns, _)) if columns > 0 => usize::from(columns),
        _ => FALLBACK_TERMINAL_WIDTH,
    }
}

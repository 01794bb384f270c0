//! Line-oriented edit scripts.
//!
//! One command per line; blank lines and lines starting with `#` are skipped.
//! Text arguments run to the end of the line and understand `\n`, `\t` and
//! `\\` escapes.

use anyhow::{Context, Result, anyhow, bail};
use core_document::{Document, Justification};
use core_model::RichTextModel;
use std::io::Write;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Type text one character at a time, like keystrokes.
    Type(String),
    /// Insert text as a single batch.
    Insert(String),
    Backspace(usize),
    Delete(usize),
    Select(usize, usize),
    Tag(String),
    Untag(String),
    Justify(Justification),
    Rich,
    Plain,
    Undo(usize),
    Redo(usize),
    Begin,
    End,
    Print,
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn count(arg: Option<&str>) -> Result<usize> {
    match arg {
        None => Ok(1),
        Some(s) => s.parse().with_context(|| format!("invalid count `{s}`")),
    }
}

fn justification(arg: &str) -> Result<Justification> {
    match arg {
        "left" => Ok(Justification::Left),
        "center" => Ok(Justification::Center),
        "right" => Ok(Justification::Right),
        "fill" => Ok(Justification::Fill),
        other => bail!("unknown justification `{other}`"),
    }
}

/// Parse one script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let (word, rest) = match trimmed.split_once(' ') {
        Some((w, r)) => (w, r),
        None => (trimmed.trim_end(), ""),
    };
    let mut args = rest.split_whitespace();
    let cmd = match word {
        "type" => Command::Type(unescape(rest)),
        "insert" => Command::Insert(unescape(rest)),
        "backspace" => Command::Backspace(count(args.next())?),
        "delete" => Command::Delete(count(args.next())?),
        "select" => {
            let start: usize = args
                .next()
                .ok_or_else(|| anyhow!("select needs a position"))?
                .parse()
                .context("invalid select start")?;
            let end = match args.next() {
                Some(e) => e.parse().context("invalid select end")?,
                None => start,
            };
            Command::Select(start, end)
        }
        "tag" | "untag" => {
            let name = args
                .next()
                .ok_or_else(|| anyhow!("{word} needs a tag name"))?
                .to_string();
            if word == "tag" {
                Command::Tag(name)
            } else {
                Command::Untag(name)
            }
        }
        "justify" => Command::Justify(justification(
            args.next().ok_or_else(|| anyhow!("justify needs a value"))?,
        )?),
        "rich" => Command::Rich,
        "plain" => Command::Plain,
        "undo" => Command::Undo(count(args.next())?),
        "redo" => Command::Redo(count(args.next())?),
        "begin" => Command::Begin,
        "end" => Command::End,
        "print" => Command::Print,
        other => bail!("unknown command `{other}`"),
    };
    Ok(Some(cmd))
}

/// Drives a model from parsed commands, writing `print` output to `out`.
pub struct Interpreter<W: Write> {
    model: RichTextModel,
    out: W,
    open_groups: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(model: RichTextModel, out: W) -> Self {
        Self {
            model,
            out,
            open_groups: 0,
        }
    }

    pub fn model(&self) -> &RichTextModel {
        &self.model
    }

    pub fn into_parts(self) -> (RichTextModel, W) {
        (self.model, self.out)
    }

    /// Run every line of `script`. Errors carry the offending line number.
    pub fn run(&mut self, script: &str) -> Result<()> {
        for (idx, line) in script.lines().enumerate() {
            let lineno = idx + 1;
            let Some(cmd) = parse_line(line).with_context(|| format!("line {lineno}"))? else {
                continue;
            };
            self.execute(cmd).with_context(|| format!("line {lineno}"))?;
        }
        self.close_groups();
        Ok(())
    }

    pub fn execute(&mut self, cmd: Command) -> Result<()> {
        debug!(target: "cli", command = ?CommandName(&cmd), "execute");
        match cmd {
            Command::Type(text) => {
                for c in text.chars() {
                    self.model.type_char(c);
                }
            }
            Command::Insert(text) => self.model.insert_text(&text),
            Command::Backspace(n) => {
                for _ in 0..n {
                    self.model.backspace();
                }
            }
            Command::Delete(n) => {
                for _ in 0..n {
                    self.model.delete_forward();
                }
            }
            Command::Select(start, end) => self.model.select(start, end),
            Command::Tag(name) => self.model.set_tag(&name, true),
            Command::Untag(name) => self.model.set_tag(&name, false),
            Command::Justify(j) => self.model.set_justification(j),
            Command::Rich => self.model.set_rich_text(true),
            Command::Plain => self.model.set_rich_text(false),
            Command::Undo(n) => {
                for _ in 0..n {
                    if !self.model.undo() {
                        debug!(target: "cli", "undo_stack_empty");
                        break;
                    }
                }
            }
            Command::Redo(n) => {
                for _ in 0..n {
                    if !self.model.redo() {
                        debug!(target: "cli", "redo_stack_empty");
                        break;
                    }
                }
            }
            Command::Begin => {
                self.model.undo_engine_mut().begin_transaction();
                self.open_groups += 1;
            }
            Command::End => {
                if self.open_groups == 0 {
                    bail!("`end` without matching `begin`");
                }
                self.model.undo_engine_mut().end_transaction();
                self.open_groups -= 1;
            }
            Command::Print => self.print()?,
        }
        for event in self.model.drain_notifications() {
            info!(target: "cli", event = event.name(), "notification");
        }
        Ok(())
    }

    fn close_groups(&mut self) {
        if self.open_groups > 0 {
            warn!(target: "cli", open = self.open_groups, "unterminated_groups_closed");
        }
        while self.open_groups > 0 {
            self.model.undo_engine_mut().end_transaction();
            self.open_groups -= 1;
        }
    }

    /// Write the document text followed by one line per tag span.
    pub fn print(&mut self) -> Result<()> {
        let doc = self.model.doc();
        writeln!(self.out, "{:?}", doc.content())?;
        for (tag, range) in doc.tag_spans() {
            let name = doc.tags().name(tag).unwrap_or("?");
            writeln!(self.out, "  {name} {}..{}", range.start, range.end)?;
        }
        let (start, end) = doc.selection();
        let engine = self.model.undo_engine();
        writeln!(
            self.out,
            "  selection {start}..{end} undo {} redo {}",
            engine.undo_depth(),
            engine.redo_depth()
        )?;
        Ok(())
    }
}

/// Logs the command kind without its text payload.
struct CommandName<'a>(&'a Command);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.0 {
            Command::Type(_) => "type",
            Command::Insert(_) => "insert",
            Command::Backspace(_) => "backspace",
            Command::Delete(_) => "delete",
            Command::Select(..) => "select",
            Command::Tag(_) => "tag",
            Command::Untag(_) => "untag",
            Command::Justify(_) => "justify",
            Command::Rich => "rich",
            Command::Plain => "plain",
            Command::Undo(_) => "undo",
            Command::Redo(_) => "redo",
            Command::Begin => "begin",
            Command::End => "end",
            Command::Print => "print",
        };
        f.write_str(name)
    }
}

//! Terminal command parsing

use duo_common::hypothesis::Side;
use duo_common::reconcile::CellKey;
use duo_common::session::{Input, Session, Stage};
use duo_common::{Error, Result};

/// One line typed by the participant
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Show,
    Quit,
    Email(String),
    Assign(Side, Vec<String>),
    Unknown,
    Comment(String),
    Continue,
    Toggle(CellKey),
    Sort(String),
    Next,
    Refresh,
    Done,
    Comments(Option<String>),
}

fn column_list(rest: &str) -> Vec<String> {
    rest.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required<'a>(command: &str, rest: &'a str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(Error::InvalidInput(format!("`{}` needs an argument", command)))
    } else {
        Ok(rest)
    }
}

/// `toggle 3 name`, `toggle 3_name`
fn parse_cell(rest: &str) -> Result<CellKey> {
    match rest.split_once(char::is_whitespace) {
        Some((position, column)) if !position.contains('_') => {
            let position = position
                .parse()
                .map_err(|_| Error::InvalidInput(format!("{:?} is not a row number", position)))?;
            Ok(CellKey::new(position, column.trim()))
        }
        _ => rest.parse(),
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "show" | "" => Command::Show,
            "quit" | "exit" => Command::Quit,
            "email" => Command::Email(required(word, rest)?.to_string()),
            "lhs" => Command::Assign(Side::Lhs, column_list(rest)),
            "rhs" => Command::Assign(Side::Rhs, column_list(rest)),
            "unknown" => Command::Unknown,
            "comment" => Command::Comment(rest.to_string()),
            "continue" => Command::Continue,
            "toggle" => Command::Toggle(parse_cell(required(word, rest)?)?),
            "sort" => Command::Sort(required(word, rest)?.to_string()),
            "next" | "submit" => Command::Next,
            "refresh" => Command::Refresh,
            "done" => Command::Done,
            "comments" => Command::Comments(Some(rest.to_string()).filter(|c| !c.is_empty())),
            "skip" => Command::Comments(None),
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown command {:?}, try `help`",
                    other
                )))
            }
        };
        Ok(command)
    }

    /// Session input for this command; `None` for purely local commands
    pub fn into_input(self, session: &Session) -> Option<Input> {
        let input = match self {
            Command::Help | Command::Show | Command::Quit => return None,
            Command::Email(email) => Input::SubmitEmail(email),
            Command::Assign(side, columns) => Input::Assign { side, columns },
            Command::Unknown => {
                let current = match session.stage() {
                    Stage::Briefing(b) => b.hypothesis.is_unknown(),
                    Stage::Interact(i) => i.hypothesis.is_unknown(),
                    _ => false,
                };
                Input::SetUnknown(!current)
            }
            Command::Comment(text) => Input::SetComment(text),
            Command::Continue => Input::ConfirmBriefing,
            Command::Toggle(key) => Input::ToggleCell(key),
            Command::Sort(column) => Input::Sort(column),
            Command::Next => Input::SubmitFeedback,
            Command::Refresh => Input::Refresh,
            Command::Done => Input::FinishScenario,
            Command::Comments(comments) => Input::SubmitComments(comments),
        };
        Some(input)
    }
}

//! Commands typed at the dashboard prompt.

use client_core::validation::{LoginForm, PasswordChangeForm, RegistrationForm};
use shared::domain::CollectionView;
use thiserror::Error;

#[derive(Debug)]
pub enum Command {
    Login(LoginForm),
    Register(RegistrationForm),
    Logout,
    ChangePassword(PasswordChangeForm),
    WhoAmI,
    Views,
    View(CollectionView),
    Next,
    Previous,
    Refresh,
    /// Re-issues the last failed fetch ("Try Again").
    Retry,
    Search(String),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}'; type 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    UnknownView(String),
}

pub const HELP: &str = "\
commands:
  login <email> <password>
  register <first> <last> <email> <password> <confirm>
  passwd <current> <new> <confirm>
  logout | whoami
  views                  list collections
  view <collection>      open a collection (e.g. view artifact-jobs)
  search [text]          filter the open collection (empty clears)
  next | prev | refresh
  retry                  try the last fetch again
  help | quit";

/// Parses one prompt line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    let Some((verb, rest)) = split_verb(line) else {
        return Ok(None);
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "login" => match args.as_slice() {
            [email, password] => Command::Login(LoginForm::new(*email, *password)),
            _ => return Err(ParseError::Usage("login <email> <password>")),
        },
        "register" => match args.as_slice() {
            [first, last, email, password, confirm] => Command::Register(RegistrationForm {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                confirm_password: confirm.to_string(),
            }),
            _ => {
                return Err(ParseError::Usage(
                    "register <first> <last> <email> <password> <confirm>",
                ))
            }
        },
        "passwd" | "change-password" => match args.as_slice() {
            [current, new, confirm] => {
                Command::ChangePassword(PasswordChangeForm::new(*current, *new, *confirm))
            }
            _ => return Err(ParseError::Usage("passwd <current> <new> <confirm>")),
        },
        "logout" => Command::Logout,
        "whoami" => Command::WhoAmI,
        "views" => Command::Views,
        "view" | "open" => match args.as_slice() {
            [name] => Command::View(name.parse().map_err(ParseError::UnknownView)?),
            _ => return Err(ParseError::Usage("view <collection>")),
        },
        "next" | "n" => Command::Next,
        "prev" | "previous" | "p" => Command::Previous,
        "refresh" => Command::Refresh,
        "retry" => Command::Retry,
        // Search text keeps its inner spacing.
        "search" | "/" => Command::Search(rest.trim().to_string()),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn split_verb(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(line.split_once(char::is_whitespace).unwrap_or((line, "")))
}

//! Line-oriented command syntax of the interactive prompt.
//!
//! ```text
//! select <slot>             make <slot> the target of transport commands
//! next                      cycle the active player
//! play | pause | stop       transport for the active player
//! set <slot> <uri> [name=<text>] [user=<u>] [pass=<p>]
//! seek-start                grab the seek control
//! seek-drag <ms>            move it
//! seek-commit <ms>          release it
//! surface <slot> <id>       bind a render surface
//! unsurface <slot>          unbind it
//! restart <slot>            rebuild the player's pipeline
//! lib                       list saved streams
//! lib add <uri> [fields]    save a stream
//! lib edit <i> <uri> [fields]
//! lib rm <i>
//! lib use <i>               stream entry <i> on the active player
//! status | help | quit
//! ```

use viewer::{PlayerConfiguration, SurfaceHandle};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),
    #[error("`{0}` is missing an argument")]
    MissingArgument(&'static str),
    #[error("`{command}`: {value:?} is not a number")]
    NotANumber {
        command: &'static str,
        value: String,
    },
    #[error("`{command}`: unexpected {token:?} (fields are name=, user=, pass=)")]
    UnexpectedToken {
        command: &'static str,
        token: String,
    },
}

/// One parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Select(usize),
    Next,
    Play,
    Pause,
    Stop,
    Set(usize, PlayerConfiguration),
    SeekStart,
    SeekDrag(u64),
    SeekCommit(u64),
    Surface(usize, SurfaceHandle),
    Unsurface(usize),
    Restart(usize),
    LibraryList,
    LibraryAdd(PlayerConfiguration),
    LibraryEdit(usize, PlayerConfiguration),
    LibraryRemove(usize),
    LibraryUse(usize),
    Status,
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
commands:
  select <slot>                           choose the active player
  next                                    cycle the active player
  play | pause | stop                     transport for the active player
  set <slot> <uri> [fields]               replace a player's stream
  seek-start | seek-drag <ms> | seek-commit <ms>
  surface <slot> <id> | unsurface <slot>
  restart <slot>
  lib                                     list saved streams
  lib add <uri> [fields] | lib edit <i> <uri> [fields]
  lib rm <i> | lib use <i>                delete, or play on the active player
  status | help | quit

fields: name=<text...> user=<user> pass=<password>";

fn number<T: std::str::FromStr>(
    command: &'static str,
    arg: Option<&str>,
) -> Result<T, ParseError> {
    let value = arg.ok_or(ParseError::MissingArgument(command))?;
    value.parse().map_err(|_| ParseError::NotANumber {
        command,
        value: value.to_string(),
    })
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Name,
    User,
    Pass,
}

impl Field {
    fn of(config: &mut PlayerConfiguration, field: Field) -> &mut String {
        match field {
            Field::Name => &mut config.name,
            Field::User => &mut config.user,
            Field::Pass => &mut config.pass,
        }
    }
}

/// `<uri> [name=..] [user=..] [pass=..]`. A bare word continues the
/// previous field, so names may contain spaces.
fn stream<'a>(
    command: &'static str,
    mut words: impl Iterator<Item = &'a str>,
) -> Result<PlayerConfiguration, ParseError> {
    let uri = words.next().ok_or(ParseError::MissingArgument(command))?;
    let mut config = PlayerConfiguration::new(uri);
    let mut current = None;
    for word in words {
        let (field, value) = match word.split_once('=') {
            Some(("name", value)) => (Field::Name, value),
            Some(("user", value)) => (Field::User, value),
            Some(("pass", value)) => (Field::Pass, value),
            _ => {
                let Some(field) = current else {
                    return Err(ParseError::UnexpectedToken {
                        command,
                        token: word.to_string(),
                    });
                };
                let text = Field::of(&mut config, field);
                text.push(' ');
                text.push_str(word);
                continue;
            }
        };
        *Field::of(&mut config, field) = value.to_string();
        current = Some(field);
    }
    Ok(config)
}

impl Input {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Input::Empty);
        };

        let input = match command.to_ascii_lowercase().as_str() {
            "select" => Input::Select(number("select", words.next())?),
            "next" => Input::Next,
            "play" => Input::Play,
            "pause" => Input::Pause,
            "stop" => Input::Stop,
            "set" => Input::Set(number("set", words.next())?, stream("set", words)?),
            "seek-start" => Input::SeekStart,
            "seek-drag" => Input::SeekDrag(number("seek-drag", words.next())?),
            "seek-commit" => Input::SeekCommit(number("seek-commit", words.next())?),
            "surface" => Input::Surface(
                number("surface", words.next())?,
                SurfaceHandle(number("surface", words.next())?),
            ),
            "unsurface" => Input::Unsurface(number("unsurface", words.next())?),
            "restart" => Input::Restart(number("restart", words.next())?),
            "lib" => match words.next() {
                None | Some("list") => Input::LibraryList,
                Some("add") => Input::LibraryAdd(stream("lib add", words)?),
                Some("edit") => {
                    Input::LibraryEdit(number("lib edit", words.next())?, stream("lib edit", words)?)
                }
                Some("rm") => Input::LibraryRemove(number("lib rm", words.next())?),
                Some("use") => Input::LibraryUse(number("lib use", words.next())?),
                Some(other) => return Err(ParseError::Unknown(format!("lib {other}"))),
            },
            "status" => Input::Status,
            "help" | "?" => Input::Help,
            "quit" | "exit" => Input::Quit,
            _ => return Err(ParseError::Unknown(command.to_string())),
        };
        Ok(input)
    }
}

//! Terminal command parsing

/// A user action typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Place { row: usize, col: usize, letter: char },
    Submit,
    RequestState,
    ShowBoard,
    ShowLog,
    ShowPlayers,
    Leave,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: place <row> <col> <letter>")]
    PlaceUsage,
    #[error("`{0}` is not a board coordinate")]
    BadCoordinate(String),
    #[error("`{0}` is not a single letter")]
    BadLetter(String),
}

pub const HELP: &str = "\
commands:
  place <row> <col> <letter>  stage a tile (0-based coordinates)
  submit                      send staged tiles
  state                       ask the server for a fresh snapshot
  board | log | players       show local state
  leave                       leave the game";

impl UserCommand {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(ParseError::Empty)?;

        let command = match verb.to_ascii_lowercase().as_str() {
            "place" | "p" => {
                let (Some(row), Some(col), Some(letter), None) =
                    (words.next(), words.next(), words.next(), words.next())
                else {
                    return Err(ParseError::PlaceUsage);
                };
                UserCommand::Place {
                    row: coordinate(row)?,
                    col: coordinate(col)?,
                    letter: single_letter(letter)?,
                }
            }
            "submit" | "s" => UserCommand::Submit,
            "state" | "refresh" => UserCommand::RequestState,
            "board" | "b" => UserCommand::ShowBoard,
            "log" => UserCommand::ShowLog,
            "players" => UserCommand::ShowPlayers,
            "leave" | "quit" | "exit" => UserCommand::Leave,
            "help" | "?" => UserCommand::Help,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn coordinate(word: &str) -> Result<usize, ParseError> {
    word.parse()
        .map_err(|_| ParseError::BadCoordinate(word.to_string()))
}

fn single_letter(word: &str) -> Result<char, ParseError> {
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_alphabetic() => Ok(c.to_ascii_uppercase()),
        _ => Err(ParseError::BadLetter(word.to_string())),
    }
}

//! Elevator command vocabulary

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Travel direction of a hall call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Direction needed to travel from `origin` to `destination`
    pub fn between(origin: u32, destination: u32) -> Self {
        if destination > origin {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the text protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request an elevator at `floor` heading `direction`
    Call { floor: u32, direction: Direction },
    /// Select a destination floor from inside the car
    Go { floor: u32 },
    /// Ask for the state of every elevator
    Status,
}

impl Command {
    /// Newline-terminated wire form
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Call { floor, direction } => write!(f, "call {} {}", floor, direction),
            Command::Go { floor } => write!(f, "go {}", floor),
            Command::Status => f.write_str("status"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Invalid floor: {0}")]
    InvalidFloor(String),
    #[error("Invalid direction: {0}")]
    InvalidDirection(String),
    #[error("Wrong number of arguments for {0}")]
    Arity(&'static str),
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err(CommandParseError::Empty);
        };
        let args: Vec<&str> = parts.collect();

        let floor = |raw: &str| {
            raw.parse::<u32>()
                .map_err(|_| CommandParseError::InvalidFloor(raw.to_string()))
        };

        match verb {
            "status" if args.is_empty() => Ok(Command::Status),
            "status" => Err(CommandParseError::Arity("status")),
            "go" => match args.as_slice() {
                [f] => Ok(Command::Go { floor: floor(*f)? }),
                _ => Err(CommandParseError::Arity("go")),
            },
            "call" => match args.as_slice() {
                [f, d] => {
                    let direction = match *d {
                        "up" => Direction::Up,
                        "down" => Direction::Down,
                        other => return Err(CommandParseError::InvalidDirection(other.to_string())),
                    };
                    Ok(Command::Call {
                        floor: floor(*f)?,
                        direction,
                    })
                }
                _ => Err(CommandParseError::Arity("call")),
            },
            other => Err(CommandParseError::Unknown(other.to_string())),
        }
    }
}

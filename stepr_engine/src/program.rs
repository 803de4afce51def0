//! Text motion programs.
//!
//! One command per line:
//!
//! ```text
//! # comment
//! move <distance_mm> <duration_s> [accel]
//! pause <duration_s>
//! loop <id> <count>
//! endloop <id> <count>
//! ```
//!
//! `loop`/`endloop` pairs must nest. The `endloop` count sets the number of
//! passes; the count on the `loop` line is informational. A negative count
//! repeats until the motor is stopped.

use crate::controller::Controller;
use crate::error::EngineError;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use stepr_common::consts::DEFAULT_ACCEL;
use thiserror::Error;
use tracing::debug;

/// Program parse or queueing failure.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// Malformed line.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// `endloop` without a matching open `loop`.
    #[error("line {line}: endloop {id} does not close the innermost open loop")]
    UnbalancedLoop {
        /// 1-based line number.
        line: usize,
        /// Loop id on the `endloop`.
        id: i64,
    },

    /// `loop` never closed.
    #[error("line {line}: loop {id} is never closed")]
    UnclosedLoop {
        /// 1-based line number of the `loop`.
        line: usize,
        /// Loop id.
        id: i64,
    },

    /// Program file unreadable.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// OS error.
        source: std::io::Error,
    },

    /// The engine rejected a command.
    #[error("line {line}: {source}")]
    Engine {
        /// 1-based line number.
        line: usize,
        /// Engine error.
        source: EngineError,
    },
}

/// One parsed program line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramLine {
    /// Ramped move.
    Move {
        /// Signed distance [mm].
        distance: f64,
        /// Duration [s].
        duration: f64,
        /// Acceleration factor; engine default when absent.
        accel: Option<f64>,
    },
    /// Pause with the coil released.
    Pause {
        /// Duration [s].
        duration: f64,
    },
    /// Loop start.
    Loop {
        /// Loop id.
        id: i64,
        /// Iterations as written; not used when queueing.
        count: i64,
    },
    /// Loop end.
    EndLoop {
        /// Loop id.
        id: i64,
        /// Iterations (negative = infinite).
        count: i64,
    },
}

/// A parsed, loop-balanced program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    lines: Vec<(usize, ProgramLine)>,
}

fn field<T: FromStr>(line: usize, fields: &[&str], index: usize, what: &str) -> Result<T, ProgramError> {
    let raw = fields.get(index).ok_or_else(|| ProgramError::Parse {
        line,
        message: format!("missing {what}"),
    })?;
    raw.parse().map_err(|_| ProgramError::Parse {
        line,
        message: format!("invalid {what} '{raw}'"),
    })
}

fn expect_fields(line: usize, fields: &[&str], min: usize, max: usize) -> Result<(), ProgramError> {
    let args = fields.len() - 1;
    if args < min || args > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(ProgramError::Parse {
            line,
            message: format!("'{}' takes {expected} arguments, got {args}", fields[0]),
        });
    }
    Ok(())
}

impl ProgramLine {
    fn parse(line: usize, text: &str) -> Result<Option<Self>, ProgramError> {
        let text = text.split('#').next().unwrap_or("").trim();
        if text.is_empty() {
            return Ok(None);
        }
        let fields: Vec<&str> = text.split_whitespace().collect();

        let parsed = match fields[0] {
            "move" => {
                expect_fields(line, &fields, 2, 3)?;
                ProgramLine::Move {
                    distance: field(line, &fields, 1, "distance")?,
                    duration: field(line, &fields, 2, "duration")?,
                    accel: if fields.len() > 3 {
                        Some(field(line, &fields, 3, "acceleration")?)
                    } else {
                        None
                    },
                }
            }
            "pause" => {
                expect_fields(line, &fields, 1, 1)?;
                ProgramLine::Pause {
                    duration: field(line, &fields, 1, "duration")?,
                }
            }
            "loop" | "endloop" => {
                expect_fields(line, &fields, 2, 2)?;
                let id = field(line, &fields, 1, "loop id")?;
                let count = field(line, &fields, 2, "loop count")?;
                if count == 0 {
                    return Err(ProgramError::Parse {
                        line,
                        message: "loop count must be non-zero".to_string(),
                    });
                }
                if fields[0] == "loop" {
                    ProgramLine::Loop { id, count }
                } else {
                    ProgramLine::EndLoop { id, count }
                }
            }
            other => {
                return Err(ProgramError::Parse {
                    line,
                    message: format!("unknown command '{other}'"),
                });
            }
        };
        Ok(Some(parsed))
    }
}

impl Program {
    /// Parse program text and check loop balance.
    pub fn parse(text: &str) -> Result<Self, ProgramError> {
        let mut lines = Vec::new();
        let mut open: Vec<(usize, i64)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let Some(parsed) = ProgramLine::parse(line, raw)? else {
                continue;
            };
            match parsed {
                ProgramLine::Loop { id, .. } => open.push((line, id)),
                ProgramLine::EndLoop { id, .. } => match open.pop() {
                    Some((_, open_id)) if open_id == id => {}
                    _ => return Err(ProgramError::UnbalancedLoop { line, id }),
                },
                _ => {}
            }
            lines.push((line, parsed));
        }

        if let Some((line, id)) = open.pop() {
            return Err(ProgramError::UnclosedLoop { line, id });
        }
        Ok(Self { lines })
    }

    /// Read and parse a program file.
    pub fn load(path: &Path) -> Result<Self, ProgramError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProgramError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let program = Self::parse(&text)?;
        debug!("Loaded {} program lines from {}", program.len(), path.display());
        Ok(program)
    }

    /// Parsed lines in order.
    pub fn lines(&self) -> impl Iterator<Item = &ProgramLine> {
        self.lines.iter().map(|(_, l)| l)
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// No commands.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append the program to `motor`'s queue.
    ///
    /// Loop ends reference the queue index returned for their loop start, so
    /// the program may be appended after existing commands. Stops at the
    /// first rejected command; commands queued before it stay queued.
    pub fn queue_on(&self, controller: &Controller, motor: usize) -> Result<(), ProgramError> {
        let mut starts: Vec<usize> = Vec::new();
        for (line, command) in &self.lines {
            let line = *line;
            let engine = |source: EngineError| ProgramError::Engine { line, source };
            match *command {
                ProgramLine::Move {
                    distance,
                    duration,
                    accel,
                } => controller
                    .queue_move(motor, distance, duration, accel.unwrap_or(DEFAULT_ACCEL))
                    .map_err(engine)?,
                ProgramLine::Pause { duration } => {
                    controller.queue_pause(motor, duration).map_err(engine)?
                }
                ProgramLine::Loop { .. } => {
                    starts.push(controller.queue_loop_start(motor).map_err(engine)?)
                }
                ProgramLine::EndLoop { id, count } => {
                    let start = starts
                        .pop()
                        .ok_or(ProgramError::UnbalancedLoop { line, id })?;
                    controller
                        .queue_loop_end(motor, start, count)
                        .map_err(engine)?
                }
            }
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

//! Command definitions
//!
//! A command is an ordered list of arguments sent as one request.

use std::fmt;

/// A request to send to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    /// Start a command with its name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Build from already split arguments
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a REPL line on whitespace, verbatim otherwise.
    ///
    /// Returns None for a blank line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let args: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if args.is_empty() {
            None
        } else {
            Some(Self { args })
        }
    }

    /// Command name as typed (first argument)
    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// All arguments including the name
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Target index if this is `SELECT <n>`
    pub fn select_target(&self) -> Option<usize> {
        if !self.name().eq_ignore_ascii_case("SELECT") || self.args.len() != 2 {
            return None;
        }
        self.args[1].parse().ok()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

//! Command parsing for the command line

use crate::exercise::tier::Tier;

/// Parsed command from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Quit the application: :q or :quit
    Quit,
    /// Show help: :help or :h
    Help,
    /// Switch tier for the active block: :tier <guided|challenge|expert>
    Tier(Tier),
    /// Reveal a hint: :hint [n], defaulting to the selected blank
    Hint(Option<usize>),
    /// Reveal an answer: :answer [n]
    Answer(Option<usize>),
    /// Reveal the full solution: :solution
    Solution,
    /// Toggle the preview with revealed answers: :answers
    Answers,
    /// Verify the current step: :verify
    Verify,
    /// Next step: :next
    Next,
    /// Previous step: :prev
    Prev,
    /// Jump to a step by 1-indexed number: :goto <n>
    Goto(usize),
    /// Reset the current step, or step n: :reset [n]
    Reset(Option<usize>),
    /// Forget all progress for the lab: :reset-lab
    ResetLab,
    /// Clear message: (empty command)
    Nop,
}

/// Result of parsing a command
#[derive(Debug, PartialEq, Eq)]
pub enum ParseResult {
    /// Successfully parsed command
    Ok(Command),
    /// Unknown command
    UnknownCommand(String),
    /// Command needs an argument
    MissingArgument(String),
    /// Argument could not be understood
    InvalidArgument { command: String, argument: String },
}

/// Parse a 1-indexed number argument into a 0-indexed one
fn index_arg(command: &str, args: &str) -> Result<Option<usize>, ParseResult> {
    if args.is_empty() {
        return Ok(None);
    }
    match args.parse::<usize>() {
        Ok(n) if n > 0 => Ok(Some(n - 1)),
        _ => Err(ParseResult::InvalidArgument { command: command.to_string(), argument: args.to_string() }),
    }
}

/// Parse a command string (without the leading :)
pub fn parse_command(input: &str) -> ParseResult {
    let input = input.trim();

    if input.is_empty() {
        return ParseResult::Ok(Command::Nop);
    }

    let mut parts = input.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("");
    let args = parts.next().map(|s| s.trim()).unwrap_or("");

    let parsed = match cmd.to_lowercase().as_str() {
        "quit" | "q" => Ok(Command::Quit),
        "help" | "h" => Ok(Command::Help),
        "tier" | "t" => {
            if args.is_empty() {
                return ParseResult::MissingArgument("tier".to_string());
            }
            args.parse::<Tier>().map(Command::Tier).map_err(|_| ParseResult::InvalidArgument {
                command: "tier".to_string(),
                argument: args.to_string(),
            })
        }
        "hint" => index_arg("hint", args).map(Command::Hint),
        "answer" | "ans" => index_arg("answer", args).map(Command::Answer),
        "solution" | "sol" => Ok(Command::Solution),
        "answers" => Ok(Command::Answers),
        "verify" | "v" => Ok(Command::Verify),
        "next" | "n" => Ok(Command::Next),
        "prev" | "p" => Ok(Command::Prev),
        "goto" | "g" => {
            if args.is_empty() {
                return ParseResult::MissingArgument("goto".to_string());
            }
            index_arg("goto", args).map(|n| Command::Goto(n.unwrap_or_default()))
        }
        "reset" => index_arg("reset", args).map(Command::Reset),
        "reset-lab" => Ok(Command::ResetLab),
        _ => return ParseResult::UnknownCommand(cmd.to_string()),
    };

    match parsed {
        Ok(command) => ParseResult::Ok(command),
        Err(err) => err,
    }
}

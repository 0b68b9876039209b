use std::io::{self, BufRead, Write};

use tracing::{event, Level};

#[cfg(any(feature = "mockall", test))]
use mockall::mock;

/// Asks the operator whether a destructive step may proceed.
pub trait Confirmer {
    fn ask(&self, prompt: &str) -> bool;
}

#[cfg(any(feature = "mockall", test))]
mock! {
    /// A Mock Confirmer for use in tests.
    pub Confirmer {}
    impl Confirmer for Confirmer {
        fn ask(&self, prompt: &str) -> bool;
    }
}

/// Only `y` and `yes` are affirmative, ignoring case and surrounding whitespace.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer == "y" || answer == "yes"
}

/// Writes the prompt and reads a single line of input.
pub fn read_confirmation<R, W>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_affirmative(&answer))
}

/// Confirms interactively on the process' stdin and stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn ask(&self, prompt: &str) -> bool {
        let stdin = io::stdin();
        let stdout = io::stdout();
        match read_confirmation(&mut stdin.lock(), &mut stdout.lock(), prompt) {
            Ok(confirmed) => confirmed,
            Err(e) => {
                // An unreadable answer is never taken as consent.
                event!(Level::WARN, "Unable to read confirmation: '{}'", e);
                false
            }
        }
    }
}

//! User interaction: printing progress and asking for confirmation.

/// A literal answer required before a destructive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Must match exactly, including case.
    Exact(&'static str),
    /// Must match ignoring ASCII case.
    CaseInsensitive(&'static str),
}

impl Confirmation {
    /// `YES`, case-sensitive. Guards format, delete and directory removal.
    pub const YES: Self = Self::Exact("YES");

    /// `OK`, case-insensitive. The legacy delete prompt.
    pub const LEGACY_OK: Self = Self::CaseInsensitive("OK");

    /// Returns true if `answer` (trimmed) satisfies the confirmation.
    #[must_use]
    pub fn accepts(self, answer: &str) -> bool {
        let answer = answer.trim();
        match self {
            Self::Exact(expected) => answer == expected,
            Self::CaseInsensitive(expected) => answer.eq_ignore_ascii_case(expected),
        }
    }

    /// The text the user has to type.
    #[must_use]
    pub const fn expected(self) -> &'static str {
        match self {
            Self::Exact(expected) | Self::CaseInsensitive(expected) => expected,
        }
    }
}

/// Where the workflows print progress and read answers.
pub trait Console: Send + Sync {
    /// Print one line for the user.
    fn print(&self, line: &str);

    /// Show `prompt` and read one line; `None` if input is closed.
    fn ask(&self, prompt: &str) -> Option<String>;

    /// Ask `question` and check the answer against `confirmation`.
    fn confirm(&self, question: &str, confirmation: Confirmation) -> bool {
        let prompt = match confirmation {
            Confirmation::Exact(_) => format!("{question} (YES/NO): "),
            Confirmation::CaseInsensitive(expected) => format!("{question} ({expected}/NO): "),
        };
        self.ask(&prompt)
            .is_some_and(|answer| confirmation.accepts(&answer))
    }
}

/// Console on the process's standard streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn print(&self, line: &str) {
        println!("{line}");
    }

    fn ask(&self, prompt: &str) -> Option<String> {
        use std::io::{BufRead, Write};

        print!("{prompt}");
        std::io::stdout().flush().ok()?;
        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// A console with canned answers that records everything shown.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::Console;

    /// Answers prompts from a queue and captures output.
    #[derive(Default)]
    pub struct ScriptedConsole {
        answers: Mutex<VecDeque<String>>,
        transcript: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedConsole {
        /// A console that answers prompts with `answers`, in order.
        #[must_use]
        pub fn with_answers<I, S>(answers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
                ..Self::default()
            }
        }

        /// Lines printed so far.
        #[must_use]
        pub fn printed(&self) -> Vec<String> {
            self.transcript.lock().clone()
        }

        /// Returns true if any printed line contains `needle`.
        #[must_use]
        pub fn printed_contains(&self, needle: &str) -> bool {
            self.transcript.lock().iter().any(|line| line.contains(needle))
        }

        /// Prompts shown so far.
        #[must_use]
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    impl Console for ScriptedConsole {
        fn print(&self, line: &str) {
            self.transcript.lock().push(line.to_string());
        }

        fn ask(&self, prompt: &str) -> Option<String> {
            self.prompts.lock().push(prompt.to_string());
            self.answers.lock().pop_front()
        }
    }
}

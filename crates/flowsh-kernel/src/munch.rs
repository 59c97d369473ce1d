//! Stage flags and expression munching.
//!
//! Arguments arrive as a flat token list. A stage is a flag followed by its
//! positional arguments and then an expression that runs until the next
//! recognized flag. [`munch`] consumes that run.

/// Every recognized stage flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    ToArray,
    Combine,
    Define,
    Shell,
    Filter,
    Recurse,
    Import,
    ImportFrom,
    Expression,
    Log,
    FlatMap,
    Tag,
    Print,
    Quote,
    Reduce,
    Seek,
    Terminate,
    Write,
    Recover,
    IgnoreError,
    PrintError,
    ToString,
    Json,
    Yaml,
    Toml,
    Sub,
    EndSub,
}

impl Flag {
    pub fn parse(token: &str) -> Option<Flag> {
        let flag = match token {
            "-a" => Flag::ToArray,
            "-c" => Flag::Combine,
            "-d" => Flag::Define,
            "-e" => Flag::Shell,
            "-f" => Flag::Filter,
            "-g" => Flag::Recurse,
            "-i" | "--import" => Flag::Import,
            "--import-from" => Flag::ImportFrom,
            "-j" => Flag::Expression,
            "-l" => Flag::Log,
            "-m" => Flag::FlatMap,
            "-n" => Flag::Tag,
            "-p" => Flag::Print,
            "-q" => Flag::Quote,
            "-r" => Flag::Reduce,
            "-s" => Flag::Seek,
            "-t" => Flag::Terminate,
            "-w" => Flag::Write,
            "--error" => Flag::Recover,
            "--ignoreerror" => Flag::IgnoreError,
            "--printerror" => Flag::PrintError,
            "--str" => Flag::ToString,
            "--json" => Flag::Json,
            "--yaml" => Flag::Yaml,
            "--toml" => Flag::Toml,
            "--sub" => Flag::Sub,
            "--endsub" => Flag::EndSub,
            _ => return None,
        };
        Some(flag)
    }

    pub fn is_flag(token: &str) -> bool {
        Self::parse(token).is_some()
    }

    /// Canonical spelling, used in usage errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::ToArray => "-a",
            Flag::Combine => "-c",
            Flag::Define => "-d",
            Flag::Shell => "-e",
            Flag::Filter => "-f",
            Flag::Recurse => "-g",
            Flag::Import => "--import",
            Flag::ImportFrom => "--import-from",
            Flag::Expression => "-j",
            Flag::Log => "-l",
            Flag::FlatMap => "-m",
            Flag::Tag => "-n",
            Flag::Print => "-p",
            Flag::Quote => "-q",
            Flag::Reduce => "-r",
            Flag::Seek => "-s",
            Flag::Terminate => "-t",
            Flag::Write => "-w",
            Flag::Recover => "--error",
            Flag::IgnoreError => "--ignoreerror",
            Flag::PrintError => "--printerror",
            Flag::ToString => "--str",
            Flag::Json => "--json",
            Flag::Yaml => "--yaml",
            Flag::Toml => "--toml",
            Flag::Sub => "--sub",
            Flag::EndSub => "--endsub",
        }
    }

    /// Stages that leave the stream alone: they keep the "first token" and
    /// "initial input" status for whatever follows. Log and write only tap
    /// the stream, so a producer may still follow them.
    pub fn is_transparent(&self) -> bool {
        matches!(
            self,
            Flag::Print
                | Flag::IgnoreError
                | Flag::PrintError
                | Flag::Import
                | Flag::ImportFrom
                | Flag::Define
                | Flag::Log
                | Flag::Write
                | Flag::Sub
        )
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What [`munch`] consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Munch {
    /// Tokens consumed, including a leading `-q`.
    pub cursor: usize,
    /// The consumed tokens joined by single spaces.
    pub expression: String,
    /// The trailing tokens split off when `num_other > 0`.
    pub others: Vec<String>,
}

/// Consume tokens until a recognized flag or the end of the list.
///
/// A leading `-q` turns the joined text into a string literal. With
/// `num_other > 0` the last `num_other` consumed tokens come back separately
/// in [`Munch::others`] (the reduce stage's initial value).
pub fn munch(tokens: &[String], num_other: usize) -> Munch {
    let quoted = tokens.first().map(String::as_str) == Some("-q");
    let start = usize::from(quoted);

    let run: Vec<&str> = tokens[start..]
        .iter()
        .map(String::as_str)
        .take_while(|token| !Flag::is_flag(token))
        .collect();

    let split = run.len().saturating_sub(num_other);
    let others = run[split..].iter().map(|s| s.to_string()).collect();
    let text = run[..split].join(" ");

    let expression = if quoted {
        serde_json::Value::String(text).to_string()
    } else {
        text
    };

    Munch {
        cursor: start + run.len(),
        expression,
        others,
    }
}

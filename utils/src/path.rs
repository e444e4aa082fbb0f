use std::fmt::Display;
use std::path::Path;

fn is_shell_safe(s: &str) -> bool {
    s.chars()
        .all(|c| matches!(c, '/' | '.' | '-' | '_' | '~' | '@' | ':' | '=') || c.is_alphanumeric())
}

fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str) -> std::fmt::Result {
    if is_shell_safe(s) {
        return f.write_str(s);
    }
    match shlex::try_quote(s) {
        Ok(r) => f.write_str(&r),
        // Only fails on NUL bytes, which can't be passed as arguments anyway
        Err(_) => Err(std::fmt::Error),
    }
}

/// Helper to format a path.
#[derive(Debug)]
pub struct PathQuotedDisplay<'a> {
    path: &'a Path,
}

impl<'a> Display for PathQuotedDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(s) = self.path.to_str() else {
            return Err(std::fmt::Error);
        };
        write_quoted(f, s)
    }
}

impl<'a> PathQuotedDisplay<'a> {
    /// Given a path, quote it in a way that it would be parsed by a default
    /// POSIX shell. If the path is UTF-8 with no spaces or shell meta-characters,
    /// it will be exactly the same as the input.
    pub fn new<P: AsRef<Path>>(path: &'a P) -> PathQuotedDisplay<'a> {
        PathQuotedDisplay {
            path: path.as_ref(),
        }
    }
}

/// Helper to format a program and its arguments as a shell command line,
/// e.g. for showing the operator what is about to run.
#[derive(Debug)]
pub struct ArgvQuotedDisplay<'a> {
    argv: &'a [String],
}

impl<'a> ArgvQuotedDisplay<'a> {
    /// Quote each element of `argv` as needed and join them with spaces.
    pub fn new(argv: &'a [String]) -> Self {
        Self { argv }
    }
}

impl<'a> Display for ArgvQuotedDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, arg) in self.argv.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if arg.is_empty() {
                f.write_str("''")?;
            } else {
                write_quoted(f, arg)?;
            }
        }
        Ok(())
    }
}

use std::{
    io::{self, BufRead, StdinLock, Stdout, Write},
    path::PathBuf,
};

use crate::validate::{Conflict, ConflictAction, ConflictKind, ConflictPolicy};

/// Asks the user how to resolve a conflict, one line of input per question.
///
/// End of input aborts validation.
pub struct PromptPolicy<R, W> {
    input: R,
    output: W,
}

impl PromptPolicy<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptPolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.output, "{line}")
    }

    fn ask_new_path(&mut self, question: &str) -> io::Result<ConflictAction> {
        Ok(match self.ask(question)? {
            None => ConflictAction::Abort,
            Some(path) if path.is_empty() => ConflictAction::Retry,
            Some(path) => ConflictAction::NewPath(PathBuf::from(path)),
        })
    }

    fn interact(&mut self, conflict: &Conflict) -> io::Result<ConflictAction> {
        match &conflict.kind {
            ConflictKind::AlreadyExists => {
                let question = format!(
                    "The logfile {:?} already exists. Please choose an action:\n\
                     1: Append, 2: Overwrite, 3: New file\n\
                     Enter the number corresponding to your choice: ",
                    conflict.path
                );
                let Some(choice) = self.ask(&question)? else {
                    return Ok(ConflictAction::Abort);
                };
                match choice.as_str() {
                    "1" => Ok(ConflictAction::Append),
                    "2" => Ok(ConflictAction::Overwrite),
                    "3" => self.ask_new_path("Please enter a new path for the logfile: "),
                    _ => {
                        self.say("Invalid choice. Please choose an action by entering a number.")?;
                        Ok(ConflictAction::Retry)
                    }
                }
            }
            ConflictKind::NotWritable { directory } => {
                self.say(&format!("The directory {directory:?} is not writeable."))?;
                self.ask_new_path("Please enter a valid log file path: ")
            }
        }
    }
}

impl<R: BufRead, W: Write> ConflictPolicy for PromptPolicy<R, W> {
    fn resolve(&mut self, conflict: &Conflict) -> ConflictAction {
        self.interact(conflict).unwrap_or(ConflictAction::Abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::BootstrapError,
        validate::{FileMode, validate_log_file_with},
    };
    use std::{fs, io::Cursor, path::Path};

    fn exists_conflict(path: &Path) -> Conflict {
        Conflict {
            kind: ConflictKind::AlreadyExists,
            path: path.to_path_buf(),
            attempt: 1,
        }
    }

    #[test]
    fn test_prompt_choices() {
        let conflict = exists_conflict(Path::new("/var/log/app.log"));
        let mut output = Vec::new();
        let input = Cursor::new("1\n2\n3\n/tmp/other.log\nx\n");
        let mut policy = PromptPolicy::new(input, &mut output);
        assert_eq!(policy.resolve(&conflict), ConflictAction::Append);
        assert_eq!(policy.resolve(&conflict), ConflictAction::Overwrite);
        assert_eq!(
            policy.resolve(&conflict),
            ConflictAction::NewPath("/tmp/other.log".into())
        );
        assert_eq!(policy.resolve(&conflict), ConflictAction::Retry);
        assert_eq!(policy.resolve(&conflict), ConflictAction::Abort);
        drop(policy);

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("\"/var/log/app.log\" already exists"));
        assert!(transcript.contains("Please enter a new path for the logfile: "));
        assert!(transcript.contains("Invalid choice."));
    }

    #[test]
    fn test_prompt_not_writable_asks_for_path() {
        let conflict = Conflict {
            kind: ConflictKind::NotWritable {
                directory: "/root".into(),
            },
            path: "/root/app.log".into(),
            attempt: 1,
        };
        let mut policy = PromptPolicy::new(Cursor::new("/tmp/app.log\n"), io::sink());
        assert_eq!(
            policy.resolve(&conflict),
            ConflictAction::NewPath("/tmp/app.log".into())
        );
    }

    #[test]
    fn test_prompt_drives_validation() {
        let dir = tempfile::tempdir().unwrap();
        let taken = dir.path().join("taken.log");
        fs::write(&taken, "keep\n").unwrap();

        // two invalid answers, then append
        let mut policy = PromptPolicy::new(Cursor::new("9\nabc\n1\n"), io::sink());
        let sink = validate_log_file_with(&taken, FileMode::CreateNew, &mut policy).unwrap();
        assert_eq!(sink.mode(), FileMode::Append);

        let mut policy = PromptPolicy::new(Cursor::new("9\n9\n9\n1\n"), io::sink());
        let err = validate_log_file_with(&taken, FileMode::CreateNew, &mut policy).unwrap_err();
        assert!(matches!(err, BootstrapError::ValidationExhausted(3)));
    }
}

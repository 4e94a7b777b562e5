//! `${input:Label}` placeholders, resolved by asking the user.

use std::collections::HashMap;
use std::io::{BufRead, Write};

const OPEN: &str = "${input:";

/// Asks the user for one value. `None` means the prompt was cancelled.
pub trait InputPrompt {
    fn prompt(&self, label: &str) -> Option<String>;
}

/// Reads answers line by line from stdin; EOF cancels.
pub struct StdinPrompt;

impl InputPrompt for StdinPrompt {
    fn prompt(&self, label: &str) -> Option<String> {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{}: ", label);
        let _ = stderr.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Labels of every placeholder in `text`, without duplicates, in order.
pub fn extract_placeholders(text: &str) -> Vec<String> {
    let mut labels = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find('}') else {
            break;
        };
        let label = after[..end].trim().to_string();
        if !label.is_empty() && !labels.contains(&label) {
            labels.push(label);
        }
        rest = &after[end + 1..];
    }
    labels
}

/// Per-run answer cache: each distinct label is asked at most once.
pub struct InputResolver<'a> {
    prompt: &'a dyn InputPrompt,
    answers: HashMap<String, String>,
}

impl<'a> InputResolver<'a> {
    pub fn new(prompt: &'a dyn InputPrompt) -> Self {
        Self {
            prompt,
            answers: HashMap::new(),
        }
    }

    /// Substitute every placeholder in `text`.
    ///
    /// Returns the label of the cancelled prompt on cancellation.
    pub fn resolve(&mut self, text: &str) -> Result<String, String> {
        for label in extract_placeholders(text) {
            if self.answers.contains_key(&label) {
                continue;
            }
            let answer = self.prompt.prompt(&label).ok_or_else(|| label.clone())?;
            self.answers.insert(label, answer);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let Some(end) = after.find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let label = after[..end].trim();
            match self.answers.get(label) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[start..start + OPEN.len() + end + 1]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    pub fn resolve_all(&mut self, texts: &[String]) -> Result<Vec<String>, String> {
        texts.iter().map(|t| self.resolve(t)).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Answers from a fixed table and records what was asked.
    pub(crate) struct ScriptedPrompt {
        pub answers: HashMap<String, String>,
        pub asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompt {
        pub(crate) fn new(answers: &[(&str, &str)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl InputPrompt for ScriptedPrompt {
        fn prompt(&self, label: &str) -> Option<String> {
            self.asked.borrow_mut().push(label.to_string());
            self.answers.get(label).cloned()
        }
    }

    #[test]
    fn test_extract_placeholders_dedup() {
        assert_eq!(
            extract_placeholders("git checkout ${input:Branch} && echo ${input:Branch} ${input: Msg }"),
            vec!["Branch", "Msg"]
        );
        assert!(extract_placeholders("echo ${HOME} ${input:").is_empty());
    }

    #[test]
    fn test_resolve_asks_once_per_label() {
        let prompt = ScriptedPrompt::new(&[("Branch", "main")]);
        let mut resolver = InputResolver::new(&prompt);
        let out = resolver
            .resolve_all(&[
                "git checkout ${input:Branch}".to_string(),
                "git pull origin ${input:Branch}".to_string(),
            ])
            .unwrap();
        assert_eq!(out, vec!["git checkout main", "git pull origin main"]);
        assert_eq!(*prompt.asked.borrow(), vec!["Branch"]);
    }

    #[test]
    fn test_resolve_leaves_other_syntax_alone() {
        let prompt = ScriptedPrompt::new(&[]);
        let mut resolver = InputResolver::new(&prompt);
        assert_eq!(resolver.resolve("echo ${HOME}").unwrap(), "echo ${HOME}");
    }

    #[test]
    fn test_cancelled_prompt_reports_label() {
        let prompt = ScriptedPrompt::new(&[]);
        let mut resolver = InputResolver::new(&prompt);
        assert_eq!(resolver.resolve("open ${input:Ticket}"), Err("Ticket".to_string()));
    }

    #[test]
    fn test_value_substituted_verbatim() {
        let prompt = ScriptedPrompt::new(&[("Q", "a b & 'c'")]);
        let mut resolver = InputResolver::new(&prompt);
        assert_eq!(resolver.resolve("search ${input:Q}").unwrap(), "search a b & 'c'");
    }
}

//! Advisory hints for wrong fill-in-the-blank answers in practice mode.
//!
//! Hints never influence grading.

use crate::model::{InputMethod, Question};

/// Largest edit distance at which an acceptable answer is suggested.
pub const HINT_MAX_DISTANCE: usize = 2;

/// A canned hint for terminal-style answers.
struct CommandHint {
    /// The answer starts with this command.
    prefix: &'static str,
    /// The hint is withheld when the answer already contains this.
    unless_contains: &'static str,
    hint: &'static str,
}

const COMMAND_HINTS: &[CommandHint] = &[
    CommandHint {
        prefix: "ls",
        unless_contains: "-l",
        hint: "Did you mean `ls -l`? Check the flag.",
    },
    CommandHint {
        prefix: "cat",
        unless_contains: ".txt",
        hint: "Are you looking for a file? Try specifying the file extension, e.g., `filename.txt`.",
    },
];

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Hint for an incorrect fill-in-the-blank answer, if any applies.
///
/// Terminal questions get a canned hint keyed on the command; text questions
/// get the first acceptable answer within [`HINT_MAX_DISTANCE`] edits.
pub fn suggest_hint(question: &Question, submitted: &str) -> Option<String> {
    let normalized = submitted.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    match question.input_method {
        InputMethod::Terminal => COMMAND_HINTS
            .iter()
            .find(|h| {
                normalized.starts_with(h.prefix) && !normalized.contains(h.unless_contains)
            })
            .map(|h| h.hint.to_string()),
        InputMethod::Text => question
            .acceptable_answers
            .iter()
            .find(|ans| levenshtein(&normalized, ans) <= HINT_MAX_DISTANCE)
            .map(|ans| format!("Did you mean `{ans}`?")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionType;

    fn fill(input_method: InputMethod, answers: &[&str]) -> Question {
        Question {
            id: 1,
            domain: "Shell".into(),
            question_type: QuestionType::FillBlank,
            text: "?".into(),
            explanation: String::new(),
            image_url: None,
            code_block: None,
            input_method,
            choices: Vec::new(),
            acceptable_answers: answers.iter().map(|s| s.to_string()).collect(),
            bank_version: "1.0.0".into(),
            validity_score: None,
            flagged: false,
        }
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("yaml", "yml"), 1);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("héllo", "hello"), 1);
    }

    #[test]
    fn close_text_answer_gets_suggestion() {
        let q = fill(InputMethod::Text, &["kubectl", "kubectl get"]);
        assert_eq!(
            suggest_hint(&q, "kubectel").as_deref(),
            Some("Did you mean `kubectl`?")
        );
        assert_eq!(suggest_hint(&q, "docker"), None);
        assert_eq!(suggest_hint(&q, "   "), None);
    }

    #[test]
    fn terminal_answers_get_canned_hints() {
        let q = fill(InputMethod::Terminal, &["ls -la"]);
        assert_eq!(
            suggest_hint(&q, "ls -a").as_deref(),
            Some("Did you mean `ls -l`? Check the flag.")
        );
        assert_eq!(suggest_hint(&q, "ls -lh"), None);
        assert!(suggest_hint(&q, "cat notes").unwrap().contains("filename.txt"));
        assert_eq!(suggest_hint(&q, "cat notes.txt"), None);
        assert_eq!(suggest_hint(&q, "pwd"), None);
    }
}

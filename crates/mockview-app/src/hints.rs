// Hint text for a session's question.

use mockview_core::model::Question;
use mockview_core::questions::QuestionBank;

const DSA_TEMPLATES: &[&str] = &[
    "walk through the smallest non-trivial example by hand and write down every step.",
    "ask which data structure gives you constant-time lookups for what you keep searching for.",
    "check the edge cases: empty input, a single element, duplicates and negative values.",
];

const GENERAL_TEMPLATES: &[&str] = &[
    "restate the expected output for each test input before touching the code.",
    "split the work into a small helper and test it in isolation.",
    "log intermediate values on the failing input and compare them with what you expect.",
];

/// Text for hint number `number` (1-based) on `question`.
///
/// Uses the question's own hints in order, then cycles through generic
/// templates for the question's topic once those run out.
pub fn hint_text(bank: &QuestionBank, question: &Question, number: u32) -> String {
    let number = number.max(1);
    let own = bank.hints_for(&question.title);

    if let Some(text) = own.get(number as usize - 1) {
        return format!("Hint {number}: {text}");
    }

    let templates = if question.topic.eq_ignore_ascii_case("DSA") {
        DSA_TEMPLATES
    } else {
        GENERAL_TEMPLATES
    };
    let index = (number as usize - 1 - own.len()) % templates.len();
    format!(
        "Hint {number}: For \"{}\", {}",
        question.title, templates[index]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(bank: &QuestionBank, title: &str) -> Question {
        bank.entries()
            .iter()
            .find(|e| e.question.title == title)
            .map(|e| e.question.clone())
            .unwrap()
    }

    #[test]
    fn uses_question_hints_in_order() {
        let bank = QuestionBank::builtin();
        let q = question(&bank, "Two Sum");

        let first = hint_text(&bank, &q, 1);
        let second = hint_text(&bank, &q, 2);
        assert!(first.starts_with("Hint 1: "));
        assert!(first.contains(&bank.hints_for("Two Sum")[0]));
        assert!(second.contains(&bank.hints_for("Two Sum")[1]));
    }

    #[test]
    fn falls_back_to_topic_templates() {
        let bank = QuestionBank::builtin();
        let q = question(&bank, "Two Sum");

        let third = hint_text(&bank, &q, 3);
        assert_eq!(
            third,
            format!("Hint 3: For \"Two Sum\", {}", DSA_TEMPLATES[0])
        );
        // Cycles once the templates are exhausted.
        let wrapped = hint_text(&bank, &q, 3 + DSA_TEMPLATES.len() as u32);
        assert!(wrapped.ends_with(DSA_TEMPLATES[0]));
    }

    #[test]
    fn unknown_question_uses_general_templates() {
        let bank = QuestionBank::new(vec![]);
        let mut q = question(&QuestionBank::builtin(), "FizzBuzz");
        q.title = "Custom".into();

        let text = hint_text(&bank, &q, 1);
        assert_eq!(text, format!("Hint 1: For \"Custom\", {}", GENERAL_TEMPLATES[0]));
    }
}

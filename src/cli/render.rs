use crate::api::{ResultSummary, TestSummary, UserProfile};
use crate::authoring::TestDraft;
use crate::engine::{AnswerMode, ScoreCard, Test};

const RULE: &str = "───────────────────────────────────────────────────────────────\n";

/// One line per listed test
pub fn test_list(heading: &str, tests: &[TestSummary]) -> String {
    let mut output = format!("\n{}\n{}", heading, RULE);
    if tests.is_empty() {
        output.push_str("  (no tests)\n");
        return output;
    }
    for test in tests {
        output.push_str(&format!(
            "  [{}] {} ({})",
            test.id,
            test.title,
            AnswerMode::from_strict(test.is_strict)
        ));
        if let Some(author) = test.author_name.as_deref() {
            output.push_str(&format!(" by {}", author));
        }
        output.push('\n');
    }
    output
}

/// One line per stored result
pub fn result_list(heading: &str, results: &[ResultSummary]) -> String {
    let mut output = format!("\n{}\n{}", heading, RULE);
    if results.is_empty() {
        output.push_str("  (no results)\n");
        return output;
    }
    for result in results {
        let when = result
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "  [{}] {} {:>3}%  {}",
            result.id,
            result.test_name.as_deref().unwrap_or("?"),
            result.score,
            when
        ));
        if let Some(user) = result.user_name.as_deref() {
            output.push_str(&format!("  ({})", user));
        }
        output.push('\n');
    }
    output
}

/// Test header followed by its numbered questions and answers
pub fn test_detail(test: &Test) -> String {
    let mut output = format!("\n{}\n{}", test.title, RULE);
    if !test.description.is_empty() {
        output.push_str(&format!("{}\n", test.description));
    }
    output.push_str(&format!(
        "Mode: {}  Questions: {}\n",
        test.mode(),
        test.questions.len()
    ));
    if let Some(author) = test.author.as_deref() {
        output.push_str(&format!("Author: {}\n", author));
    }
    for (qi, question) in test.questions.iter().enumerate() {
        output.push_str(&format!("\n{}. {}\n", qi + 1, question.title));
        for (ai, answer) in question.answers.iter().enumerate() {
            output.push_str(&format!("   {}) {}\n", ai + 1, answer.text));
        }
    }
    output
}

/// Score summary with a verdict per scored question
pub fn score_card(test: &Test, card: &ScoreCard) -> String {
    let mut output = format!(
        "\nScore: {}% ({} of {} correct)\n",
        card.score, card.correct, card.considered
    );
    for (qi, question) in test.questions.iter().enumerate() {
        let mark = match card.verdict(&question.id) {
            Some(true) => "correct",
            Some(false) => "wrong",
            None => "skipped",
        };
        output.push_str(&format!("  {}. {} [{}]\n", qi + 1, question.title, mark));
    }
    output
}

/// Logged-in user's profile
pub fn profile(profile: &UserProfile) -> String {
    format!("Name:  {}\nEmail: {}\n", profile.name, profile.email)
}

/// Summary of a persisted authoring draft
pub fn draft(draft: &TestDraft) -> String {
    let mut output = format!("Draft: {}\n", draft.metadata.title);
    output.push_str(&format!(
        "Mode: {}  Private: {}\n",
        AnswerMode::from_strict(draft.metadata.is_strict.unwrap_or_default()),
        draft.metadata.is_private.unwrap_or_default()
    ));
    output.push_str(&format!("Questions: {}\n", draft.questions.len()));
    for (qi, question) in draft.questions.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", qi + 1, question.title));
    }
    output
}

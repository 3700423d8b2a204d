use chrono::{DateTime, NaiveDate, Utc};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Answers chosen for one question, as 0-based indexes.
///
/// Written on the command line as `QUESTION:ANSWER[,ANSWER...]` with
/// 1-based numbers, e.g. `2:1,3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSpec {
    /// Question index
    pub question: usize,
    /// Answer indexes within the question
    pub answers: Vec<usize>,
}

/// Parse an `--answer` value
pub fn parse_answer_spec(raw: &str) -> Result<AnswerSpec, String> {
    let (question, answers) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected QUESTION:ANSWERS, got '{}'", raw))?;

    let question = parse_position(question)?;
    let answers = parse_positions(answers)?;
    if answers.is_empty() {
        return Err(format!("no answers given for question {}", question + 1));
    }

    Ok(AnswerSpec { question, answers })
}

/// Parse a comma-separated list of 1-based positions into 0-based indexes.
/// Blank input yields an empty list.
pub fn parse_positions(raw: &str) -> Result<Vec<usize>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_position)
        .collect()
}

fn parse_position(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(format!("'{}' is not a positive number", raw.trim())),
    }
}

/// Parse a `YYYY-MM-DD` date or an RFC 3339 timestamp
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", raw))
}

/// Line-oriented prompt on stdin/stdout for interactive commands
pub struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    /// Prompt reading from the process's stdin
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `label` and read one line. `None` once stdin is closed.
    pub async fn ask(&mut self, label: &str) -> std::io::Result<Option<String>> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}", label)?;
        stdout.flush()?;
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Print a line
    pub fn say(&self, text: &str) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_answer_spec() {
        let spec = parse_answer_spec("2:1,3").unwrap();
        assert_eq!(
            spec,
            AnswerSpec {
                question: 1,
                answers: vec![0, 2],
            }
        );
    }

    #[test]
    fn test_parse_answer_spec_rejects_bad_input() {
        assert!(parse_answer_spec("2").is_err());
        assert!(parse_answer_spec("0:1").is_err());
        assert!(parse_answer_spec("1:").is_err());
        assert!(parse_answer_spec("1:a").is_err());
    }

    #[test]
    fn test_parse_positions_blank_is_empty() {
        assert_eq!(parse_positions("  ").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_positions("1, 2").unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-05").unwrap().month(), 3);
        assert!(parse_date("2024-03-05T10:00:00Z").is_ok());
        assert!(parse_date("March 5th").is_err());
    }
}

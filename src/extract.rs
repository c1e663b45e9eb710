//! Question extraction from uploaded PDFs.
//!
//! Two steps: `pdf_text` turns PDF bytes into raw text (`pdf-extract`), and a
//! `QuestionExtractor` derives question drafts from that text. Both are
//! best-effort; the upload path treats any failure as "no questions".

use regex::Regex;
use serde::Deserialize;

/// A question as supplied by a faculty member or recovered from text.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
  #[serde(default)]
  pub question_number: Option<u32>,
  #[serde(default)]
  pub question_text: String,
  #[serde(default)]
  pub marks: Option<u32>,
}

/// Derives question drafts from raw text. Never fails; an empty result means
/// nothing parseable was found.
pub trait QuestionExtractor: Send + Sync {
  fn extract(&self, raw_text: &str) -> Vec<QuestionDraft>;
}

/// Raw text of a PDF. CPU-bound; call from `spawn_blocking`.
pub fn pdf_text(bytes: &[u8]) -> Result<String, String> {
  pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
}

/// Line-oriented heuristic for numbered exam questions:
///
/// ```text
/// Q1. Define entropy. [5]
/// 2) State the second law of thermodynamics
///    and give one example. (10 marks)
/// Question 3: Derive ... [4 M]
/// ```
///
/// A numbered line opens a question, following lines continue it, and a
/// trailing marks annotation is split off.
pub struct HeuristicExtractor {
  start: Regex,
  marks: Regex,
}

impl HeuristicExtractor {
  pub fn new() -> Result<Self, regex::Error> {
    Ok(Self {
      start: Regex::new(r"(?i)^\s*(?:q(?:uestion)?\s*\.?\s*)?(\d{1,3})\s*[.):]\s*(.*)$")?,
      marks: Regex::new(r"(?i)[\[(]\s*(\d{1,3})\s*(?:marks?|m)?\s*[\])]\s*$")?,
    })
  }

  fn finish(&self, number: u32, text: &str) -> Option<QuestionDraft> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let (text, marks) = match self.marks.captures(&text) {
      Some(c) => {
        let whole = c.get(0).map_or(text.len(), |m| m.start());
        (text[..whole].trim_end().to_string(), c.get(1).and_then(|m| m.as_str().parse().ok()))
      }
      None => (text.clone(), None),
    };
    if text.is_empty() {
      return None;
    }
    Some(QuestionDraft { question_number: Some(number), question_text: text, marks })
  }
}

impl QuestionExtractor for HeuristicExtractor {
  fn extract(&self, raw_text: &str) -> Vec<QuestionDraft> {
    let mut out = Vec::new();
    let mut current: Option<(u32, String)> = None;

    for line in raw_text.lines() {
      if let Some(c) = self.start.captures(line) {
        let number = c.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        if let Some(number) = number {
          if let Some((n, text)) = current.take() {
            out.extend(self.finish(n, &text));
          }
          let first = c.get(2).map_or("", |m| m.as_str()).to_string();
          current = Some((number, first));
          continue;
        }
      }
      if let Some((_, text)) = current.as_mut() {
        let line = line.trim();
        if !line.is_empty() {
          text.push(' ');
          text.push_str(line);
        }
      }
    }
    if let Some((n, text)) = current.take() {
      out.extend(self.finish(n, &text));
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn extract(text: &str) -> Vec<QuestionDraft> {
    HeuristicExtractor::new().unwrap().extract(text)
  }

  #[test]
  fn numbered_questions_with_marks() {
    let text = "University of Somewhere\nMidterm 2023\n\
Q1. Define entropy. [5]\n\
2) State the second law of thermodynamics\n   and give one example. (10 marks)\n\
Question 3: Derive the ideal gas law [4 M]\n";
    let qs = extract(text);
    assert_eq!(qs.len(), 3);
    assert_eq!(qs[0], QuestionDraft { question_number: Some(1), question_text: "Define entropy.".into(), marks: Some(5) });
    assert_eq!(qs[1].question_text, "State the second law of thermodynamics and give one example.");
    assert_eq!(qs[1].marks, Some(10));
    assert_eq!(qs[2].question_number, Some(3));
    assert_eq!(qs[2].marks, Some(4));
  }

  #[test]
  fn question_without_marks() {
    let qs = extract("1. What is a vector space?");
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].marks, None);
  }

  #[test]
  fn unstructured_text_yields_nothing() {
    assert!(extract("").is_empty());
    assert!(extract("Instructions: answer all questions.\nTime: 3 hours").is_empty());
    // a year is not a question number
    assert!(extract("2023. Annual examination").is_empty());
  }

  #[test]
  fn bare_number_line_takes_following_text() {
    let qs = extract("1.\nExplain Ohm's law. [3]");
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].question_text, "Explain Ohm's law.");
    assert_eq!(qs[0].marks, Some(3));
  }

  #[test]
  fn garbage_pdf_is_an_error() {
    assert!(pdf_text(b"not a pdf").is_err());
  }

  #[test]
  fn manual_drafts_deserialize_camel_case() {
    let drafts: Vec<QuestionDraft> =
      serde_json::from_str(r#"[{"questionNumber":1,"questionText":"Define work","marks":2}]"#).unwrap();
    assert_eq!(drafts[0].question_text, "Define work");
  }
}

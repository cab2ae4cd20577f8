// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Structured test plan produced by the planning agent

use serde::{Deserialize, Serialize};

use super::AgentError;

/// One planned test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub title: String,
    #[serde(default)]
    pub arrange: String,
    #[serde(default)]
    pub act: String,
    #[serde(default)]
    pub assert: String,
    /// Modules or functions to mock
    #[serde(default)]
    pub mocks: Vec<String>,
}

/// Ordered test cases; empty when the agent decided nothing is worth testing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPlan {
    pub cases: Vec<TestCase>,
}

impl TestPlan {
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Parse a final agent answer.
    ///
    /// Accepts bare JSON or JSON inside a fenced block, with prose around it.
    pub fn parse(text: &str) -> std::result::Result<Self, AgentError> {
        let candidate = json_object_span(text).ok_or_else(|| AgentError::MalformedResponse {
            reason: "no JSON object in final answer".to_string(),
            trace: text.to_string(),
        })?;

        serde_json::from_str::<TestPlan>(candidate).map_err(|e| AgentError::MalformedResponse {
            reason: format!("invalid plan JSON: {}", e),
            trace: text.to_string(),
        })
    }

    /// Numbered list for the generation prompt
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, case) in self.cases.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, case.title));
            for (label, value) in [
                ("Arrange", &case.arrange),
                ("Act", &case.act),
                ("Assert", &case.assert),
            ] {
                if !value.trim().is_empty() {
                    out.push_str(&format!("   - {}: {}\n", label, value.trim()));
                }
            }
            if !case.mocks.is_empty() {
                out.push_str(&format!("   - Mocks: {}\n", case.mocks.join(", ")));
            }
        }
        out
    }
}

/// Outermost `{ ... }` span of `text`
fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let plan = TestPlan::parse(
            r#"{"cases":[{"title":"adds numbers","arrange":"a=1,b=2","act":"add(a,b)","assert":"3","mocks":[]}]}"#,
        )
        .unwrap();
        assert_eq!(plan.cases.len(), 1);
        assert_eq!(plan.cases[0].title, "adds numbers");
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = "Here is the plan:\n```json\n{\"cases\": [{\"title\": \"renders\"}]}\n```\nDone.";
        let plan = TestPlan::parse(text).unwrap();
        assert_eq!(plan.cases[0].title, "renders");
        assert!(plan.cases[0].mocks.is_empty());
    }

    #[test]
    fn test_parse_empty_plan() {
        let plan = TestPlan::parse(r#"{"cases": []}"#).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_parse_malformed() {
        let err = TestPlan::parse("I could not decide").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse { .. }));

        let err = TestPlan::parse(r#"{"steps": 3}"#).unwrap_err();
        assert!(err.to_string().contains("invalid plan JSON"));
    }

    #[test]
    fn test_render() {
        let plan = TestPlan {
            cases: vec![TestCase {
                title: "rejects empty input".to_string(),
                arrange: String::new(),
                act: "parse('')".to_string(),
                assert: "throws".to_string(),
                mocks: vec!["./api".to_string()],
            }],
        };
        assert_eq!(
            plan.render(),
            "1. rejects empty input\n   - Act: parse('')\n   - Assert: throws\n   - Mocks: ./api\n"
        );
    }
}

//! Prompt template and response schema for feedback classification.

use serde_json::{json, Value};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an analyst who categorizes customer feedback. \
You assign each feedback item one or more short, reusable labels such as \"Bug Report\", \
\"Feature Request\", \"Positive\" or \"Pricing\". Labels are two or three words at most and \
consistent across items that share a theme.";

/// Build the user prompt for one batch of newline-separated feedback lines.
pub fn build_prompt(batch: &str, suggested_labels: &[String]) -> String {
    let mut prompt = String::from(
        "Classify each line of customer feedback below.\n\
        Rules:\n\
        - Each line is one separate feedback item.\n\
        - Return exactly one output item per input line, in the same order as the input.\n\
        - Do not merge, skip, split or reword lines.\n\
        - Copy each line verbatim into the `feedback` field.\n\
        - Put one or more labels for that line in the `labels` field.\n",
    );

    let suggested: Vec<&str> = suggested_labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if !suggested.is_empty() {
        prompt.push_str("- Prefer these labels where they fit: ");
        prompt.push_str(&suggested.join(", "));
        prompt.push_str(". Only create a new label when none of them applies.\n");
    }

    prompt.push_str("\nFeedback:\n");
    prompt.push_str(batch);
    prompt
}

/// Response shape requested from the service: `[{feedback, labels[]}]`.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "feedback": { "type": "STRING" },
                "labels": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" }
                }
            },
            "required": ["feedback", "labels"],
            "propertyOrdering": ["feedback", "labels"]
        }
    })
}

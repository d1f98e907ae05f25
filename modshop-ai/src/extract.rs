// Pulling a ReceiptAnalysis out of free-form model output.

use serde_json::Value;

use modshop_common::error::Error;
use modshop_common::models::ReceiptAnalysis;

/// Removes markdown code fences the model adds despite being told not to.
pub fn strip_fences(text: &str) -> String {
    text.trim().replace("```json", "").replace("```", "").trim().to_string()
}

/// The first balanced `{...}` in `text`. Braces inside string literals are
/// not counted.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `candidates[0].content.parts[0].text` of a generateContent response.
pub fn candidate_text(response: &Value) -> Result<&str, Error> {
    if let Some(err) = response.get("error") {
        let msg = err.get("message").and_then(|m| m.as_str()).unwrap_or("unknown error");
        return Err(Error::Ai(format!("API error: {}", msg)));
    }
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| Error::Ai("Response missing candidate text".into()))
}

pub fn parse_analysis(model_text: &str) -> Result<ReceiptAnalysis, Error> {
    let cleaned = strip_fences(model_text);
    let json = first_json_object(&cleaned)
        .ok_or_else(|| Error::Ai(format!("No JSON object in model output: {}", cleaned)))?;
    let analysis: ReceiptAnalysis = serde_json::from_str(json)?;
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modshop_common::models::VerificationStatus;
    use serde_json::json;

    #[test]
    fn parses_fenced_output() {
        let text = "```json\n{\"extracted_info\": {\"amount\": \"250.00\", \"reference_number\": \"1234567890123\", \"date\": \"Not Found\"}, \"verification_status\": \"APPROVED\", \"reasoning\": \"clean\"}\n```";
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.extracted_info.amount.as_deref(), Some("250.00"));
        assert_eq!(analysis.extracted_info.reference_number.as_deref(), Some("1234567890123"));
        assert_eq!(analysis.verification_status, VerificationStatus::Approved);
    }

    #[test]
    fn takes_first_object_after_prose() {
        let text = r#"Sure! Here it is: {"extracted_info": {"amount": "1{0}0"}, "verification_status": "FLAGGED", "reasoning": "brace } in text"} and {"other": 1}"#;
        let json = first_json_object(text).unwrap();
        assert!(json.ends_with(r#""brace } in text"}"#));

        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.extracted_info.amount.as_deref(), Some("1{0}0"));
        assert_eq!(analysis.verification_status, VerificationStatus::Flagged);
        assert_eq!(analysis.extracted_info.reference_number, None);
    }

    #[test]
    fn missing_or_unbalanced_json_is_an_ai_error() {
        assert!(matches!(parse_analysis("I cannot read this image."), Err(Error::Ai(_))));
        assert!(matches!(parse_analysis("{\"extracted_info\": {"), Err(Error::Ai(_))));
        assert!(matches!(parse_analysis("{not json}"), Err(Error::Json(_))));
    }

    #[test]
    fn reads_candidate_text_or_reports_api_error() {
        let ok = json!({"candidates": [{"content": {"parts": [{"text": "{}"}]}}]});
        assert_eq!(candidate_text(&ok).unwrap(), "{}");

        let err = json!({"error": {"code": 400, "message": "API key not valid"}});
        match candidate_text(&err) {
            Err(Error::Ai(msg)) => assert!(msg.contains("API key not valid")),
            other => panic!("unexpected: {:?}", other),
        }

        assert!(candidate_text(&json!({"candidates": []})).is_err());
    }
}

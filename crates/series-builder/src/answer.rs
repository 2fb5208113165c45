use dashboard_core::TaskError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Answer produced by the qualitative assistant, with its audit scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitativeAnswer {
    pub final_response: String,
    pub faithfulness: f64,
    pub relevancy: f64,
}

#[derive(Debug, Default, Deserialize)]
struct AuditScore {
    #[serde(default)]
    faithfulness: Option<f64>,
    #[serde(default)]
    answer_relevancy: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawAnswer {
    final_response: String,
    #[serde(default)]
    audit_score: Option<AuditScore>,
}

impl QualitativeAnswer {
    pub fn from_payload(payload: Value) -> Result<Self, TaskError> {
        let raw: RawAnswer = serde_json::from_value(payload)
            .map_err(|e| TaskError::DataShape(format!("qualitative answer: {}", e)))?;
        let audit = raw.audit_score.unwrap_or_default();
        Ok(Self {
            final_response: raw.final_response,
            faithfulness: audit.faithfulness.filter(|v| v.is_finite()).unwrap_or(0.0),
            relevancy: audit.answer_relevancy.filter(|v| v.is_finite()).unwrap_or(0.0),
        })
    }

    pub fn faithfulness_pct(&self) -> f64 {
        as_percent(self.faithfulness)
    }

    pub fn relevancy_pct(&self) -> f64 {
        as_percent(self.relevancy)
    }
}

fn as_percent(score: f64) -> f64 {
    let pct = if score <= 1.0 { score * 100.0 } else { score };
    pct.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_answer() {
        let answer = QualitativeAnswer::from_payload(json!({
            "final_response": "Liquidity improved.",
            "audit_score": {"faithfulness": 0.88, "answer_relevancy": 0.94}
        }))
        .unwrap();
        assert_eq!(answer.final_response, "Liquidity improved.");
        assert!((answer.faithfulness_pct() - 88.0).abs() < 1e-9);
        assert!((answer.relevancy_pct() - 94.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_scores_default_to_zero() {
        let answer = QualitativeAnswer::from_payload(json!({"final_response": "ok"})).unwrap();
        assert_eq!(answer.faithfulness_pct(), 0.0);
    }

    #[test]
    fn test_missing_response_is_shape_error() {
        let err = QualitativeAnswer::from_payload(json!({"audit_score": {}})).unwrap_err();
        assert!(matches!(err, TaskError::DataShape(_)));
    }
}

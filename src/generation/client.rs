//! Orchestrates completion calls per generation mode and enforces the JSON
//! contract: fence stripping, balance check, parse, schema validation, and a
//! single bounded repair attempt when the provider reports a length cutoff.

use std::sync::Arc;

use thiserror::Error;
use time::Date;
use tracing::warn;

use crate::generation::calendar::{week_start_of, SeasonalTable, ALSACE};
use crate::generation::context::MealGenerationContext;
use crate::generation::prompts;
use crate::generation::provider::{CompletionProvider, CompletionRequest, FinishReason};
use crate::generation::schema::{GeneratedWeek, MealType};

/// How much of the raw model output is retained on error paths for
/// diagnostics.
const RAW_EXCERPT_CHARS: usize = 1000;

const SYSTEM_PROMPT: &str = "Expert cuisine française. Réponds UNIQUEMENT en JSON valide, sans texte avant/après. Sois concis dans les descriptions et instructions.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation transport error: {0}")]
    Transport(String),
    #[error("generation response truncated and could not be repaired")]
    Truncated { raw_head: String, raw_tail: String },
    #[error("invalid generation response: {reason}")]
    InvalidResponse {
        reason: String,
        raw_head: String,
        raw_tail: String,
    },
}

impl GenerationError {
    fn invalid(reason: impl Into<String>, raw: &str) -> Self {
        GenerationError::InvalidResponse {
            reason: reason.into(),
            raw_head: excerpt_head(raw),
            raw_tail: excerpt_tail(raw),
        }
    }

    fn truncated(raw: &str) -> Self {
        GenerationError::Truncated {
            raw_head: excerpt_head(raw),
            raw_tail: excerpt_tail(raw),
        }
    }
}

fn excerpt_head(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}

fn excerpt_tail(raw: &str) -> String {
    let total = raw.chars().count();
    raw.chars().skip(total.saturating_sub(RAW_EXCERPT_CHARS)).collect()
}

#[derive(Debug, Clone, Copy)]
struct GenerationOptions {
    temperature: f32,
    max_output_tokens: u32,
}

const WEEK_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.7,
    max_output_tokens: 4000,
};
const SLOT_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.7,
    max_output_tokens: 1000,
};
const REPLACE_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.7,
    max_output_tokens: 1000,
};
const ALTERNATIVE_OPTIONS: GenerationOptions = GenerationOptions {
    temperature: 0.7,
    max_output_tokens: 1500,
};

pub struct GenerationClient {
    provider: Arc<dyn CompletionProvider>,
    seasonal: &'static SeasonalTable,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            seasonal: &ALSACE,
        }
    }

    pub async fn generate_week(
        &self,
        ctx: &MealGenerationContext,
        week_start: Option<Date>,
        today: Date,
    ) -> Result<GeneratedWeek, GenerationError> {
        let start = week_start.map(week_start_of).unwrap_or_else(|| week_start_of(today));
        let prompt = prompts::week_prompt(ctx, start, today, self.seasonal);
        self.run(prompt, WEEK_OPTIONS).await
    }

    pub async fn generate_single_slot(
        &self,
        ctx: &MealGenerationContext,
        date: Date,
        meal_type: MealType,
    ) -> Result<GeneratedWeek, GenerationError> {
        let prompt = prompts::single_slot_prompt(ctx, date, meal_type, self.seasonal);
        self.run(prompt, SLOT_OPTIONS).await
    }

    pub async fn replace_meal(
        &self,
        ctx: &MealGenerationContext,
        date: Date,
        meal_type: MealType,
        reason: Option<&str>,
    ) -> Result<GeneratedWeek, GenerationError> {
        let prompt = prompts::replace_prompt(ctx, date, meal_type, reason, self.seasonal);
        self.run(prompt, REPLACE_OPTIONS).await
    }

    pub async fn generate_alternative(
        &self,
        ctx: &MealGenerationContext,
        original_meal_name: &str,
        ingredient_to_exclude: &str,
        date: Date,
        meal_type: MealType,
    ) -> Result<GeneratedWeek, GenerationError> {
        let prompt = prompts::alternative_prompt(
            ctx,
            original_meal_name,
            ingredient_to_exclude,
            date,
            meal_type,
            self.seasonal,
        );
        self.run(prompt, ALTERNATIVE_OPTIONS).await
    }

    async fn run(
        &self,
        user_prompt: String,
        options: GenerationOptions,
    ) -> Result<GeneratedWeek, GenerationError> {
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: user_prompt,
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
        };
        let completion = self
            .provider
            .complete(&request)
            .await
            .map_err(|e| GenerationError::Transport(format!("{e:#}")))?;

        let cleaned = strip_code_fences(&completion.text);

        if completion.finish_reason == FinishReason::Length {
            warn!("generation output cut off for length, attempting repair");
            let repaired =
                repair_truncated_week(cleaned).ok_or_else(|| GenerationError::truncated(cleaned))?;
            return parse_week(&repaired).map_err(|e| {
                warn!(error = %e, "truncation repair produced invalid payload");
                GenerationError::truncated(cleaned)
            });
        }

        parse_week(cleaned)
    }
}

/// Strip a Markdown code fence wrapper (```json ... ``` or ``` ... ```).
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Naive brace/bracket balance check, mirroring the pre-parse sanity check
/// on the raw payload. An unbalanced document is rejected outright instead
/// of being handed to the parser.
fn balanced(raw: &str) -> bool {
    let open_braces = raw.matches('{').count();
    let close_braces = raw.matches('}').count();
    let open_brackets = raw.matches('[').count();
    let close_brackets = raw.matches(']').count();
    open_braces == close_braces && open_brackets == close_brackets
}

pub fn parse_week(raw: &str) -> Result<GeneratedWeek, GenerationError> {
    if !balanced(raw) {
        return Err(GenerationError::invalid(
            "incomplete JSON (unbalanced braces/brackets)",
            raw,
        ));
    }
    let week: GeneratedWeek =
        serde_json::from_str(raw).map_err(|e| GenerationError::invalid(e.to_string(), raw))?;
    week.validate()
        .map_err(|reason| GenerationError::invalid(reason, raw))?;
    Ok(week)
}

/// Best-effort reconstruction of a length-truncated `GeneratedWeek`
/// document. A document that already parses is returned unchanged.
/// Otherwise the text is cut after the last complete meal object in the
/// `meals` array and valid closing syntax is synthesized. Returns `None`
/// when no complete meal boundary can be found.
pub fn repair_truncated_week(raw: &str) -> Option<String> {
    if serde_json::from_str::<serde_json::Value>(raw).is_ok() {
        return Some(raw.to_string());
    }

    let meals_key = raw.find("\"meals\"")?;
    let array_open = meals_key + raw[meals_key..].find('[')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut last_complete_meal_end = None;

    for (offset, ch) in raw[array_open + 1..].char_indices() {
        let i = array_open + 1 + offset;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                if depth == 0 {
                    // meals array itself closed; truncation happened later
                    break;
                }
                depth -= 1;
                if depth == 0 && ch == '}' {
                    last_complete_meal_end = Some(i);
                }
            }
            _ => {}
        }
    }

    let end = last_complete_meal_end?;
    let mut fixed = raw[..=end].to_string();
    fixed.push_str("], \"seasonalIngredients\": [], \"dishwareScore\": 5}");
    Some(fixed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::provider::testing::ScriptedProvider;
    use time::macros::date;
    use uuid::Uuid;

    fn meal_fragment(name: &str) -> String {
        format!(
            r#"{{"name": "{name}", "mealType": "dinner", "date": "2024-06-10", "prepTime": 10, "cookTime": 20, "servings": 2, "tags": ["quick"], "instructions": ["Étape 1"], "dishwareTips": "Une poêle.", "ingredients": [{{"name": "riz", "quantity": 200.0, "unit": "g"}}]}}"#
        )
    }

    fn valid_week_json() -> String {
        format!(
            r#"{{"meals": [{}], "seasonalIngredients": ["tomate"], "dishwareScore": 7}}"#,
            meal_fragment("Riz sauté")
        )
    }

    #[test]
    fn strips_json_code_fences() {
        let fenced = format!("```json\n{}\n```", valid_week_json());
        assert_eq!(strip_code_fences(&fenced), valid_week_json());
        let bare = format!("```\n{}\n```", valid_week_json());
        assert_eq!(strip_code_fences(&bare), valid_week_json());
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn unbalanced_json_is_rejected_without_repair() {
        let err = parse_week(r#"{"meals": [{"name": "x""#).unwrap_err();
        match err {
            GenerationError::InvalidResponse { reason, .. } => {
                assert!(reason.contains("unbalanced"))
            }
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn repair_leaves_valid_document_unchanged() {
        let raw = valid_week_json();
        assert_eq!(repair_truncated_week(&raw).unwrap(), raw);
    }

    #[test]
    fn repair_recovers_partial_meals_from_truncated_output() {
        let truncated = format!(
            r#"{{"meals": [{}, {}, {{"name": "Coupé en plein mil"#,
            meal_fragment("Riz sauté"),
            meal_fragment("Wok de légumes")
        );
        let fixed = repair_truncated_week(&truncated).expect("repairable");
        let week = parse_week(&fixed).expect("repaired document parses");
        assert_eq!(week.meals.len(), 2);
        assert_eq!(week.meals[0].name, "Riz sauté");
        assert_eq!(week.meals[1].name, "Wok de légumes");
        assert_eq!(week.dishware_score, 5.0);
        assert!(week.seasonal_ingredients.is_empty());
    }

    #[test]
    fn repair_fails_when_no_meal_completed() {
        let truncated = r#"{"meals": [{"name": "Jamais fini", "prepTi"#;
        assert!(repair_truncated_week(truncated).is_none());
    }

    #[test]
    fn error_excerpts_are_bounded() {
        let raw = "x".repeat(5000);
        match GenerationError::invalid("boom", &raw) {
            GenerationError::InvalidResponse {
                raw_head, raw_tail, ..
            } => {
                assert_eq!(raw_head.chars().count(), 1000);
                assert_eq!(raw_tail.chars().count(), 1000);
            }
            _ => unreachable!(),
        }
    }

    fn client(responses: Vec<anyhow::Result<crate::generation::provider::Completion>>) -> GenerationClient {
        GenerationClient::new(Arc::new(ScriptedProvider::new(responses)))
    }

    #[tokio::test]
    async fn single_slot_round_trip() {
        let client = client(vec![ScriptedProvider::ok(&valid_week_json())]);
        let ctx = MealGenerationContext::new(Uuid::new_v4());
        let week = client
            .generate_single_slot(&ctx, date!(2024 - 06 - 10), MealType::Dinner)
            .await
            .unwrap();
        assert_eq!(week.meals.len(), 1);
        assert_eq!(week.meals[0].name, "Riz sauté");
    }

    #[tokio::test]
    async fn length_cutoff_triggers_repair() {
        let truncated = format!(
            r#"{{"meals": [{}, {{"name": "Coupé"#,
            meal_fragment("Gratin simple")
        );
        let client = client(vec![ScriptedProvider::truncated(&truncated)]);
        let ctx = MealGenerationContext::new(Uuid::new_v4());
        let week = client
            .generate_week(&ctx, Some(date!(2024 - 06 - 10)), date!(2024 - 06 - 10))
            .await
            .unwrap();
        assert_eq!(week.meals.len(), 1);
        assert_eq!(week.meals[0].name, "Gratin simple");
    }

    #[tokio::test]
    async fn unrepairable_truncation_is_a_truncated_error() {
        let client = client(vec![ScriptedProvider::truncated(r#"{"meals": [{"na"#)]);
        let ctx = MealGenerationContext::new(Uuid::new_v4());
        let err = client
            .generate_week(&ctx, Some(date!(2024 - 06 - 10)), date!(2024 - 06 - 10))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Truncated { .. }));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_transport_error() {
        let client = client(vec![Err(anyhow::anyhow!("connection refused"))]);
        let ctx = MealGenerationContext::new(Uuid::new_v4());
        let err = client
            .generate_single_slot(&ctx, date!(2024 - 06 - 10), MealType::Lunch)
            .await
            .unwrap_err();
        match err {
            GenerationError::Transport(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected Transport, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stop_reason_with_valid_json_skips_repair_untouched() {
        let client = client(vec![ScriptedProvider::ok(&valid_week_json())]);
        let ctx = MealGenerationContext::new(Uuid::new_v4());
        let week = client
            .generate_week(&ctx, Some(date!(2024 - 06 - 10)), date!(2024 - 06 - 10))
            .await
            .unwrap();
        assert_eq!(week.dishware_score, 7.0);
        assert_eq!(week.seasonal_ingredients, vec!["tomate".to_string()]);
    }
}

//! Validated shape of the generation model's output. Normalization happens
//! on deserialize (`dessert` meal type, list-form instructions, missing
//! description); `validate` then enforces ranges. A malformed meal rejects
//! the whole batch.

use serde::{Deserialize, Deserializer, Serialize};

use crate::generation::calendar::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            _ => None,
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMeal {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "normalized_meal_type")]
    pub meal_type: MealType,
    pub date: String,
    pub prep_time: i64,
    pub cook_time: i64,
    pub servings: i64,
    pub tags: Vec<String>,
    #[serde(deserialize_with = "canonical_instructions")]
    pub instructions: String,
    pub dishware_tips: String,
    pub ingredients: Vec<GeneratedIngredient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWeek {
    pub meals: Vec<GeneratedMeal>,
    pub seasonal_ingredients: Vec<String>,
    pub dishware_score: f64,
}

/// The model sometimes labels an evening meal `dessert`; fold it into
/// `dinner` before the enum check.
fn normalized_meal_type<'de, D>(deserializer: D) -> Result<MealType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.as_str() {
        "dessert" => Ok(MealType::Dinner),
        other => MealType::parse(other)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown mealType {other:?}"))),
    }
}

/// Instructions arrive either as an ordered step list (canonicalized into a
/// numbered newline-joined string) or as a plain string (kept as-is).
fn canonical_instructions<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInstructions {
        Steps(Vec<String>),
        Text(String),
    }

    Ok(match RawInstructions::deserialize(deserializer)? {
        RawInstructions::Steps(steps) => steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n"),
        RawInstructions::Text(text) => text,
    })
}

impl GeneratedMeal {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("meal name is empty".into());
        }
        if parse_date(&self.date).is_err() {
            return Err(format!("meal {:?} has invalid date {:?}", self.name, self.date));
        }
        if self.prep_time < 0 || self.cook_time < 0 {
            return Err(format!("meal {:?} has negative prep/cook time", self.name));
        }
        if self.servings < 1 {
            return Err(format!("meal {:?} has non-positive servings", self.name));
        }
        Ok(())
    }
}

impl GeneratedWeek {
    pub fn validate(&self) -> Result<(), String> {
        if !(1.0..=10.0).contains(&self.dishware_score) {
            return Err(format!("dishwareScore {} out of range 1..=10", self.dishware_score));
        }
        for meal in &self.meals {
            meal.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal_json(meal_type: &str, instructions: serde_json::Value) -> String {
        serde_json::json!({
            "name": "Gratin de courgettes",
            "mealType": meal_type,
            "date": "2024-06-10",
            "prepTime": 10,
            "cookTime": 25,
            "servings": 2,
            "tags": ["one-pan", "comfort"],
            "instructions": instructions,
            "dishwareTips": "Un seul plat au four.",
            "ingredients": [
                {"name": "courgette", "quantity": 2.0, "unit": "pcs"},
                {"name": "crème", "quantity": 200.0, "unit": "ml", "notes": "entière"}
            ]
        })
        .to_string()
    }

    #[test]
    fn dessert_normalizes_to_dinner() {
        let meal: GeneratedMeal =
            serde_json::from_str(&meal_json("dessert", serde_json::json!("Tout au four."))).unwrap();
        assert_eq!(meal.meal_type, MealType::Dinner);
    }

    #[test]
    fn breakfast_and_lunch_pass_through() {
        for (raw, expected) in [("breakfast", MealType::Breakfast), ("lunch", MealType::Lunch)] {
            let meal: GeneratedMeal =
                serde_json::from_str(&meal_json(raw, serde_json::json!("Une étape."))).unwrap();
            assert_eq!(meal.meal_type, expected);
        }
    }

    #[test]
    fn unknown_meal_type_is_rejected() {
        let err = serde_json::from_str::<GeneratedMeal>(&meal_json(
            "brunch",
            serde_json::json!("Une étape."),
        ));
        assert!(err.is_err());
    }

    #[test]
    fn instruction_list_becomes_numbered_string() {
        let meal: GeneratedMeal = serde_json::from_str(&meal_json(
            "dinner",
            serde_json::json!(["Chop onions", "Fry chicken"]),
        ))
        .unwrap();
        assert_eq!(meal.instructions, "1. Chop onions\n2. Fry chicken");
    }

    #[test]
    fn instruction_string_passes_through() {
        let meal: GeneratedMeal = serde_json::from_str(&meal_json(
            "dinner",
            serde_json::json!("Faire revenir puis gratiner."),
        ))
        .unwrap();
        assert_eq!(meal.instructions, "Faire revenir puis gratiner.");
    }

    #[test]
    fn missing_description_defaults_to_empty() {
        let meal: GeneratedMeal =
            serde_json::from_str(&meal_json("dinner", serde_json::json!("Une étape."))).unwrap();
        assert_eq!(meal.description, "");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let raw = serde_json::json!({
            "mealType": "dinner",
            "date": "2024-06-10"
        })
        .to_string();
        assert!(serde_json::from_str::<GeneratedMeal>(&raw).is_err());
    }

    #[test]
    fn dishware_score_out_of_range_fails_validation() {
        let meal: GeneratedMeal =
            serde_json::from_str(&meal_json("dinner", serde_json::json!("Une étape."))).unwrap();
        let week = GeneratedWeek {
            meals: vec![meal],
            seasonal_ingredients: vec![],
            dishware_score: 11.0,
        };
        assert!(week.validate().is_err());
    }

    #[test]
    fn negative_times_fail_validation() {
        let mut meal: GeneratedMeal =
            serde_json::from_str(&meal_json("dinner", serde_json::json!("Une étape."))).unwrap();
        meal.prep_time = -5;
        assert!(meal.validate().is_err());
    }
}

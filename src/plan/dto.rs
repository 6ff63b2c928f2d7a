//! Wire types for the plan endpoints. Requests and responses are camelCase
//! JSON; dates travel as ISO `YYYY-MM-DD` strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generation::calendar::iso_date;
use crate::plan::assembler::WeekGenerationSummary;
use crate::plan::store::{PlanMeal, PlanWithMeals, RecipeRow};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWeekRequest {
    /// Any date inside the target week; defaults to the current week.
    pub week_start: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceMealRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanIngredientRequest {
    pub ingredient_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanQuery {
    pub week_start: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub dishware_tips: Option<String>,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub tags: serde_json::Value,
    pub ai_generated: bool,
}

impl From<RecipeRow> for RecipeResponse {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            instructions: row.instructions,
            dishware_tips: row.dishware_tips,
            prep_time: row.prep_time,
            cook_time: row.cook_time,
            servings: row.servings,
            tags: row.tags,
            ai_generated: row.ai_generated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSlotResponse {
    pub id: Uuid,
    pub date: String,
    pub meal_type: String,
    pub prep_time: Option<i32>,
    pub recipe: Option<RecipeResponse>,
}

impl From<PlanMeal> for MealSlotResponse {
    fn from(slot: PlanMeal) -> Self {
        Self {
            id: slot.meal.id,
            date: iso_date(slot.meal.date),
            meal_type: slot.meal.meal_type,
            prep_time: slot.meal.prep_time,
            recipe: slot.recipe.map(RecipeResponse::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: Uuid,
    pub household_id: Uuid,
    pub week_start: String,
    pub week_end: String,
    pub meals: Vec<MealSlotResponse>,
}

impl From<PlanWithMeals> for PlanResponse {
    fn from(plan: PlanWithMeals) -> Self {
        Self {
            id: plan.plan.id,
            household_id: plan.plan.household_id,
            week_start: iso_date(plan.plan.week_start),
            week_end: iso_date(plan.plan.week_end),
            meals: plan.meals.into_iter().map(MealSlotResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWeekResponse {
    pub plan: PlanResponse,
    pub summary: WeekGenerationSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanIngredientResponse {
    pub ingredient: String,
    pub meals_updated: usize,
    pub meals_failed: usize,
}

//! Full-week plan assembly. The week is generated slot by slot so one bad
//! completion costs a single slot, never the whole plan: a failed slot is
//! persisted as an empty meal row and the run continues.

use time::Date;
use tracing::{debug, info, warn};

use crate::generation::calendar::{slot_calendar, week_end_of, week_start_of};
use crate::generation::client::GenerationClient;
use crate::generation::context::MealGenerationContext;
use crate::generation::schema::{GeneratedIngredient, GeneratedMeal, MealType};
use crate::plan::store::{NewRecipe, PlanStore, PlanWithMeals};

/// French ingredient names counted as meat when tallying against the
/// household's meat quota.
pub const MEAT_KEYWORDS: &[&str] = &[
    "viande",
    "boeuf",
    "bœuf",
    "porc",
    "poulet",
    "agneau",
    "steak",
    "saucisse",
    "jambon",
    "lard",
    "bacon",
];

pub fn contains_meat(ingredients: &[GeneratedIngredient]) -> bool {
    ingredients.iter().any(|ing| {
        let name = ing.name.to_lowercase();
        MEAT_KEYWORDS.iter().any(|kw| name.contains(kw))
    })
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct WeekGenerationSummary {
    pub slots: usize,
    pub created: usize,
    pub failed: usize,
    pub meat_meals: usize,
}

#[derive(Debug)]
pub struct WeekGenerationOutcome {
    pub plan: PlanWithMeals,
    pub summary: WeekGenerationSummary,
}

/// Generate (or regenerate) a household's plan for the week containing
/// `week_start` (or the current week when `None`). Existing meals for the
/// plan are cleared first. Days already in the past are skipped; remaining
/// days each get a lunch and a dinner slot.
pub async fn generate_week_plan(
    store: &dyn PlanStore,
    client: &GenerationClient,
    mut ctx: MealGenerationContext,
    week_start: Option<Date>,
    today: Date,
) -> anyhow::Result<WeekGenerationOutcome> {
    let start = week_start.map(week_start_of).unwrap_or_else(|| week_start_of(today));
    let end = week_end_of(start);

    let plan = store.upsert_plan(ctx.household_id, start, end).await?;
    let deleted = store.clear_plan_meals(plan.id).await?;
    if deleted > 0 {
        debug!(plan_id = %plan.id, deleted, "cleared previous meals before regeneration");
    }

    let slots = slot_calendar(start, today);
    let mut summary = WeekGenerationSummary {
        slots: slots.len(),
        ..Default::default()
    };
    let meat_quota = ctx.meat_quota();

    for (date, meal_type) in slots {
        match client.generate_single_slot(&ctx, date, meal_type).await {
            Ok(week) => match week.meals.first() {
                Some(meal) => {
                    if contains_meat(&meal.ingredients) {
                        summary.meat_meals += 1;
                        if let Some(quota) = meat_quota {
                            if summary.meat_meals as u32 > quota {
                                warn!(
                                    %date,
                                    %meal_type,
                                    meat_meals = summary.meat_meals,
                                    quota,
                                    "meat quota exceeded for the week"
                                );
                            }
                        }
                    }
                    match persist_slot(store, plan.id, date, meal_type, meal).await {
                        Ok(()) => {
                            ctx.push_recent(meal.name.clone());
                            summary.created += 1;
                        }
                        Err(error) => {
                            warn!(%date, %meal_type, error = %error, "failed to persist generated meal, leaving slot empty");
                            store.insert_meal(plan.id, date, meal_type, None, None).await?;
                            summary.failed += 1;
                        }
                    }
                }
                None => {
                    warn!(%date, %meal_type, "generation returned no meal, leaving slot empty");
                    store.insert_meal(plan.id, date, meal_type, None, None).await?;
                    summary.failed += 1;
                }
            },
            Err(error) => {
                warn!(%date, %meal_type, error = %error, "slot generation failed, leaving slot empty");
                store.insert_meal(plan.id, date, meal_type, None, None).await?;
                summary.failed += 1;
            }
        }
    }

    info!(
        plan_id = %plan.id,
        slots = summary.slots,
        created = summary.created,
        failed = summary.failed,
        meat_meals = summary.meat_meals,
        "week generation finished"
    );

    let plan = store.plan_with_meals(plan.id).await?;
    Ok(WeekGenerationOutcome { plan, summary })
}

/// Total hands-on time recorded on the meal row for quick display.
pub fn total_time(meal: &GeneratedMeal) -> i32 {
    (meal.prep_time + meal.cook_time) as i32
}

async fn persist_slot(
    store: &dyn PlanStore,
    plan_id: uuid::Uuid,
    date: Date,
    meal_type: MealType,
    meal: &GeneratedMeal,
) -> anyhow::Result<()> {
    let recipe_id = store.create_recipe(&NewRecipe::from(meal)).await?;
    // The meal lands on the requested slot regardless of what date the
    // model echoed back; the slot grid is the source of truth.
    store
        .insert_meal(plan_id, date, meal_type, Some(recipe_id), Some(total_time(meal)))
        .await?;
    Ok(())
}

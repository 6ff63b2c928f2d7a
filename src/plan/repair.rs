//! Targeted repair of a single meal slot: replace a meal the household
//! rejected, or swap in an alternative that avoids a newly banned
//! ingredient. Unlike full-week assembly these operations are all-or-nothing
//! and surface failures to the caller.

use anyhow::{bail, Context};
use tracing::info;

use crate::generation::client::GenerationClient;
use crate::generation::context::MealGenerationContext;
use crate::generation::schema::MealType;
use crate::plan::assembler::total_time;
use crate::plan::store::{MealRow, NewRecipe, PlanStore};

/// Replace the recipe bound to an existing meal slot with a freshly
/// generated one. The meal row keeps its identity and slot; only the recipe
/// binding changes.
pub async fn replace_meal_in_plan(
    store: &dyn PlanStore,
    client: &GenerationClient,
    ctx: &MealGenerationContext,
    meal: &MealRow,
    reason: Option<&str>,
) -> anyhow::Result<MealRow> {
    let meal_type = MealType::parse(&meal.meal_type)
        .with_context(|| format!("meal {} has unknown meal type {:?}", meal.id, meal.meal_type))?;

    let week = client
        .replace_meal(ctx, meal.date, meal_type, reason)
        .await
        .context("generating replacement meal")?;
    let Some(generated) = week.meals.first() else {
        bail!("generation returned no replacement meal");
    };

    let recipe_id = store.create_recipe(&NewRecipe::from(generated)).await?;
    let updated = store
        .update_meal_recipe(meal.id, Some(recipe_id), Some(total_time(generated)))
        .await?;
    info!(meal_id = %meal.id, recipe = %generated.name, "meal replaced");
    Ok(updated)
}

/// Generate an alternative for a meal whose current recipe uses an
/// ingredient the household just banned.
pub async fn alternative_without_ingredient(
    store: &dyn PlanStore,
    client: &GenerationClient,
    ctx: &MealGenerationContext,
    meal: &MealRow,
    original_meal_name: &str,
    ingredient: &str,
) -> anyhow::Result<MealRow> {
    let meal_type = MealType::parse(&meal.meal_type)
        .with_context(|| format!("meal {} has unknown meal type {:?}", meal.id, meal.meal_type))?;

    let week = client
        .generate_alternative(ctx, original_meal_name, ingredient, meal.date, meal_type)
        .await
        .context("generating alternative meal")?;
    let Some(generated) = week.meals.first() else {
        bail!("generation returned no alternative meal");
    };

    let recipe_id = store.create_recipe(&NewRecipe::from(generated)).await?;
    let updated = store
        .update_meal_recipe(meal.id, Some(recipe_id), Some(total_time(generated)))
        .await?;
    info!(
        meal_id = %meal.id,
        excluded = ingredient,
        recipe = %generated.name,
        "alternative meal applied"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::provider::testing::ScriptedProvider;
    use crate::plan::store::testing::MemoryPlanStore;
    use std::sync::Arc;
    use time::macros::date;
    use uuid::Uuid;

    fn slot_json(name: &str) -> String {
        format!(
            r#"{{"meals": [{{"name": "{name}", "mealType": "dinner", "date": "2024-06-12", "prepTime": 15, "cookTime": 25, "servings": 2, "tags": [], "instructions": "Une étape.", "dishwareTips": "Un plat.", "ingredients": [{{"name": "lentilles", "quantity": 250.0, "unit": "g"}}]}}], "seasonalIngredients": [], "dishwareScore": 6}}"#
        )
    }

    async fn seeded_plan(store: &MemoryPlanStore) -> (Uuid, MealRow, MealRow) {
        let household = Uuid::new_v4();
        let plan = store
            .upsert_plan(household, date!(2024 - 06 - 10), date!(2024 - 06 - 16))
            .await
            .unwrap();
        let first = store
            .insert_meal(plan.id, date!(2024 - 06 - 12), MealType::Dinner, Some(Uuid::new_v4()), Some(30))
            .await
            .unwrap();
        let second = store
            .insert_meal(plan.id, date!(2024 - 06 - 13), MealType::Lunch, Some(Uuid::new_v4()), Some(20))
            .await
            .unwrap();
        (household, first, second)
    }

    #[tokio::test]
    async fn replace_rebinds_the_same_meal_row() {
        let store = MemoryPlanStore::new();
        let (household, target, other) = seeded_plan(&store).await;
        let old_recipe = target.recipe_id;

        let client = GenerationClient::new(Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::ok(&slot_json("Dahl de lentilles")),
        ])));
        let ctx = MealGenerationContext::new(household);

        let updated = replace_meal_in_plan(&store, &client, &ctx, &target, Some("trop long"))
            .await
            .unwrap();

        assert_eq!(updated.id, target.id);
        assert_ne!(updated.recipe_id, old_recipe);
        assert_eq!(updated.prep_time, Some(40));
        assert_eq!(
            store.recipe_name(updated.recipe_id.unwrap()).as_deref(),
            Some("Dahl de lentilles")
        );

        let untouched = store.get_meal(other.id).await.unwrap().unwrap();
        assert_eq!(untouched.recipe_id, other.recipe_id);
    }

    #[tokio::test]
    async fn replace_failure_propagates_and_changes_nothing() {
        let store = MemoryPlanStore::new();
        let (household, target, _) = seeded_plan(&store).await;
        let old_recipe = target.recipe_id;

        let client = GenerationClient::new(Arc::new(ScriptedProvider::new(vec![Err(
            anyhow::anyhow!("provider down"),
        )])));
        let ctx = MealGenerationContext::new(household);

        let err = replace_meal_in_plan(&store, &client, &ctx, &target, None).await;
        assert!(err.is_err());

        let unchanged = store.get_meal(target.id).await.unwrap().unwrap();
        assert_eq!(unchanged.recipe_id, old_recipe);
    }

    #[tokio::test]
    async fn alternative_rebinds_with_new_recipe() {
        let store = MemoryPlanStore::new();
        let (household, target, _) = seeded_plan(&store).await;

        let client = GenerationClient::new(Arc::new(ScriptedProvider::new(vec![
            ScriptedProvider::ok(&slot_json("Curry sans lardons")),
        ])));
        let ctx = MealGenerationContext::new(household);

        let updated = alternative_without_ingredient(
            &store,
            &client,
            &ctx,
            &target,
            "Tartiflette",
            "lardons",
        )
        .await
        .unwrap();

        assert_eq!(updated.id, target.id);
        assert_eq!(
            store.recipe_name(updated.recipe_id.unwrap()).as_deref(),
            Some("Curry sans lardons")
        );
    }

    #[tokio::test]
    async fn unknown_stored_meal_type_is_rejected() {
        let store = MemoryPlanStore::new();
        let (household, target, _) = seeded_plan(&store).await;
        let mut corrupt = target.clone();
        corrupt.meal_type = "brunch".into();

        let client = GenerationClient::new(Arc::new(ScriptedProvider::new(vec![])));
        let ctx = MealGenerationContext::new(household);

        let err = replace_meal_in_plan(&store, &client, &ctx, &corrupt, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown meal type"));
    }
}

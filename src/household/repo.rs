//! Household reads feeding the generation context, plus the banned
//! ingredient write path. Preferences are stored as key/value rows with
//! JSON-encoded values; unknown or malformed values fall back to defaults
//! rather than failing the whole load.

use anyhow::Context;
use serde::de::DeserializeOwned;
use sqlx::{FromRow, PgPool};
use time::{Date, Duration};
use tracing::debug;
use uuid::Uuid;

use crate::generation::calendar::RECENT_MEALS_WINDOW_DAYS;
use crate::generation::context::{
    CalendarConstraint, HouseholdPreferences, MealGenerationContext,
};

#[derive(Debug, Clone, FromRow)]
pub struct HouseholdRow {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct IngredientRow {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
}

pub async fn get_household(db: &PgPool, id: Uuid) -> anyhow::Result<Option<HouseholdRow>> {
    let row = sqlx::query_as::<_, HouseholdRow>("SELECT id, name FROM households WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn ingredient_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<IngredientRow>> {
    let row = sqlx::query_as::<_, IngredientRow>(
        "SELECT id, name, normalized_name FROM ingredients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn ban_ingredient(
    db: &PgPool,
    household_id: Uuid,
    ingredient_id: Uuid,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO banned_ingredients (id, household_id, ingredient_id, reason)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (household_id, ingredient_id) DO UPDATE SET reason = EXCLUDED.reason
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(household_id)
    .bind(ingredient_id)
    .bind(reason)
    .execute(db)
    .await
    .context("upsert banned ingredient")?;
    Ok(())
}

fn preference<T: DeserializeOwned + Default>(
    prefs: &[(String, String)],
    key: &str,
) -> T {
    prefs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| serde_json::from_str(v).ok())
        .unwrap_or_default()
}

fn preference_opt<T: DeserializeOwned>(prefs: &[(String, String)], key: &str) -> Option<T> {
    prefs
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| serde_json::from_str(v).ok())
}

/// Assemble the full generation context for a household, scoped to a plan
/// week. Returns `None` when the household does not exist. `exclude_meal`
/// keeps the meal currently being replaced out of its own recent-meals list.
pub async fn load_generation_context(
    db: &PgPool,
    household_id: Uuid,
    week_start: Date,
    week_end: Date,
    today: Date,
    exclude_meal: Option<Uuid>,
) -> anyhow::Result<Option<MealGenerationContext>> {
    if get_household(db, household_id).await?.is_none() {
        return Ok(None);
    }

    let banned: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT i.name
        FROM banned_ingredients b
        JOIN ingredients i ON i.id = b.ingredient_id
        WHERE b.household_id = $1
        ORDER BY i.name
        "#,
    )
    .bind(household_id)
    .fetch_all(db)
    .await
    .context("load banned ingredients")?;

    let prefs: Vec<(String, String)> = sqlx::query_as(
        "SELECT key, value FROM household_preferences WHERE household_id = $1",
    )
    .bind(household_id)
    .fetch_all(db)
    .await
    .context("load household preferences")?;

    let since = today - Duration::days(RECENT_MEALS_WINDOW_DAYS);
    let recent_meals: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT r.name
        FROM meals m
        JOIN recipes r ON r.id = m.recipe_id
        JOIN meal_plans p ON p.id = m.meal_plan_id
        WHERE p.household_id = $1
          AND m.date >= $2
          AND ($3::uuid IS NULL OR m.id <> $3)
        ORDER BY m.date DESC
        LIMIT 30
        "#,
    )
    .bind(household_id)
    .bind(since)
    .bind(exclude_meal)
    .fetch_all(db)
    .await
    .context("load recent meals")?;

    #[derive(FromRow)]
    struct ConstraintRow {
        date: Date,
        kind: String,
        description: Option<String>,
    }

    let constraints: Vec<ConstraintRow> = sqlx::query_as(
        r#"
        SELECT date, kind, description
        FROM household_constraints
        WHERE household_id = $1 AND date BETWEEN $2 AND $3
        ORDER BY date
        "#,
    )
    .bind(household_id)
    .bind(week_start)
    .bind(week_end)
    .fetch_all(db)
    .await
    .context("load calendar constraints")?;

    let ctx = MealGenerationContext {
        household_id,
        banned_ingredients: banned,
        recent_meals,
        preferences: HouseholdPreferences {
            diet: preference(&prefs, "diet"),
            allergies: preference(&prefs, "allergies"),
            objectives: preference(&prefs, "objectives"),
            time_constraints: preference(&prefs, "timeConstraints"),
        },
        meat_frequency: preference_opt(&prefs, "meatFrequency"),
        meals_per_week: preference_opt(&prefs, "mealsPerWeek"),
        prioritize_seasonal: preference(&prefs, "prioritizeSeasonal"),
        min_dishware: preference(&prefs, "minDishware"),
        constraints: constraints
            .into_iter()
            .map(|row| CalendarConstraint {
                date: row.date,
                kind: row.kind,
                description: row.description,
            })
            .collect(),
    };
    debug!(
        household_id = %household_id,
        banned = ctx.banned_ingredients.len(),
        recents = ctx.recent_meals.len(),
        constraints = ctx.constraints.len(),
        "generation context loaded"
    );
    Ok(Some(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_decodes_json_values() {
        let prefs = vec![
            ("diet".to_string(), r#"["omnivore"]"#.to_string()),
            ("meatFrequency".to_string(), "3".to_string()),
            ("prioritizeSeasonal".to_string(), "true".to_string()),
        ];
        let diet: Vec<String> = preference(&prefs, "diet");
        assert_eq!(diet, vec!["omnivore".to_string()]);
        assert_eq!(preference_opt::<u32>(&prefs, "meatFrequency"), Some(3));
        assert!(preference::<bool>(&prefs, "prioritizeSeasonal"));
    }

    #[test]
    fn malformed_or_missing_preferences_fall_back() {
        let prefs = vec![("diet".to_string(), "not json".to_string())];
        let diet: Vec<String> = preference(&prefs, "diet");
        assert!(diet.is_empty());
        assert_eq!(preference_opt::<u32>(&prefs, "meatFrequency"), None);
        assert!(!preference::<bool>(&prefs, "minDishware"));
    }
}

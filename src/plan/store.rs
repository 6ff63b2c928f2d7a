//! Plan persistence behind a capability trait, so the assembler and repair
//! flows can run against a fake in tests. The Postgres implementation owns
//! the recipe/ingredient write path; ingredient identity is keyed by a
//! case- and diacritic-insensitive normalized name.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::generation::schema::{GeneratedMeal, MealType};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealPlanRow {
    pub id: Uuid,
    pub household_id: Uuid,
    pub week_start: Date,
    pub week_end: Date,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub date: Date,
    pub meal_type: String,
    pub recipe_id: Option<Uuid>,
    pub prep_time: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeRow {
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

#[derive(Debug, Clone)]
pub struct NewRecipeIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub instructions: String,
    pub dishware_tips: String,
    pub prep_time: i32,
    pub cook_time: i32,
    pub servings: i32,
    pub tags: Vec<String>,
    pub ingredients: Vec<NewRecipeIngredient>,
}

impl From<&GeneratedMeal> for NewRecipe {
    fn from(meal: &GeneratedMeal) -> Self {
        Self {
            name: meal.name.clone(),
            description: if meal.description.is_empty() {
                None
            } else {
                Some(meal.description.clone())
            },
            instructions: meal.instructions.clone(),
            dishware_tips: meal.dishware_tips.clone(),
            prep_time: meal.prep_time as i32,
            cook_time: meal.cook_time as i32,
            servings: meal.servings as i32,
            tags: meal.tags.clone(),
            ingredients: meal
                .ingredients
                .iter()
                .map(|ing| NewRecipeIngredient {
                    name: ing.name.clone(),
                    quantity: ing.quantity,
                    unit: ing.unit.clone(),
                    notes: ing.notes.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanMeal {
    pub meal: MealRow,
    pub recipe: Option<RecipeRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanWithMeals {
    pub plan: MealPlanRow,
    pub meals: Vec<PlanMeal>,
}

/// A meal slot whose current recipe references some ingredient, with the
/// recipe name needed to prompt for an alternative.
#[derive(Debug, Clone)]
pub struct AffectedMeal {
    pub meal: MealRow,
    pub recipe_name: String,
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn upsert_plan(
        &self,
        household_id: Uuid,
        week_start: Date,
        week_end: Date,
    ) -> anyhow::Result<MealPlanRow>;

    /// Regenerating a week is a full replace: all prior meal rows go first.
    async fn clear_plan_meals(&self, plan_id: Uuid) -> anyhow::Result<u64>;

    async fn create_recipe(&self, recipe: &NewRecipe) -> anyhow::Result<Uuid>;

    /// `recipe_id = None` records an explicit empty slot.
    async fn insert_meal(
        &self,
        plan_id: Uuid,
        date: Date,
        meal_type: MealType,
        recipe_id: Option<Uuid>,
        prep_time: Option<i32>,
    ) -> anyhow::Result<MealRow>;

    /// Rebind an existing meal row in place; the meal identity is preserved.
    async fn update_meal_recipe(
        &self,
        meal_id: Uuid,
        recipe_id: Option<Uuid>,
        prep_time: Option<i32>,
    ) -> anyhow::Result<MealRow>;

    async fn get_meal(&self, meal_id: Uuid) -> anyhow::Result<Option<MealRow>>;

    async fn get_plan(&self, plan_id: Uuid) -> anyhow::Result<Option<MealPlanRow>>;

    async fn plan_with_meals(&self, plan_id: Uuid) -> anyhow::Result<PlanWithMeals>;

    async fn find_plan(
        &self,
        household_id: Uuid,
        week_start: Date,
    ) -> anyhow::Result<Option<MealPlanRow>>;

    async fn latest_plan(&self, household_id: Uuid) -> anyhow::Result<Option<MealPlanRow>>;

    async fn meals_containing_ingredient(
        &self,
        plan_id: Uuid,
        normalized_name: &str,
    ) -> anyhow::Result<Vec<AffectedMeal>>;
}

/// Lowercased, diacritic-folded, whitespace-trimmed ingredient key, so
/// "Épinards " and "épinards" resolve to the same row.
pub fn normalize_ingredient_name(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(|c| {
            let folded: &[char] = match c {
                'à' | 'â' | 'ä' => &['a'],
                'é' | 'è' | 'ê' | 'ë' => &['e'],
                'î' | 'ï' => &['i'],
                'ô' | 'ö' => &['o'],
                'ù' | 'û' | 'ü' => &['u'],
                'ç' => &['c'],
                'œ' => &['o', 'e'],
                'æ' => &['a', 'e'],
                _ => return c.to_lowercase().collect::<Vec<_>>(),
            };
            folded.to_vec()
        })
        .collect()
}

#[derive(Clone)]
pub struct PgPlanStore {
    db: PgPool,
}

impl PgPlanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct PlanMealFlat {
    id: Uuid,
    meal_plan_id: Uuid,
    date: Date,
    meal_type: String,
    recipe_id: Option<Uuid>,
    prep_time: Option<i32>,
    r_id: Option<Uuid>,
    r_name: Option<String>,
    r_description: Option<String>,
    r_instructions: Option<String>,
    r_dishware_tips: Option<String>,
    r_prep_time: Option<i32>,
    r_cook_time: Option<i32>,
    r_servings: Option<i32>,
    r_tags: Option<serde_json::Value>,
    r_ai_generated: Option<bool>,
}

impl From<PlanMealFlat> for PlanMeal {
    fn from(flat: PlanMealFlat) -> Self {
        let recipe = flat.r_id.map(|id| RecipeRow {
            id,
            name: flat.r_name.unwrap_or_default(),
            description: flat.r_description,
            instructions: flat.r_instructions.unwrap_or_default(),
            dishware_tips: flat.r_dishware_tips,
            prep_time: flat.r_prep_time.unwrap_or_default(),
            cook_time: flat.r_cook_time.unwrap_or_default(),
            servings: flat.r_servings.unwrap_or_default(),
            tags: flat.r_tags.unwrap_or_default(),
            ai_generated: flat.r_ai_generated.unwrap_or_default(),
        });
        PlanMeal {
            meal: MealRow {
                id: flat.id,
                meal_plan_id: flat.meal_plan_id,
                date: flat.date,
                meal_type: flat.meal_type,
                recipe_id: flat.recipe_id,
                prep_time: flat.prep_time,
            },
            recipe,
        }
    }
}

#[derive(Debug, FromRow)]
struct AffectedMealFlat {
    id: Uuid,
    meal_plan_id: Uuid,
    date: Date,
    meal_type: String,
    recipe_id: Option<Uuid>,
    prep_time: Option<i32>,
    recipe_name: String,
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn upsert_plan(
        &self,
        household_id: Uuid,
        week_start: Date,
        week_end: Date,
    ) -> anyhow::Result<MealPlanRow> {
        let plan = sqlx::query_as::<_, MealPlanRow>(
            r#"
            INSERT INTO meal_plans (id, household_id, week_start, week_end)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (household_id, week_start)
            DO UPDATE SET week_end = EXCLUDED.week_end
            RETURNING id, household_id, week_start, week_end, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(household_id)
        .bind(week_start)
        .bind(week_end)
        .fetch_one(&self.db)
        .await
        .context("upsert meal plan")?;
        Ok(plan)
    }

    async fn clear_plan_meals(&self, plan_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM meals WHERE meal_plan_id = $1")
            .bind(plan_id)
            .execute(&self.db)
            .await
            .context("delete plan meals")?;
        Ok(result.rows_affected())
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> anyhow::Result<Uuid> {
        let mut tx = self.db.begin().await?;

        let recipe_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO recipes
                (id, name, description, instructions, dishware_tips,
                 prep_time, cook_time, servings, tags, ai_generated)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&recipe.name)
        .bind(&recipe.description)
        .bind(&recipe.instructions)
        .bind(&recipe.dishware_tips)
        .bind(recipe.prep_time)
        .bind(recipe.cook_time)
        .bind(recipe.servings)
        .bind(serde_json::json!(recipe.tags))
        .fetch_one(&mut *tx)
        .await
        .context("insert recipe")?;

        for ingredient in &recipe.ingredients {
            let normalized = normalize_ingredient_name(&ingredient.name);
            let ingredient_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO ingredients (id, name, normalized_name, category, unit)
                VALUES ($1, $2, $3, 'other', $4)
                ON CONFLICT (normalized_name) DO UPDATE SET name = ingredients.name
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&ingredient.name)
            .bind(&normalized)
            .bind(&ingredient.unit)
            .fetch_one(&mut *tx)
            .await
            .context("find or create ingredient")?;

            sqlx::query(
                r#"
                INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, notes)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (recipe_id, ingredient_id) DO NOTHING
                "#,
            )
            .bind(recipe_id)
            .bind(ingredient_id)
            .bind(ingredient.quantity)
            .bind(&ingredient.unit)
            .bind(&ingredient.notes)
            .execute(&mut *tx)
            .await
            .context("link recipe ingredient")?;
        }

        tx.commit().await?;
        Ok(recipe_id)
    }

    async fn insert_meal(
        &self,
        plan_id: Uuid,
        date: Date,
        meal_type: MealType,
        recipe_id: Option<Uuid>,
        prep_time: Option<i32>,
    ) -> anyhow::Result<MealRow> {
        let meal = sqlx::query_as::<_, MealRow>(
            r#"
            INSERT INTO meals (id, meal_plan_id, date, meal_type, recipe_id, prep_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, meal_plan_id, date, meal_type, recipe_id, prep_time
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(plan_id)
        .bind(date)
        .bind(meal_type.as_str())
        .bind(recipe_id)
        .bind(prep_time)
        .fetch_one(&self.db)
        .await
        .context("insert meal")?;
        Ok(meal)
    }

    async fn update_meal_recipe(
        &self,
        meal_id: Uuid,
        recipe_id: Option<Uuid>,
        prep_time: Option<i32>,
    ) -> anyhow::Result<MealRow> {
        let meal = sqlx::query_as::<_, MealRow>(
            r#"
            UPDATE meals
            SET recipe_id = $2, prep_time = $3
            WHERE id = $1
            RETURNING id, meal_plan_id, date, meal_type, recipe_id, prep_time
            "#,
        )
        .bind(meal_id)
        .bind(recipe_id)
        .bind(prep_time)
        .fetch_one(&self.db)
        .await
        .context("update meal recipe")?;
        Ok(meal)
    }

    async fn get_meal(&self, meal_id: Uuid) -> anyhow::Result<Option<MealRow>> {
        let meal = sqlx::query_as::<_, MealRow>(
            r#"
            SELECT id, meal_plan_id, date, meal_type, recipe_id, prep_time
            FROM meals
            WHERE id = $1
            "#,
        )
        .bind(meal_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(meal)
    }

    async fn get_plan(&self, plan_id: Uuid) -> anyhow::Result<Option<MealPlanRow>> {
        let plan = sqlx::query_as::<_, MealPlanRow>(
            r#"
            SELECT id, household_id, week_start, week_end, created_at
            FROM meal_plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(plan)
    }

    async fn plan_with_meals(&self, plan_id: Uuid) -> anyhow::Result<PlanWithMeals> {
        let plan = self
            .get_plan(plan_id)
            .await?
            .context("meal plan not found")?;

        let rows = sqlx::query_as::<_, PlanMealFlat>(
            r#"
            SELECT m.id, m.meal_plan_id, m.date, m.meal_type, m.recipe_id, m.prep_time,
                   r.id AS r_id, r.name AS r_name, r.description AS r_description,
                   r.instructions AS r_instructions, r.dishware_tips AS r_dishware_tips,
                   r.prep_time AS r_prep_time, r.cook_time AS r_cook_time,
                   r.servings AS r_servings, r.tags AS r_tags, r.ai_generated AS r_ai_generated
            FROM meals m
            LEFT JOIN recipes r ON r.id = m.recipe_id
            WHERE m.meal_plan_id = $1
            ORDER BY m.date ASC, m.meal_type DESC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await
        .context("load plan meals")?;

        Ok(PlanWithMeals {
            plan,
            meals: rows.into_iter().map(PlanMeal::from).collect(),
        })
    }

    async fn find_plan(
        &self,
        household_id: Uuid,
        week_start: Date,
    ) -> anyhow::Result<Option<MealPlanRow>> {
        let plan = sqlx::query_as::<_, MealPlanRow>(
            r#"
            SELECT id, household_id, week_start, week_end, created_at
            FROM meal_plans
            WHERE household_id = $1 AND week_start = $2
            "#,
        )
        .bind(household_id)
        .bind(week_start)
        .fetch_optional(&self.db)
        .await?;
        Ok(plan)
    }

    async fn latest_plan(&self, household_id: Uuid) -> anyhow::Result<Option<MealPlanRow>> {
        let plan = sqlx::query_as::<_, MealPlanRow>(
            r#"
            SELECT id, household_id, week_start, week_end, created_at
            FROM meal_plans
            WHERE household_id = $1
            ORDER BY week_start DESC
            LIMIT 1
            "#,
        )
        .bind(household_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(plan)
    }

    async fn meals_containing_ingredient(
        &self,
        plan_id: Uuid,
        normalized_name: &str,
    ) -> anyhow::Result<Vec<AffectedMeal>> {
        let rows = sqlx::query_as::<_, AffectedMealFlat>(
            r#"
            SELECT DISTINCT m.id, m.meal_plan_id, m.date, m.meal_type, m.recipe_id,
                   m.prep_time, r.name AS recipe_name
            FROM meals m
            JOIN recipes r ON r.id = m.recipe_id
            JOIN recipe_ingredients ri ON ri.recipe_id = r.id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE m.meal_plan_id = $1 AND i.normalized_name = $2
            "#,
        )
        .bind(plan_id)
        .bind(normalized_name)
        .fetch_all(&self.db)
        .await
        .context("find meals containing ingredient")?;

        Ok(rows
            .into_iter()
            .map(|flat| AffectedMeal {
                meal: MealRow {
                    id: flat.id,
                    meal_plan_id: flat.meal_plan_id,
                    date: flat.date,
                    meal_type: flat.meal_type,
                    recipe_id: flat.recipe_id,
                    prep_time: flat.prep_time,
                },
                recipe_name: flat.recipe_name,
            })
            .collect())
    }
}

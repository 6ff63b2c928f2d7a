use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::generation::calendar::{parse_date, week_start_of};
use crate::household;
use crate::plan::assembler::generate_week_plan;
use crate::plan::dto::{
    BanIngredientRequest, BanIngredientResponse, GenerateWeekRequest, GenerateWeekResponse,
    PlanQuery, PlanResponse, ReplaceMealRequest,
};
use crate::plan::repair::{alternative_without_ingredient, replace_meal_in_plan};
use crate::plan::store::MealRow;
use crate::state::AppState;

fn internal(err: anyhow::Error) -> (StatusCode, String) {
    error!(error = %format!("{err:#}"), "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn bad_date(raw: &str) -> (StatusCode, String) {
    (
        StatusCode::BAD_REQUEST,
        format!("invalid date {raw:?}, expected YYYY-MM-DD"),
    )
}

fn today() -> time::Date {
    OffsetDateTime::now_utc().date()
}

/// POST /households/:id/plan/generate
#[instrument(skip(state, payload), fields(household_id = %household_id))]
pub async fn generate_week(
    State(state): State<AppState>,
    Path(household_id): Path<Uuid>,
    Json(payload): Json<GenerateWeekRequest>,
) -> Result<Json<GenerateWeekResponse>, (StatusCode, String)> {
    let week_start = match payload.week_start.as_deref() {
        Some(raw) => Some(parse_date(raw).map_err(|_| bad_date(raw))?),
        None => None,
    };
    let today = today();
    let start = week_start.map(week_start_of).unwrap_or_else(|| week_start_of(today));
    let end = crate::generation::calendar::week_end_of(start);

    let ctx = household::load_generation_context(&state.db, household_id, start, end, today, None)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "household not found".to_string()))?;

    let outcome = generate_week_plan(state.store.as_ref(), &state.generator, ctx, week_start, today)
        .await
        .map_err(internal)?;

    info!(
        plan_id = %outcome.plan.plan.id,
        created = outcome.summary.created,
        failed = outcome.summary.failed,
        "week plan generated"
    );
    Ok(Json(GenerateWeekResponse {
        plan: PlanResponse::from(outcome.plan),
        summary: outcome.summary,
    }))
}

/// GET /households/:id/plan — the plan for the requested week, falling back
/// to the household's most recent plan when no week is given or matched.
#[instrument(skip(state), fields(household_id = %household_id))]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(household_id): Path<Uuid>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    let plan = match query.week_start.as_deref() {
        Some(raw) => {
            let start = week_start_of(parse_date(raw).map_err(|_| bad_date(raw))?);
            match state
                .store
                .find_plan(household_id, start)
                .await
                .map_err(internal)?
            {
                Some(plan) => Some(plan),
                None => state
                    .store
                    .latest_plan(household_id)
                    .await
                    .map_err(internal)?,
            }
        }
        None => state
            .store
            .latest_plan(household_id)
            .await
            .map_err(internal)?,
    };

    let plan = plan.ok_or((StatusCode::NOT_FOUND, "no meal plan found".to_string()))?;
    let full = state
        .store
        .plan_with_meals(plan.id)
        .await
        .map_err(internal)?;
    Ok(Json(PlanResponse::from(full)))
}

async fn meal_and_context(
    state: &AppState,
    meal_id: Uuid,
    exclude_meal: Option<Uuid>,
) -> Result<(MealRow, crate::generation::context::MealGenerationContext), (StatusCode, String)> {
    let meal = state
        .store
        .get_meal(meal_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "meal not found".to_string()))?;
    let plan = state
        .store
        .get_plan(meal.meal_plan_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "meal plan not found".to_string()))?;
    let ctx = household::load_generation_context(
        &state.db,
        plan.household_id,
        plan.week_start,
        plan.week_end,
        today(),
        exclude_meal,
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "household not found".to_string()))?;
    Ok((meal, ctx))
}

/// POST /meals/:id/replace
#[instrument(skip(state, payload), fields(meal_id = %meal_id))]
pub async fn replace_meal(
    State(state): State<AppState>,
    Path(meal_id): Path<Uuid>,
    Json(payload): Json<ReplaceMealRequest>,
) -> Result<Json<MealRow>, (StatusCode, String)> {
    let (meal, ctx) = meal_and_context(&state, meal_id, Some(meal_id)).await?;
    let updated = replace_meal_in_plan(
        state.store.as_ref(),
        &state.generator,
        &ctx,
        &meal,
        payload.reason.as_deref(),
    )
    .await
    .map_err(internal)?;
    Ok(Json(updated))
}

/// POST /meals/:id/clear — detach the recipe, leaving an explicit empty slot.
#[instrument(skip(state), fields(meal_id = %meal_id))]
pub async fn clear_meal(
    State(state): State<AppState>,
    Path(meal_id): Path<Uuid>,
) -> Result<Json<MealRow>, (StatusCode, String)> {
    state
        .store
        .get_meal(meal_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "meal not found".to_string()))?;
    let updated = state
        .store
        .update_meal_recipe(meal_id, None, None)
        .await
        .map_err(internal)?;
    Ok(Json(updated))
}

/// POST /households/:id/ban-ingredient — record the ban, then regenerate
/// every meal in the current week's plan that uses the ingredient. A meal
/// whose alternative fails keeps its old recipe.
#[instrument(skip(state, payload), fields(household_id = %household_id))]
pub async fn ban_ingredient(
    State(state): State<AppState>,
    Path(household_id): Path<Uuid>,
    Json(payload): Json<BanIngredientRequest>,
) -> Result<Json<BanIngredientResponse>, (StatusCode, String)> {
    let ingredient = household::ingredient_by_id(&state.db, payload.ingredient_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "ingredient not found".to_string()))?;

    household::ban_ingredient(
        &state.db,
        household_id,
        payload.ingredient_id,
        payload.reason.as_deref(),
    )
    .await
    .map_err(internal)?;

    let today = today();
    let mut updated = 0usize;
    let mut failed = 0usize;

    if let Some(plan) = state
        .store
        .find_plan(household_id, week_start_of(today))
        .await
        .map_err(internal)?
    {
        let affected = state
            .store
            .meals_containing_ingredient(plan.id, &ingredient.normalized_name)
            .await
            .map_err(internal)?;
        for entry in affected {
            let ctx = household::load_generation_context(
                &state.db,
                household_id,
                plan.week_start,
                plan.week_end,
                today,
                Some(entry.meal.id),
            )
            .await
            .map_err(internal)?
            .ok_or((StatusCode::NOT_FOUND, "household not found".to_string()))?;

            match alternative_without_ingredient(
                state.store.as_ref(),
                &state.generator,
                &ctx,
                &entry.meal,
                &entry.recipe_name,
                &ingredient.name,
            )
            .await
            {
                Ok(_) => updated += 1,
                Err(error) => {
                    warn!(meal_id = %entry.meal.id, error = %format!("{error:#}"), "alternative generation failed, keeping existing meal");
                    failed += 1;
                }
            }
        }
    }

    Ok(Json(BanIngredientResponse {
        ingredient: ingredient.name,
        meals_updated: updated,
        meals_failed: failed,
    }))
}

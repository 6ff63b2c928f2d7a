//! Deterministic prompt construction for the four generation modes. Pure
//! functions of the context plus an injected "today" and seasonal table; the
//! only instruction contract is "return one JSON object matching the
//! GeneratedWeek schema, nothing else".
//!
//! The product copy is French, carried over from the WeekEat authoring
//! rules: desirable comfort food, <= 10 ingredients (salt/pepper/oil
//! excluded), <= 4 steps, one main vessel, <= 2 vegetable types.

use time::Date;

use crate::generation::calendar::{clipped_week_dates, iso_date, SeasonalTable};
use crate::generation::context::MealGenerationContext;
use crate::generation::schema::MealType;

const WEEK_RECENT_CAP: usize = 25;
const SLOT_RECENT_CAP: usize = 20;

fn list_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

fn recent_list(recents: &[String], cap: usize) -> String {
    if recents.is_empty() {
        "aucun".to_string()
    } else {
        recents.iter().take(cap).cloned().collect::<Vec<_>>().join(" | ")
    }
}

fn constraints_line(ctx: &MealGenerationContext) -> String {
    if ctx.constraints.is_empty() {
        return "aucune".to_string();
    }
    ctx.constraints
        .iter()
        .map(|c| {
            let mut line = format!("{}: {}", iso_date(c.date), c.kind);
            if let Some(desc) = &c.description {
                line.push_str(&format!(" ({desc})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn hard_rules(banned: &str, recent: &str, seasonal: &str) -> String {
    format!(
        "CONTRAINTES DURES\n\
         - Ingrédients bannis: {banned}\n\
         - Repas récents à éviter strictement: {recent}\n\
         - 10 ingrédients max (hors sel/poivre/huile)\n\
         - 4 étapes max\n\
         - 1 ustensile principal max (poêle OU casserole OU plaque four)\n\
         - Légumes max: 2 types\n\
         - Saisonnier (bonus, 0 à 1 ingrédient principal): {seasonal}"
    )
}

fn single_meal_schema(meal_type: MealType, date: Date) -> String {
    format!(
        "{{\n  \"meals\": [{{\n    \"name\": \"string\",\n    \"description\": \"string (<= 15 mots)\",\n    \"mealType\": \"{meal_type}\",\n    \"date\": \"{date}\",\n    \"prepTime\": number,\n    \"cookTime\": number,\n    \"servings\": 2,\n    \"tags\": [\"one-pan\", \"comfort\", \"quick\"],\n    \"instructions\": [\"Étape 1\", \"Étape 2\", \"Étape 3\", \"Étape 4\"],\n    \"dishwareTips\": \"string\",\n    \"ingredients\": [{{\"name\":\"string\",\"quantity\":number,\"unit\":\"g|ml|pcs|tbsp|tsp\"}}]\n  }}],\n  \"seasonalIngredients\": [\"string\"],\n  \"dishwareScore\": number\n}}",
        date = iso_date(date),
    )
}

const WEEK_SCHEMA: &str = r#"{
  "meals": [
    {
      "name": "string",
      "description": "string (<= 15 mots)",
      "mealType": "lunch" | "dinner",
      "date": "YYYY-MM-DD",
      "prepTime": number,
      "cookTime": number,
      "servings": number,
      "tags": ["one-pan", "comfort", "quick", "budget", ...],
      "instructions": ["Étape 1", "Étape 2", "Étape 3", "Étape 4"],
      "dishwareTips": "string (1 phrase)",
      "ingredients": [
        { "name": "string", "quantity": number, "unit": "g|ml|pcs|tbsp|tsp", "notes": "string optionnel" }
      ]
    }
  ],
  "seasonalIngredients": ["string"],
  "dishwareScore": number
}"#;

/// Full-week prompt. The date window is clipped to `today`; a fully past
/// week still yields a well-formed prompt requesting zero meals.
pub fn week_prompt(
    ctx: &MealGenerationContext,
    week_start: Date,
    today: Date,
    seasonal: &SeasonalTable,
) -> String {
    let dates = clipped_week_dates(week_start, today);
    let target_meals = dates.len() * 2;
    let date_list = if dates.is_empty() {
        "aucune".to_string()
    } else {
        dates.iter().map(|d| iso_date(*d)).collect::<Vec<_>>().join(", ")
    };
    let seasonal_list = seasonal.for_month(today.month()).join(", ");

    let diet = list_or(&ctx.preferences.diet, "aucune");
    let allergies = list_or(&ctx.preferences.allergies, "aucune");
    let objectives = list_or(&ctx.preferences.objectives, "aucun");
    let time_constraints = list_or(&ctx.preferences.time_constraints, "aucune");
    let calendar = constraints_line(ctx);
    let banned = list_or(&ctx.banned_ingredients, "aucun");
    let recent = recent_list(&ctx.recent_meals, WEEK_RECENT_CAP);

    let meat_rule = match ctx.meat_quota() {
        Some(target) => {
            format!("\n7) Viande: exactement {target} repas avec viande sur {target_meals} repas.")
        }
        None => String::new(),
    };

    format!(
        "Tu es un chef pragmatique + meal-planner. Ton but est de proposer des repas \"envie de les faire\", simples, rapides, et réalistes pour un supermarché classique.\n\
         \n\
         TÂCHE\n\
         Génère {target_meals} repas pour les dates suivantes (2 par jour: lunch + dinner). Ne génère pas pour les jours passés.\n\
         \n\
         DATES (ISO)\n\
         {date_list}\n\
         \n\
         PROFIL FOYER\n\
         - Portions: 2\n\
         - Régime: {diet}\n\
         - Allergies: {allergies}\n\
         - Objectifs: {objectives}\n\
         - Contraintes temps: {time_constraints}\n\
         - Contraintes calendrier: {calendar}\n\
         \n\
         CONTRAINTES DURES (OBLIGATOIRES)\n\
         1) Ingrédients bannis: {banned}\n\
            - Interdiction absolue: aucun repas ne doit contenir ces ingrédients.\n\
         2) Variété: ne pas proposer un repas déjà mangé dans les 30 derniers jours.\n\
            - Déjà mangés (à éviter strictement): {recent}\n\
         3) 1 lunch + 1 dinner par date, pour chaque date listée.\n\
         4) Simplicité:\n\
            - 4 étapes max\n\
            - 10 ingrédients max (hors sel, poivre, huile)\n\
            - 1 ustensile principal max (poêle OU casserole OU plaque four)\n\
         5) Supermarché standard: pas d'ingrédients rares, pas de techniques avancées.\n\
         6) \"Vaisselle minimale\" = vrai: recettes réellement one-pan / one-pot, pas de 3 casseroles.{meat_rule}\n\
         \n\
         RÈGLES POUR ÉVITER LES \"REPAS TRISTES\"\n\
         - Priorité à des plats désirables (comfort food) mais équilibrés.\n\
         - Légumes: max 2 types par repas, privilégie les légumes faciles et appréciés.\n\
         - Le \"saisonnier\" est un bonus, pas une punition: 1 ingrédient de saison principal max par repas.\n\
         - Liste saison Alsace (suggestions, pas obligation): {seasonal_list}\n\
         \n\
         FORMAT DE SORTIE\n\
         Retourne uniquement un objet JSON valide selon ce schéma, sans texte autour.\n\
         \n\
         SCHÉMA JSON\n\
         {WEEK_SCHEMA}\n\
         \n\
         RAPPELS\n\
         - ingredients <= 10 (hors sel/poivre/huile)\n\
         - steps <= 4\n\
         - Chaque date listée a 1 lunch + 1 dinner\n\
         - Aucun ingrédient banni\n\
         - Aucun repas similaire aux récents (évite aussi les variantes proches)"
    )
}

/// One slot of the incremental full-week run. Same rule set as the week
/// prompt, scoped to a single date and meal type.
pub fn single_slot_prompt(
    ctx: &MealGenerationContext,
    date: Date,
    meal_type: MealType,
    seasonal: &SeasonalTable,
) -> String {
    let seasonal_list = seasonal.for_month(date.month()).join(", ");
    let banned = list_or(&ctx.banned_ingredients, "aucun");
    let recent = recent_list(&ctx.recent_meals, WEEK_RECENT_CAP);
    let diet = list_or(&ctx.preferences.diet, "aucune");
    let allergies = list_or(&ctx.preferences.allergies, "aucune");
    let time_constraints = list_or(&ctx.preferences.time_constraints, "aucune");

    let day_constraint = ctx
        .constraints
        .iter()
        .find(|c| c.date == date)
        .map(|c| {
            let desc = c.description.as_deref().unwrap_or("");
            format!("\n- Contrainte du jour: {} {}", c.kind, desc).trim_end().to_string()
        })
        .unwrap_or_default();

    format!(
        "Tu génères UN SEUL repas. Objectif: plat appétissant, simple, rapide, supermarché standard, vaisselle minimale.\n\
         \n\
         REPAS DEMANDÉ\n\
         - date: {date}\n\
         - mealType: {meal_type}\n\
         - Régime: {diet}\n\
         - Allergies: {allergies}\n\
         - Contraintes temps: {time_constraints}{day_constraint}\n\
         \n\
         {rules}\n\
         \n\
         SORTIE\n\
         Uniquement un objet JSON valide selon ce schéma:\n\
         \n\
         {schema}",
        date = iso_date(date),
        rules = hard_rules(&banned, &recent, &seasonal_list),
        schema = single_meal_schema(meal_type, date),
    )
}

/// Replacement of one already-planned slot. The caller must have removed the
/// replaced meal's own name from `ctx.recent_meals`.
pub fn replace_prompt(
    ctx: &MealGenerationContext,
    date: Date,
    meal_type: MealType,
    reason: Option<&str>,
    seasonal: &SeasonalTable,
) -> String {
    let seasonal_list = seasonal.for_month(date.month()).join(", ");
    let banned = list_or(&ctx.banned_ingredients, "aucun");
    let recent = recent_list(&ctx.recent_meals, SLOT_RECENT_CAP);
    let reason_line = reason
        .map(|r| format!("\n- raison: {r}"))
        .unwrap_or_default();

    format!(
        "Tu remplaces un seul repas. Objectif: proposer un plat appétissant, simple, rapide, supermarché standard, vaisselle minimale.\n\
         \n\
         À REMPLACER\n\
         - date: {date}\n\
         - mealType: {meal_type}{reason_line}\n\
         \n\
         {rules}\n\
         \n\
         SORTIE\n\
         Uniquement un objet JSON valide selon ce schéma:\n\
         \n\
         {schema}",
        date = iso_date(date),
        rules = hard_rules(&banned, &recent, &seasonal_list),
        schema = single_meal_schema(meal_type, date),
    )
}

/// Alternative to an existing meal without one ingredient. The excluded
/// ingredient joins the banned set for this prompt only.
pub fn alternative_prompt(
    ctx: &MealGenerationContext,
    original_meal_name: &str,
    ingredient_to_exclude: &str,
    date: Date,
    meal_type: MealType,
    seasonal: &SeasonalTable,
) -> String {
    let mut banned: Vec<String> = ctx.banned_ingredients.clone();
    if !ingredient_to_exclude.is_empty() {
        banned.push(ingredient_to_exclude.to_string());
    }
    let banned = list_or(&banned, "aucun");
    let recent = recent_list(&ctx.recent_meals, SLOT_RECENT_CAP);
    let seasonal_list = seasonal.for_month(date.month()).join(", ");

    format!(
        "Tu proposes une alternative à \"{original_meal_name}\" mais SANS \"{ingredient_to_exclude}\".\n\
         \n\
         CIBLE\n\
         - date: {date}\n\
         - mealType: {meal_type}\n\
         \n\
         {rules}\n\
         \n\
         STYLE\n\
         - Reste dans une vibe proche (comfort, gourmand) sans être une variante déguisée.\n\
         - Supermarché standard.\n\
         \n\
         SORTIE\n\
         Uniquement un objet JSON valide selon ce schéma:\n\
         \n\
         {schema}",
        date = iso_date(date),
        rules = hard_rules(&banned, &recent, &seasonal_list),
        schema = single_meal_schema(meal_type, date),
    )
}

use time::Date;
use uuid::Uuid;

use crate::generation::calendar::RECENT_MEALS_WINDOW;

#[derive(Debug, Clone, Default)]
pub struct HouseholdPreferences {
    pub diet: Vec<String>,
    pub allergies: Vec<String>,
    pub objectives: Vec<String>,
    pub time_constraints: Vec<String>,
}

/// A per-day calendar override, e.g. "no meal this day" or "restaurant".
#[derive(Debug, Clone)]
pub struct CalendarConstraint {
    pub date: Date,
    pub kind: String,
    pub description: Option<String>,
}

/// Snapshot of everything the generator needs about a household. Built fresh
/// per invocation and discarded; `recent_meals` is mutated during a full-week
/// run so later slots see earlier slots' names.
#[derive(Debug, Clone)]
pub struct MealGenerationContext {
    pub household_id: Uuid,
    pub banned_ingredients: Vec<String>,
    pub recent_meals: Vec<String>,
    pub preferences: HouseholdPreferences,
    pub meat_frequency: Option<u32>,
    pub meals_per_week: Option<u32>,
    pub prioritize_seasonal: bool,
    pub min_dishware: bool,
    pub constraints: Vec<CalendarConstraint>,
}

impl MealGenerationContext {
    pub fn new(household_id: Uuid) -> Self {
        Self {
            household_id,
            banned_ingredients: Vec::new(),
            recent_meals: Vec::new(),
            preferences: HouseholdPreferences::default(),
            meat_frequency: None,
            meals_per_week: None,
            prioritize_seasonal: false,
            min_dishware: false,
            constraints: Vec::new(),
        }
    }

    /// Prepend a freshly accepted meal name, keeping the tracked window
    /// capped so prompts stay bounded.
    pub fn push_recent(&mut self, name: impl Into<String>) {
        self.recent_meals.insert(0, name.into());
        self.recent_meals.truncate(RECENT_MEALS_WINDOW);
    }

    /// The meat quota only applies to omnivore households.
    pub fn meat_quota(&self) -> Option<u32> {
        if self.preferences.diet.iter().any(|d| d == "omnivore") {
            self.meat_frequency
        } else {
            None
        }
    }
}

mod repo;

pub use repo::{
    ban_ingredient, get_household, ingredient_by_id, load_generation_context, HouseholdRow,
    IngredientRow,
};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Duration, Month};

use crate::generation::schema::MealType;

/// Trailing window of meal names used to forbid repeats, in entries and days.
pub const RECENT_MEALS_WINDOW: usize = 30;
pub const RECENT_MEALS_WINDOW_DAYS: i64 = 30;

pub const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub fn iso_date(date: Date) -> String {
    date.format(DATE_FORMAT).expect("ISO date format")
}

pub fn parse_date(raw: &str) -> anyhow::Result<Date> {
    Ok(Date::parse(raw, DATE_FORMAT)?)
}

/// Monday of the ISO week containing `date`.
pub fn week_start_of(date: Date) -> Date {
    date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

pub fn week_end_of(week_start: Date) -> Date {
    week_start + Duration::days(6)
}

/// Dates of the week starting at `week_start`, clipped so past days are never
/// targeted. Empty when the whole week is already behind `today`.
pub fn clipped_week_dates(week_start: Date, today: Date) -> Vec<Date> {
    let end = week_end_of(week_start);
    let mut current = week_start.max(today);
    let mut dates = Vec::new();
    while current <= end {
        dates.push(current);
        current += Duration::days(1);
    }
    dates
}

/// One lunch and one dinner slot per remaining date, in calendar order.
/// Breakfast is never generated.
pub fn slot_calendar(week_start: Date, today: Date) -> Vec<(Date, MealType)> {
    clipped_week_dates(week_start, today)
        .into_iter()
        .flat_map(|date| [(date, MealType::Lunch), (date, MealType::Dinner)])
        .collect()
}

/// Month-indexed seasonal produce suggestions fed to the prompts as a bonus
/// list, not a hard filter. The default table covers Alsace.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalTable {
    months: [&'static [&'static str]; 12],
}

pub static ALSACE: SeasonalTable = SeasonalTable {
    months: [
        &["carotte", "poireau", "pomme de terre", "courge", "pomme"],
        &["carotte", "poireau", "pomme de terre", "pomme"],
        &["épinard", "radis", "carotte", "poireau"],
        &["asperge", "laitue", "radis", "épinard"],
        &["asperge", "concombre", "fraises", "laitue", "petits pois"],
        &["courgette", "tomate", "concombre", "cerises", "haricot vert"],
        &["courgette", "tomate", "haricot vert", "abricot", "pêche"],
        &["courgette", "tomate", "haricot vert", "prune", "pêche"],
        &["tomate", "haricot vert", "pomme", "poire", "raisin"],
        &["courge", "carotte", "poireau", "pomme", "raisin"],
        &["carotte", "poireau", "pomme de terre", "pomme"],
        &["carotte", "poireau", "pomme de terre", "courge"],
    ],
};

impl SeasonalTable {
    pub fn for_month(&self, month: Month) -> &'static [&'static str] {
        self.months[month as usize - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn week_start_is_monday() {
        assert_eq!(week_start_of(date!(2024 - 06 - 12)), date!(2024 - 06 - 10));
        assert_eq!(week_start_of(date!(2024 - 06 - 10)), date!(2024 - 06 - 10));
        // Sunday belongs to the week started the previous Monday
        assert_eq!(week_start_of(date!(2024 - 06 - 16)), date!(2024 - 06 - 10));
    }

    #[test]
    fn clipping_starts_at_today_for_past_week_start() {
        let dates = clipped_week_dates(date!(2024 - 06 - 10), date!(2024 - 06 - 13));
        assert_eq!(dates.first().copied(), Some(date!(2024 - 06 - 13)));
        assert_eq!(dates.last().copied(), Some(date!(2024 - 06 - 16)));
        assert_eq!(dates.len(), 4);
    }

    #[test]
    fn future_week_is_not_clipped() {
        let dates = clipped_week_dates(date!(2024 - 06 - 17), date!(2024 - 06 - 13));
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], date!(2024 - 06 - 17));
    }

    #[test]
    fn fully_past_week_yields_no_dates() {
        let dates = clipped_week_dates(date!(2024 - 06 - 03), date!(2024 - 06 - 20));
        assert!(dates.is_empty());
    }

    #[test]
    fn slot_calendar_has_lunch_and_dinner_only() {
        let slots = slot_calendar(date!(2024 - 06 - 10), date!(2024 - 06 - 15));
        assert_eq!(
            slots,
            vec![
                (date!(2024 - 06 - 15), MealType::Lunch),
                (date!(2024 - 06 - 15), MealType::Dinner),
                (date!(2024 - 06 - 16), MealType::Lunch),
                (date!(2024 - 06 - 16), MealType::Dinner),
            ]
        );
        assert!(slots.iter().all(|(_, t)| *t != MealType::Breakfast));
    }

    #[test]
    fn seasonal_table_covers_every_month() {
        for month in 1..=12u8 {
            let month = Month::try_from(month).unwrap();
            assert!(!ALSACE.for_month(month).is_empty());
        }
    }

    #[test]
    fn iso_date_round_trip() {
        let d = date!(2024 - 06 - 10);
        assert_eq!(iso_date(d), "2024-06-10");
        assert_eq!(parse_date("2024-06-10").unwrap(), d);
    }
}

use crate::domain::snapshot::Weekday;

/// Expand one selected weekday into the full pickup schedule the chosen
/// frequency needs. Companion days sit at fixed +2/+4 offsets from the
/// selected day.
///
/// TODO: confirm the offset rule with the product owner; it is inherited
/// heuristic behavior, kept in this one function so it can be replaced in
/// a single place.
pub fn pickup_schedule(selected: Weekday, frequency: &str) -> Vec<Weekday> {
    match required_day_count(frequency) {
        7 => Weekday::ALL.to_vec(),
        3 => vec![selected, selected.offset(2), selected.offset(4)],
        2 => vec![selected, selected.offset(2)],
        _ => vec![selected],
    }
}

fn required_day_count(frequency: &str) -> usize {
    match frequency {
        "daily" => 7,
        "thrice_per_week" => 3,
        "twice_per_week" => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::pickup_schedule;
    use crate::domain::snapshot::Weekday;

    #[test]
    fn once_per_week_keeps_only_the_selected_day() {
        assert_eq!(pickup_schedule(Weekday::Tuesday, "once_per_week"), vec![Weekday::Tuesday]);
    }

    #[test]
    fn twice_per_week_adds_a_companion_two_days_later() {
        assert_eq!(
            pickup_schedule(Weekday::Monday, "twice_per_week"),
            vec![Weekday::Monday, Weekday::Wednesday]
        );
        // wraps past the weekend
        assert_eq!(
            pickup_schedule(Weekday::Saturday, "twice_per_week"),
            vec![Weekday::Saturday, Weekday::Monday]
        );
    }

    #[test]
    fn thrice_per_week_spreads_across_the_week() {
        assert_eq!(
            pickup_schedule(Weekday::Monday, "thrice_per_week"),
            vec![Weekday::Monday, Weekday::Wednesday, Weekday::Friday]
        );
    }

    #[test]
    fn daily_covers_all_seven_days() {
        assert_eq!(pickup_schedule(Weekday::Thursday, "daily"), Weekday::ALL.to_vec());
    }

    #[test]
    fn unknown_frequency_degrades_to_the_selected_day() {
        assert_eq!(pickup_schedule(Weekday::Friday, "fortnightly"), vec![Weekday::Friday]);
    }
}

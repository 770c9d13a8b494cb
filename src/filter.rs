use crate::model::{Category, Race, Region};

/// Keeps a race iff its category is selected, and for Gold Cup races the
/// region must also be selected. Stable: input order is preserved.
pub fn filter_races(races: &[Race], categories: &[Category], regions: &[Region]) -> Vec<Race> {
    races
        .iter()
        .filter(|race| {
            let Some(category) = race.category() else {
                return false;
            };
            if !categories.contains(&category) {
                return false;
            }
            if category == Category::GoldCup {
                return race
                    .region()
                    .map(|region| regions.contains(&region))
                    .unwrap_or(false);
            }
            true
        })
        .cloned()
        .collect()
}

/// Symmetric-difference toggle: removes the value if present, appends it
/// otherwise. Order of the remaining entries is preserved.
pub fn toggle<T: PartialEq + Copy>(set: &mut Vec<T>, value: T) {
    if let Some(idx) = set.iter().position(|v| *v == value) {
        set.remove(idx);
    } else {
        set.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::{filter_races, toggle};
    use crate::model::{Category, Race, Region, CATEGORY_OPTIONS, REGION_OPTIONS};

    fn race(name: &str, category: &str, region: Option<&str>) -> Race {
        Race {
            name: Some(name.to_string()),
            category: Some(category.to_string()),
            region: region.map(|r| r.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn filter_keeps_selected_categories_in_order() {
        let races = vec![
            race("a", "National", None),
            race("b", "Practice", None),
            race("c", "State", None),
            race("d", "Multi", None),
        ];
        let categories = vec![Category::National, Category::State, Category::Multi];
        let result = filter_races(&races, &categories, &REGION_OPTIONS.to_vec());
        let names: Vec<_> = result.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[test]
    fn gold_cup_also_requires_region() {
        let races = vec![
            race("ne", "Gold Cup", Some("North East")),
            race("sw", "Gold Cup", Some("South West")),
            race("none", "Gold Cup", None),
        ];
        let categories = CATEGORY_OPTIONS.to_vec();

        let result = filter_races(&races, &categories, &[Region::NorthEast]);
        let names: Vec<_> = result.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["ne"]);

        // No region selected means no Gold Cup races at all.
        let result = filter_races(&races, &categories, &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn non_gold_cup_ignores_region_filters() {
        let races = vec![race("a", "National", Some("North East"))];
        let result = filter_races(&races, &[Category::National], &[]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let result = filter_races(&[], &CATEGORY_OPTIONS, &REGION_OPTIONS);
        assert!(result.is_empty());
    }

    #[test]
    fn unknown_category_is_excluded() {
        let races = vec![race("a", "Freestyle", None)];
        let result = filter_races(&races, &CATEGORY_OPTIONS, &REGION_OPTIONS);
        assert!(result.is_empty());
    }

    #[test]
    fn toggle_roundtrip_restores_set() {
        let original = vec![Category::National, Category::State];
        let mut set = original.clone();
        toggle(&mut set, Category::Multi);
        assert!(set.contains(&Category::Multi));
        toggle(&mut set, Category::Multi);
        assert_eq!(set, original);

        toggle(&mut set, Category::National);
        assert_eq!(set, vec![Category::State]);
        toggle(&mut set, Category::National);
        assert_eq!(set, vec![Category::State, Category::National]);
    }
}

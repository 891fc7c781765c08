use std::collections::{BTreeMap, HashMap};

use oglike_core::costs::{ConstructionCost, FixedCost, StorageRule, amount_of};
use oglike_core::models::ResourceAmount;
use oglike_core::validator::enough_resources;
use proptest::prelude::*;

fn base(metal: i64, crystal: i64) -> BTreeMap<String, i64> {
    [("metal".to_string(), metal), ("crystal".to_string(), crystal)].into()
}

proptest! {
    #[test]
    fn construction_costs_never_decrease(
        metal in 1i64..10_000,
        crystal in 0i64..10_000,
        progression in 1.01f64..3.0,
        level in 1i64..30,
    ) {
        let cost = ConstructionCost::new(base(metal, crystal), progression);
        let here = cost.compute_costs(level);
        let next = cost.compute_costs(level + 1);
        for res in ["metal", "crystal"] {
            prop_assert!(amount_of(&next, res) >= amount_of(&here, res));
        }
    }

    #[test]
    fn first_level_costs_the_base(metal in 1i64..1_000_000, progression in 1.01f64..3.0) {
        let cost = ConstructionCost::new(base(metal, 0), progression);
        prop_assert_eq!(amount_of(&cost.compute_costs(1), "metal"), metal as f64);
    }

    #[test]
    fn unit_costs_scale_linearly(metal in 0i64..100_000, count in 1i64..1_000) {
        let cost = FixedCost::new(base(metal, 1));
        let total = cost.compute_costs(count);
        prop_assert_eq!(amount_of(&total, "metal"), (metal * count) as f64);
        prop_assert_eq!(amount_of(&total, "crystal"), count as f64);
    }

    #[test]
    fn storage_grows_with_level(base_storage in 1.0f64..1e6, level in 0i64..20) {
        let rule = StorageRule {
            resource: "metal".to_string(),
            base: base_storage,
            progression: 1.5,
        };
        prop_assert!(rule.compute_storage(level + 1).amount > rule.compute_storage(level).amount);
    }

    #[test]
    fn affordable_means_every_cost_is_covered(
        costs in prop::collection::vec((0usize..3, 0.0f64..1000.0), 0..6),
        stock in prop::collection::vec(prop::option::of(0.0f64..1000.0), 3),
    ) {
        let names = ["metal", "crystal", "deuterium"];
        let costs: Vec<_> = costs
            .into_iter()
            .map(|(i, amount)| ResourceAmount::new(names[i], amount))
            .collect();
        // A resource the planet has never stocked is absent, not zero
        let available: HashMap<String, f64> = names
            .iter()
            .zip(&stock)
            .filter_map(|(name, amount)| amount.map(|a| (name.to_string(), a)))
            .collect();

        let expected = costs
            .iter()
            .all(|c| available.get(&c.resource).is_some_and(|&a| a >= c.amount));
        prop_assert_eq!(enough_resources(&costs, &available), expected);
    }
}

//! Tree building, product assignment and volume aggregation on the domain model.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rstest::rstest;

use downline::domain::volume::{aggregate, verify};
use downline::domain::{MemberId, PlanType, Position, ProductAssignor, TreeBuilder};
use downline::util::testing::{sample_config, sample_products};

#[rstest]
#[case(PlanType::Binary, 2, 30, 5)]
#[case(PlanType::Matrix, 3, 39, 4)]
#[case(PlanType::Unilevel, 4, 20, 3)]
fn given_full_levels_when_building_then_depth_is_minimal(
    #[case] plan: PlanType,
    #[case] width: u32,
    #[case] members: u32,
    #[case] depth: usize,
) {
    let tree = TreeBuilder::new().build(&sample_config(plan, members, 3, width)).unwrap();

    assert_eq!(tree.len(), members as usize + 1);
    assert_eq!(tree.depth(), depth);
    assert!(tree.members().all(|m| m.children.len() <= width as usize));
}

#[test]
fn given_binary_tree_when_building_then_positions_alternate_left_right() {
    let tree = TreeBuilder::new().build(&sample_config(PlanType::Binary, 10, 2, 2)).unwrap();

    for member in tree.members().skip(1) {
        let expected = if member.id.0 % 2 == 1 { Position::Left } else { Position::Right };
        assert_eq!(member.position, expected, "{}", member.id);
    }
    assert_eq!(tree.member(MemberId::ROOT).unwrap().position, Position::Root);
}

#[test]
fn given_matrix_tree_when_building_then_leg_names_follow_slots() {
    let tree = TreeBuilder::new().build(&sample_config(PlanType::Matrix, 3, 1, 3)).unwrap();

    let legs: Vec<Option<String>> = tree.members().map(|m| m.leg.clone()).collect();
    assert_eq!(
        legs,
        vec![
            None,
            Some("leg-1".to_string()),
            Some("leg-2".to_string()),
            Some("leg-3".to_string())
        ]
    );
}

#[test]
fn given_seeded_rng_when_assigning_then_every_member_but_root_gets_a_product() {
    let mut tree = TreeBuilder::new().build(&sample_config(PlanType::Matrix, 25, 2, 3)).unwrap();
    let products = sample_products();
    let mut rng = ChaCha8Rng::seed_from_u64(99);

    ProductAssignor::new(&products).assign_all(&mut tree, &mut rng);

    let root = tree.member(MemberId::ROOT).unwrap();
    assert!(root.product.is_none());
    assert_relative_eq!(root.personal_volume, 0.0);
    for member in tree.members().skip(1) {
        let product = &products[member.product.unwrap()];
        assert_relative_eq!(member.personal_volume, product.business_volume);
    }
}

#[test]
fn given_assigned_tree_when_aggregating_then_verify_passes_and_root_sums_everything() {
    let mut tree = TreeBuilder::new().build(&sample_config(PlanType::Binary, 50, 5, 2)).unwrap();
    let products = sample_products();
    ProductAssignor::new(&products).assign_all(&mut tree, &mut ChaCha8Rng::seed_from_u64(1));

    aggregate(&mut tree);

    verify(&tree).unwrap();
    let personal: f64 = tree.members().map(|m| m.personal_volume).sum();
    let root = tree.member(MemberId::ROOT).unwrap();
    assert_relative_eq!(root.team_volume, personal, max_relative = 1e-12);
    assert!(root.personal_volume_per_cycle.is_empty());
    assert_eq!(root.team_volume_per_cycle.len(), 5);
}

#[test]
fn given_leaf_when_aggregating_then_team_volume_is_zero_and_personal_series_has_join_cycle() {
    let mut tree = TreeBuilder::new().build(&sample_config(PlanType::Unilevel, 6, 3, 2)).unwrap();
    let products = sample_products();
    ProductAssignor::new(&products).assign_all(&mut tree, &mut ChaCha8Rng::seed_from_u64(4));

    aggregate(&mut tree);

    for id in tree.leaf_ids() {
        let leaf = tree.member(id).unwrap();
        assert_relative_eq!(leaf.team_volume, 0.0);
        assert!(leaf.leg_volumes.is_empty());
        assert_eq!(leaf.personal_volume_per_cycle.keys().copied().collect::<Vec<_>>(), vec![leaf.join_cycle]);
    }
}

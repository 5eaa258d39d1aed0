//! Weighted product selection.

use rand::Rng;
use tracing::instrument;

use crate::domain::arena::{GenealogyTree, Member};
use crate::domain::entities::{Product, SALES_RATIO_TOTAL};

/// Picks a product per member proportionally to the products' sales ratios.
pub struct ProductAssignor<'a> {
    products: &'a [Product],
}

impl<'a> ProductAssignor<'a> {
    pub fn new(products: &'a [Product]) -> Self {
        Self { products }
    }

    /// Index of the product selected by a draw `r` in `[0, 100)`.
    ///
    /// The first product whose cumulative ratio reaches `r` wins; rounding
    /// gaps fall back to the last product.
    pub fn select(&self, r: f64) -> Option<usize> {
        let mut cumulative = 0.0;
        for (i, product) in self.products.iter().enumerate() {
            cumulative += product.sales_ratio;
            if cumulative >= r {
                return Some(i);
            }
        }
        self.products.len().checked_sub(1)
    }

    /// Draws a product for `member` and credits its business volume.
    pub fn assign<R: Rng>(&self, member: &mut Member, rng: &mut R) -> Option<&'a Product> {
        let r = rng.gen_range(0.0..SALES_RATIO_TOTAL);
        let idx = self.select(r)?;
        let product = &self.products[idx];
        member.product = Some(idx);
        member.personal_volume = product.business_volume;
        Some(product)
    }

    /// Assigns every non-root member in creation order.
    #[instrument(level = "debug", skip_all, fields(members = tree.len() - 1))]
    pub fn assign_all<R: Rng>(&self, tree: &mut GenealogyTree, rng: &mut R) {
        let order = tree.indices().to_vec();
        for idx in order.into_iter().skip(1) {
            if let Some(member) = tree.get_mut(idx) {
                self.assign(member, rng);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::TreeBuilder;
    use crate::domain::entities::{PlanType, SimulationConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    fn products() -> Vec<Product> {
        vec![
            Product::new("starter", 50.0, 20.0),
            Product::new("pro", 100.0, 30.0),
            Product::new("elite", 300.0, 50.0),
        ]
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(20.0, 0)]
    #[case(20.01, 1)]
    #[case(50.0, 1)]
    #[case(99.99, 2)]
    fn given_draw_when_selecting_then_uses_cumulative_ratio(#[case] r: f64, #[case] expected: usize) {
        let products = products();
        assert_eq!(ProductAssignor::new(&products).select(r), Some(expected));
    }

    #[test]
    fn given_ratios_short_of_draw_when_selecting_then_falls_back_to_last() {
        let products = vec![Product::new("a", 1.0, 49.995), Product::new("b", 1.0, 49.995)];
        assert_eq!(ProductAssignor::new(&products).select(99.995), Some(1));
    }

    #[test]
    fn given_tree_when_assigning_all_then_root_keeps_zero_volume() {
        let config = SimulationConfig::new(PlanType::Matrix, 30, 2, 3, products());
        let mut tree = TreeBuilder::new().build(&config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        ProductAssignor::new(&config.products).assign_all(&mut tree, &mut rng);

        let root = tree.member(crate::domain::entities::MemberId::ROOT).unwrap();
        assert!(root.product.is_none());
        assert_eq!(root.personal_volume, 0.0);
        for member in tree.members().skip(1) {
            let idx = member.product.unwrap();
            assert_eq!(member.personal_volume, config.products[idx].business_volume);
        }
    }

    #[test]
    fn given_many_draws_when_assigning_then_distribution_tracks_ratios() {
        let products = products();
        let assignor = ProductAssignor::new(&products);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut counts = [0usize; 3];
        for _ in 0..20_000 {
            let r = rng.gen_range(0.0..SALES_RATIO_TOTAL);
            counts[assignor.select(r).unwrap()] += 1;
        }
        let share = |i: usize| counts[i] as f64 / 20_000.0 * 100.0;
        assert!((share(0) - 20.0).abs() < 2.0);
        assert!((share(1) - 30.0).abs() < 2.0);
        assert!((share(2) - 50.0).abs() < 2.0);
    }
}

/*
Terminal rendering of a genealogy as a termtree.
Depth is limited; deeper members collapse into a single "+N below" leaf.
 */
use termtree::Tree;

use crate::application::report::{MemberRecord, SimulationResult};

pub trait ToTermTree {
    fn to_term_tree(&self, max_depth: usize) -> Tree<String>;
}

impl ToTermTree for SimulationResult {
    fn to_term_tree(&self, max_depth: usize) -> Tree<String> {
        match self.root() {
            Some(root) => build_tree(self, root, max_depth),
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

fn build_tree(result: &SimulationResult, member: &MemberRecord, remaining: usize) -> Tree<String> {
    let mut tree = Tree::new(label(member));
    if member.child_ids.is_empty() {
        return tree;
    }
    if remaining == 0 {
        let hidden = result.downline(member.id).len();
        tree.push(Tree::new(format!("+{hidden} below")));
        return tree;
    }
    for child in member.child_ids.iter().filter_map(|&id| result.member(id)) {
        tree.push(build_tree(result, child, remaining - 1));
    }
    tree
}

fn label(member: &MemberRecord) -> String {
    let product = member.product.as_deref().unwrap_or("-");
    if member.parent_id.is_none() {
        return format!("{} tv={:.2}", member.name, member.team_volume);
    }
    format!(
        "{} [{}] {} c{} pv={:.2} tv={:.2}",
        member.name, member.position, product, member.join_cycle, member.personal_volume, member.team_volume
    )
}

use std::collections::BTreeMap;
use std::fmt;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{Cycle, MemberId, Position};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::plan::PlanRule;

/// Per-cycle volume series.
pub type CycleVolumes = BTreeMap<Cycle, f64>;

/// A node of the genealogy tree.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: MemberId,
    /// Distance from the root, root is 0
    pub level: u32,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in placement order
    pub children: Vec<Index>,
    pub position: Position,
    /// Leg key of this member under its parent
    pub leg: Option<String>,
    /// Cycle the member joined in, 0 for the root
    pub join_cycle: Cycle,
    /// Index into the configured product list
    pub product: Option<usize>,
    pub personal_volume: f64,
    pub team_volume: f64,
    pub personal_volume_per_cycle: CycleVolumes,
    pub team_volume_per_cycle: CycleVolumes,
    pub leg_volume_per_cycle: BTreeMap<String, CycleVolumes>,
    /// Lifetime volume per leg
    pub leg_volumes: BTreeMap<String, f64>,
}

impl Member {
    fn new(id: MemberId, level: u32, parent: Option<Index>, position: Position, leg: Option<String>, join_cycle: Cycle) -> Self {
        Self {
            id,
            level,
            parent,
            children: Vec::new(),
            position,
            leg,
            join_cycle,
            product: None,
            personal_volume: 0.0,
            team_volume: 0.0,
            personal_volume_per_cycle: BTreeMap::new(),
            team_volume_per_cycle: BTreeMap::new(),
            leg_volume_per_cycle: BTreeMap::new(),
            leg_volumes: BTreeMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (level {}, {})", self.id, self.level, self.position)
    }
}

/// Arena-backed genealogy tree.
///
/// Members are never removed, so every [`Index`] handed out stays valid and
/// `order[k]` is the member with id `k`.
#[derive(Debug)]
pub struct GenealogyTree {
    arena: Arena<Member>,
    root: Index,
    /// Arena indices in creation order
    order: Vec<Index>,
    rule: &'static PlanRule,
    max_children: usize,
}

impl GenealogyTree {
    /// Creates a tree holding only the root.
    pub fn new(rule: &'static PlanRule, max_children: usize) -> Self {
        let mut arena = Arena::new();
        let root = arena.insert(Member::new(MemberId::ROOT, 0, None, Position::Root, None, 0));
        Self {
            arena,
            root,
            order: vec![root],
            rule,
            max_children,
        }
    }

    /// Attaches a new member as the next child of `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_child(&mut self, parent: Index, join_cycle: Cycle) -> DomainResult<Index> {
        let (level, child_index) = match self.arena.get(parent) {
            Some(p) if p.children.len() < self.max_children => (p.level + 1, p.children.len()),
            Some(p) => {
                return Err(DomainError::InvariantViolation(format!(
                    "{} already has {} children",
                    p.id,
                    p.children.len()
                )))
            }
            None => {
                return Err(DomainError::InvariantViolation(format!(
                    "parent index {parent:?} not in tree"
                )))
            }
        };

        let id = MemberId(self.order.len() as u32);
        let position = self.rule.position_for(child_index);
        let leg = self.rule.leg_key(position);
        let idx = self
            .arena
            .insert(Member::new(id, level, Some(parent), position, Some(leg), join_cycle));
        if let Some(p) = self.arena.get_mut(parent) {
            p.children.push(idx);
        }
        self.order.push(idx);
        Ok(idx)
    }

    pub fn root(&self) -> Index {
        self.root
    }

    pub fn max_children(&self) -> usize {
        self.max_children
    }

    pub fn get(&self, idx: Index) -> Option<&Member> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut Member> {
        self.arena.get_mut(idx)
    }

    pub fn index_of(&self, id: MemberId) -> Option<Index> {
        self.order.get(id.index()).copied()
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.index_of(id).and_then(|idx| self.get(idx))
    }

    /// Arena indices in creation order, root first.
    pub fn indices(&self) -> &[Index] {
        &self.order
    }

    /// Members in creation order, root first.
    pub fn members(&self) -> impl Iterator<Item = &Member> + '_ {
        self.order.iter().filter_map(|&idx| self.arena.get(idx))
    }

    pub fn parent_id(&self, member: &Member) -> Option<MemberId> {
        member.parent.and_then(|p| self.get(p)).map(|p| p.id)
    }

    pub fn child_ids(&self, member: &Member) -> Vec<MemberId> {
        member
            .children
            .iter()
            .filter_map(|&c| self.get(c))
            .map(|c| c.id)
            .collect()
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// A tree always holds its root.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    /// Number of levels, a lone root has depth 1.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.members().map(|m| m.level as usize + 1).max().unwrap_or(0)
    }

    /// Members without children, in pre-order.
    #[instrument(level = "debug", skip(self))]
    pub fn leaf_ids(&self) -> Vec<MemberId> {
        self.iter()
            .filter(|(_, m)| m.children.is_empty())
            .map(|(_, m)| m.id)
            .collect()
    }
}

pub struct TreeIterator<'a> {
    tree: &'a GenealogyTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a GenealogyTree) -> Self {
        Self {
            tree,
            stack: vec![tree.root()],
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a Member);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current_idx) = self.stack.pop() {
            if let Some(member) = self.tree.get(current_idx) {
                // Push children in reverse order for left-to-right traversal
                self.stack.extend(member.children.iter().rev());
                return Some((current_idx, member));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a GenealogyTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a GenealogyTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root(), false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a Member);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(member) = self.tree.get(current_idx) {
                if visited {
                    return Some((current_idx, member));
                }
                self.stack.push((current_idx, true));
                for &child in member.children.iter().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}

//! Nested-set arithmetic for subtree moves
//!
//! Moving subtree `[lft, rgt]` so that it starts at `destination` shifts two
//! disjoint ranges: the subtree itself, and the nodes between the subtree and
//! the destination, which slide the other way by the subtree width. Every
//! other boundary is unchanged.

/// Boundary shifts for one subtree move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftPlan {
    pub moved: (i64, i64),
    pub moved_delta: i64,
    pub displaced: (i64, i64),
    pub displaced_delta: i64,
}

impl ShiftPlan {
    /// New value for a single `lft` or `rgt` boundary
    pub fn apply(&self, value: i64) -> i64 {
        if value >= self.moved.0 && value <= self.moved.1 {
            value + self.moved_delta
        } else if value >= self.displaced.0 && value <= self.displaced.1 {
            value + self.displaced_delta
        } else {
            value
        }
    }

    /// Smallest and largest boundary value touched
    pub fn span(&self) -> (i64, i64) {
        (
            self.moved.0.min(self.displaced.0),
            self.moved.1.max(self.displaced.1),
        )
    }
}

/// Plan moving `[lft, rgt]` to start at boundary `destination`
///
/// `destination` is a boundary value in the pre-move numbering: the subtree
/// ends up immediately before whatever node currently starts or ends there.
/// Returns `None` when the move would not change anything, i.e. when
/// `destination` lies in `[lft, rgt + 1]`.
pub fn plan_move(lft: i64, rgt: i64, destination: i64) -> Option<ShiftPlan> {
    let width = rgt - lft + 1;

    if destination > rgt + 1 {
        Some(ShiftPlan {
            moved: (lft, rgt),
            moved_delta: destination - rgt - 1,
            displaced: (rgt + 1, destination - 1),
            displaced_delta: -width,
        })
    } else if destination < lft {
        Some(ShiftPlan {
            moved: (lft, rgt),
            moved_delta: destination - lft,
            displaced: (destination, lft - 1),
            displaced_delta: width,
        })
    } else {
        None
    }
}

/// True when `candidate_lft` is inside the subtree `[lft, rgt]`
pub fn is_within(lft: i64, rgt: i64, candidate_lft: i64) -> bool {
    candidate_lft >= lft && candidate_lft <= rgt
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tree used below:
    //
    // root(1,12)
    //   a(2,3)  b(4,7)  c(8,9)  d(10,11)
    //           b1(5,6)

    fn boundaries() -> Vec<(&'static str, i64, i64)> {
        vec![
            ("root", 1, 12),
            ("a", 2, 3),
            ("b", 4, 7),
            ("b1", 5, 6),
            ("c", 8, 9),
            ("d", 10, 11),
        ]
    }

    fn apply(plan: &ShiftPlan) -> Vec<(&'static str, i64, i64)> {
        boundaries()
            .into_iter()
            .map(|(name, l, r)| (name, plan.apply(l), plan.apply(r)))
            .collect()
    }

    fn ordered_children(tree: &[(&'static str, i64, i64)]) -> Vec<&'static str> {
        let mut children: Vec<_> = tree
            .iter()
            .filter(|(name, _, _)| ["a", "b", "c", "d"].contains(name))
            .cloned()
            .collect();
        children.sort_by_key(|(_, l, _)| *l);
        children.into_iter().map(|(name, _, _)| name).collect()
    }

    #[test]
    fn test_move_subtree_right_after_sibling() {
        // b after c: destination = c.rgt + 1
        let plan = plan_move(4, 7, 10).unwrap();
        let tree = apply(&plan);

        assert_eq!(ordered_children(&tree), vec!["a", "c", "b", "d"]);
        assert!(tree.contains(&("b", 6, 9)));
        assert!(tree.contains(&("b1", 7, 8)));
        assert!(tree.contains(&("c", 4, 5)));
        assert!(tree.contains(&("root", 1, 12)));
    }

    #[test]
    fn test_move_left_before_sibling() {
        // d before a: destination = a.lft
        let plan = plan_move(10, 11, 2).unwrap();
        let tree = apply(&plan);

        assert_eq!(ordered_children(&tree), vec!["d", "a", "b", "c"]);
        assert!(tree.contains(&("d", 2, 3)));
        assert!(tree.contains(&("b1", 7, 8)));
    }

    #[test]
    fn test_move_to_end_of_parent() {
        // a becomes last child of root: destination = root.rgt
        let plan = plan_move(2, 3, 12).unwrap();
        let tree = apply(&plan);

        assert_eq!(ordered_children(&tree), vec!["b", "c", "d", "a"]);
        assert!(tree.contains(&("a", 10, 11)));
        assert!(tree.contains(&("root", 1, 12)));
    }

    #[test]
    fn test_boundaries_stay_a_permutation() {
        let plan = plan_move(4, 7, 12).unwrap();
        let mut values: Vec<i64> = apply(&plan)
            .into_iter()
            .flat_map(|(_, l, r)| [l, r])
            .collect();
        values.sort_unstable();
        assert_eq!(values, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_noop_destinations() {
        assert_eq!(plan_move(4, 7, 4), None);
        assert_eq!(plan_move(4, 7, 6), None);
        // Directly after itself
        assert_eq!(plan_move(4, 7, 8), None);
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(4, 7, 5));
        assert!(is_within(4, 7, 4));
        assert!(!is_within(4, 7, 8));
    }
}

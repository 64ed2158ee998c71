use proptest::prelude::*;

/// How an ordering edge is declared
#[derive(Debug, Clone, Copy)]
pub enum EdgeStyle {
    /// The later node declares `after(earlier)`
    After,
    /// The earlier node declares `before(later)`
    Before,
}

/// Randomly generated acyclic constraint set over nodes `n0..n{count-1}`.
///
/// Edges only ever point from a lower to a higher index, so the set is
/// acyclic by construction; `n0` never has predecessors and the highest
/// node never has successors, which makes them eligible for first/last.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub count: usize,
    pub edges: Vec<(usize, usize, EdgeStyle)>,
    pub deploy_order: Vec<usize>,
    pub first: bool,
    pub last: bool,
}

impl ConstraintSet {
    pub fn name(index: usize) -> String {
        format!("n{index}")
    }
}

fn edge_style_strategy() -> impl Strategy<Value = EdgeStyle> {
    prop_oneof![Just(EdgeStyle::After), Just(EdgeStyle::Before)]
}

/// Strategy for generating acyclic constraint sets of 2..12 nodes
pub fn acyclic_constraint_strategy() -> impl Strategy<Value = ConstraintSet> {
    (2usize..12).prop_flat_map(|count| {
        let edges = prop::collection::vec((0..count, 0..count, edge_style_strategy()), 0..24)
            .prop_map(|raw| {
                raw.into_iter()
                    .filter(|(a, b, _)| a != b)
                    .map(|(a, b, style)| (a.min(b), a.max(b), style))
                    .collect::<Vec<_>>()
            });
        let order = Just((0..count).collect::<Vec<_>>()).prop_shuffle();
        (Just(count), edges, order, any::<bool>(), any::<bool>()).prop_map(
            |(count, edges, deploy_order, first, last)| ConstraintSet {
                count,
                edges,
                deploy_order,
                first,
                last,
            },
        )
    })
}

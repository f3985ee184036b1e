//! # Checker Tier Tests (T0-T3)
//!
//! End-to-end behaviour of the composite checker driven by the rule runner.
//!
//! ## Tiers
//! - T0: Emptiness
//! - T1: Role Grammar
//! - T2: Circular Composites
//! - T3: Engine Lifecycle

use relcheck_core::primitives::{
    COMPOSITE_EMPTY, COMPOSITE_LOOP, COMPOSITE_UNKNOWN, HIGH_COUNT, LOW_COUNT, ROLE_EMPTY,
    ROLE_MISSING, ROLE_UNKNOWN, WRONG_ROLE, WRONG_TYPE,
};
use relcheck_core::{
    Cardinality, CheckerConfig, CompositeChecker, Diagnostics, Entity, EntityGraph, EntityId,
    GrammarCache, GrammarEntry, Member, MemberExpression, MemberType, RoleDef, RuleRunner, Tags,
    TagCondition,
};
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs.iter().copied().collect()
}

fn c(id: i64) -> EntityId {
    EntityId::composite(id)
}

/// Composite holding the given composites under role "outer".
fn parent(id: i64, children: &[i64]) -> Entity {
    let members = children.iter().map(|child| Member::new("outer", c(*child))).collect();
    Entity::composite(id, Tags::new(), members)
}

fn restriction_grammar() -> Vec<GrammarEntry> {
    vec![GrammarEntry::new(
        "Turn restriction",
        vec![TagCondition::new("type", &["restriction"])],
        vec![
            RoleDef::new("from")
                .with_types([MemberType::Line])
                .with_count(Cardinality::Exactly(1)),
            RoleDef::new("via")
                .with_types([MemberType::Point, MemberType::Line])
                .with_count(Cardinality::AtLeast(1)),
            RoleDef::new("to")
                .with_types([MemberType::Line])
                .with_count(Cardinality::Exactly(1)),
        ],
    )]
}

fn runner(entries: Vec<GrammarEntry>, config: CheckerConfig) -> RuleRunner<CompositeChecker> {
    let grammar = Arc::new(GrammarCache::from_entries(entries));
    RuleRunner::new(CompositeChecker::new(grammar, config))
}

fn check_with(graph: &EntityGraph, entries: Vec<GrammarEntry>, config: CheckerConfig) -> Diagnostics {
    runner(entries, config)
        .validate(graph, &graph.ids(), None)
        .expect("validate")
}

fn check(graph: &EntityGraph, entries: Vec<GrammarEntry>) -> Diagnostics {
    check_with(graph, entries, CheckerConfig::default())
}

fn codes(out: &Diagnostics) -> Vec<u32> {
    out.iter().map(|d| d.code).collect()
}

fn set(ids: &[EntityId]) -> BTreeSet<EntityId> {
    ids.iter().copied().collect()
}

// =============================================================================
// TIER T0: EMPTINESS
// =============================================================================

mod t0_emptiness {
    use super::*;

    /// T0.1: A composite without members yields exactly one empty diagnostic.
    #[test]
    fn memberless_composite_is_empty() {
        let graph: EntityGraph = [Entity::composite(1, tags(&[("type", "restriction")]), vec![])]
            .into_iter()
            .collect();

        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![COMPOSITE_EMPTY]);
        let d = out.iter().next().expect("diagnostic");
        assert_eq!(d.entities, vec![c(1)]);
        assert_eq!(d.message, "Composite is empty");
    }

    /// T0.2: Members that are all deleted leave the composite empty.
    #[test]
    fn deleted_members_leave_composite_empty() {
        let mut from = Entity::line(1, Tags::new(), vec![1, 2]);
        from.deleted = true;
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "restriction")]),
                vec![Member::new("from", EntityId::line(1))],
            ),
            from,
        ]
        .into_iter()
        .collect();

        assert_eq!(codes(&check(&graph, restriction_grammar())), vec![COMPOSITE_EMPTY]);
    }

    /// T0.3: Incomplete or unknown members do not make a composite non-empty.
    #[test]
    fn incomplete_members_leave_composite_empty() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "restriction")]),
                vec![
                    Member::new("from", EntityId::line(1)),
                    Member::new("bogus", EntityId::line(40)),
                ],
            ),
            Entity::placeholder(EntityId::line(1)),
        ]
        .into_iter()
        .collect();

        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![COMPOSITE_EMPTY]);
        assert_eq!(out.iter().next().expect("diagnostic").entities, vec![c(1)]);
    }

    /// T0.3b: One usable member is enough to run the member checks.
    #[test]
    fn one_usable_member_is_not_empty() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                Tags::new(),
                vec![
                    Member::new("", EntityId::line(1)),
                    Member::new("", EntityId::line(40)),
                ],
            ),
            Entity::line(1, Tags::new(), vec![1, 2]),
        ]
        .into_iter()
        .collect();

        assert!(check(&graph, Vec::new()).is_empty());
    }

    /// T0.4: Deleted composites are not checked at all.
    #[test]
    fn deleted_composite_is_skipped() {
        let mut gone = Entity::composite(1, Tags::new(), vec![]);
        gone.deleted = true;
        let graph: EntityGraph = [gone].into_iter().collect();

        assert!(check(&graph, Vec::new()).is_empty());
    }
}

// =============================================================================
// TIER T1: ROLE GRAMMAR
// =============================================================================

mod t1_role_grammar {
    use super::*;

    fn restriction(members: Vec<Member>) -> EntityGraph {
        [
            Entity::composite(1, tags(&[("type", "restriction")]), members),
            Entity::line(1, Tags::new(), vec![1, 2]),
            Entity::line(2, Tags::new(), vec![2, 3]),
            Entity::line(3, Tags::new(), vec![3, 4]),
            Entity::point(2, Tags::new()),
        ]
        .into_iter()
        .collect()
    }

    /// T1.1: A well-formed composite yields nothing.
    #[test]
    fn valid_restriction_is_clean() {
        let graph = restriction(vec![
            Member::new("from", EntityId::line(1)),
            Member::new("via", EntityId::point(2)),
            Member::new("to", EntityId::line(2)),
        ]);
        assert!(check(&graph, restriction_grammar()).is_empty());
    }

    /// T1.2: Exactly-one roles: zero is missing, two is too high.
    #[test]
    fn exactly_one_role_counts() {
        let graph = restriction(vec![
            Member::new("from", EntityId::line(1)),
            Member::new("from", EntityId::line(3)),
            Member::new("via", EntityId::point(2)),
        ]);
        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![HIGH_COUNT, ROLE_MISSING]);

        let high = out.with_code(HIGH_COUNT).next().expect("high");
        let detail = high.description.as_ref().expect("detail");
        assert_eq!(detail.args, vec!["from".to_string(), "2".to_string()]);
        assert_eq!(high.entities, vec![c(1)]);
    }

    /// T1.3: Minimum counts report too low.
    #[test]
    fn minimum_count_reports_low() {
        let graph = restriction(vec![Member::new("x", EntityId::point(2))]);
        let entries = vec![GrammarEntry::new(
            "Pair",
            vec![TagCondition::new("type", &["restriction"])],
            vec![RoleDef::new("x").with_count(Cardinality::AtLeast(2))],
        )];
        assert_eq!(codes(&check(&graph, entries)), vec![LOW_COUNT]);
    }

    /// T1.4: Wrong member type points at the member.
    #[test]
    fn wrong_type_points_at_member() {
        let graph = restriction(vec![
            Member::new("from", EntityId::point(2)),
            Member::new("via", EntityId::point(2)),
            Member::new("to", EntityId::line(2)),
        ]);
        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![WRONG_TYPE]);
        assert_eq!(out.iter().next().expect("d").entities, vec![EntityId::point(2)]);
    }

    /// T1.5: Failed member expressions are reported as wrong role.
    #[test]
    fn member_expression_mismatch() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "route")]),
                vec![Member::new("stop", EntityId::point(1))],
            ),
            Entity::point(1, tags(&[("amenity", "bench")])),
        ]
        .into_iter()
        .collect();
        let entries = vec![GrammarEntry::new(
            "Route",
            vec![TagCondition::new("type", &["route"])],
            vec![RoleDef::new("stop")
                .with_expression(MemberExpression::parse("public_transport=stop_position").expect("expr"))],
        )];

        let out = check(&graph, entries);
        assert_eq!(codes(&out), vec![WRONG_ROLE]);
        assert_eq!(
            out.iter().next().expect("d").text(),
            "Role verification problem: Role of composite member does not match member expression \
             'public_transport=stop_position' in grammar entry Route"
        );
    }

    /// T1.6: Unknown and empty roles are aggregated per role string.
    #[test]
    fn unknown_roles_are_aggregated() {
        let graph = restriction(vec![
            Member::new("from", EntityId::line(1)),
            Member::new("via", EntityId::point(2)),
            Member::new("to", EntityId::line(2)),
            Member::new("", EntityId::line(3)),
            Member::new("towards", EntityId::line(3)),
        ]);
        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![ROLE_EMPTY, ROLE_UNKNOWN]);

        let empty = out.with_code(ROLE_EMPTY).next().expect("empty");
        assert_eq!(
            empty.text(),
            "Role verification problem: Empty role found when expecting one of 'from/via/to'"
        );
        assert_eq!(empty.entities, vec![c(1), EntityId::line(3)]);
    }

    /// T1.7: Typed composites without grammar are reported at low severity.
    #[test]
    fn unknown_type_is_informational() {
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "bogus")]), vec![Member::new("", EntityId::point(1))]),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let out = check(&graph, restriction_grammar());
        assert_eq!(codes(&out), vec![COMPOSITE_UNKNOWN]);
        assert_eq!(out.count_severity(relcheck_core::Severity::Other), 1);
    }

    /// T1.8: Public transport routes without scheme get the versioning warning.
    #[test]
    fn unversioned_public_transport_route() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "route"), ("route", "tram")]),
                vec![Member::new("", EntityId::point(1))],
            ),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let out = check(&graph, restriction_grammar());
        let d = out.iter().next().expect("d");
        assert_eq!(d.code, COMPOSITE_UNKNOWN);
        assert_eq!(d.severity, relcheck_core::Severity::Warning);
        assert_eq!(d.message, "Route scheme is unspecified");
        let description = d.description.as_ref().expect("description");
        assert_eq!(description.args, vec!["public_transport:version", "2", "1"]);
        assert_eq!(
            d.text(),
            "Route scheme is unspecified: Add public_transport:version (2=public_transport; 1=legacy)"
        );
    }

    /// T1.9: The multipolygon policy skips role checks but not emptiness.
    #[test]
    fn multipolygon_policy() {
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "multipolygon")]), vec![]),
            Entity::composite(2, tags(&[("type", "multipolygon")]), vec![Member::new("x", EntityId::point(1))]),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let entries = vec![GrammarEntry::new(
            "Multipolygon",
            vec![TagCondition::new("type", &["multipolygon"])],
            vec![RoleDef::new("outer"), RoleDef::new("inner")],
        )];
        let config = CheckerConfig {
            skip_multipolygons: true,
            ..CheckerConfig::default()
        };

        assert_eq!(codes(&check(&graph, entries.clone())), vec![COMPOSITE_EMPTY, ROLE_UNKNOWN]);
        assert_eq!(codes(&check_with(&graph, entries, config)), vec![COMPOSITE_EMPTY]);
    }
}

// =============================================================================
// TIER T2: CIRCULAR COMPOSITES
// =============================================================================

mod t2_cycles {
    use super::*;
    use relcheck_core::would_create_cycle;

    fn loops(out: &Diagnostics) -> Vec<(String, BTreeSet<EntityId>)> {
        out.with_code(COMPOSITE_LOOP)
            .map(|d| (d.message.clone(), d.entity_set()))
            .collect()
    }

    /// T2.1: Two composites containing each other yield one diagnostic.
    #[test]
    fn mutual_containment_reported_once() {
        let graph: EntityGraph = [parent(1, &[2]), parent(2, &[1])].into_iter().collect();

        let found = loops(&check(&graph, Vec::new()));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "Composite contains itself as a member");
        assert_eq!(found[0].1, set(&[c(1), c(2)]));
    }

    /// T2.2: A ring of three is reported once, whatever the visit order.
    #[test]
    fn ring_reported_once_in_any_order() {
        let graph: EntityGraph = [parent(1, &[2]), parent(2, &[3]), parent(3, &[1])]
            .into_iter()
            .collect();

        for selection in [
            vec![c(1), c(2), c(3)],
            vec![c(2), c(3), c(1)],
            vec![c(3), c(2), c(1)],
        ] {
            let out = runner(Vec::new(), CheckerConfig::default())
                .validate(&graph, &selection, None)
                .expect("validate");
            let found = loops(&out);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].0, "Composites generate circular dependency of parent/child elements");
            assert_eq!(found[0].1, set(&[c(1), c(2), c(3)]));
        }
    }

    /// T2.3: The complex-loop policy drops rings but keeps pairs.
    #[test]
    fn complex_loop_policy() {
        let graph: EntityGraph = [
            parent(1, &[2]),
            parent(2, &[3]),
            parent(3, &[1]),
            parent(10, &[11]),
            parent(11, &[10]),
        ]
        .into_iter()
        .collect();
        let config = CheckerConfig {
            allow_complex_loops: true,
            ..CheckerConfig::default()
        };

        assert_eq!(loops(&check(&graph, Vec::new())).len(), 2);
        let kept = loops(&check_with(&graph, Vec::new(), config));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].1, set(&[c(10), c(11)]));
    }

    /// T2.4: Incremental query before linking.
    #[test]
    fn would_create_cycle_query() {
        // 2 -> 3 -> 1
        let graph: EntityGraph = [parent(1, &[]), parent(2, &[3]), parent(3, &[1])]
            .into_iter()
            .collect();

        assert_eq!(would_create_cycle(&graph, c(1), c(2), false), vec![c(1), c(2), c(3), c(1)]);
        assert!(!would_create_cycle(&graph, c(3), c(2), false).is_empty());
        assert!(would_create_cycle(&graph, c(2), c(1), false).is_empty());

        let fresh: EntityGraph = [parent(1, &[]), parent(2, &[])].into_iter().collect();
        assert!(would_create_cycle(&fresh, c(1), c(2), false).is_empty());
    }

    /// T2.5: Loops through deleted composites are not reported.
    #[test]
    fn deleted_link_breaks_loop() {
        let mut second = parent(2, &[1]);
        second.deleted = true;
        let graph: EntityGraph = [parent(1, &[2]), second].into_iter().collect();

        assert!(loops(&check(&graph, Vec::new())).is_empty());
    }

    /// T2.6: Very deep containment chains are traversed without overflowing.
    #[test]
    fn deep_chain_is_traversed() {
        const DEPTH: i64 = 20_000;
        let chain = |closed: bool| -> EntityGraph {
            (1..=DEPTH)
                .map(|id| match id {
                    DEPTH if closed => parent(id, &[1]),
                    DEPTH => parent(id, &[]),
                    _ => parent(id, &[id + 1]),
                })
                .collect()
        };
        let validate = |graph: &EntityGraph| {
            runner(Vec::new(), CheckerConfig::default())
                .validate(graph, &[c(1)], None)
                .expect("validate")
        };

        assert!(loops(&validate(&chain(false))).is_empty());

        let found = loops(&validate(&chain(true)));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1.len(), 20_000);
    }
}

// =============================================================================
// TIER T3: ENGINE LIFECYCLE
// =============================================================================

mod t3_engine {
    use super::*;
    use relcheck_core::{CancellationToken, ValidatorError};

    /// T3.1: Partial selections only report diagnostics about the selection.
    #[test]
    fn partial_selection_filters() {
        let graph: EntityGraph = [
            Entity::composite(1, Tags::new(), vec![]),
            Entity::composite(2, Tags::new(), vec![]),
        ]
        .into_iter()
        .collect();

        let mut runner = runner(Vec::new(), CheckerConfig::default());
        runner.set_partial_selection(true);
        let out = runner.validate(&graph, &[c(2)], None).expect("validate");
        assert_eq!(out.len(), 1);
        assert_eq!(out.iter().next().expect("d").entities, vec![c(2)]);
    }

    /// T3.2: Running before start is a lifecycle error.
    #[test]
    fn run_requires_start() {
        let graph = EntityGraph::new();
        let mut runner = runner(Vec::new(), CheckerConfig::default());
        assert!(matches!(runner.run(&graph, &[]), Err(ValidatorError::Lifecycle { .. })));
        assert!(matches!(runner.start(None), Err(ValidatorError::Lifecycle { .. })));
    }

    /// T3.3: A run canceled up front reports nothing and is not an error.
    #[test]
    fn canceled_run_returns_normally() {
        let graph: EntityGraph = [Entity::composite(1, Tags::new(), vec![])].into_iter().collect();
        let token = CancellationToken::new();
        token.cancel();

        let mut runner = runner(Vec::new(), CheckerConfig::default());
        let out = runner
            .validate(&graph, &graph.ids(), Some(Box::new(token)))
            .expect("validate");
        assert!(out.is_empty());
    }

    /// T3.4: Validating twice gives identical results.
    #[test]
    fn repeated_runs_are_identical() {
        let graph: EntityGraph = [
            parent(1, &[2]),
            parent(2, &[1]),
            Entity::composite(3, tags(&[("type", "restriction")]), vec![Member::new("x", c(1))]),
        ]
        .into_iter()
        .collect();

        let mut runner = runner(restriction_grammar(), CheckerConfig::default());
        let first = runner.validate(&graph, &graph.ids(), None).expect("first");
        let second = runner.validate(&graph, &graph.ids(), None).expect("second");
        assert_eq!(first, second);
    }
}

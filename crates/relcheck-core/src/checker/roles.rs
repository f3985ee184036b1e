//! # Role Checks
//!
//! Matching of composite members against the role definitions of the
//! applicable grammar entries.

use crate::diagnostic::{Diagnostic, DiagnosticBuilder, Diagnostics, Severity};
use crate::grammar::{GrammarEntry, MemberType, RoleDef};
use crate::graph::EntityStore;
use crate::primitives::{
    EMPTY_ROLE_LABEL, HIGH_COUNT, LOW_COUNT, ROLE_EMPTY, ROLE_MISSING, ROLE_UNKNOWN,
    ROLE_VERIFICATION_PROBLEM, WRONG_ROLE, WRONG_TYPE,
};
use crate::{Entity, EntityKind, Member, Tags};
use std::collections::BTreeSet;

/// A role definition together with the name of the entry defining it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<'a> {
    pub role: &'a RoleDef,
    pub entry: &'a str,
}

/// Role definitions of every entry applying to the tags, in grammar order.
///
/// A key defined by several entries yields several candidates.
pub(crate) fn candidates<'a>(entries: &'a [GrammarEntry], tags: &Tags) -> Vec<Candidate<'a>> {
    entries
        .iter()
        .filter(|e| e.applies_to(tags))
        .flat_map(|e| {
            e.roles.iter().map(move |role| Candidate {
                role,
                entry: e.name.as_str(),
            })
        })
        .collect()
}

/// Run member, count and unknown-role checks on a composite.
pub(crate) fn check_roles(
    rule: &str,
    store: &dyn EntityStore,
    composite: &Entity,
    candidates: &[Candidate<'_>],
    out: &mut Diagnostics,
) {
    for member in composite.members() {
        if let Some(d) = check_member(rule, store, composite, member, candidates) {
            out.push(d);
        }
    }
    check_counts(rule, store, composite, candidates, out);
    check_unknown_roles(rule, store, composite, candidates, out);
}

fn role_problem(rule: &str, code: u32, template: &'static str, args: Vec<String>) -> DiagnosticBuilder {
    Diagnostic::builder(rule, Severity::Warning, code).grouped(ROLE_VERIFICATION_PROBLEM, template, args)
}

fn label(key: &str) -> &str {
    if key.is_empty() { EMPTY_ROLE_LABEL } else { key }
}

// =============================================================================
// MEMBER SHAPE
// =============================================================================

/// Best explanation of why no candidate accepts the member, if any.
///
/// A failed member expression beats a type mismatch: it proves the type was
/// accepted by some definition. Members no candidate covers are left to the
/// unknown-role check.
fn check_member(
    rule: &str,
    store: &dyn EntityStore,
    composite: &Entity,
    member: &Member,
    candidates: &[Candidate<'_>],
) -> Option<Diagnostic> {
    let member_type = MemberType::of(store, member.entity);
    let usable = store.is_usable(member.entity);
    let target = if usable { member.entity } else { composite.id };

    let mut entry: Option<&str> = None;
    let mut accepted: BTreeSet<MemberType> = BTreeSet::new();
    let mut mismatch: Option<Diagnostic> = None;

    for candidate in candidates.iter().filter(|c| c.role.is_role(&member.role)) {
        entry = Some(candidate.entry);
        accepted.extend(candidate.role.types.iter().copied());

        if candidate.role.accepts(member_type) {
            let Some(expression) = &candidate.role.member_expression else {
                return None;
            };
            // Unverifiable without the entity.
            let Some(entity) = store.entity(member.entity).filter(|e| e.is_usable()) else {
                return None;
            };
            if expression.matches(entity) {
                return None;
            }
            mismatch = Some(
                role_problem(
                    rule,
                    WRONG_ROLE,
                    "Role of composite member does not match member expression ''{0}'' in grammar entry {1}",
                    vec![expression.to_string(), candidate.entry.to_string()],
                )
                .entity(target)
                .build(),
            );
        } else if member.entity.kind == EntityKind::Composite
            && !usable
            && candidate.role.types.contains(&MemberType::Multipolygon)
        {
            // Whether an unusable composite is a multipolygon is unknown.
            return None;
        }
    }

    let entry = entry?;
    if mismatch.is_some() {
        return mismatch;
    }
    // Incomplete lines expected closed cannot be told apart from open ones.
    if member.entity.kind == EntityKind::Line
        && store.is_incomplete(member.entity)
        && accepted.contains(&MemberType::ClosedLine)
        && !accepted.contains(&MemberType::Line)
    {
        return None;
    }
    let types: Vec<&str> = accepted.iter().map(|t| t.name()).collect();
    Some(
        role_problem(
            rule,
            WRONG_TYPE,
            "Type ''{0}'' of composite member with role ''{1}'' does not match accepted types ''{2}'' in grammar entry {3}",
            vec![
                member.entity.kind.name().to_string(),
                member.role.clone(),
                types.join("/"),
                entry.to_string(),
            ],
        )
        .entity(target)
        .build(),
    )
}

// =============================================================================
// ROLE SHAPE
// =============================================================================

/// One diagnostic per role key whose member count is off.
fn check_counts(
    rule: &str,
    store: &dyn EntityStore,
    composite: &Entity,
    candidates: &[Candidate<'_>],
    out: &mut Diagnostics,
) {
    let mut reported: BTreeSet<&str> = BTreeSet::new();
    for candidate in candidates {
        let role = candidate.role;
        if reported.contains(role.key.as_str()) {
            continue;
        }
        let observed = composite
            .members()
            .iter()
            .filter(|m| !store.is_deleted(m.entity) && role.is_role(&m.role))
            .count() as u64;
        let valid = role.valid_count(observed);
        if observed == valid {
            continue;
        }
        let key = label(&role.key).to_string();
        let diagnostic = if observed == 0 {
            role_problem(rule, ROLE_MISSING, "Role ''{0}'' missing", vec![key])
        } else if valid > observed {
            role_problem(
                rule,
                LOW_COUNT,
                "Number of ''{0}'' roles too low ({1})",
                vec![key, observed.to_string()],
            )
        } else {
            role_problem(
                rule,
                HIGH_COUNT,
                "Number of ''{0}'' roles too high ({1})",
                vec![key, observed.to_string()],
            )
        };
        out.push(diagnostic.entity(composite.id).build());
        reported.insert(role.key.as_str());
    }
}

/// One diagnostic per distinct member role no candidate covers.
///
/// Loosely structured `type=network` composites are exempt unless they
/// describe bicycle routes.
fn check_unknown_roles(
    rule: &str,
    store: &dyn EntityStore,
    composite: &Entity,
    candidates: &[Candidate<'_>],
    out: &mut Diagnostics,
) {
    let tags = &composite.tags;
    if tags.get("type") == Some("network") && tags.get("route") != Some("bicycle") {
        return;
    }

    let present: Vec<&Member> = composite
        .members()
        .iter()
        .filter(|m| !store.is_deleted(m.entity))
        .collect();
    let roles: BTreeSet<&str> = present.iter().map(|m| m.role.as_str()).collect();

    let mut expected: Vec<&str> = Vec::new();
    for candidate in candidates {
        let key = label(&candidate.role.key);
        if !expected.contains(&key) {
            expected.push(key);
        }
    }
    let expected = expected.join("/");

    for role in roles {
        if candidates.iter().any(|c| c.role.is_role(role)) {
            continue;
        }
        let builder = if role.is_empty() {
            role_problem(
                rule,
                ROLE_EMPTY,
                "Empty role found when expecting one of ''{0}''",
                vec![expected.clone()],
            )
        } else {
            role_problem(
                rule,
                ROLE_UNKNOWN,
                "Role ''{0}'' is not among expected values ''{1}''",
                vec![role.to_string(), expected.clone()],
            )
        };
        let carriers = present.iter().filter(|m| m.role == role).map(|m| m.entity);
        out.push(builder.entity(composite.id).entities(carriers).build());
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Cardinality, MemberExpression, TagCondition};
    use crate::graph::EntityGraph;
    use crate::EntityId;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().copied().collect()
    }

    fn entry(roles: Vec<RoleDef>) -> GrammarEntry {
        GrammarEntry::new("Test", vec![TagCondition::new("type", &["test"])], roles)
    }

    fn run(graph: &EntityGraph, composite: EntityId, entries: &[GrammarEntry]) -> Diagnostics {
        let entity = graph.entity(composite).expect("composite");
        let found = candidates(entries, &entity.tags);
        let mut out = Diagnostics::new();
        check_roles("roles", graph, entity, &found, &mut out);
        out
    }

    fn codes(out: &Diagnostics) -> Vec<u32> {
        out.iter().map(|d| d.code).collect()
    }

    #[test]
    fn candidates_follow_grammar_order() {
        let entries = vec![
            entry(vec![RoleDef::new("a"), RoleDef::new("b")]),
            GrammarEntry::new("Other", vec![TagCondition::new("kind", &[])], vec![RoleDef::new("a")]),
        ];
        let found = candidates(&entries, &tags(&[("type", "test"), ("kind", "x")]));
        let keys: Vec<&str> = found.iter().map(|c| c.role.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "a"]);
        assert_eq!(found[2].entry, "Other");
    }

    #[test]
    fn type_mismatch_names_accepted_types() {
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "test")]), vec![Member::new("via", EntityId::point(1))]),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::new("via").with_types([MemberType::Line, MemberType::ClosedLine]),
        ])];

        let out = run(&graph, EntityId::composite(1), &entries);
        assert_eq!(codes(&out), vec![WRONG_TYPE]);
        let d = out.iter().next().expect("diagnostic");
        assert_eq!(d.entities, vec![EntityId::point(1)]);
        assert_eq!(
            d.description.as_ref().expect("detail").render(),
            "Type 'point' of composite member with role 'via' does not match accepted types 'line/closed line' in grammar entry Test"
        );
    }

    #[test]
    fn expression_mismatch_wins_over_type_mismatch() {
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "test")]), vec![Member::new("stop", EntityId::point(1))]),
            Entity::point(1, tags(&[("highway", "bus_stop")])),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::new("stop")
                .with_types([MemberType::Point])
                .with_expression(MemberExpression::parse("public_transport").expect("expr")),
            RoleDef::new("stop").with_types([MemberType::Line]),
        ])];

        let out = run(&graph, EntityId::composite(1), &entries);
        assert_eq!(codes(&out), vec![WRONG_ROLE]);
    }

    #[test]
    fn second_candidate_can_accept() {
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "test")]), vec![Member::new("stop", EntityId::point(1))]),
            Entity::point(1, tags(&[("railway", "stop")])),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::new("stop").with_expression(MemberExpression::parse("highway").expect("expr")),
            RoleDef::new("stop").with_expression(MemberExpression::parse("railway").expect("expr")),
        ])];

        assert!(run(&graph, EntityId::composite(1), &entries).is_empty());
    }

    #[test]
    fn unverifiable_members_are_accepted() {
        // Members 7 and 8 are absent: incomplete placeholders.
        let graph: EntityGraph = [Entity::composite(
            1,
            tags(&[("type", "test")]),
            vec![
                Member::new("outer", EntityId::line(7)),
                Member::new("inner", EntityId::composite(8)),
                Member::new("stop", EntityId::point(9)),
            ],
        )]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::new("outer").with_types([MemberType::ClosedLine]),
            RoleDef::new("inner").with_types([MemberType::Multipolygon]),
            RoleDef::new("stop")
                .with_types([MemberType::Point])
                .with_expression(MemberExpression::parse("highway").expect("expr")),
        ])];

        assert!(run(&graph, EntityId::composite(1), &entries).is_empty());
    }

    #[test]
    fn counts_report_missing_low_and_high() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "test")]),
                vec![
                    Member::new("from", EntityId::line(1)),
                    Member::new("from", EntityId::line(2)),
                    Member::new("via", EntityId::point(1)),
                ],
            ),
            Entity::line(1, Tags::new(), vec![1, 2]),
            Entity::line(2, Tags::new(), vec![2, 3]),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::new("from").with_count(Cardinality::Exactly(1)),
            RoleDef::new("to").with_count(Cardinality::Exactly(1)),
            RoleDef::new("via").with_count(Cardinality::AtLeast(2)),
        ])];

        let out = run(&graph, EntityId::composite(1), &entries);
        assert_eq!(codes(&out), vec![HIGH_COUNT, ROLE_MISSING, LOW_COUNT]);
        let texts: Vec<String> = out.iter().map(Diagnostic::text).collect();
        assert_eq!(texts[0], "Role verification problem: Number of 'from' roles too high (2)");
        assert_eq!(texts[1], "Role verification problem: Role 'to' missing");
        assert!(out.iter().all(|d| d.entities == vec![EntityId::composite(1)]));
    }

    #[test]
    fn count_is_reported_once_per_key() {
        let graph: EntityGraph = [Entity::composite(1, tags(&[("type", "test")]), vec![])]
            .into_iter()
            .collect();
        let entries = vec![entry(vec![
            RoleDef::new("x").with_count(Cardinality::Exactly(1)),
            RoleDef::new("x").with_count(Cardinality::AtLeast(1)),
        ])];

        assert_eq!(codes(&run(&graph, EntityId::composite(1), &entries)), vec![ROLE_MISSING]);
    }

    #[test]
    fn unknown_and_empty_roles_are_aggregated() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "test")]),
                vec![
                    Member::new("stop", EntityId::point(1)),
                    Member::new("", EntityId::point(2)),
                    Member::new("bogus", EntityId::point(3)),
                    Member::new("bogus", EntityId::point(4)),
                ],
            ),
            Entity::point(1, Tags::new()),
            Entity::point(2, Tags::new()),
            Entity::point(3, Tags::new()),
            Entity::point(4, Tags::new()),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![RoleDef::new("stop"), RoleDef::new("platform")])];

        let out = run(&graph, EntityId::composite(1), &entries);
        assert_eq!(codes(&out), vec![ROLE_EMPTY, ROLE_UNKNOWN]);

        let unknown = out.with_code(ROLE_UNKNOWN).next().expect("unknown");
        assert_eq!(
            unknown.entities,
            vec![EntityId::composite(1), EntityId::point(3), EntityId::point(4)]
        );
        assert_eq!(
            unknown.text(),
            "Role verification problem: Role 'bogus' is not among expected values 'stop/platform'"
        );
    }

    #[test]
    fn network_composites_skip_unknown_roles() {
        let members = vec![Member::new("bogus", EntityId::point(1))];
        let entries = vec![GrammarEntry::new(
            "Network",
            vec![TagCondition::new("type", &["network"])],
            vec![RoleDef::new("")],
        )];
        let graph: EntityGraph = [
            Entity::composite(1, tags(&[("type", "network")]), members.clone()),
            Entity::composite(2, tags(&[("type", "network"), ("route", "bicycle")]), members),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();

        assert!(run(&graph, EntityId::composite(1), &entries).is_empty());
        assert_eq!(codes(&run(&graph, EntityId::composite(2), &entries)), vec![ROLE_UNKNOWN]);
    }

    #[test]
    fn pattern_roles_cover_members() {
        let graph: EntityGraph = [
            Entity::composite(
                1,
                tags(&[("type", "test")]),
                vec![
                    Member::new("stop_entry_only", EntityId::point(1)),
                    Member::new("stop", EntityId::point(1)),
                ],
            ),
            Entity::point(1, Tags::new()),
        ]
        .into_iter()
        .collect();
        let entries = vec![entry(vec![
            RoleDef::pattern("stop(_entry_only|_exit_only)?")
                .expect("pattern")
                .with_count(Cardinality::AtLeast(2)),
        ])];

        assert!(run(&graph, EntityId::composite(1), &entries).is_empty());
    }
}

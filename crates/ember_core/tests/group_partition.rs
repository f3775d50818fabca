//! Owned-group partition invariants: prefix establishment at creation,
//! O(1) boundary maintenance under churn, exclusion handling.

use ember_core::{Entity, Registry};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    mass: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Motion {
    speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tagged;

/// Prefixes of both owned pools must be equal as sets after any
/// mutation.
fn assert_prefix_invariant(registry: &mut Registry, expected: &[Entity]) {
    let group = registry.group::<(Body, Motion), (), ()>();
    assert_eq!(group.len(), expected.len());

    let mut prefix: Vec<Entity> = group.iter().collect();
    prefix.sort_unstable();
    let mut wanted = expected.to_vec();
    wanted.sort_unstable();
    assert_eq!(prefix, wanted);
}

#[test]
fn creation_partitions_existing_pools() {
    let mut registry = Registry::new();

    // 5 entities with Body, 3 of them also with Motion.
    let entities = registry.create_many(5);
    for &entity in &entities {
        registry.add(entity, Body { mass: 1.0 });
    }
    for &entity in &entities[..3] {
        registry.add(entity, Motion { speed: 2.0 });
    }

    let group = registry.group::<(Body, Motion), (), ()>();
    assert_eq!(group.len(), 3);

    let mut matched: Vec<Entity> = group.iter().collect();
    matched.sort_unstable();
    let mut expected = entities[..3].to_vec();
    expected.sort_unstable();
    assert_eq!(matched, expected);
}

#[test]
fn inserts_and_removes_maintain_prefix() {
    let mut registry = Registry::new();
    registry.group::<(Body, Motion), (), ()>();

    let entities = registry.create_many(4);
    for &entity in &entities {
        registry.add(entity, Body { mass: 1.0 });
    }
    assert_prefix_invariant(&mut registry, &[]);

    registry.add(entities[2], Motion { speed: 1.0 });
    assert_prefix_invariant(&mut registry, &[entities[2]]);

    registry.add(entities[0], Motion { speed: 1.0 });
    assert_prefix_invariant(&mut registry, &[entities[2], entities[0]]);

    registry.remove::<Motion>(entities[2]);
    assert_prefix_invariant(&mut registry, &[entities[0]]);

    registry.destroy(entities[0]);
    assert_prefix_invariant(&mut registry, &[]);
}

#[test]
fn exclusion_gates_membership() {
    let mut registry = Registry::new();
    registry.group::<(Body, Motion), (), (Anchor,)>();

    let entity = registry.create();
    registry.add(entity, Body { mass: 1.0 });
    registry.add(entity, Motion { speed: 1.0 });

    {
        let group = registry.group::<(Body, Motion), (), (Anchor,)>();
        assert_eq!(group.len(), 1);
    }

    // Gaining the excluded component evicts from the prefix.
    registry.add(entity, Anchor);
    {
        let group = registry.group::<(Body, Motion), (), (Anchor,)>();
        assert_eq!(group.len(), 0);
    }

    // Losing it re-admits.
    registry.remove::<Anchor>(entity);
    {
        let group = registry.group::<(Body, Motion), (), (Anchor,)>();
        assert_eq!(group.len(), 1);
        assert!(group.contains(entity));
    }
}

#[test]
fn get_types_count_toward_membership() {
    let mut registry = Registry::new();
    registry.group::<(Body,), (Tagged,), ()>();

    let plain = registry.create();
    registry.add(plain, Body { mass: 1.0 });

    let tagged = registry.create();
    registry.add(tagged, Body { mass: 1.0 });
    registry.add(tagged, Tagged);

    let group = registry.group::<(Body,), (Tagged,), ()>();
    assert_eq!(group.len(), 1);
    assert!(group.contains(tagged));
    assert!(!group.contains(plain));
}

#[test]
#[should_panic(expected = "at least two component types")]
fn single_component_group_is_rejected() {
    let mut registry = Registry::new();
    registry.group::<(Body,), (), ()>();
}

#[test]
#[should_panic(expected = "already owned by another group")]
fn overlapping_ownership_is_rejected() {
    let mut registry = Registry::new();
    registry.group::<(Body, Motion), (), ()>();
    registry.group::<(Body, Tagged), (), ()>();
}

#[test]
fn group_iteration_is_prefix_bounded() {
    let mut registry = Registry::new();

    let many = registry.create_many(64);
    for &entity in &many {
        registry.add(entity, Body { mass: 1.0 });
    }
    for &entity in &many[..5] {
        registry.add(entity, Motion { speed: 1.0 });
    }

    let group = registry.group::<(Body, Motion), (), ()>();
    // Iteration touches exactly the prefix, not the whole Body pool.
    assert_eq!(group.iter().count(), 5);
}

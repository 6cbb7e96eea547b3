//! State Manager integration tests
//!
//! Covers the mutation API end to end:
//! - layout/components stay 1:1 under random init/remove sequences
//! - edge moves are no-ops
//! - batches notify once and roll back on failure
//! - removing a sectioned component leaves no dangling reference

mod helpers;

use std::sync::{Arc, Mutex};

use helpers::patch;
use mkb_builder::state::{ChangeCause, Direction, StateManager};
use mkb_builder::Error;
use mkb_common::ids::{ComponentId, SectionId};
use mkb_common::model::SectionType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

fn ids(list: &[&str]) -> Vec<ComponentId> {
    list.iter().map(|s| ComponentId::from(*s)).collect()
}

fn recorder(manager: &mut StateManager) -> Arc<Mutex<Vec<(u64, ChangeCause)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    manager.subscribe(move |change| {
        sink.lock().unwrap().push((change.revision, change.cause));
    });
    seen
}

#[test]
fn test_duplicate_init_keeps_first_component() {
    let mut m = StateManager::new(50);
    m.init_component("hero-1".into(), "hero", json!({"title": "A"})).unwrap();

    let err = m
        .init_component("hero-1".into(), "hero", json!({"title": "B"}))
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateId(ref id) if id.as_str() == "hero-1"));

    let state = m.get_state();
    assert_eq!(state.components.len(), 1);
    let data = state.component(&"hero-1".into()).unwrap().props.to_data();
    assert_eq!(data["title"], json!("A"));
}

#[test]
fn test_move_up_swaps_with_neighbour() {
    let mut m = StateManager::new(50);
    for id in ["a", "b", "c"] {
        m.init_component(id.into(), "biography", json!({})).unwrap();
    }

    assert!(m.move_component(&"b".into(), Direction::Up).unwrap());
    assert_eq!(m.get_state().layout, ids(&["b", "a", "c"]));
}

#[test]
fn test_edge_moves_are_noops() {
    let mut m = StateManager::new(50);
    for id in ["a", "b", "c"] {
        m.init_component(id.into(), "biography", json!({})).unwrap();
    }
    let seen = recorder(&mut m);
    let revision = m.revision();

    assert!(!m.move_component(&"a".into(), Direction::Up).unwrap());
    assert!(!m.move_component(&"c".into(), Direction::Down).unwrap());

    assert_eq!(m.get_state().layout, ids(&["a", "b", "c"]));
    assert_eq!(m.revision(), revision);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_layout_and_components_stay_one_to_one() {
    let mut rng = StdRng::seed_from_u64(0x6d6b62);
    let mut m = StateManager::new(10);
    let mut next = 0;

    for _ in 0..500 {
        let state = m.get_state();
        let roll: u8 = rng.gen_range(0..10);
        if state.layout.is_empty() || roll < 5 {
            let id = ComponentId::new(format!("c{}", next));
            next += 1;
            m.init_component(id, "topics", json!({})).unwrap();
        } else if roll < 8 {
            let victim = state.layout[rng.gen_range(0..state.layout.len())].clone();
            m.remove_component(&victim).unwrap();
        } else if roll < 9 {
            // Re-using an existing ID must fail without side effects
            let existing = state.layout[rng.gen_range(0..state.layout.len())].clone();
            assert!(m.init_component(existing, "topics", json!({})).is_err());
        } else {
            let target = state.layout[rng.gen_range(0..state.layout.len())].clone();
            let direction = if rng.gen_bool(0.5) { Direction::Up } else { Direction::Down };
            m.move_component(&target, direction).unwrap();
        }

        let state = m.get_state();
        assert_eq!(state.layout.len(), state.components.len());
        assert!(state.layout.iter().all(|id| state.components.contains_key(id)));
        assert!(state.violations().is_empty(), "{:?}", state.violations());
    }
}

#[test]
fn test_batch_of_n_notifies_once() {
    let mut m = StateManager::new(50);
    let seen = recorder(&mut m);

    m.batch_update(|m| {
        for i in 0..7 {
            m.init_component(ComponentId::new(format!("t{}", i)), "topics", json!({}))?;
        }
        m.move_component(&"t3".into(), Direction::Up)?;
        m.update_component(&"t0".into(), &patch(json!({"title": "My Topics"})))
    })
    .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], (1, ChangeCause::Batch { mutations: 9 }));
    assert_eq!(m.get_state().layout.len(), 7);
}

#[test]
fn test_nested_batches_join_the_outer_one() {
    let mut m = StateManager::new(50);
    let seen = recorder(&mut m);

    m.batch_update(|m| {
        m.init_component("a".into(), "hero", json!({}))?;
        m.batch_update(|m| m.init_component("b".into(), "hero", json!({})))?;
        m.init_component("c".into(), "hero", json!({}))
    })
    .unwrap();

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(m.get_state().layout, ids(&["a", "b", "c"]));
}

#[test]
fn test_failed_batch_restores_everything() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({"title": "Keep"})).unwrap();
    let section = m.add_section(SectionType::TwoColumn).unwrap();
    m.assign_to_section(&"a".into(), &section, 2).unwrap();
    let before = m.get_state();
    let seen = recorder(&mut m);

    let result = m.batch_update(|m| {
        m.update_component(&"a".into(), &patch(json!({"title": "Changed"})))?;
        m.remove_section(&section)?;
        m.remove_component(&"missing".into())
    });

    assert!(matches!(result, Err(Error::ComponentNotFound(_))));
    assert_eq!(*m.get_state(), *before);
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn test_remove_sectioned_component_detaches_it() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    m.init_component("b".into(), "biography", json!({})).unwrap();
    let section = m.add_section(SectionType::FullWidth).unwrap();
    m.assign_to_section(&"a".into(), &section, 1).unwrap();
    m.assign_to_section(&"b".into(), &section, 1).unwrap();

    m.remove_component(&"a".into()).unwrap();

    let state = m.get_state();
    let slots: Vec<&str> = state.sections[0]
        .components
        .iter()
        .map(|s| s.component_id.as_str())
        .collect();
    assert_eq!(slots, vec!["b"]);
    assert!(state.violations().is_empty());
}

#[test]
fn test_assignment_is_validated_up_front() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    let section = m.add_section(SectionType::TwoColumn).unwrap();
    let revision = m.revision();

    assert!(matches!(
        m.assign_to_section(&"ghost".into(), &section, 1),
        Err(Error::ComponentNotFound(_))
    ));
    assert!(matches!(
        m.assign_to_section(&"a".into(), &SectionId::new("nope"), 1),
        Err(Error::SectionNotFound(_))
    ));
    assert!(matches!(
        m.assign_to_section(&"a".into(), &section, 3),
        Err(Error::InvalidColumn { column: 3, .. })
    ));
    assert_eq!(m.revision(), revision);

    m.assign_to_section(&"a".into(), &section, 1).unwrap();
    assert!(matches!(
        m.assign_to_section(&"a".into(), &section, 1),
        Err(Error::AlreadyInSection { .. })
    ));

    // Moving to another column of the same section is allowed
    m.assign_to_section(&"a".into(), &section, 2).unwrap();
    assert_eq!(m.get_state().placement_of(&"a".into()).map(|(_, c)| c), Some(2));
}

#[test]
fn test_assigning_elsewhere_moves_the_component() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    let first = m.add_section(SectionType::FullWidth).unwrap();
    let second = m.add_section(SectionType::ThreeColumn).unwrap();

    m.assign_to_section(&"a".into(), &first, 1).unwrap();
    m.assign_to_section(&"a".into(), &second, 3).unwrap();

    let state = m.get_state();
    assert!(state.sections[0].components.is_empty());
    assert_eq!(state.placement_of(&"a".into()), Some((&second, 3)));
}

#[test]
fn test_duplicate_lands_after_original_in_same_column() {
    let mut m = StateManager::new(50);
    for id in ["a", "b", "c"] {
        m.init_component(id.into(), "topics", json!({"title": id})).unwrap();
    }
    let section = m.add_section(SectionType::TwoColumn).unwrap();
    m.assign_to_section(&"a".into(), &section, 2).unwrap();
    m.assign_to_section(&"c".into(), &section, 2).unwrap();

    let copy = m.duplicate_component(&"a".into()).unwrap();

    let state = m.get_state();
    assert_eq!(state.layout[1], copy);
    assert_eq!(
        state.component(&copy).unwrap().props,
        state.component(&"a".into()).unwrap().props
    );
    let column: Vec<&ComponentId> = state.sections[0].column_members(2).collect();
    assert_eq!(column, vec![&ComponentId::from("a"), &copy, &ComponentId::from("c")]);
}

#[test]
fn test_removing_a_section_keeps_its_components() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    let section = m.add_section(SectionType::MainSidebar).unwrap();
    m.assign_to_section(&"a".into(), &section, 2).unwrap();

    m.remove_section(&section).unwrap();

    let state = m.get_state();
    assert!(state.sections.is_empty());
    assert_eq!(state.layout, ids(&["a"]));
    assert_eq!(state.placement_of(&"a".into()), None);
}

#[test]
fn test_invalid_patch_is_rejected() {
    let mut m = StateManager::new(50);
    m.init_component("c".into(), "contact", json!({"email": "jane@example.com"}))
        .unwrap();

    let err = m
        .update_component(&"c".into(), &patch(json!({"email": "not an email"})))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidComponent(_)));
    let data = m.get_state().component(&"c".into()).unwrap().props.to_data();
    assert_eq!(data["email"], json!("jane@example.com"));
}

#[test]
fn test_snapshots_are_immutable() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    let snapshot = m.get_state();

    m.remove_component(&"a".into()).unwrap();

    assert_eq!(snapshot.layout, ids(&["a"]));
    assert!(m.get_state().layout.is_empty());
}

#[test]
fn test_undo_restores_removed_component_and_section_slot() {
    let mut m = StateManager::new(50);
    m.init_component("a".into(), "hero", json!({})).unwrap();
    let section = m.add_section(SectionType::FullWidth).unwrap();
    m.assign_to_section(&"a".into(), &section, 1).unwrap();
    let seen = recorder(&mut m);

    m.remove_component(&"a".into()).unwrap();
    assert!(m.undo());

    let state = m.get_state();
    assert_eq!(state.placement_of(&"a".into()), Some((&section, 1)));
    let causes: Vec<ChangeCause> = seen.lock().unwrap().iter().map(|(_, c)| *c).collect();
    assert_eq!(causes, vec![ChangeCause::Mutation, ChangeCause::Undo]);
}

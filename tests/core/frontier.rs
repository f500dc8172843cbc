#[path = "../common/mod.rs"]
mod common;

use common::Fixture;
use quorum::core::frontier::{self, SeenBy, SeenIndex, SeenSet, StoreSeenIndex};
use quorum::core::records::{self, EventType, NewEvent, TurnQuery};

fn unseen_turn_ids(fx: &Fixture, by: &SeenBy) -> Vec<String> {
    records::query_turns(
        &fx.store,
        &TurnQuery {
            unseen_by: Some(by.clone()),
            ..TurnQuery::default()
        },
    )
    .unwrap()
    .into_iter()
    .map(|t| t.id)
    .collect()
}

#[test]
fn referenced_turns_leave_the_frontier() {
    let fx = Fixture::new();
    let t1 = fx.turn("c1", "first");
    fx.advance_hours(1);
    let t2 = fx.turn("c1", "second");
    let by = SeenBy::new("connector", EventType::Connection);

    assert_eq!(unseen_turn_ids(&fx, &by), vec![t2.clone(), t1.clone()]);

    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "links first").ref_ids(vec![t1.clone()]),
    )
    .unwrap();

    assert_eq!(unseen_turn_ids(&fx, &by), vec![t2.clone()]);
    // Asking again without new writes gives the same answer.
    assert_eq!(unseen_turn_ids(&fx, &by), vec![t2]);
}

#[test]
fn frontier_is_scoped_to_actor_and_type() {
    let fx = Fixture::new();
    let t1 = fx.turn("c1", "only turn");

    // Same actor, different type.
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Insight, "connector", "x").ref_ids(vec![t1.clone()]),
    )
    .unwrap();
    // Same type, different actor.
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "human", "y").ref_ids(vec![t1.clone()]),
    )
    .unwrap();

    let by = SeenBy::new("connector", EventType::Connection);
    assert_eq!(unseen_turn_ids(&fx, &by), vec![t1.clone()]);

    let other = SeenBy::new("connector", EventType::Insight);
    assert!(unseen_turn_ids(&fx, &other).is_empty());
}

#[test]
fn limit_applies_after_filtering() {
    let fx = Fixture::new();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(fx.turn("c1", &format!("turn {i}")));
        fx.advance_hours(1);
    }
    // Newest three are seen.
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Connection, "connector", "seen")
            .ref_ids(ids[2..].to_vec()),
    )
    .unwrap();

    let by = SeenBy::new("connector", EventType::Connection);
    let page = records::query_turns(
        &fx.store,
        &TurnQuery {
            unseen_by: Some(by),
            limit: 2,
            ..TurnQuery::default()
        },
    )
    .unwrap();
    let got: Vec<String> = page.into_iter().map(|t| t.id).collect();
    assert_eq!(got, vec![ids[1].clone(), ids[0].clone()]);
}

#[test]
fn seen_set_and_store_index_agree() {
    let fx = Fixture::new();
    let a = fx.turn("c1", "a");
    let b = fx.turn("c1", "b");
    let c = fx.turn("c1", "c");
    records::insert_event(
        &fx.store,
        NewEvent::new(EventType::Critique, "devils_advocate", "critique")
            .ref_ids(vec![b.clone(), "not-a-record".into()]),
    )
    .unwrap();

    let by = SeenBy::new("devils_advocate", EventType::Critique);
    let set = SeenSet::load(&fx.store, &by).unwrap();
    let index = StoreSeenIndex::new(&fx.store);
    assert_eq!(set.len(), 2);

    for id in [&a, &b, &c] {
        assert_eq!(
            set.has_been_seen(id, &by).unwrap(),
            index.has_been_seen(id, &by).unwrap(),
            "{id}"
        );
    }
    assert!(set.has_been_seen(&b, &by).unwrap());

    let turns = records::query_turns(&fx.store, &TurnQuery::default()).unwrap();
    let remaining = frontier::unseen(&set, &by, turns).unwrap();
    let ids: Vec<&str> = remaining.iter().map(|t| t.id.as_str()).collect();
    assert!(ids.contains(&a.as_str()));
    assert!(ids.contains(&c.as_str()));
    assert!(!ids.contains(&b.as_str()));
}

#[test]
fn empty_store_has_empty_frontier() {
    let fx = Fixture::new();
    let by = SeenBy::new("connector", EventType::Connection);
    assert!(unseen_turn_ids(&fx, &by).is_empty());
    assert!(SeenSet::load(&fx.store, &by).unwrap().is_empty());
}

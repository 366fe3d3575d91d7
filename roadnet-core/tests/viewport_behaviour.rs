//! Behavioural tests for `ViewportQueryEngine` using rstest-bdd.

use std::cell::RefCell;

use roadnet_core::{
    BoundingBox, FeatureCollection, QueryError, ViewportConfig, ViewportQueryEngine,
    geojson::FeatureProperties,
    test_support::{MemorySegmentStore, dense_grid, point_segment, retired},
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

/// Shared state for viewport scenarios.
#[derive(Default)]
struct ViewportWorld {
    store: RefCell<Option<MemorySegmentStore>>,
    response: RefCell<Option<Result<FeatureCollection, QueryError>>>,
}

impl ViewportWorld {
    fn query(&self, bbox: BoundingBox) {
        let store = self
            .store
            .borrow_mut()
            .take()
            .expect("store should be initialised before querying");
        let engine = ViewportQueryEngine::new(store, ViewportConfig::default());
        self.response.replace(Some(engine.query(&bbox)));
    }

    fn features(&self) -> FeatureCollection {
        match self.response.borrow().as_ref() {
            Some(Ok(collection)) => collection.clone(),
            Some(Err(err)) => panic!("query failed: {err}"),
            None => panic!("no query has been issued"),
        }
    }
}

#[fixture]
fn world() -> ViewportWorld {
    ViewportWorld::default()
}

#[given("a segment store holding {count} active segments in the viewport")]
fn given_dense_store(world: &ViewportWorld, count: usize) {
    world
        .store
        .replace(Some(MemorySegmentStore::with_segments(dense_grid(count))));
}

#[given("an empty segment store")]
fn given_empty_store(world: &ViewportWorld) {
    world.store.replace(Some(MemorySegmentStore::default()));
}

#[given("a segment store holding one retired and one active segment")]
fn given_mixed_store(world: &ViewportWorld) {
    world.store.replace(Some(MemorySegmentStore::with_segments([
        retired(point_segment(1, 1, 0.5, 0.5)),
        point_segment(1, 2, 0.25, 0.25),
    ])));
}

#[when("I query the viewport")]
fn query_viewport(world: &ViewportWorld) {
    world.query(BoundingBox::new(0.0, 0.0, 1.0, 1.0).expect("valid bbox"));
}

#[when("I query the degenerate viewport at the origin")]
fn query_origin(world: &ViewportWorld) {
    world.query(BoundingBox::new(0.0, 0.0, 0.0, 0.0).expect("valid bbox"));
}

#[then("the response holds {count} full features")]
fn then_full(world: &ViewportWorld, count: usize) {
    let collection = world.features();
    assert_eq!(collection.len(), count);
    assert!(
        collection
            .features
            .iter()
            .all(|feature| matches!(feature.properties, FeatureProperties::Full(_))),
        "expected only full features"
    );
}

#[then("the response holds {count} simplified features")]
fn then_simplified(world: &ViewportWorld, count: usize) {
    let collection = world.features();
    assert_eq!(collection.len(), count);
    assert!(
        collection
            .features
            .iter()
            .all(|feature| matches!(feature.properties, FeatureProperties::Simplified(_))),
        "expected only simplified features"
    );
}

#[then("the response holds no features")]
fn then_empty(world: &ViewportWorld) {
    assert!(world.features().is_empty());
}

#[scenario(path = "tests/features/viewport.feature", index = 0)]
fn dense_threshold_is_inclusive(world: ViewportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport.feature", index = 1)]
fn above_dense_threshold_simplifies(world: ViewportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport.feature", index = 2)]
fn above_hard_cap_is_empty(world: ViewportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport.feature", index = 3)]
fn empty_store_degenerate_viewport(world: ViewportWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/viewport.feature", index = 4)]
fn superseded_segments_hidden(world: ViewportWorld) {
    let _ = world;
}

//! Integration tests for Store action broadcasting
//!
//! Observers see every action produced by effects, which is how a console or
//! a test waits for the outcome of a fire-and-forget effect.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use std::sync::Arc;
use std::time::Duration;
use turnstile_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use turnstile_runtime::{Store, StoreError};

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum GateAction {
    /// Ask a lane to open
    Open { lane: u32 },
    /// Lane opened (produced by an effect)
    Opened { lane: u32 },
    /// Lane closed again after a short delay (terminal)
    Closed { lane: u32 },
}

#[derive(Debug, Clone, Default)]
struct GateState {
    open_lanes: Vec<u32>,
    cycles: u32,
}

#[derive(Clone)]
struct GateEnvironment;

#[derive(Clone)]
struct GateReducer;

impl Reducer for GateReducer {
    type State = GateState;
    type Action = GateAction;
    type Environment = GateEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            GateAction::Open { lane } => smallvec![Effect::future(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Some(GateAction::Opened { lane })
            })],
            GateAction::Opened { lane } => {
                state.open_lanes.push(lane);
                smallvec![Effect::Delay {
                    duration: Duration::from_millis(10),
                    action: Box::new(GateAction::Closed { lane }),
                }]
            },
            GateAction::Closed { lane } => {
                state.open_lanes.retain(|l| *l != lane);
                state.cycles += 1;
                smallvec![Effect::None]
            },
        }
    }
}

fn gate_store() -> Store<GateState, GateAction, GateEnvironment, GateReducer> {
    Store::new(GateState::default(), GateReducer, GateEnvironment)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn send_and_wait_for_terminal_action() {
    let store = gate_store();

    let result = store
        .send_and_wait_for(
            GateAction::Open { lane: 1 },
            |action| matches!(action, GateAction::Closed { lane: 1 }),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result, GateAction::Closed { lane: 1 });
    let (open, cycles) = store.state(|s| (s.open_lanes.clone(), s.cycles)).await;
    assert!(open.is_empty());
    assert_eq!(cycles, 1);
}

#[tokio::test]
async fn send_and_wait_for_times_out_when_nothing_matches() {
    let store = gate_store();

    let result = store
        .send_and_wait_for(
            GateAction::Open { lane: 7 },
            |action| matches!(action, GateAction::Closed { lane: 8 }),
            Duration::from_millis(60),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}

#[tokio::test]
async fn subscribers_see_effect_actions_in_order() {
    let store = gate_store();
    let mut rx = store.subscribe_actions();

    store.send(GateAction::Open { lane: 3 }).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first, GateAction::Opened { lane: 3 });
    assert_eq!(second, GateAction::Closed { lane: 3 });
}

#[tokio::test]
async fn concurrent_waiters_filter_by_lane() {
    let store = Arc::new(gate_store());

    let mut handles = Vec::new();
    for lane in 1..=4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .send_and_wait_for(
                    GateAction::Open { lane },
                    move |action| matches!(action, GateAction::Closed { lane: l } if *l == lane),
                    Duration::from_secs(2),
                )
                .await
        }));
    }

    for (idx, handle) in handles.into_iter().enumerate() {
        let lane = u32::try_from(idx).unwrap() + 1;
        let result = handle.await.expect("waiter panicked").unwrap();
        assert_eq!(result, GateAction::Closed { lane });
    }

    assert_eq!(store.state(|s| s.cycles).await, 4);
}

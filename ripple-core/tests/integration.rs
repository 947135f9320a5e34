//! Integration Tests for the Reactive Runtime
//!
//! These tests drive signals, effects, batches, and the effect variants
//! together through the public API only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use ripple_core::{Container, Error, Record, Runtime, RuntimeConfig, Signal};

fn record(pairs: &[(&str, i32)]) -> Record<i32> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

/// Writing a property re-runs its reader synchronously with the new value.
#[test]
fn write_reruns_reader_synchronously() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 1)]));

    let reader = s.clone();
    let r = rt
        .effect(move |_| Ok(reader.get("v").unwrap_or(0) * 2))
        .unwrap();
    assert_eq!(r.value(), Some(2));

    s.insert("v", 5).unwrap();
    assert_eq!(r.value(), Some(10));
}

/// Effects chained through result signals: writing the upstream property
/// re-runs both, writing an unrelated property re-runs only its reader.
#[test]
fn chained_effects_rerun_in_order() {
    let rt = Runtime::new();
    let a = rt.signal(record(&[("x", 1)]));
    let b = rt.signal(record(&[("y", 1)]));
    let order = Rc::new(RefCell::new(Vec::new()));

    let (reader, log) = (a.clone(), order.clone());
    let e1 = rt
        .effect(move |_| {
            log.borrow_mut().push("e1");
            Ok(reader.get("x").unwrap_or(0))
        })
        .unwrap();

    let (upstream, other, log) = (e1.clone(), b.clone(), order.clone());
    let e2 = rt
        .effect(move |_| {
            log.borrow_mut().push("e2");
            Ok(upstream.value().unwrap_or(0) + other.get("y").unwrap_or(0))
        })
        .unwrap();
    order.borrow_mut().clear();

    b.insert("y", 10).unwrap();
    assert_eq!(*order.borrow(), vec!["e2"]);
    order.borrow_mut().clear();

    a.insert("x", 5).unwrap();
    assert_eq!(*order.borrow(), vec!["e1", "e2"]);
    assert_eq!(e2.value(), Some(15));
}

/// One write to the head of a chain re-runs each link exactly once.
#[test]
fn chain_reruns_each_link_once_per_write() {
    let rt = Runtime::new();
    let a = rt.signal(record(&[("n", 1)]));
    let (b_runs, c_runs) = (counter(), counter());

    let (reader, count) = (a.clone(), b_runs.clone());
    let b = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(reader.get("n").unwrap_or(0) * 2)
        })
        .unwrap();

    let (upstream, count) = (b.clone(), c_runs.clone());
    let c = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(upstream.value().unwrap_or(0) + 1)
        })
        .unwrap();

    for n in 2..=4 {
        a.insert("n", n).unwrap();
        assert_eq!(b_runs.get(), n as u32);
        assert_eq!(c_runs.get(), n as u32);
        assert_eq!(c.value(), Some(n * 2 + 1));
    }
}

/// A diamond re-runs each branch once. The join runs once per branch, in
/// subscription order, so it sees the left branch updated before the right.
#[test]
fn diamond_runs_join_once_per_branch() {
    let rt = Runtime::new();
    let src = rt.signal(record(&[("n", 1)]));
    let observed = Rc::new(RefCell::new(Vec::new()));
    let (left_runs, right_runs) = (counter(), counter());

    let (reader, count) = (src.clone(), left_runs.clone());
    let left = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(reader.get("n").unwrap_or(0) + 1)
        })
        .unwrap();
    let (reader, count) = (src.clone(), right_runs.clone());
    let right = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(reader.get("n").unwrap_or(0) * 10)
        })
        .unwrap();

    let (l, r, log) = (left.clone(), right.clone(), observed.clone());
    let bottom = rt
        .effect(move |_| {
            let sum = l.value().unwrap_or(0) + r.value().unwrap_or(0);
            log.borrow_mut().push(sum);
            Ok(sum)
        })
        .unwrap();

    src.insert("n", 2).unwrap();
    assert_eq!(left_runs.get(), 2);
    assert_eq!(right_runs.get(), 2);
    assert_eq!(rt.run_count(&bottom), Some(3));
    assert_eq!(*observed.borrow(), vec![12, 3 + 10, 3 + 20]);
    assert_eq!(bottom.value(), Some(23));
}

/// Reads taken only on a branch that is no longer taken stop causing runs.
#[test]
fn stale_edges_are_pruned() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("flag", 1), ("a", 0), ("b", 0)]));
    let runs = counter();

    let (reader, count) = (s.clone(), runs.clone());
    let result = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(if reader.get("flag") == Some(1) {
                reader.get("a")
            } else {
                reader.get("b")
            })
        })
        .unwrap();
    assert_eq!(rt.dependency_count(&result), 2);

    s.insert("flag", 0).unwrap();
    assert_eq!(runs.get(), 2);

    s.insert("a", 99).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(rt.listener_count(&s, "a"), 0);

    s.insert("b", 7).unwrap();
    assert_eq!(runs.get(), 3);
    assert_eq!(result.value(), Some(Some(7)));
}

/// Writing an equal value is not a change.
#[test]
fn equal_writes_are_silent() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 3)]));
    let runs = counter();

    let (reader, count) = (s.clone(), runs.clone());
    rt.effect(move |_| {
        count.set(count.get() + 1);
        Ok(reader.get("v"))
    })
    .unwrap();

    s.insert("v", 3).unwrap();
    assert_eq!(runs.get(), 1);
}

/// A batch of many writes re-runs each affected effect once.
#[test]
fn batch_coalesces_many_writes() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 0)]));
    let runs = counter();

    let (reader, count) = (s.clone(), runs.clone());
    let result = rt
        .effect(move |_| {
            count.set(count.get() + 1);
            Ok(reader.get("v"))
        })
        .unwrap();

    rt.batch(|| {
        for n in 1..=50 {
            s.insert("v", n)?;
        }
        Ok(())
    })
    .unwrap();

    assert_eq!(runs.get(), 2);
    assert_eq!(result.value(), Some(Some(50)));
}

/// An effect that writes what it reads is rejected as a cycle.
#[test]
fn self_feeding_effect_is_rejected() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("n", 0)]));

    let handle = s.clone();
    let err = rt
        .effect(move |_| {
            let n = handle.get("n").unwrap_or(0);
            handle.insert("n", n + 1)?;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert!(err.is_reentrancy());
}

/// Two effects feeding each other are rejected as a cycle.
#[test]
fn mutual_eager_cycle_is_rejected() {
    let rt = Runtime::new();
    let a = rt.signal(record(&[("x", 0)]));
    let b = rt.signal(record(&[("y", 0)]));

    let (from, to) = (a.clone(), b.clone());
    rt.effect(move |_| {
        let x = from.get("x").unwrap_or(0);
        to.insert("y", x + 1)?;
        Ok(())
    })
    .unwrap();

    let (from, to) = (b.clone(), a.clone());
    let err = rt
        .effect(move |_| {
            let y = from.get("y").unwrap_or(0);
            to.insert("x", y + 1)?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_reentrancy());
}

/// A clock-gated effect waits for the tick, then sees the latest state.
#[test]
fn clock_gating_defers_to_the_tick() {
    let rt = Runtime::new();
    let tick = rt.tick();
    let s = rt.signal(record(&[("v", 0)]));
    let runs = counter();

    let (reader, count) = (s.clone(), runs.clone());
    let result = rt
        .clock_effect(
            move |_| {
                count.set(count.get() + 1);
                Ok(reader.get("v").unwrap_or(0))
            },
            &tick,
        )
        .unwrap();

    for n in 1..=5 {
        s.insert("v", n).unwrap();
    }
    assert_eq!(runs.get(), 1);

    tick.advance().unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(result.value(), Some(5));

    tick.advance().unwrap();
    assert_eq!(runs.get(), 2);
}

/// A hundred triggers within one window produce at most two runs, and the
/// final state shows up once the window closes.
#[tokio::test(start_paused = true)]
async fn throttle_limits_runs_per_window() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 0)]));
    let runs = counter();

    let (reader, count) = (s.clone(), runs.clone());
    let result = rt
        .throttled_effect(
            move |_| {
                count.set(count.get() + 1);
                Ok(reader.get("v").unwrap_or(0))
            },
            Duration::from_millis(10),
        )
        .unwrap();

    for n in 1..=100 {
        s.insert("v", n).unwrap();
    }
    assert!(runs.get() <= 2);

    rt.settle().await.unwrap();
    assert!(runs.get() <= 2);
    assert_eq!(result.value(), Some(100));
}

/// A deferred effect tracks what it read before suspending and assigns its
/// value once the future settles.
#[tokio::test]
async fn deferred_effect_settles_later() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 2)]));

    let reader = s.clone();
    let result = rt
        .effect_async(move |_| {
            let v = reader.get("v").unwrap_or(0);
            Ok(async move {
                tokio::task::yield_now().await;
                v * 3
            })
        })
        .unwrap();
    assert_eq!(result.value(), None);

    rt.settle().await.unwrap();
    assert_eq!(result.value(), Some(6));

    s.insert("v", 4).unwrap();
    rt.settle().await.unwrap();
    assert_eq!(result.value(), Some(12));
}

/// Destroyed effects stop reacting but their last value stays readable.
#[test]
fn destroy_stops_reactions() {
    let rt = Runtime::new();
    let s = rt.signal(record(&[("v", 1)]));

    let reader = s.clone();
    let result = rt.effect(move |_| Ok(reader.get("v"))).unwrap();
    rt.destroy(&result);

    s.insert("v", 2).unwrap();
    assert_eq!(result.value(), Some(Some(1)));
    assert_eq!(rt.computation_count(), 0);
    assert_eq!(rt.edge_count(), 0);
}

/// Nested containers: wrapping is lazy, memoized, and stores raw containers.
#[test]
fn nested_containers_share_one_signal() {
    struct Doc {
        title: String,
        body: Container<Vec<String>>,
    }

    let rt = Runtime::new();
    let doc = rt.signal(Doc {
        title: "draft".into(),
        body: Container::new(vec!["intro".into()]),
    });

    let reader = doc.clone();
    let lines = rt
        .effect(move |_| {
            let body: Signal<Vec<String>> = reader.child("body", |d| &d.body);
            Ok(body.len())
        })
        .unwrap();

    let body = doc.child("body", |d| &d.body);
    body.push("more".into()).unwrap();
    assert_eq!(lines.value(), Some(2));

    doc.write("title", |d| &mut d.title, "final".into()).unwrap();
    assert_eq!(rt.run_count(&lines), Some(2));
    assert_eq!(doc.peek(|d| d.title.clone()), "final");
}

/// Configuration is loaded from JSON and applied to the runtime.
#[test]
fn runtime_config_from_json() {
    let config = RuntimeConfig::from_json(r#"{ "default_throttle_ms": 50 }"#).unwrap();
    let rt = Runtime::with_config(config);

    assert_eq!(rt.config().default_throttle_ms, 50);
    assert_eq!(rt.config().max_drain_passes, 10_000);
    assert!(RuntimeConfig::from_json("not json").is_err());
}

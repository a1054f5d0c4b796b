//! End-to-end accumulator scenarios through the public API.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;

use moar_metrics_core::{method_path, MetricStore, MEMORY_METRIC};

fn ms_samples(v: &str) -> Vec<i64> {
    let body = v.strip_suffix("|ms").expect("timer value ends with |ms");
    body.split(';').map(|s| s.parse().unwrap()).collect()
}

#[test]
fn basic_operations() {
    let s = MetricStore::new();
    s.start_timer("test.elapsed");
    s.increment("foo.samples");
    s.increment("bar.samples");
    s.adjust_counter("foo.samples", 1);
    s.decrement("foo.samples");

    let r = s.report(true);
    assert_eq!(r["foo.samples"], "1|c");
    assert_eq!(r["bar.samples"], "1|c");
    let elapsed = ms_samples(&r["test.elapsed"]);
    assert_eq!(elapsed.len(), 1);
    assert!(elapsed[0] >= 0);
    assert!(r[MEMORY_METRIC].ends_with("|bytes"));
}

#[test]
fn start_then_two_increments() {
    let s = MetricStore::new();
    s.start_timer("a");
    s.increment("b");
    s.increment("b");

    let r = s.report(true);
    assert_eq!(r["b"], "2|c");
    assert!(ms_samples(&r["a"])[0] >= 0);
}

#[test]
fn two_stop_cycles_keep_stop_order() {
    let s = MetricStore::new();
    s.start_timer_at("t", 0);
    s.stop_timer_at("t", 10);
    s.start_timer_at("t", 100);
    s.stop_timer_at("t", 120);
    assert_eq!(s.report(false)["t"], "10;20|ms");
}

#[test]
fn report_keys_sorted() {
    let s = MetricStore::new();
    for name in ["q", "b", "x.y", "a_b", "Z"] {
        s.increment(name);
    }
    let keys: Vec<String> = s.report(false).into_keys().collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert!(keys.iter().any(|k| k == MEMORY_METRIC));
}

#[test]
fn time_method_uses_normalized_name() {
    fn load_user(s: &MetricStore) {
        let _t = s.time_method("Data_Dao::loadUser", Some("db"), None);
    }

    let s = MetricStore::new();
    load_user(&s);
    assert_eq!(s.timer_samples("data.dao.loaduser.db").len(), 1);
}

#[test]
fn time_method_with_method_path() {
    let s = MetricStore::new();
    {
        let _t = s.time_method(method_path!(), None, None);
    }
    let r = s.report(false);
    assert!(
        r.keys().any(|k| k.ends_with("store.scenarios.time.method.with.method.path")),
        "{r:?}"
    );
}

#[test]
fn shared_store_across_threads() {
    let s = Arc::new(MetricStore::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let s = Arc::clone(&s);
            thread::spawn(move || {
                for _ in 0..100 {
                    s.increment("hits");
                }
                s.record_timer("work", 1);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let r = s.report(false);
    assert_eq!(r["hits"], "800|c");
    assert_eq!(ms_samples(&r["work"]).len(), 8);
}

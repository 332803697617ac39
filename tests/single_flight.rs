use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mri_envlog::deploy::{DispatchOutcome, DispatchResult};
use mri_envlog::publish::Publisher;

fn done(transcript: &str) -> DispatchResult {
    DispatchResult {
        success: true,
        outcome: DispatchOutcome::Deployed,
        transcript: transcript.to_string(),
    }
}

#[tokio::test]
async fn concurrent_triggers_never_run_two_deploys_at_once() {
    let publisher = Publisher::new();
    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let make_work = |label: &'static str| {
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        async move {
            let now = current.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            current.fetch_sub(1, Ordering::SeqCst);
            done(label)
        }
    };

    let first = publisher.trigger(make_work("first"));
    let second = publisher.trigger(make_work("second"));

    let first_result = first.wait().await;
    let second_result = second.wait().await;

    assert_eq!(
        peak.load(Ordering::SeqCst),
        1,
        "deploys must be strictly serialised"
    );
    assert_eq!(first_result.transcript, "first");
    assert_eq!(second_result.transcript, "second");
}

#[tokio::test]
async fn trigger_during_flight_queues_after_the_current_deploy() {
    let publisher = Publisher::new();
    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let make_work = |label: &'static str, hold: u64| {
        let order = Arc::clone(&order);
        async move {
            tokio::time::sleep(Duration::from_millis(hold)).await;
            order.lock().expect("order lock").push(label);
            done(label)
        }
    };

    let first = publisher.trigger(make_work("first", 150));
    // Let the first deploy take the slot before the second arrives.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(publisher.in_flight());
    let second = publisher.trigger(make_work("second", 10));

    first.wait().await;
    second.wait().await;

    let order = order.lock().expect("order lock");
    assert_eq!(
        *order,
        vec!["first", "second"],
        "the queued deploy starts only after the in-flight one completes"
    );
}

#[tokio::test]
async fn in_flight_reflects_the_ongoing_operation() {
    let publisher = Publisher::new();
    assert!(!publisher.in_flight());

    let ticket = publisher.trigger(async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        done("only")
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(publisher.in_flight(), "progress indication while deploying");

    let result = ticket.wait().await;
    assert!(result.success);
    assert!(!publisher.in_flight(), "slot released after delivery");
}

#[tokio::test]
async fn each_trigger_receives_its_own_result_exactly_once() {
    let publisher = Publisher::new();
    let first = publisher.trigger(async { done("uno") });
    let second = publisher.trigger(async { done("due") });

    let mut transcripts = vec![first.wait().await.transcript, second.wait().await.transcript];
    transcripts.sort();
    assert_eq!(transcripts, vec!["due".to_string(), "uno".to_string()]);
}

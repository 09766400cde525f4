//! Overlapping sessions on one engine

mod common;

use common::{engine, queued, scripted, wait_until, Recorder, WAIT};
use trickle_core::source::channel;
use trickle_core::LifecycleState;

#[tokio::test]
async fn test_new_session_supersedes_running_one() {
    let (producer, senders) = queued(&[200, 200]);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let first = engine.spawn(None);
    senders[0].send("old").await;
    wait_until(&engine, |s| s.text == "old").await;

    let second = engine.spawn(None);
    tokio::time::timeout(WAIT, first).await.unwrap().unwrap();
    // Starting over tore down the old body
    assert!(senders[0].is_cancelled());
    assert!(engine.is_loading() || engine.state() == LifecycleState::Processing);

    senders[1].send("new").await;
    drop(senders);
    tokio::time::timeout(WAIT, second).await.unwrap().unwrap();

    let seen = recorder.get();
    assert_eq!(seen.messages, vec!["old", "new"]);
    assert_eq!(seen.successes, vec!["new"]);
    assert!(seen.errors.is_empty());
    assert_eq!(engine.text(), "new");
    assert!(engine.is_success());
    assert_eq!(engine.snapshot().generation, 2);
}

#[tokio::test]
async fn test_late_failure_of_superseded_session_is_ignored() {
    let (producer, mut deliveries) = scripted(2);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let first = engine.spawn(None);
    let second = engine.spawn(None);

    // The first session's response turns up after it was replaced
    let late = deliveries.remove(0);
    let _ = late.send(Err(std::io::Error::other("late failure")));
    tokio::time::timeout(WAIT, first).await.unwrap().unwrap();

    let (tx, response) = channel::channel(200, 4);
    let current = deliveries.remove(0);
    assert!(current.send(Ok(response)).is_ok());
    tx.send("fresh").await;
    drop(tx);
    tokio::time::timeout(WAIT, second).await.unwrap().unwrap();

    let seen = recorder.get();
    assert!(seen.errors.is_empty());
    assert_eq!(seen.successes, vec!["fresh"]);
    assert!(engine.is_success());
}

#[tokio::test]
async fn test_late_success_of_superseded_session_is_ignored() {
    let (producer, mut deliveries) = scripted(2);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let first = engine.spawn(None);
    let second = engine.spawn(None);

    let (old_tx, old_response) = channel::channel(200, 4);
    old_tx.send("stale").await;
    drop(old_tx);
    let _ = deliveries.remove(0).send(Ok(old_response));
    tokio::time::timeout(WAIT, first).await.unwrap().unwrap();

    // Still waiting on the second response
    assert!(engine.is_loading());
    assert_eq!(engine.text(), "");

    let (tx, response) = channel::channel(200, 4);
    assert!(deliveries.remove(0).send(Ok(response)).is_ok());
    tx.send("current").await;
    drop(tx);
    tokio::time::timeout(WAIT, second).await.unwrap().unwrap();

    let seen = recorder.get();
    assert_eq!(seen.messages, vec!["current"]);
    assert_eq!(seen.successes, vec!["current"]);
}

#[tokio::test]
async fn test_stale_stop_does_not_suppress_next_error() {
    let (producer, senders) = queued(&[200, 500]);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let first = engine.spawn(None);
    engine.stop();
    tokio::time::timeout(WAIT, first).await.unwrap().unwrap();
    assert_eq!(engine.state(), LifecycleState::Interrupted);

    engine.start().await;
    drop(senders);

    assert!(engine.is_error());
    assert_eq!(recorder.get().errors, vec![None]);
}

#[tokio::test]
async fn test_restart_while_stop_unwinding() {
    let (producer, senders) = queued(&[200, 200]);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let first = engine.spawn(None);
    senders[0].send("one").await;
    wait_until(&engine, |s| s.text == "one").await;

    // Stop and immediately start again, before the first loop has run
    engine.stop();
    let second = engine.spawn(None);
    senders[1].send("two").await;

    tokio::time::timeout(WAIT, first).await.unwrap().unwrap();
    drop(senders);
    tokio::time::timeout(WAIT, second).await.unwrap().unwrap();

    assert!(engine.is_success());
    assert_eq!(engine.text(), "two");
    assert_eq!(recorder.get().successes, vec!["two"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_from_another_thread() {
    let (producer, tx) = common::single(200);
    let recorder = Recorder::new();
    let engine = engine(producer, &recorder);

    let handle = engine.spawn(None);
    tx.send("data").await;
    wait_until(&engine, |s| s.text == "data").await;

    let remote = engine.clone();
    std::thread::spawn(move || remote.stop()).join().unwrap();

    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    tokio::time::timeout(WAIT, tx.cancelled()).await.unwrap();

    assert_eq!(engine.state(), LifecycleState::Interrupted);
    let seen = recorder.get();
    assert!(seen.errors.is_empty());
    assert!(seen.successes.is_empty());
}

mod support;

use std::collections::BTreeSet;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use streamq::{InMemoryBroker, QueueError, TypedQueue};
use support::Widget;

fn bound_queue(subject: &str, stream: &str) -> (Arc<InMemoryBroker>, TypedQueue<Widget, InMemoryBroker>) {
    let broker = Arc::new(InMemoryBroker::new());
    broker.add_stream(stream, &[subject]);
    let queue = TypedQueue::new(Arc::clone(&broker), subject, stream);
    (broker, queue)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn end_to_end_queue_drains() {
    let (broker, queue) = bound_queue("widgets.made", "widgets");

    for id in 1..=3 {
        queue.publish(&Widget::new(id)).unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            assert!(widget.id > 0);
            assert_eq!(widget.foo, format!("foo-{}", widget.id));
            sink.lock().unwrap().push(widget.id);
            Ok(())
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        broker.acknowledged().len() == 3
    }));

    let mut ids = seen.lock().unwrap().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(broker.pending("widgets.made", "assembly"), 0);
}

#[test]
fn republishing_same_identity_stores_once() {
    let (broker, queue) = bound_queue("widgets.made", "widgets");

    let widget = Widget::new(7);
    let first = queue.publish(&widget).unwrap();
    let second = queue.publish(&widget).unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.sequence, first.sequence);
    assert_eq!(broker.stream_len("widgets"), 1);
}

#[test]
fn last_message_on_empty_stream_is_not_found() {
    let (_broker, queue) = bound_queue("widgets.made", "widgets");
    match queue.last_message("widgets.made") {
        Err(QueueError::NotFound { stream, filter }) => {
            assert_eq!(stream, "widgets");
            assert_eq!(filter, "widgets.made");
        }
        other => panic!("expected NotFound, got {:?}", other.map(|w| w.id)),
    }
}

#[test]
fn malformed_payload_is_dropped_without_invoking_handler() {
    use streamq::Broker as _;

    let (broker, queue) = bound_queue("widgets.made", "widgets");

    // A payload no Widget codec produced.
    broker
        .publish("widgets.made", "bad", b"\x00\x01garbage".to_vec())
        .unwrap();
    queue.publish(&Widget::new(1)).unwrap();

    let (tx, rx) = channel();
    let _sub = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            let _ = tx.send(widget.id);
            Ok(())
        })
        .unwrap();

    // Only the well-formed widget reaches the handler; the garbage is
    // acked away so it cannot block the group.
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);
    assert!(wait_until(Duration::from_secs(2), || {
        broker.acknowledged().len() == 2
    }));
    assert!(rx.try_recv().is_err());
    assert!(broker.acknowledged().contains(&"bad".to_string()));
}

#[test]
fn failed_handler_gets_redelivery_with_equivalent_message() {
    let (_broker, queue) = bound_queue("widgets.made", "widgets");
    queue.publish(&Widget::new(5)).unwrap();

    let (tx, rx) = channel();
    let deliveries = Mutex::new(Vec::new());
    let _sub = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            let mut seen = deliveries.lock().unwrap();
            seen.push(widget.clone());
            if seen.len() == 1 {
                return Err("not ready".into());
            }
            let _ = tx.send((seen[0].clone(), widget));
            Ok(())
        })
        .unwrap();

    let (first, second) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(first, second);
    assert_eq!(second, Widget::new(5));
}

#[test]
fn queue_group_members_split_the_work() {
    let (broker, queue) = bound_queue("widgets.made", "widgets");

    let (tx, rx) = channel();
    let tx2 = tx.clone();
    let sub_a = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            let _ = tx.send(("a", widget.id));
            Ok(())
        })
        .unwrap();
    let sub_b = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            let _ = tx2.send(("b", widget.id));
            Ok(())
        })
        .unwrap();

    for id in 1..=6 {
        queue.publish(&Widget::new(id)).unwrap();
    }

    let mut ids = BTreeSet::new();
    for _ in 0..6 {
        let (_member, id) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        // Each message goes to exactly one member.
        assert!(ids.insert(id));
    }
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    assert!(wait_until(Duration::from_secs(2), || {
        broker.pending("widgets.made", "assembly") == 0
    }));

    sub_a.unsubscribe();
    sub_b.unsubscribe();
}

#[test]
fn unsubscribe_stops_future_deliveries() {
    let (broker, queue) = bound_queue("widgets.made", "widgets");

    let (tx, rx) = channel();
    let sub = queue
        .queue_subscribe("assembly", move |widget: Widget| {
            let _ = tx.send(widget.id);
            Ok(())
        })
        .unwrap();

    queue.publish(&Widget::new(1)).unwrap();
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 1);

    sub.unsubscribe();
    queue.publish(&Widget::new(2)).unwrap();

    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    // The message waits for the next member of the group.
    assert_eq!(broker.pending("widgets.made", "assembly"), 1);
}

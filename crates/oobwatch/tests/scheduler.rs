//! End-to-end tests of the poll scheduler against an in-memory server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oobwatch::client::{
    HttpRequest, HttpResponse, HttpTransport, MemoryInteractionServer, TransportError,
};
use oobwatch::{
    ChannelSink, InteractionClient, PollScheduler, RegistrationState, SchedulerConfig,
    ShutdownOutcome, SinkEvent,
};
use oobwatch_testkit::fixtures::{dns_record, http_record, identity, TestFixture};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{timeout, Instant};

const WAIT: Duration = Duration::from_secs(600);

fn config(interval_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval: Duration::from_secs(interval_secs),
        ..SchedulerConfig::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn next_request(rx: &mut UnboundedReceiver<HttpRequest>) -> HttpRequest {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for request")
        .expect("request channel closed")
}

async fn next_event(rx: &mut UnboundedReceiver<SinkEvent>) -> SinkEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for sink event")
        .expect("sink channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_register_poll_deregister_flow() {
    init_tracing();
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, mut events) = ChannelSink::new();
    let client = fixture.client();
    let correlation_id = client.correlation_id().to_string();

    let scheduler = PollScheduler::start(client, sink, config(60)).unwrap();

    let domain = match next_event(&mut events).await {
        SinkEvent::Ready(domain) => domain,
        other => panic!("expected ready, got {other:?}"),
    };
    assert_eq!(domain, scheduler.domain());
    assert!(domain.starts_with(&correlation_id));
    assert!(domain.ends_with(".oast.test"));
    assert_eq!(scheduler.state(), RegistrationState::Registered);

    assert_eq!(next_request(&mut requests).await.route(), "/register");
    assert_eq!(next_request(&mut requests).await.route(), "/poll");

    fixture.server.push_interaction(&correlation_id, http_record("first"));
    fixture.server.push_interaction(&correlation_id, dns_record("second", "A"));
    assert!(scheduler.poll_now());

    let mut ids = Vec::new();
    for _ in 0..2 {
        match next_event(&mut events).await {
            SinkEvent::Entry(entry) => ids.push(entry.unique_id().to_string()),
            other => panic!("expected entry, got {other:?}"),
        }
    }
    assert_eq!(ids, vec!["first", "second"]);

    assert_eq!(scheduler.shutdown().await, ShutdownOutcome::Graceful);
    assert!(!fixture.server.is_registered(&correlation_id));
    assert_eq!(fixture.server.request_count("/deregister"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_cuts_wait_short() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(60)).unwrap();

    assert_eq!(next_request(&mut requests).await.route(), "/register");
    assert_eq!(next_request(&mut requests).await.route(), "/poll");
    let first_poll = Instant::now();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(scheduler.poll_now());

    assert_eq!(next_request(&mut requests).await.route(), "/poll");
    let elapsed = first_poll.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "polled too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "polled too late: {elapsed:?}");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_interval_drives_polls() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(60)).unwrap();

    next_request(&mut requests).await;
    next_request(&mut requests).await;
    let first_poll = Instant::now();

    assert_eq!(next_request(&mut requests).await.route(), "/poll");
    let elapsed = first_poll.elapsed();
    assert!(elapsed >= Duration::from_secs(60), "polled too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(61), "polled too late: {elapsed:?}");

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_triggers_is_bounded() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(60)).unwrap();
    next_request(&mut requests).await;
    next_request(&mut requests).await;

    let trigger = scheduler.trigger();
    for _ in 0..10 {
        assert!(trigger.fire());
    }

    // One trigger wakes the worker, the rest leave a single pending poll.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fixture.server.request_count("/poll"), 3);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_mid_wait_deregisters() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(3600)).unwrap();
    next_request(&mut requests).await;
    next_request(&mut requests).await;

    let started = Instant::now();
    assert_eq!(scheduler.shutdown().await, ShutdownOutcome::Graceful);
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(next_request(&mut requests).await.route(), "/deregister");
    assert!(fixture.server.registered_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_register_failure_stops_worker() {
    let fixture = TestFixture::new();
    fixture.server.force_status("/register", 500);
    let (sink, mut events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(60)).unwrap();

    while scheduler.is_running() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(scheduler.state(), RegistrationState::Unregistered);
    assert!(!scheduler.poll_now());
    assert!(events.try_recv().is_err());
    assert_eq!(fixture.server.request_count("/poll"), 0);

    assert_eq!(scheduler.shutdown().await, ShutdownOutcome::Graceful);
    assert_eq!(fixture.server.request_count("/deregister"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_do_not_stop_loop() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, mut events) = ChannelSink::new();
    let client = fixture.client();
    let correlation_id = client.correlation_id().to_string();

    let scheduler = PollScheduler::start(client, sink, config(60)).unwrap();
    next_event(&mut events).await;
    next_request(&mut requests).await;

    fixture.server.force_status("/poll", 502);
    next_request(&mut requests).await;
    assert!(scheduler.poll_now());
    next_request(&mut requests).await;
    assert!(scheduler.is_running());
    assert_eq!(scheduler.state(), RegistrationState::Registered);

    fixture.server.clear_forced_status("/poll");
    fixture.server.push_interaction(&correlation_id, http_record("after-outage"));
    assert!(scheduler.poll_now());

    match next_event(&mut events).await {
        SinkEvent::Entry(entry) => assert_eq!(entry.unique_id(), "after-outage"),
        other => panic!("expected entry, got {other:?}"),
    }

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_cancels_worker() {
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();

    let scheduler = PollScheduler::start(fixture.client(), sink, config(60)).unwrap();
    next_request(&mut requests).await;
    next_request(&mut requests).await;

    drop(scheduler);

    assert_eq!(next_request(&mut requests).await.route(), "/deregister");
}

/// Forwards everything except polls, which never complete.
struct StalledPolls(Arc<MemoryInteractionServer>);

#[async_trait]
impl HttpTransport for StalledPolls {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.route() == "/poll" {
            std::future::pending::<()>().await;
        }
        self.0.send(request).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_bounded() {
    init_tracing();
    let fixture = TestFixture::new();
    let mut requests = fixture.server.subscribe();
    let (sink, _events) = ChannelSink::new();
    let client = InteractionClient::with_identity(
        fixture.config.clone(),
        StalledPolls(fixture.server.clone()),
        identity(&fixture.config.host),
    )
    .unwrap();

    let scheduler = PollScheduler::start(client, sink, config(60)).unwrap();
    next_request(&mut requests).await;

    while scheduler.state() != RegistrationState::Registered {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let started = Instant::now();
    assert_eq!(scheduler.shutdown().await, ShutdownOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn test_zero_interval_is_rejected() {
    let fixture = TestFixture::new();
    let (sink, _events) = ChannelSink::new();
    let result = PollScheduler::start(fixture.client(), sink, config(0));
    assert!(matches!(result, Err(oobwatch::OobError::InvalidSchedule(_))));
}

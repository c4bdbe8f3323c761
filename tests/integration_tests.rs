//! Integration tests for the engine lifecycle: runs, stops, crashes and teardown.

use autoscript::script::{Script, Value};
use autoscript::{
    ActionGateway, Color, Engine, GatewayError, GlobalAction, Point, RecordedAction,
    RecordingGateway, Rect, RunStatus, Screenshot, TextBlock, TextRecognizer,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn capture() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, move |line: &str| sink.lock().push(line.to_string()))
}

fn fast_engine(gateway: Arc<dyn ActionGateway>) -> Arc<Engine> {
    Arc::new(
        Engine::builder()
            .sleep_slice(Duration::from_millis(10))
            .poll_interval(Duration::from_millis(10))
            .build(gateway),
    )
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition never became true");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Delegates to a [`RecordingGateway`] but panics on every click.
struct PanickingGateway {
    inner: RecordingGateway,
}

impl ActionGateway for PanickingGateway {
    fn click(&self, _at: Point) -> Result<(), GatewayError> {
        panic!("click handler exploded")
    }

    fn long_click(&self, at: Point, duration: Duration) -> Result<(), GatewayError> {
        self.inner.long_click(at, duration)
    }

    fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<(), GatewayError> {
        self.inner.swipe(from, to, duration)
    }

    fn global_action(&self, action: GlobalAction) -> Result<(), GatewayError> {
        self.inner.global_action(action)
    }

    fn pixel(&self, at: Point) -> Result<Color, GatewayError> {
        self.inner.pixel(at)
    }

    fn screenshot(&self) -> Result<Screenshot, GatewayError> {
        self.inner.screenshot()
    }

    fn text_recognizer(&self) -> Result<Arc<dyn TextRecognizer>, GatewayError> {
        self.inner.text_recognizer()
    }

    fn find_image(&self, template: &str, threshold: f64) -> Result<Option<Point>, GatewayError> {
        self.inner.find_image(template, threshold)
    }

    fn send_message(&self, text: &str) -> Result<(), GatewayError> {
        self.inner.send_message(text)
    }

    fn vibrate(&self, duration: Duration) -> Result<(), GatewayError> {
        self.inner.vibrate(duration)
    }

    fn set_clipboard(&self, text: &str) -> Result<(), GatewayError> {
        self.inner.set_clipboard(text)
    }

    fn toast(&self, text: &str) -> Result<(), GatewayError> {
        self.inner.toast(text)
    }

    fn load_var(&self, name: &str) -> Option<String> {
        self.inner.load_var(name)
    }

    fn store_var(&self, name: &str, value: &str) {
        self.inner.store_var(name, value)
    }
}

#[tokio::test]
async fn test_stop_ends_infinite_loop() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    let run = Engine::spawn(&engine, "while (true) {\n  click(1, 1)\n  sleep(20)\n}");

    wait_until(|| gateway.click_count() >= 2).await;
    engine.stop();

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run ignored the stop request")
        .unwrap();
    assert_eq!(report.status, RunStatus::Stopped);

    let clicks = gateway.click_count();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(gateway.click_count(), clicks, "actions after the run ended");
}

#[tokio::test]
async fn test_stop_interrupts_polling_wait() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    let run = Engine::spawn(&engine, "seen = waitForColor(1, 1, \"#00FF00\", 100000)\nclick(1, 1)");

    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.stop();

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("wait ignored the stop request")
        .unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.variable("seen"), Some(&Value::Bool(false)));
    assert!(gateway.actions().is_empty());
}

#[tokio::test]
async fn test_next_run_after_stop_starts_fresh() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());

    let report = engine.execute("a = 1\nreturn").await;
    assert_eq!(report.status, RunStatus::Stopped);

    engine.stop();
    let report = engine.execute("b = 2\nclick(3, 3)").await;
    assert_eq!(report.status, RunStatus::Completed);
    assert!(report.variable("a").is_none());
    assert_eq!(report.variable("b"), Some(&Value::Number(2.0)));
    assert_eq!(gateway.actions(), vec![RecordedAction::Click(Point::new(3, 3))]);
}

#[tokio::test]
async fn test_runs_are_serialized() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());

    let first = Engine::spawn(&engine, "click(1, 1)\nsleep(100)\nclick(2, 2)");
    wait_until(|| gateway.click_count() == 1).await;
    let second = Engine::spawn(&engine, "click(3, 3)");

    assert!(first.await.unwrap().is_completed());
    assert!(second.await.unwrap().is_completed());
    assert_eq!(
        gateway.actions(),
        vec![
            RecordedAction::Click(Point::new(1, 1)),
            RecordedAction::Click(Point::new(2, 2)),
            RecordedAction::Click(Point::new(3, 3)),
        ]
    );
}

#[tokio::test]
async fn test_panic_is_reported_as_crash() {
    let gateway = Arc::new(PanickingGateway {
        inner: RecordingGateway::new(),
    });
    let (log, sink) = capture();
    let engine = Engine::builder().on_log(sink).build(gateway.clone());

    let report = engine
        .execute("text = getText(0, 0, 10, 10)\nx = 1\nclick(5, 5)\ny = 2")
        .await;

    match &report.status {
        RunStatus::Crashed(message) => assert!(message.contains("click handler exploded")),
        other => panic!("expected a crash, got {:?}", other),
    }
    assert!(log
        .lock()
        .iter()
        .any(|line| line == "Fatal error: click handler exploded"));

    // The recognizer opened before the crash is still released.
    assert_eq!(gateway.inner.recognizers_opened(), 1);
    assert_eq!(gateway.inner.recognizers_closed(), 1);

    // The engine stays usable.
    let report = engine.execute("z = 3").await;
    assert!(report.is_completed());
    assert_eq!(report.variable("z"), Some(&Value::Number(3.0)));
}

#[tokio::test]
async fn test_close_during_run() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    let run = Engine::spawn(
        &engine,
        "text = getText(0, 0, 10, 10)\nwhile (true) {\n  sleep(1000)\n}",
    );

    wait_until(|| gateway.recognizers_opened() == 1).await;
    engine.close().await;

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("close did not stop the run")
        .unwrap();
    assert_eq!(report.status, RunStatus::Stopped);

    engine.close().await;
    assert_eq!(gateway.recognizers_closed(), 1);
}

#[tokio::test]
async fn test_close_without_run_is_harmless() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    engine.close().await;
    engine.close().await;
    assert_eq!(gateway.recognizers_closed(), 0);

    let report = engine.execute("click(1, 1)").await;
    assert!(report.is_completed());
}

#[test]
fn test_close_blocking_outside_runtime() {
    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    engine.close_blocking();
    assert!(engine.cancel_token().is_cancelled());
}

#[tokio::test]
async fn test_recognizer_timeout_does_not_stall_run() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.set_screen_text(vec![TextBlock {
        text: "Start".to_string(),
        bounds: Rect::from_corners(0, 0, 10, 10),
    }]);
    gateway.set_recognition_delay(Duration::from_secs(30));
    let (log, sink) = capture();
    let engine = Engine::builder()
        .sleep_slice(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(10))
        .ocr_timeout(Duration::from_millis(50))
        .on_log(sink)
        .build(gateway.clone());

    let started = Instant::now();
    let report = engine
        .execute("text = getText(0, 0, 100, 100)\npos = findText(\"Start\", 200)")
        .await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.variable("text"), Some(&Value::from("")));
    assert_eq!(report.variable("pos"), Some(&Value::Null));
    assert!(log.lock().iter().any(|line| line.contains("timed out")));
}

#[tokio::test]
async fn test_unready_gateway_logs_and_continues() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.set_ready(false);
    let (log, sink) = capture();
    let engine = Engine::builder().on_log(sink).build(gateway.clone());

    let report = engine.execute("click(1, 1)\nlog(\"still here\")").await;
    assert!(report.is_completed());
    let log = log.lock();
    assert!(log
        .iter()
        .any(|line| line == "Line 1: Gateway error: Action gateway is not ready"));
    assert!(log.iter().any(|line| line == "still here"));
}

#[tokio::test]
async fn test_script_from_file() {
    let path = std::env::temp_dir().join(format!("autoscript-{}.txt", std::process::id()));
    std::fs::write(&path, "x = 4\nclick(x, x)\n").unwrap();

    let script = Script::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let gateway = Arc::new(RecordingGateway::new());
    let engine = fast_engine(gateway.clone());
    let report = engine.execute_script(&script).await;
    assert!(report.is_completed());
    assert_eq!(gateway.actions(), vec![RecordedAction::Click(Point::new(4, 4))]);

    assert!(Script::from_file(&path).is_err());
}

//! Integration tests for script execution against the recording gateway.

use autoscript::script::Value;
use autoscript::{
    ActionGateway, Color, Engine, GlobalAction, Point, RecordedAction, RecordingGateway, Rect, RunReport,
    RunStatus, TextBlock,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Harness {
    gateway: Arc<RecordingGateway>,
    engine: Arc<Engine>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new() -> Self {
        let gateway = Arc::new(RecordingGateway::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let engine = Engine::builder()
            .sleep_slice(Duration::from_millis(10))
            .poll_interval(Duration::from_millis(20))
            .find_text_timeout(Duration::from_millis(200))
            .ocr_timeout(Duration::from_millis(500))
            .on_log(move |line| sink.lock().push(line.to_string()))
            .build(gateway.clone());
        Self {
            gateway,
            engine: Arc::new(engine),
            log,
        }
    }

    async fn run(&self, source: &str) -> RunReport {
        tokio::time::timeout(Duration::from_secs(10), self.engine.execute(source))
            .await
            .expect("script did not finish")
    }

    fn lines(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn logged(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn clicks(&self) -> Vec<Point> {
        self.gateway
            .actions()
            .into_iter()
            .filter_map(|action| match action {
                RecordedAction::Click(at) => Some(at),
                _ => None,
            })
            .collect()
    }
}

#[tokio::test]
async fn test_while_false_body_never_runs() {
    let h = Harness::new();
    let report = h.run("while (false) { click(1,1) }").await;
    assert!(report.is_completed());
    assert!(h.gateway.actions().is_empty());
}

#[tokio::test]
async fn test_if_else_branches_are_exclusive() {
    let h = Harness::new();
    h.run("if (false) { click(1,1) } else { click(2,2) }").await;
    assert_eq!(h.clicks(), vec![Point::new(2, 2)]);

    let h = Harness::new();
    h.run("if (true) { click(1,1) } else { click(2,2) }").await;
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_multi_line_if_else() {
    let h = Harness::new();
    h.run(
        r#"
        x = 5
        if (x > 10)
        {
            click(1, 1)
        }
        else
        {
            click(2, 2)
        }
        click(3, 3)
        "#,
    )
    .await;
    assert_eq!(h.clicks(), vec![Point::new(2, 2), Point::new(3, 3)]);
}

#[tokio::test]
async fn test_else_if_chain_takes_first_match() {
    let h = Harness::new();
    h.run(
        r#"
        x = 2
        if (x == 1) {
            click(1, 1)
        } else if (x == 2) {
            click(2, 2)
        } else if (x >= 2) {
            click(3, 3)
        } else {
            click(4, 4)
        }
        "#,
    )
    .await;
    assert_eq!(h.clicks(), vec![Point::new(2, 2)]);
}

#[tokio::test]
async fn test_function_locals_do_not_leak() {
    let h = Harness::new();
    let report = h
        .run(
            r#"
            x = "outer"
            fun f(a, b) {
                x = a + b
                temp = 1
            }
            f(1, 2)
            "#,
        )
        .await;
    assert_eq!(report.variable("x"), Some(&Value::from("outer")));
    assert!(report.variable("temp").is_none());
    assert!(report.variable("a").is_none());
}

#[tokio::test]
async fn test_function_result_reaches_assignment() {
    let h = Harness::new();
    let report = h
        .run(
            r#"
            y = add(1, 2)
            fun add(a, b) {
                result = a + b
            }
            z = add(y, 10)
            "#,
        )
        .await;
    assert_eq!(report.variable("y"), Some(&Value::Number(3.0)));
    assert_eq!(report.variable("z"), Some(&Value::Number(13.0)));
    assert!(report.variable("result").is_none());
}

#[tokio::test]
async fn test_function_without_result_leaves_target_unset() {
    let h = Harness::new();
    let report = h
        .run("fun noop() {\n  click(1, 1)\n}\ny = noop()")
        .await;
    assert!(report.variable("y").is_none());
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_runaway_recursion_is_a_line_error() {
    let h = Harness::new();
    let report = h.run("fun r() {\n  r()\n}\nr()\nclick(5, 5)").await;
    assert!(report.is_completed());
    assert!(h.logged("Maximum call depth 64 exceeded"));
    assert_eq!(h.clicks(), vec![Point::new(5, 5)]);
}

#[tokio::test]
async fn test_negative_sleep_is_rejected() {
    let h = Harness::new();
    let started = Instant::now();
    let report = h.run("sleep(-5)\nsleep(0)\nlog(\"after\")").await;
    assert!(report.is_completed());
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(h.logged("Line 1: sleep: duration must not be negative"));
    assert!(h.logged("after"));
}

#[tokio::test]
async fn test_stop_interrupts_long_sleep() {
    let h = Harness::new();
    let run = Engine::spawn(&h.engine, "sleep(100000)\nclick(1, 1)");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stopped_at = Instant::now();
    h.engine.stop();

    let report = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .expect("run ignored the stop request")
        .unwrap();
    assert_eq!(report.status, RunStatus::Stopped);
    assert!(stopped_at.elapsed() < Duration::from_millis(500));
    assert!(h.gateway.actions().is_empty());
}

#[tokio::test]
async fn test_compare_color_exact_and_tolerance() {
    let h = Harness::new();
    h.gateway
        .set_pixel(Point::new(5, 5), Color::from_argb(0xFFFF_0000));
    h.gateway
        .set_pixel(Point::new(6, 6), Color::from_rgb(0xF8, 0x04, 0x00));
    let report = h
        .run(
            r##"
            exact = compareColor(5, 5, "#FF0000")
            packed = compareColor(5, 5, -65536)
            near = compareColor(6, 6, "#FF0000")
            loose = compareColor(6, 6, "#FF0000", 8)
            "##,
        )
        .await;
    assert_eq!(report.variable("exact"), Some(&Value::Bool(true)));
    assert_eq!(report.variable("packed"), Some(&Value::Bool(true)));
    assert_eq!(report.variable("near"), Some(&Value::Bool(false)));
    assert_eq!(report.variable("loose"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn test_boolean_conditions() {
    let h = Harness::new();
    h.run(
        r#"
        if (5 >= 3 && 2 < 1) { click(1, 1) }
        if (5 >= 3 || 2 < 1) { click(2, 2) }
        if (!false) { click(3, 3) }
        "#,
    )
    .await;
    assert_eq!(h.clicks(), vec![Point::new(2, 2), Point::new(3, 3)]);
}

#[tokio::test]
async fn test_counter_loop_stops_after_three_increments() {
    let h = Harness::new();
    let report = h
        .run(
            "setVar(\"n\",\"0\")\nwhile (true) { incVar(\"n\"); if (getVar(\"n\") == \"3\") { break } }",
        )
        .await;
    assert!(report.is_completed());
    assert_eq!(h.gateway.load_var("n").as_deref(), Some("3"));
}

#[tokio::test]
async fn test_click_sleep_log() {
    let h = Harness::new();
    let started = Instant::now();
    let report = h.run("click(10,10)\nsleep(50)\nlog(\"done\")").await;

    assert!(report.is_completed());
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert_eq!(h.gateway.actions(), vec![RecordedAction::Click(Point::new(10, 10))]);
    assert_eq!(h.lines().iter().filter(|line| *line == "done").count(), 1);
}

#[tokio::test]
async fn test_continue_ends_enclosing_loop_like_break() {
    // `continue` does not resume the loop: it leaves it, exactly like `break`.
    let h = Harness::new();
    let report = h
        .run(
            r#"
            i = 0
            while (i < 5) {
                i++
                if (i == 2) { continue }
                click(i, i)
            }
            "#,
        )
        .await;
    assert!(report.is_completed());
    assert_eq!(report.variable("i"), Some(&Value::Number(2.0)));
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_return_stops_whole_run() {
    // `return` inside a function ends the run, not just the function.
    let h = Harness::new();
    let report = h
        .run(
            r#"
            fun f() {
                click(1, 1)
                return
                click(2, 2)
            }
            f()
            click(3, 3)
            "#,
        )
        .await;
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_exit_flag() {
    let h = Harness::new();
    let report = h
        .run(
            r#"
            i = 0
            while (!EXIT) {
                i += 1
                if (i >= 3) { EXIT = true }
            }
            click(1, 1)
            "#,
        )
        .await;
    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.variable("i"), Some(&Value::Number(3.0)));
    assert!(h.gateway.actions().is_empty());
}

#[tokio::test]
async fn test_exit_false_is_ignored() {
    let h = Harness::new();
    let report = h.run("EXIT = false\nclick(1, 1)").await;
    assert!(report.is_completed());
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_wait_for_color() {
    let h = Harness::new();
    h.gateway
        .set_pixel(Point::new(2, 2), Color::from_rgb(0, 0xFF, 0));
    let started = Instant::now();
    let report = h
        .run(
            r##"
            missing = waitForColor(1, 1, "#00FF00", 100)
            present = waitForColor(2, 2, "#00FF00", 5000)
            "##,
        )
        .await;
    assert_eq!(report.variable("missing"), Some(&Value::Bool(false)));
    assert_eq!(report.variable("present"), Some(&Value::Bool(true)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_text_queries() {
    let h = Harness::new();
    h.gateway.set_screen_text(vec![
        TextBlock {
            text: "Start".to_string(),
            bounds: Rect::from_corners(10, 20, 30, 40),
        },
        TextBlock {
            text: "Settings".to_string(),
            bounds: Rect::from_corners(200, 300, 260, 320),
        },
    ]);
    let report = h
        .run(
            r#"
            pos = findText("Start")
            gone = findText("Quit", 60)
            text = getText(0, 0, 100, 100)
            seen = waitForText(150, 250, 300, 350, "Sett", 1000)
            if (findText("Settings") != null) { click(1, 1) }
            "#,
        )
        .await;
    assert_eq!(report.variable("pos"), Some(&Value::Point(20, 30)));
    assert_eq!(report.variable("gone"), Some(&Value::Null));
    assert_eq!(report.variable("text"), Some(&Value::from("Start")));
    assert_eq!(report.variable("seen"), Some(&Value::Bool(true)));
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);

    // The recognizer is shared by the run and closed when it ends.
    assert_eq!(h.gateway.recognizers_opened(), 1);
    assert_eq!(h.gateway.recognizers_closed(), 1);
}

#[tokio::test]
async fn test_recognizer_init_failure_returns_sentinels() {
    let h = Harness::new();
    h.gateway.fail_recognizer_init("model missing");
    let started = Instant::now();
    let report = h
        .run(
            r#"
            text = getText(0, 0, 100, 100)
            pos = findText("Start", 5000)
            click(1, 1)
            "#,
        )
        .await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.variable("text"), Some(&Value::from("")));
    assert_eq!(report.variable("pos"), Some(&Value::Null));
    assert!(h.logged("Text recognizer failed to initialize: model missing"));
    assert_eq!(h.clicks(), vec![Point::new(1, 1)]);
}

#[tokio::test]
async fn test_find_image() {
    let h = Harness::new();
    h.gateway.add_image("ok.png", Point::new(50, 60), 0.95);
    let report = h
        .run(
            r#"
            hit = findImage("ok.png")
            strict = findImage("ok.png", 0.99)
            none = findImage("other.png")
            "#,
        )
        .await;
    assert_eq!(report.variable("hit"), Some(&Value::Point(50, 60)));
    assert_eq!(report.variable("strict"), Some(&Value::Null));
    assert_eq!(report.variable("none"), Some(&Value::Null));
}

#[tokio::test]
async fn test_invalid_line_does_not_abort() {
    let h = Harness::new();
    let report = h
        .run(
            r#"
            click(99999, 1)
            nothing()
            this is not a statement
            tap(1, 1, 0)
            click(4, 4)
            "#,
        )
        .await;
    assert!(report.is_completed());
    assert_eq!(h.clicks(), vec![Point::new(4, 4)]);
    assert!(h.logged("Line 2: click: coordinate 99999 outside 0..=10000"));
    assert!(h.logged("Line 3: Undefined function: nothing"));
    assert!(h.logged("Line 4: Unrecognized statement"));
    assert!(h.logged("Line 5: tap: count must be positive"));
}

#[tokio::test]
async fn test_device_actions_are_recorded() {
    let h = Harness::new();
    h.run(
        r#"
        longClick(1, 2)
        swipe(1, 2, 3, 4, 250)
        tap(5, 5, 2, 0)
        back()
        home()
        recents()
        vibrate(30)
        toast("hi")
        sendTelegram("run finished")
        pushToCb("copied")
        "#,
    )
    .await;
    assert_eq!(
        h.gateway.actions(),
        vec![
            RecordedAction::LongClick(Point::new(1, 2), Duration::from_millis(500)),
            RecordedAction::Swipe {
                from: Point::new(1, 2),
                to: Point::new(3, 4),
                duration: Duration::from_millis(250),
            },
            RecordedAction::Click(Point::new(5, 5)),
            RecordedAction::Click(Point::new(5, 5)),
            RecordedAction::Global(GlobalAction::Back),
            RecordedAction::Global(GlobalAction::Home),
            RecordedAction::Global(GlobalAction::Recents),
            RecordedAction::Vibrate(Duration::from_millis(30)),
            RecordedAction::Toast("hi".to_string()),
            RecordedAction::Message("run finished".to_string()),
            RecordedAction::Clipboard("copied".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_assignments_and_interpolation() {
    let h = Harness::new();
    h.gateway
        .set_pixel(Point::new(3, 3), Color::from_rgb(0x12, 0x34, 0x56));
    let report = h
        .run(
            r##"
            val x = 5
            int y = x * 2 + 1
            string name = "bot"
            greeting = "hi " + name
            color = getColor(3, 3)
            if (getColor(3, 3) == "#123456") { same = true }
            r = random(1, 3)
            y -= 1
            log("$name: y=${y}")
            "##,
        )
        .await;
    assert_eq!(report.variable("x"), Some(&Value::Number(5.0)));
    assert_eq!(report.variable("y"), Some(&Value::Number(10.0)));
    assert_eq!(report.variable("greeting"), Some(&Value::from("hi bot")));
    assert_eq!(report.variable("color"), Some(&Value::from("#123456")));
    assert_eq!(report.variable("same"), Some(&Value::Bool(true)));
    let r = report.variable("r").and_then(Value::as_number).unwrap();
    assert!((1.0..=3.0).contains(&r));
    assert!(h.lines().contains(&"bot: y=10".to_string()));
}

#[tokio::test]
async fn test_counter_overflow_is_a_line_error() {
    let h = Harness::new();
    h.gateway.store_var("n", &i64::MAX.to_string());
    h.gateway.store_var("m", &i64::MIN.to_string());
    let report = h.run("incVar(\"n\")\ndecVar(\"m\")\nx = 1").await;

    assert!(report.is_completed());
    assert_eq!(report.variable("x"), Some(&Value::Number(1.0)));
    assert_eq!(h.gateway.load_var("n"), Some(i64::MAX.to_string()));
    assert_eq!(h.gateway.load_var("m"), Some(i64::MIN.to_string()));
    assert!(h.logged("Line 1: incVar: n = 9223372036854775807 would overflow"));
    assert!(h.logged("Line 2: decVar: m = -9223372036854775808 would overflow"));
}

#[tokio::test]
async fn test_break_outside_loop_ends_only_its_branch() {
    let h = Harness::new();
    let report = h
        .run(
            r#"
            if (true) { break }
            click(1, 1)
            fun g() {
                if (true) { break }
                click(2, 2)
            }
            i = 0
            while (i < 2) {
                i++
                g()
            }
            click(3, 3)
            "#,
        )
        .await;
    assert!(report.is_completed());
    assert_eq!(report.variable("i"), Some(&Value::Number(2.0)));
    assert_eq!(
        h.clicks(),
        vec![
            Point::new(1, 1),
            Point::new(2, 2),
            Point::new(2, 2),
            Point::new(3, 3),
        ]
    );
}

#[tokio::test]
async fn test_bare_break_ends_enclosing_block() {
    // A `break` standing directly in a block ends that block: at top level
    // the rest of the script, in a function the rest of its body.
    let h = Harness::new();
    let report = h
        .run(
            r#"
            fun f() {
                click(1, 1)
                break
                click(2, 2)
            }
            f()
            click(3, 3)
            break
            click(4, 4)
            "#,
        )
        .await;
    assert!(report.is_completed());
    assert_eq!(h.clicks(), vec![Point::new(1, 1), Point::new(3, 3)]);
}

#[tokio::test]
async fn test_query_results_with_both_quote_kinds_compare() {
    let h = Harness::new();
    h.gateway.store_var("q", r#"it's "x""#);
    let report = h
        .run(
            r#"
            if (getVar("q") == getVar("q")) { click(1, 1) }
            if (getVar("q") == 'it\'s "x"') { click(2, 2) }
            if (getVar("q") != "it's") { click(3, 3) }
            copy = getVar("q")
            "#,
        )
        .await;
    assert_eq!(report.variable("copy"), Some(&Value::from(r#"it's "x""#)));
    assert_eq!(
        h.clicks(),
        vec![Point::new(1, 1), Point::new(2, 2), Point::new(3, 3)]
    );
}

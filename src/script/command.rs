//! Built-in command table.
//!
//! Every built-in is one [`CommandSpec`] entry: its name, the argument counts
//! it accepts and a parser that resolves and validates the arguments into a
//! typed [`Command`]. Parsing never touches the device, so a command that
//! fails validation performs no gateway call.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::gateway::{Color, GlobalAction, Point, Rect, TextBlock};
use crate::result::GatewayError;
use crate::script::error::ScriptError;
use crate::script::eval::Evaluator;
use crate::script::runtime::{RunConfig, Runtime};
use crate::script::text::split_args;
use crate::script::value::Value;
use crate::timing::PollTimer;

const DEFAULT_LONG_CLICK_MS: u64 = 500;
const DEFAULT_SWIPE_MS: u64 = 300;
const DEFAULT_TAP_DELAY_MS: u64 = 100;

/// A validated built-in call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `click(x,y)`
    Click(Point),
    /// `longClick(x,y[,duration])`
    LongClick(Point, Duration),
    /// `swipe(x1,y1,x2,y2[,duration])`
    Swipe {
        /// Start point
        from: Point,
        /// End point
        to: Point,
        /// Gesture duration
        duration: Duration,
    },
    /// `tap(x,y,count[,delay])`
    Tap {
        /// Where to tap
        at: Point,
        /// Number of clicks
        count: u32,
        /// Pause between clicks
        delay: Duration,
    },
    /// `sleep(ms)`
    Sleep(Duration),
    /// `log(text)`
    Log(String),
    /// `toast(text)`
    Toast(String),
    /// `sendTelegram(text)`
    SendMessage(String),
    /// `vibrate(ms)`
    Vibrate(Duration),
    /// `back()`, `home()`, `recents()`
    Global(GlobalAction),
    /// `setVar(name,value)`
    SetVar {
        /// Persistent variable name
        name: String,
        /// Value to store
        value: String,
    },
    /// `getVar(name)`
    GetVar(String),
    /// `incVar(name)`
    IncVar(String),
    /// `decVar(name)`
    DecVar(String),
    /// `waitForColor(x,y,color,timeout)`
    WaitForColor {
        /// Pixel to watch
        at: Point,
        /// Expected color
        color: Color,
        /// Polling budget
        timeout: Duration,
    },
    /// `waitForText(x1,y1,x2,y2,text,timeout)`
    WaitForText {
        /// Region to watch
        area: Rect,
        /// Text to wait for
        text: String,
        /// Polling budget
        timeout: Duration,
    },
    /// `compareColor(x,y,color[,tolerance])`
    CompareColor {
        /// Pixel to sample
        at: Point,
        /// Expected color
        color: Color,
        /// Allowed per-channel difference; 0 requires an exact match
        tolerance: u8,
    },
    /// `getColor(x,y)`
    GetColor(Point),
    /// `getText(x1,y1,x2,y2)`
    GetText(Rect),
    /// `pushToCb(text)`
    PushToClipboard(String),
    /// `random(min,max)`
    Random {
        /// Lower bound, inclusive
        min: i64,
        /// Upper bound, inclusive
        max: i64,
    },
    /// `findText(text[,timeout])`
    FindText {
        /// Text to look for
        text: String,
        /// Polling budget
        timeout: Duration,
    },
    /// `findImage(path[,threshold])`
    FindImage {
        /// Template image
        path: String,
        /// Minimum match score
        threshold: f64,
    },
}

/// One entry of the command table.
pub struct CommandSpec {
    /// Name as written in scripts
    pub name: &'static str,
    arity: &'static [usize],
    expected: &'static str,
    parse: fn(&Args<'_>) -> Result<Command, ScriptError>,
    query: bool,
}

impl CommandSpec {
    /// Whether the command produces a value usable inside expressions and
    /// conditions.
    pub fn is_query(&self) -> bool {
        self.query
    }
}

static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "click",
        arity: &[2],
        expected: "2",
        parse: |a| Ok(Command::Click(a.point(0)?)),
        query: false,
    },
    CommandSpec {
        name: "longClick",
        arity: &[2, 3],
        expected: "2 or 3",
        parse: |a| {
            Ok(Command::LongClick(
                a.point(0)?,
                a.duration_or(2, "duration", DEFAULT_LONG_CLICK_MS)?,
            ))
        },
        query: false,
    },
    CommandSpec {
        name: "swipe",
        arity: &[4, 5],
        expected: "4 or 5",
        parse: |a| {
            Ok(Command::Swipe {
                from: a.point(0)?,
                to: a.point(2)?,
                duration: a.duration_or(4, "duration", DEFAULT_SWIPE_MS)?,
            })
        },
        query: false,
    },
    CommandSpec {
        name: "tap",
        arity: &[3, 4],
        expected: "3 or 4",
        parse: |a| {
            Ok(Command::Tap {
                at: a.point(0)?,
                count: a.count(2)?,
                delay: a.duration_or(3, "delay", DEFAULT_TAP_DELAY_MS)?,
            })
        },
        query: false,
    },
    CommandSpec {
        name: "sleep",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::Sleep(a.duration(0, "duration")?)),
        query: false,
    },
    CommandSpec {
        name: "log",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::Log(a.message(0))),
        query: false,
    },
    CommandSpec {
        name: "toast",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::Toast(a.message(0))),
        query: false,
    },
    CommandSpec {
        name: "sendTelegram",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::SendMessage(a.message(0))),
        query: false,
    },
    CommandSpec {
        name: "vibrate",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::Vibrate(a.duration(0, "duration")?)),
        query: false,
    },
    CommandSpec {
        name: "back",
        arity: &[0],
        expected: "0",
        parse: |_| Ok(Command::Global(GlobalAction::Back)),
        query: false,
    },
    CommandSpec {
        name: "home",
        arity: &[0],
        expected: "0",
        parse: |_| Ok(Command::Global(GlobalAction::Home)),
        query: false,
    },
    CommandSpec {
        name: "recents",
        arity: &[0],
        expected: "0",
        parse: |_| Ok(Command::Global(GlobalAction::Recents)),
        query: false,
    },
    CommandSpec {
        name: "setVar",
        arity: &[2],
        expected: "2",
        parse: |a| {
            Ok(Command::SetVar {
                name: a.name(0)?,
                value: a.text(1),
            })
        },
        query: false,
    },
    CommandSpec {
        name: "getVar",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::GetVar(a.name(0)?)),
        query: true,
    },
    CommandSpec {
        name: "incVar",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::IncVar(a.name(0)?)),
        query: false,
    },
    CommandSpec {
        name: "decVar",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::DecVar(a.name(0)?)),
        query: false,
    },
    CommandSpec {
        name: "waitForColor",
        arity: &[4],
        expected: "4",
        parse: |a| {
            Ok(Command::WaitForColor {
                at: a.point(0)?,
                color: a.color(2)?,
                timeout: a.duration(3, "timeout")?,
            })
        },
        query: true,
    },
    CommandSpec {
        name: "waitForText",
        arity: &[6],
        expected: "6",
        parse: |a| {
            Ok(Command::WaitForText {
                area: a.rect(0)?,
                text: a.text(4),
                timeout: a.duration(5, "timeout")?,
            })
        },
        query: true,
    },
    CommandSpec {
        name: "compareColor",
        arity: &[3, 4],
        expected: "3 or 4",
        parse: |a| {
            Ok(Command::CompareColor {
                at: a.point(0)?,
                color: a.color(2)?,
                tolerance: a.tolerance(3)?,
            })
        },
        query: true,
    },
    CommandSpec {
        name: "getColor",
        arity: &[2],
        expected: "2",
        parse: |a| Ok(Command::GetColor(a.point(0)?)),
        query: true,
    },
    CommandSpec {
        name: "getText",
        arity: &[4],
        expected: "4",
        parse: |a| Ok(Command::GetText(a.rect(0)?)),
        query: true,
    },
    CommandSpec {
        name: "pushToCb",
        arity: &[1],
        expected: "1",
        parse: |a| Ok(Command::PushToClipboard(a.message(0))),
        query: false,
    },
    CommandSpec {
        name: "random",
        arity: &[2],
        expected: "2",
        parse: |a| {
            let min = a.number(0, "min")? as i64;
            let max = a.number(1, "max")? as i64;
            Ok(Command::Random {
                min: min.min(max),
                max: min.max(max),
            })
        },
        query: false,
    },
    CommandSpec {
        name: "findText",
        arity: &[1, 2],
        expected: "1 or 2",
        parse: |a| {
            let timeout = match a.len() {
                1 => a.config.find_text_timeout,
                _ => a.duration(1, "timeout")?,
            };
            Ok(Command::FindText {
                text: a.text(0),
                timeout,
            })
        },
        query: true,
    },
    CommandSpec {
        name: "findImage",
        arity: &[1, 2],
        expected: "1 or 2",
        parse: |a| {
            Ok(Command::FindImage {
                path: a.text(0),
                threshold: a.threshold(1)?,
            })
        },
        query: true,
    },
];

/// Look up a built-in by name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Whether `name` is a built-in command.
pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

/// Resolve and validate the raw argument text of a call to `spec`.
pub fn parse(
    spec: &'static CommandSpec,
    args: &str,
    eval: &Evaluator<'_>,
    config: &RunConfig,
) -> Result<Command, ScriptError> {
    let raw = split_args(args);
    if !spec.arity.contains(&raw.len()) {
        return Err(ScriptError::Arity {
            command: spec.name,
            expected: spec.expected,
            got: raw.len(),
        });
    }
    let args = Args {
        command: spec.name,
        raw,
        eval,
        config,
    };
    (spec.parse)(&args)
}

/// Resolved arguments of one call.
pub struct Args<'a> {
    command: &'static str,
    raw: Vec<&'a str>,
    eval: &'a Evaluator<'a>,
    config: &'a RunConfig,
}

impl Args<'_> {
    fn len(&self) -> usize {
        self.raw.len()
    }

    fn value(&self, index: usize) -> Value {
        self.raw
            .get(index)
            .map(|raw| self.eval.resolve_value(raw))
            .unwrap_or(Value::Null)
    }

    fn raw(&self, index: usize) -> &str {
        self.raw.get(index).copied().unwrap_or_default()
    }

    fn invalid(&self, message: String) -> ScriptError {
        ScriptError::invalid(self.command, message)
    }

    fn text(&self, index: usize) -> String {
        self.value(index).as_string()
    }

    /// Text with `${name}` / `$name` interpolated.
    fn message(&self, index: usize) -> String {
        self.eval.interpolate(&self.text(index))
    }

    fn name(&self, index: usize) -> Result<String, ScriptError> {
        let name = self.text(index);
        if name.trim().is_empty() {
            return Err(self.invalid("variable name must not be empty".to_string()));
        }
        Ok(name)
    }

    fn number(&self, index: usize, what: &str) -> Result<f64, ScriptError> {
        self.value(index)
            .as_number()
            .filter(|n| n.is_finite())
            .ok_or_else(|| {
                self.invalid(format!("{} must be a number, got {}", what, self.raw(index)))
            })
    }

    fn coordinate(&self, index: usize) -> Result<i32, ScriptError> {
        let n = self.number(index, "coordinate")?;
        let max = self.config.max_coordinate;
        if n < 0.0 || n > f64::from(max) {
            return Err(self.invalid(format!("coordinate {} outside 0..={}", n, max)));
        }
        Ok(n as i32)
    }

    fn point(&self, index: usize) -> Result<Point, ScriptError> {
        Ok(Point::new(self.coordinate(index)?, self.coordinate(index + 1)?))
    }

    fn rect(&self, index: usize) -> Result<Rect, ScriptError> {
        Ok(Rect::from_corners(
            self.coordinate(index)?,
            self.coordinate(index + 1)?,
            self.coordinate(index + 2)?,
            self.coordinate(index + 3)?,
        ))
    }

    fn duration(&self, index: usize, what: &str) -> Result<Duration, ScriptError> {
        let ms = self.number(index, what)?;
        if ms < 0.0 {
            return Err(self.invalid(format!("{} must not be negative, got {}", what, ms)));
        }
        Ok(Duration::from_millis(ms as u64))
    }

    fn duration_or(&self, index: usize, what: &str, default_ms: u64) -> Result<Duration, ScriptError> {
        if index < self.len() {
            self.duration(index, what)
        } else {
            Ok(Duration::from_millis(default_ms))
        }
    }

    fn count(&self, index: usize) -> Result<u32, ScriptError> {
        let n = self.number(index, "count")?;
        if n < 1.0 || n > f64::from(u32::MAX) {
            return Err(self.invalid(format!("count must be positive, got {}", n)));
        }
        Ok(n as u32)
    }

    fn color(&self, index: usize) -> Result<Color, ScriptError> {
        self.text(index)
            .parse::<Color>()
            .map_err(|e| self.invalid(e.to_string()))
    }

    fn tolerance(&self, index: usize) -> Result<u8, ScriptError> {
        if index >= self.len() {
            return Ok(0);
        }
        let n = self.number(index, "tolerance")?;
        if !(0.0..=255.0).contains(&n) {
            return Err(self.invalid(format!("tolerance {} outside 0..=255", n)));
        }
        Ok(n as u8)
    }

    fn threshold(&self, index: usize) -> Result<f64, ScriptError> {
        if index >= self.len() {
            return Ok(self.config.image_threshold);
        }
        let n = self.number(index, "threshold")?;
        if n <= 0.0 || n > 1.0 {
            return Err(self.invalid(format!("threshold {} outside (0, 1]", n)));
        }
        Ok(n)
    }
}

/// Outcome of sampling the screen text once.
enum Sample {
    Text(Vec<TextBlock>),
    Retry,
    Abort,
}

impl Command {
    /// Perform the command against the runtime's gateway.
    ///
    /// Returns the value the call produces, if any. Action failures are
    /// returned as errors; a failing query logs the failure and yields its
    /// "not found" sentinel instead.
    pub(crate) async fn execute(&self, rt: &Runtime, line: usize) -> Result<Option<Value>, ScriptError> {
        let gateway = rt.gateway();
        match self {
            Command::Click(at) => {
                gateway.click(*at)?;
                rt.log(&format!("click({}, {})", at.x, at.y));
                Ok(None)
            }
            Command::LongClick(at, duration) => {
                gateway.long_click(*at, *duration)?;
                rt.log(&format!(
                    "longClick({}, {}, {})",
                    at.x,
                    at.y,
                    duration.as_millis()
                ));
                Ok(None)
            }
            Command::Swipe { from, to, duration } => {
                gateway.swipe(*from, *to, *duration)?;
                rt.log(&format!(
                    "swipe({}, {}, {}, {}, {})",
                    from.x,
                    from.y,
                    to.x,
                    to.y,
                    duration.as_millis()
                ));
                Ok(None)
            }
            Command::Tap { at, count, delay } => {
                let mut done = 0;
                while done < *count && !rt.should_stop() {
                    gateway.click(*at)?;
                    done += 1;
                    if done < *count && !rt.sleep(*delay).await {
                        break;
                    }
                }
                rt.log(&format!("tap({}, {}) x{}", at.x, at.y, done));
                Ok(None)
            }
            Command::Sleep(duration) => {
                if !rt.sleep(*duration).await {
                    debug!(line, "Sleep interrupted by stop request");
                }
                Ok(None)
            }
            Command::Log(text) => {
                rt.log(text);
                Ok(None)
            }
            Command::Toast(text) => {
                gateway.toast(text)?;
                rt.log(&format!("toast: {}", text));
                Ok(None)
            }
            Command::SendMessage(text) => {
                gateway.send_message(text)?;
                rt.log(&format!("sendTelegram: {}", text));
                Ok(None)
            }
            Command::Vibrate(duration) => {
                gateway.vibrate(*duration)?;
                rt.log(&format!("vibrate({})", duration.as_millis()));
                Ok(None)
            }
            Command::Global(action) => {
                gateway.global_action(*action)?;
                rt.log(&format!("{}()", action));
                Ok(None)
            }
            Command::PushToClipboard(text) => {
                gateway.set_clipboard(text)?;
                rt.log(&format!("pushToCb: {}", text));
                Ok(None)
            }
            Command::SetVar { name, value } => {
                gateway.store_var(name, value);
                rt.log(&format!("setVar({}, {})", name, value));
                Ok(None)
            }
            Command::GetVar(name) => Ok(Some(Value::String(
                gateway.load_var(name).unwrap_or_default(),
            ))),
            Command::IncVar(name) => step_var(rt, "incVar", name, 1).map(Some),
            Command::DecVar(name) => step_var(rt, "decVar", name, -1).map(Some),
            Command::Random { min, max } => {
                let n = rand::thread_rng().gen_range(*min..=*max);
                Ok(Some(Value::from(n)))
            }
            Command::GetColor(at) => match gateway.pixel(*at) {
                Ok(color) => Ok(Some(Value::String(color.to_string()))),
                Err(e) => {
                    rt.error(line, &format!("getColor failed: {}", e));
                    Ok(Some(Value::Null))
                }
            },
            Command::CompareColor {
                at,
                color,
                tolerance,
            } => match gateway.pixel(*at) {
                Ok(actual) => Ok(Some(Value::Bool(actual.matches(*color, *tolerance)))),
                Err(e) => {
                    rt.error(line, &format!("compareColor failed: {}", e));
                    Ok(Some(Value::Bool(false)))
                }
            },
            Command::WaitForColor { at, color, timeout } => {
                let found = wait_for_color(rt, line, *at, *color, *timeout).await;
                rt.log(&format!(
                    "waitForColor({}, {}, {}): {}",
                    at.x,
                    at.y,
                    color,
                    if found { "matched" } else { "timed out" }
                ));
                Ok(Some(Value::Bool(found)))
            }
            Command::WaitForText {
                area,
                text,
                timeout,
            } => {
                let found = poll_text(rt, line, *timeout, |blocks| {
                    blocks
                        .iter()
                        .any(|b| area.contains(b.bounds.center()) && b.text.contains(text.as_str()))
                        .then_some(())
                })
                .await
                .is_some();
                rt.log(&format!(
                    "waitForText(\"{}\"): {}",
                    text,
                    if found { "found" } else { "timed out" }
                ));
                Ok(Some(Value::Bool(found)))
            }
            Command::GetText(area) => {
                let text = match sample_text(rt, line).await {
                    Sample::Text(blocks) => blocks
                        .iter()
                        .filter(|b| area.contains(b.bounds.center()))
                        .map(|b| b.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" "),
                    Sample::Retry | Sample::Abort => String::new(),
                };
                Ok(Some(Value::String(text)))
            }
            Command::FindText { text, timeout } => {
                let found = poll_text(rt, line, *timeout, |blocks| {
                    blocks
                        .iter()
                        .find(|b| b.text.contains(text.as_str()))
                        .map(|b| b.bounds.center())
                })
                .await;
                match found {
                    Some(at) => rt.log(&format!("findText(\"{}\"): {}", text, at)),
                    None => rt.log(&format!("findText(\"{}\"): not found", text)),
                }
                Ok(Some(Value::from(found)))
            }
            Command::FindImage { path, threshold } => {
                match gateway.find_image(path, *threshold) {
                    Ok(found) => {
                        match found {
                            Some(at) => rt.log(&format!("findImage({}): {}", path, at)),
                            None => rt.log(&format!("findImage({}): not found", path)),
                        }
                        Ok(Some(Value::from(found)))
                    }
                    Err(e) => {
                        rt.error(line, &format!("findImage failed: {}", e));
                        Ok(Some(Value::Null))
                    }
                }
            }
        }
    }
}

/// Add `delta` to a persistent integer variable; a missing or non-numeric
/// value counts as 0.
fn step_var(
    rt: &Runtime,
    command: &'static str,
    name: &str,
    delta: i64,
) -> Result<Value, ScriptError> {
    let gateway = rt.gateway();
    let current = gateway
        .load_var(name)
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(0);
    let next = current.checked_add(delta).ok_or_else(|| {
        ScriptError::invalid(command, format!("{} = {} would overflow", name, current))
    })?;
    gateway.store_var(name, &next.to_string());
    debug!(name, value = next, "Persistent variable updated");
    Ok(Value::from(next))
}

async fn wait_for_color(
    rt: &Runtime,
    line: usize,
    at: Point,
    color: Color,
    timeout: Duration,
) -> bool {
    let config = rt.config();
    let mut timer = PollTimer::new(timeout, config.poll_interval);
    loop {
        match rt.gateway().pixel(at) {
            Ok(actual) if actual.matches(color, 0) => return true,
            Ok(_) => {}
            Err(e) => {
                rt.error(line, &format!("waitForColor failed: {}", e));
                return false;
            }
        }
        if !timer.next(rt.token(), config.sleep_slice).await {
            return false;
        }
    }
}

/// Poll the screen text until `check` finds something or the budget runs out.
async fn poll_text<T>(
    rt: &Runtime,
    line: usize,
    timeout: Duration,
    check: impl Fn(&[TextBlock]) -> Option<T>,
) -> Option<T> {
    let config = rt.config();
    let mut timer = PollTimer::new(timeout, config.poll_interval);
    loop {
        match sample_text(rt, line).await {
            Sample::Text(blocks) => {
                if let Some(found) = check(&blocks) {
                    return Some(found);
                }
            }
            Sample::Retry => {}
            Sample::Abort => return None,
        }
        if !timer.next(rt.token(), config.sleep_slice).await {
            return None;
        }
    }
}

/// Capture the screen and recognize its text once.
///
/// The recognition is raced against the stop flag so a stop request never
/// waits out the recognizer's bound.
async fn sample_text(rt: &Runtime, line: usize) -> Sample {
    let image = match rt.gateway().screenshot() {
        Ok(image) => image,
        Err(e) => {
            rt.error(line, &format!("Screenshot failed: {}", e));
            return Sample::Abort;
        }
    };

    let result = tokio::select! {
        result = rt.ocr().recognize(rt.gateway(), image) => result,
        _ = rt.token().cancelled(rt.config().sleep_slice) => return Sample::Abort,
    };

    match result {
        Ok(blocks) => Sample::Text(blocks),
        Err(e @ GatewayError::RecognitionTimeout { .. }) => {
            rt.error(line, &format!("Text recognition failed: {}", e));
            Sample::Retry
        }
        Err(e) => {
            rt.error(line, &format!("Text recognition failed: {}", e));
            Sample::Abort
        }
    }
}

//! In-memory gateway that records actions instead of performing them

use crate::gateway::{
    ActionGateway, Color, GlobalAction, Point, Screenshot, TextBlock, TextRecognizer,
};
use crate::result::GatewayError;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default frame width
const DEFAULT_WIDTH: u32 = 360;

/// Default frame height
const DEFAULT_HEIGHT: u32 = 640;

/// An action the engine asked the gateway to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedAction {
    /// `click`, and each tap of `tap`
    Click(Point),
    /// `longClick`
    LongClick(Point, Duration),
    /// `swipe`
    Swipe {
        /// Start point
        from: Point,
        /// End point
        to: Point,
        /// Gesture duration
        duration: Duration,
    },
    /// `back`, `home`, `recents`
    Global(GlobalAction),
    /// `sendTelegram`
    Message(String),
    /// `vibrate`
    Vibrate(Duration),
    /// `pushToCb`
    Clipboard(String),
    /// `toast`
    Toast(String),
}

/// A simulated device.
///
/// Records every action, answers pixel queries from a background color plus
/// per-pixel overrides, serves a configurable list of on-screen text blocks to
/// its recognizer, and resolves template images from a lookup table. The
/// state can be changed while a run is in progress, which is how tests drive
/// the polling waits.
///
/// # Examples
///
/// ```
/// use autoscript::{ActionGateway, Color, Point, RecordedAction, RecordingGateway};
///
/// let gateway = RecordingGateway::new();
/// gateway.set_pixel(Point::new(5, 5), Color::from_rgb(255, 0, 0));
///
/// gateway.click(Point::new(1, 2)).unwrap();
/// assert_eq!(gateway.actions(), vec![RecordedAction::Click(Point::new(1, 2))]);
/// assert_eq!(gateway.pixel(Point::new(5, 5)).unwrap().argb(), 0xFFFF0000);
/// ```
pub struct RecordingGateway {
    width: u32,
    height: u32,
    ready: AtomicBool,
    actions: Mutex<Vec<RecordedAction>>,
    action_error: Mutex<Option<String>>,
    background: Mutex<Color>,
    pixels: Mutex<HashMap<Point, Color>>,
    screen_text: Arc<Mutex<Vec<TextBlock>>>,
    recognition_delay: Mutex<Duration>,
    recognizer_init_error: Mutex<Option<String>>,
    images: Mutex<HashMap<String, (Point, f64)>>,
    vars: Mutex<HashMap<String, String>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    /// A ready device with a small black screen.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// A ready device with a black screen of the given size.
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ready: AtomicBool::new(true),
            actions: Mutex::new(Vec::new()),
            action_error: Mutex::new(None),
            background: Mutex::new(Color::from_rgb(0, 0, 0)),
            pixels: Mutex::new(HashMap::new()),
            screen_text: Arc::new(Mutex::new(Vec::new())),
            recognition_delay: Mutex::new(Duration::ZERO),
            recognizer_init_error: Mutex::new(None),
            images: Mutex::new(HashMap::new()),
            vars: Mutex::new(HashMap::new()),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Everything performed so far, in order.
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().clone()
    }

    /// Number of `click` actions performed so far.
    pub fn click_count(&self) -> usize {
        self.actions
            .lock()
            .iter()
            .filter(|a| matches!(a, RecordedAction::Click(_)))
            .count()
    }

    /// Mark the device as (not) ready.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every subsequent action fail with `message`.
    pub fn fail_actions(&self, message: impl Into<String>) {
        *self.action_error.lock() = Some(message.into());
    }

    /// Color of every pixel without an override.
    pub fn set_background(&self, color: Color) {
        *self.background.lock() = color;
    }

    /// Override one pixel.
    pub fn set_pixel(&self, at: Point, color: Color) {
        self.pixels.lock().insert(at, color);
    }

    /// Replace the text the recognizer reports.
    pub fn set_screen_text(&self, blocks: Vec<TextBlock>) {
        *self.screen_text.lock() = blocks;
    }

    /// Delay every recognition by `delay`.
    pub fn set_recognition_delay(&self, delay: Duration) {
        *self.recognition_delay.lock() = delay;
    }

    /// Make opening a recognizer fail with `message`.
    pub fn fail_recognizer_init(&self, message: impl Into<String>) {
        *self.recognizer_init_error.lock() = Some(message.into());
    }

    /// Register a template image found at `at` with match score `score`.
    pub fn add_image(&self, template: impl Into<String>, at: Point, score: f64) {
        self.images.lock().insert(template.into(), (at, score));
    }

    /// Number of recognizers opened so far.
    pub fn recognizers_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of recognizers closed so far.
    pub fn recognizers_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn perform(&self, action: RecordedAction) -> Result<(), GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotReady);
        }
        if let Some(message) = self.action_error.lock().clone() {
            return Err(GatewayError::ActionFailed(message));
        }
        self.actions.lock().push(action);
        Ok(())
    }

    fn sample(&self, at: Point) -> Color {
        self.pixels
            .lock()
            .get(&at)
            .copied()
            .unwrap_or(*self.background.lock())
    }
}

impl ActionGateway for RecordingGateway {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn click(&self, at: Point) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Click(at))
    }

    fn long_click(&self, at: Point, duration: Duration) -> Result<(), GatewayError> {
        self.perform(RecordedAction::LongClick(at, duration))
    }

    fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Swipe { from, to, duration })
    }

    fn global_action(&self, action: GlobalAction) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Global(action))
    }

    fn pixel(&self, at: Point) -> Result<Color, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotReady);
        }
        Ok(self.sample(at))
    }

    fn screenshot(&self) -> Result<Screenshot, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotReady);
        }
        let background = self.background.lock().argb();
        let mut pixels = vec![background; self.width as usize * self.height as usize];
        for (point, color) in self.pixels.lock().iter() {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < self.width
                && (point.y as u32) < self.height
            {
                pixels[point.y as usize * self.width as usize + point.x as usize] = color.argb();
            }
        }
        Ok(Screenshot {
            width: self.width,
            height: self.height,
            pixels: pixels.into(),
        })
    }

    fn text_recognizer(&self) -> Result<Arc<dyn TextRecognizer>, GatewayError> {
        if let Some(message) = self.recognizer_init_error.lock().clone() {
            return Err(GatewayError::RecognizerInit(message));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingRecognizer {
            screen_text: self.screen_text.clone(),
            delay: *self.recognition_delay.lock(),
            closed: self.closed.clone(),
        }))
    }

    fn find_image(&self, template: &str, threshold: f64) -> Result<Option<Point>, GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::NotReady);
        }
        Ok(self
            .images
            .lock()
            .get(template)
            .filter(|(_, score)| *score >= threshold)
            .map(|(at, _)| *at))
    }

    fn send_message(&self, text: &str) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Message(text.to_string()))
    }

    fn vibrate(&self, duration: Duration) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Vibrate(duration))
    }

    fn set_clipboard(&self, text: &str) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Clipboard(text.to_string()))
    }

    fn toast(&self, text: &str) -> Result<(), GatewayError> {
        self.perform(RecordedAction::Toast(text.to_string()))
    }

    fn load_var(&self, name: &str) -> Option<String> {
        self.vars.lock().get(name).cloned()
    }

    fn store_var(&self, name: &str, value: &str) {
        self.vars.lock().insert(name.to_string(), value.to_string());
    }
}

struct RecordingRecognizer {
    screen_text: Arc<Mutex<Vec<TextBlock>>>,
    delay: Duration,
    closed: Arc<AtomicUsize>,
}

impl TextRecognizer for RecordingRecognizer {
    fn recognize(&self, _image: Screenshot) -> BoxFuture<'static, Result<Vec<TextBlock>, GatewayError>> {
        let screen_text = self.screen_text.clone();
        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(screen_text.lock().clone())
        })
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

//! Action Gateway contract
//!
//! The engine never touches a device directly. Everything it does to or reads
//! from the screen goes through an [`ActionGateway`], which a host application
//! implements on top of its accessibility service, screen capture, OCR and
//! messaging backends. All primitives are synchronous from the engine's point
//! of view except text recognition, which returns a future that the engine
//! waits on with a fixed bound.

mod color;
mod ocr;
mod recording;

pub use color::Color;
pub use ocr::OcrHandle;
pub use recording::{RecordedAction, RecordingGateway};

use crate::result::GatewayError;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    /// Horizontal position in pixels
    pub x: i32,
    /// Vertical position in pixels
    pub y: i32,
}

impl Point {
    /// Create a point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// An axis-aligned screen region, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Right edge
    pub right: i32,
    /// Bottom edge
    pub bottom: i32,
}

impl Rect {
    /// Build a region from two corners given in any order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            left: x1.min(x2),
            top: y1.min(y2),
            right: x1.max(x2),
            bottom: y1.max(y2),
        }
    }

    /// Center of the region.
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    /// Whether `point` lies inside the region.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

/// A captured frame of the screen, pixels packed as `0xAARRGGBB`, row-major.
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Packed pixels, `width * height` entries
    pub pixels: Arc<[u32]>,
}

impl Screenshot {
    /// Sample one pixel, `None` outside the frame.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.pixels.get(index).copied().map(Color::from_argb)
    }
}

/// One piece of text found by the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Recognized text
    pub text: String,
    /// Where it was found
    pub bounds: Rect,
}

/// System navigation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    /// Navigate back
    Back,
    /// Go to the home screen
    Home,
    /// Open the recent apps list
    Recents,
}

impl fmt::Display for GlobalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlobalAction::Back => write!(f, "back"),
            GlobalAction::Home => write!(f, "home"),
            GlobalAction::Recents => write!(f, "recents"),
        }
    }
}

/// A text recognition session.
///
/// Created lazily by [`ActionGateway::text_recognizer`] on the first text
/// query of a run and closed when the run ends. The engine serializes access
/// through [`OcrHandle`], so `recognize` is never called after `close`.
pub trait TextRecognizer: Send + Sync {
    /// Start recognizing `image`. The engine bounds the wait on the returned
    /// future; a recognizer that never answers cannot stall a run.
    fn recognize(&self, image: Screenshot) -> BoxFuture<'static, Result<Vec<TextBlock>, GatewayError>>;

    /// Release the underlying session.
    fn close(&self);
}

/// Device actions and sensing used by the script engine.
///
/// Implementations must be thread-safe: the engine calls them from its worker
/// task while a controller may call [`Engine::close`](crate::Engine::close)
/// from elsewhere.
pub trait ActionGateway: Send + Sync {
    /// Whether the backend can perform actions right now.
    fn is_ready(&self) -> bool {
        true
    }

    /// Single tap at a point.
    fn click(&self, at: Point) -> Result<(), GatewayError>;

    /// Press and hold at a point.
    fn long_click(&self, at: Point, duration: Duration) -> Result<(), GatewayError>;

    /// Drag from one point to another.
    fn swipe(&self, from: Point, to: Point, duration: Duration) -> Result<(), GatewayError>;

    /// Back, home or recents.
    fn global_action(&self, action: GlobalAction) -> Result<(), GatewayError>;

    /// Sample the current color of one pixel.
    fn pixel(&self, at: Point) -> Result<Color, GatewayError>;

    /// Capture the whole screen.
    fn screenshot(&self) -> Result<Screenshot, GatewayError>;

    /// Open a text recognition session.
    fn text_recognizer(&self) -> Result<Arc<dyn TextRecognizer>, GatewayError>;

    /// Locate a template image on screen, returning the center of the best
    /// match whose score reaches `threshold`.
    fn find_image(&self, template: &str, threshold: f64) -> Result<Option<Point>, GatewayError>;

    /// Deliver a chat notification.
    fn send_message(&self, text: &str) -> Result<(), GatewayError>;

    /// Vibrate the device.
    fn vibrate(&self, duration: Duration) -> Result<(), GatewayError>;

    /// Put text on the clipboard.
    fn set_clipboard(&self, text: &str) -> Result<(), GatewayError>;

    /// Show a transient on-screen message.
    fn toast(&self, text: &str) -> Result<(), GatewayError>;

    /// Read from the gateway's persistent variable store (`getVar`).
    fn load_var(&self, name: &str) -> Option<String>;

    /// Write to the gateway's persistent variable store (`setVar`).
    fn store_var(&self, name: &str, value: &str);
}

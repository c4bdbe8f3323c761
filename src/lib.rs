//! autoscript: device automation scripts for Rust
//!
//! autoscript runs a small line-oriented automation language (commands,
//! conditionals, loops, functions and stringly-typed variables) against a
//! device backend. The backend is anything implementing [`ActionGateway`]:
//! it clicks, swipes, samples pixels, recognizes text and matches images.
//! The engine owns everything else: block discovery, condition evaluation,
//! function scopes, and a cooperative stop flag that every wait observes.
//!
//! # Features
//!
//! - **Async**: one run is one tokio task; sleeps and polls never block a thread
//! - **Responsive stop**: `stop()` takes effect within one sleep slice
//! - **Lenient**: a bad line is logged and skipped, never aborts the run
//! - **Bounded OCR**: text recognition is lock-guarded and time-bounded
//! - **Testable**: [`RecordingGateway`] stands in for a real device
//!
//! # Quick Start
//!
//! ```rust
//! use autoscript::{Engine, RecordingGateway};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let gateway = Arc::new(RecordingGateway::new());
//!     let engine = Engine::builder()
//!         .on_log(|line| println!("{}", line))
//!         .build(gateway.clone());
//!
//!     let report = engine
//!         .execute(
//!             r#"
//!             setVar("n", "0")
//!             while (true) {
//!                 incVar("n")
//!                 if (getVar("n") == "3") { break }
//!             }
//!             count = getVar("n")
//!             log("counted to ${count}")
//!             "#,
//!         )
//!         .await;
//!
//!     assert!(report.is_completed());
//! }
//! ```
//!
//! # Script Language
//!
//! ```text
//! // comments start with two slashes
//! fun tapTwice(x, y) {
//!     tap(x, y, 2, 150)
//!     result = "ok"
//! }
//!
//! val status = tapTwice(100, 200)
//! if (compareColor(10, 10, "#FF0000")) {
//!     log("red")
//! } else if (findText("Continue") != null) {
//!     click(540, 1800)
//! } else {
//!     back()
//! }
//! ```
//!
//! # Stopping a Run
//!
//! ```rust,no_run
//! use autoscript::{Engine, RecordingGateway, RunStatus};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let engine = Arc::new(Engine::new(Arc::new(RecordingGateway::new())));
//! let run = Engine::spawn(&engine, "sleep(100000)");
//!
//! tokio::time::sleep(Duration::from_millis(100)).await;
//! engine.stop();
//!
//! let report = run.await.unwrap();
//! assert_eq!(report.status, RunStatus::Stopped);
//! # }
//! ```

#![warn(missing_docs)]

mod engine;
mod gateway;
mod result;

pub mod script;
pub mod timing;

// Public API exports
pub use engine::{Engine, EngineBuilder};
pub use gateway::{
    ActionGateway, Color, GlobalAction, OcrHandle, Point, RecordedAction, RecordingGateway, Rect,
    Screenshot, TextBlock, TextRecognizer,
};
pub use result::{ColorError, GatewayError, RunReport, RunStatus};
pub use timing::CancelToken;

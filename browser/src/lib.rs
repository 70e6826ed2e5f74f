//! Headless browser session and the narrow exploration tool surface (spec
//! §4.3). `supervisor` launches one [`BrowserSession`] per analysis (per
//! device, for multi-device runs) and registers its eight tools with a
//! [`qa_core::tools::ToolRegistry`] before handing the registry to
//! `qa_core::agent::explore::explore`.

mod error;
mod session;
mod tools;
mod viewport;

pub use error::BrowserError;
pub use session::BrowserSession;
pub use tools::{
    register_all, ClickTool, EvaluateJsTool, GetPageInfoTool, NavigateTool, ScreenshotTool,
    ScrollTool, TypeTextTool, WaitTool,
};
pub use viewport::{resolve as resolve_viewport, Viewport, DEFAULT_VIEWPORT};

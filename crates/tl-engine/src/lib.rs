//! The turn execution engine: wires `tl-core` contracts and `tl-stores`
//! implementations into a runnable Agent → Loop → Iteration → Tool-call
//! pipeline.

pub mod config;
pub mod runtime;
pub mod test_support;

pub use config::{CleanupSettings, ConfigIssue, ConfigSeverity, EngineConfig, LoopSettings};
pub use runtime::{Agent, CancelMap, CancelToken, IterationRunner, LocalTool, LocalToolPlugin, LoopConfig, LoopRunner, ToolRunner};

//! Service Kit - Agent Tools
//!
//! Tools that implement `agent_core::Tool`.

mod calculator;
mod datetime;
mod notes;
mod weather;
mod web_search;

pub use calculator::{evaluate, CalculatorTool};
pub use datetime::DateTimeTool;
pub use notes::{DEFAULT_NOTE_CAPACITY, ListNotesTool, Note, NoteBook, SaveNoteTool};
pub use weather::WeatherTool;
pub use web_search::{ScopedSearchTool, WebSearchTool};

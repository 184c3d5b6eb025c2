//! Argument-parsing substrate exposed to command/plugin logic.
//!
//! [`reader::StringReader`] is the cursor primitive every token recognizer
//! builds on; [`arguments::ArgumentType`] is the pluggable
//! parse/load/examples/suggestions contract implemented per token kind.

pub mod arguments;
pub mod reader;
pub mod suggestions;

pub use arguments::{ArgumentType, ParseContext, ParseError, ResolutionError};
pub use reader::{ReadError, StringReader};
pub use suggestions::{Suggestion, Suggestions, SuggestionsBuilder};

//! Document model types shared by every extractor.
//!
//! This module defines the intermediate representation (IR) that bridges
//! format-specific extraction and Markdown emission. Extractors produce an
//! ordered `Vec<StructuralNode>`; the serializer consumes only that sequence.

mod node;
mod span;
mod table;

pub use node::{Inline, ListItem, PlaceholderKind, StructuralNode};
pub use span::{RawTextRun, StyleFlags, StyledSpan};
pub use table::{build_grid, escape_cell, TableGrid};

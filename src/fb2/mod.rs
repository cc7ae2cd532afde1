//! FB2 (FictionBook 2) parsing.

mod parser;

pub use parser::{
    author_display, parse_fb2, Binary, ContentNode, Fb2Author, Fb2Document, ImageRef, Section,
};

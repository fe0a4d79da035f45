//! Built-in component library.

mod file;
mod string;

pub use file::{FileReader, FileWriter};
pub use string::{Grep, StringSink, StringSource, Uppercase};

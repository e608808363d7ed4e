//! Rendering of select responses to the console or a file.

mod table;

pub use table::TableFormatter;

use std::fs;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{IoSnafu, Result};
use crate::response::Response;

/// Where `print` sends the rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Console,
    File,
}

/// Renders `response` and writes it to stdout or to `path`
/// (`default_path` when no path is given).
pub fn print_response(
    response: &Response,
    kind: OutputKind,
    path: Option<&Path>,
    default_path: &Path,
) -> Result<()> {
    let text = TableFormatter::new(response).render();
    match kind {
        OutputKind::Console => {
            print!("{}", text);
            Ok(())
        }
        OutputKind::File => {
            let target = path.unwrap_or(default_path);
            fs::write(target, text).context(IoSnafu {
                message: format!("failed to write query output to {}", target.display()),
            })
        }
    }
}

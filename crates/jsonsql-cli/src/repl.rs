//! A small interactive shell over one JSON document.
//!
//! By default we use `rustyline` for line editing and tab completion driven by
//! the schema's completion items. A minimal stdin-based fallback exists behind
//! `--no-default-features`.

use anyhow::Result;
#[cfg(feature = "repl-rustyline")]
use anyhow::anyhow;
use colored::Colorize;
use jsonsql_query::Explorer;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::{self, Write};

use crate::render;

pub fn cmd_repl(explorer: Explorer) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        return cmd_repl_rustyline(explorer);
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        return cmd_repl_simple(explorer);
    }
}

fn print_banner(explorer: &Explorer) {
    println!("{}", "jsonsql explorer".green().bold());
    match explorer.summary() {
        Some(summary) => println!("table `{}`: {summary}", explorer.config().table_name),
        None => println!("{}", "no rows loaded".yellow()),
    }
    println!("Type `.help` for commands. Type `.quit` to exit.\n");
}

#[cfg(not(feature = "repl-rustyline"))]
fn cmd_repl_simple(mut explorer: Explorer) -> Result<()> {
    print_banner(&explorer);

    let stdin = io::stdin();
    loop {
        print!("{}", "sql> ".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        match dispatch_line(&mut explorer, line.trim()) {
            ReplControl::Continue => {}
            ReplControl::Exit => break,
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn cmd_repl_rustyline(mut explorer: Explorer) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    print_banner(&explorer);

    let helper = ReplLineHelper::new(&explorer);
    let mut rl: Editor<ReplLineHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(helper));

    loop {
        let line = match rl.readline("sql> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        match dispatch_line(&mut explorer, line) {
            ReplControl::Continue => {}
            ReplControl::Exit => break,
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReplControl {
    Continue,
    Exit,
}

fn dispatch_line(explorer: &mut Explorer, line: &str) -> ReplControl {
    if line.is_empty() {
        return ReplControl::Continue;
    }
    if line.starts_with('.') {
        return dispatch_meta(explorer, line);
    }

    match explorer.run_query(line) {
        Ok(result) => {
            print!("{}", render::render_result(result));
            println!("{}", render::render_timing(result).dimmed());
        }
        Err(e) => eprintln!("{} {e}", "error:".red().bold()),
    }
    ReplControl::Continue
}

fn dispatch_meta(explorer: &mut Explorer, line: &str) -> ReplControl {
    match line {
        ".quit" | ".exit" => return ReplControl::Exit,
        ".help" => print_help(),
        ".schema" => match explorer.schema() {
            Some(schema) => print!("{}", render::render_schema(schema, explorer.rows().len())),
            None => println!("{}", "no schema (no rows loaded)".yellow()),
        },
        ".complete" => {
            for item in explorer.completion_items() {
                println!("{:<24} {}", item.insert_text, item.detail.dimmed());
            }
        }
        ".last" => match (explorer.last_result(), explorer.last_error()) {
            (Some(result), _) => println!("{}", render::render_timing(result)),
            (None, Some(err)) => println!("{} {err}", "last error:".red()),
            (None, None) => println!("no query run yet"),
        },
        ".run" => {
            let sql = explorer.query().to_string();
            return dispatch_line(explorer, &sql);
        }
        other => eprintln!("{} unknown command `{other}` (try `.help`)", "error:".red().bold()),
    }
    ReplControl::Continue
}

fn print_help() {
    println!("{}", "Commands".bold());
    println!("  <sql>       run a query against the loaded table");
    println!("  .schema     show inferred columns");
    println!("  .complete   list completion items");
    println!("  .run        run the current query again");
    println!("  .last       timing or error of the last query");
    println!("  .help       this help");
    println!("  .quit       exit");
}

// =============================================================================
// Tab completion (rustyline)
// =============================================================================

#[cfg(feature = "repl-rustyline")]
struct ReplLineHelper {
    /// `(display, replacement)` for table, columns, keywords and meta commands.
    candidates: Vec<(String, String)>,
}

#[cfg(feature = "repl-rustyline")]
impl ReplLineHelper {
    fn new(explorer: &Explorer) -> Self {
        let mut candidates: Vec<(String, String)> = explorer
            .completion_items()
            .iter()
            .map(|item| (item.label.clone(), item.insert_text.clone()))
            .collect();
        for meta in [".schema", ".complete", ".run", ".last", ".help", ".quit"] {
            candidates.push((meta.to_string(), meta.to_string()));
        }
        Self { candidates }
    }

    fn pairs_from_prefix(&self, prefix: &str) -> Vec<rustyline::completion::Pair> {
        let needle = prefix.to_ascii_uppercase();
        self.candidates
            .iter()
            .filter(|(label, _)| label.to_ascii_uppercase().starts_with(&needle))
            .map(|(label, insert)| rustyline::completion::Pair {
                display: label.clone(),
                replacement: insert.clone(),
            })
            .collect()
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::Helper for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::highlight::Highlighter for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::hint::Hinter for ReplLineHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::validate::Validator for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::completion::Completer for ReplLineHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == ',' || c == '(')
            .map(|i| i + 1)
            .unwrap_or(0);
        Ok((start, self.pairs_from_prefix(&line[start..pos])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonsql_query::ExplorerConfig;
    use serde_json::json;

    fn explorer() -> Explorer {
        Explorer::new(json!([{ "id": 1 }, { "id": 2 }]), ExplorerConfig::default()).expect("explorer")
    }

    #[test]
    fn test_quit_commands_exit() {
        let mut explorer = explorer();
        assert_eq!(dispatch_line(&mut explorer, ".quit"), ReplControl::Exit);
        assert_eq!(dispatch_line(&mut explorer, ".exit"), ReplControl::Exit);
    }

    #[test]
    fn test_sql_lines_run_through_explorer() {
        let mut explorer = explorer();
        assert_eq!(
            dispatch_line(&mut explorer, "SELECT COUNT(*) AS n FROM data"),
            ReplControl::Continue
        );
        assert_eq!(explorer.last_result().map(|r| r.row_count), Some(1));

        dispatch_line(&mut explorer, "DELETE FROM data");
        assert!(explorer.last_error().is_some());
    }

    #[test]
    fn test_run_repeats_current_query() {
        let mut explorer = explorer();
        assert_eq!(dispatch_line(&mut explorer, ".run"), ReplControl::Continue);
        assert_eq!(explorer.last_result().map(|r| r.row_count), Some(2));
    }

    #[cfg(feature = "repl-rustyline")]
    #[test]
    fn test_completion_candidates_use_escaped_insert_text() {
        let explorer = Explorer::new(
            json!([{ "address": { "city": "NYC" } }]),
            ExplorerConfig {
                flatten: true,
                ..ExplorerConfig::default()
            },
        )
        .expect("explorer");
        let helper = ReplLineHelper::new(&explorer);

        let pairs = helper.pairs_from_prefix("addr");
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].replacement, "[address.city]");

        let pairs = helper.pairs_from_prefix("sel");
        assert!(pairs.iter().any(|p| p.replacement == "SELECT"));
    }
}

//! # Help Catalog
//!
//! A static mapping from command names to a short description and an
//! example invocation. The content is informational only; nothing in the
//! engine depends on it.

use phf::phf_map;

use crate::error::{Entity, NotFoundSnafu, Result};

pub struct HelpEntry {
    pub description: &'static str,
    pub example: &'static str,
}

static COMMANDS: phf::Map<&'static str, HelpEntry> = phf_map! {
    "open" => HelpEntry {
        description: "Opens an existing database from its image file.",
        example: "engine.open(\"test_db\", None)",
    },
    "show" => HelpEntry {
        description: "Lists the open database's tables, or the databases under a root path.",
        example: "engine.show() / engine.show_databases(None)",
    },
    "help" => HelpEntry {
        description: "Prints this catalog, or one entry.",
        example: "engine.help(Some(\"select\"))",
    },
    "create" => HelpEntry {
        description: "Creates a database, or a table from column definitions.",
        example: "engine.create_table(\"users\", &[\"id INTEGER PRIMARY KEY\", \"name STRING\"])",
    },
    "alter" => HelpEntry {
        description: "Adds, modifies, or drops columns and constraints; also renames tables.",
        example: "engine.alter_table(\"users\", Some(&[\"age INTEGER\"]), None, None)",
    },
    "drop" => HelpEntry {
        description: "Drops a table, or the whole database.",
        example: "engine.drop(\"users\", false)",
    },
    "insert" => HelpEntry {
        description: "Inserts rows of values into named columns.",
        example: "engine.insert(\"users\", &[\"id\"], vec![vec![Value::Int(1)]])",
    },
    "update" => HelpEntry {
        description: "Rewrites assigned cells of every row matching a condition.",
        example: "engine.update(\"users\", &[\"age = 18\"], \"id = 1\")",
    },
    "delete" => HelpEntry {
        description: "Removes every row matching a condition.",
        example: "engine.delete(\"users\", \"age < 18\")",
    },
    "select" => HelpEntry {
        description: "Materializes matching rows; retrieve them with last_select().",
        example: "engine.select_where(\"users\", &[\"id\", \"name\"], \"age >= 18\")",
    },
    "begin" => HelpEntry {
        description: "Starts a transaction; later commands queue until COMMIT.",
        example: "engine.begin()",
    },
    "commit" => HelpEntry {
        description: "Executes the queued commands and persists the database image.",
        example: "engine.commit()",
    },
    "rollback" => HelpEntry {
        description: "Discards the queued commands and restores the pre-BEGIN snapshot.",
        example: "engine.rollback()",
    },
    "undo" => HelpEntry {
        description: "Reverses the most recent historical command; no-op when empty.",
        example: "engine.undo()",
    },
    "print" => HelpEntry {
        description: "Renders the last select response to the console or a file.",
        example: "engine.print(OutputKind::Console, None)",
    },
};

/// Renders the whole catalog, or a single entry.
pub fn render(topic: Option<&str>) -> Result<String> {
    match topic {
        Some(name) => {
            let key = name.to_ascii_lowercase();
            match COMMANDS.get(key.as_str()) {
                Some(entry) => Ok(format_entry(&key, entry)),
                None => NotFoundSnafu {
                    entity: Entity::Command,
                    name,
                }
                .fail(),
            }
        }
        None => {
            let mut names: Vec<&&str> = COMMANDS.keys().collect();
            names.sort();
            let mut text = String::new();
            for name in names {
                if let Some(entry) = COMMANDS.get(name) {
                    text.push_str(&format_entry(name, entry));
                }
            }
            Ok(text)
        }
    }
}

fn format_entry(name: &str, entry: &HelpEntry) -> String {
    format!(
        "{}\n    {}\n    example: {}\n",
        name, entry.description, entry.example
    )
}

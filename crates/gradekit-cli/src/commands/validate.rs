//! The `gradekit validate` command.

use std::path::PathBuf;

use anyhow::Result;

use gradekit_core::parser::{self, SetFile};

pub fn execute(path: PathBuf) -> Result<()> {
    let files = if path.is_dir() {
        parser::load_directory(&path)?
    } else {
        vec![parser::parse_set_file(&path)?]
    };

    let mut total_warnings = 0;

    for file in &files {
        match file {
            SetFile::Topics(set) => println!("Topic set: {} ({} topics)", set.name, set.topics.len()),
            SetFile::Key(key) => {
                println!("Answer key: {} ({} questions)", key.name, key.questions.len())
            }
        }

        let warnings = file.validate();
        for w in &warnings {
            let prefix = w
                .item_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if files.is_empty() {
        println!("No set files found.");
    } else if total_warnings == 0 {
        println!("All sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

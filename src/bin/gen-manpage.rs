//! Man page generator for aotf
//!
//! Writes `aotf.1` plus one `aotf-<command>.1` page per subcommand.
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::{Command, CommandFactory};
use std::fs;
use std::io;
use std::path::PathBuf;

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

/// Page names paired with the command each one documents
fn pages() -> Vec<(String, Command)> {
    let root = cli::Cli::command();
    let mut pages = vec![(root.get_name().to_string(), root.clone())];
    for sub in root.get_subcommands() {
        pages.push((format!("{}-{}", root.get_name(), sub.get_name()), sub.clone()));
    }
    pages
}

fn render(title: &str, cmd: Command) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .title(title.to_uppercase())
        .render(&mut buffer)?;
    Ok(buffer)
}

fn main() -> io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    for (name, cmd) in pages() {
        let output_path = output_dir.join(format!("{}.1", name));
        fs::write(&output_path, render(&name, cmd)?)?;
        println!("Wrote {}", output_path.display());
    }

    println!("\nView with: man -l {}", output_dir.join("aotf.1").display());
    Ok(())
}

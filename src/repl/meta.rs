//! Dot-commands: `.exit`, `.btree`, `.constants`, and the catch-all.

use crate::storage::table::Table;

pub enum MetaOutcome {
    Exit,
    Handled,
    Unrecognized,
}

pub fn run(input: &str, table: &mut Table) -> MetaOutcome {
    match input {
        ".exit" => MetaOutcome::Exit,
        ".btree" => {
            println!("Tree:");
            match table.print_tree() {
                Ok(dump) => print!("{}", dump),
                Err(e) => fatal(&e.to_string()),
            }
            MetaOutcome::Handled
        }
        ".constants" => {
            println!("Constants:");
            println!("{}", Table::constants());
            MetaOutcome::Handled
        }
        _ => MetaOutcome::Unrecognized,
    }
}

fn fatal(message: &str) -> ! {
    println!("{}", message);
    std::process::exit(1);
}

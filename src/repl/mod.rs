//! The line-oriented command loop: print the prompt, read one line,
//! dispatch to a meta-command or a statement. Every message printed here
//! is part of the REPL's external contract and must stay byte-exact;
//! internal diagnostics go through `tracing` instead, never stdout.

mod meta;
mod statement;

use std::io::{self, Write};

use tracing::{error, info};

use crate::errors::CommandError;
use crate::storage::table::{InsertError, Table};
use statement::Statement;

const PROMPT: &str = "db > ";

pub fn run(table: &mut Table) {
    loop {
        print!("{}", PROMPT);
        if io::stdout().flush().is_err() {
            fatal("failed to flush stdout");
        }

        let mut line = String::new();
        let bytes_read = match io::stdin().read_line(&mut line) {
            Ok(n) => n,
            Err(e) => fatal(&format!("error reading input: {}", e)),
        };
        if bytes_read == 0 {
            fatal("error reading input: unexpected end of input");
        }

        let input = line.trim_end_matches(['\n', '\r']);
        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            match meta::run(input, table) {
                meta::MetaOutcome::Exit => {
                    if let Err(e) = table.close() {
                        fatal(&format!("error closing database: {}", e));
                    }
                    info!("database closed cleanly on .exit");
                    std::process::exit(0);
                }
                meta::MetaOutcome::Handled => continue,
                meta::MetaOutcome::Unrecognized => {
                    println!("{}", CommandError::UnrecognizedCommand(input.to_string()));
                    continue;
                }
            }
        }

        match statement::prepare_statement(input) {
            Ok(Statement::Insert(row)) => match table.insert(&row) {
                Ok(()) => println!("Executed."),
                Err(InsertError::Duplicate) => println!("{}", CommandError::DuplicateKey),
                Err(InsertError::Storage(e)) => {
                    error!(error = %e, "storage error during insert");
                    fatal(&e.to_string());
                }
            },
            Ok(Statement::Select) => match table.select() {
                Ok(rows) => {
                    for row in &rows {
                        println!("({}, {}, {})", row.id, row.username, row.email);
                    }
                    println!("total rows: {}", rows.len());
                    println!("Executed.");
                }
                Err(e) => {
                    error!(error = %e, "storage error during select");
                    fatal(&e.to_string());
                }
            },
            Err(e) => println!("{}", e),
        }
    }
}

fn fatal(message: &str) -> ! {
    println!("{}", message);
    std::process::exit(1);
}

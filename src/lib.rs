//! Library surface for the embedded store: the error taxonomy, the
//! storage engine (pager, node layout, cursor, B+ tree), and the REPL
//! glue that drives them. Split out from `main` so that `tests/` can
//! exercise `Table`/`Pager` directly instead of only through stdin/stdout.

pub mod errors;
pub mod repl;
pub mod storage;

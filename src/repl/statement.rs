//! Parses one non-meta input line into a `Statement`. Mirrors the
//! original tutorial's prepare_statement: a thin, stateless tokenizer
//! that knows nothing about the tree.

use crate::errors::CommandError;
use crate::storage::row::Row;

pub enum Statement {
    Insert(Row),
    Select,
}

pub fn prepare_statement(input: &str) -> Result<Statement, CommandError> {
    if input == "select" {
        return Ok(Statement::Select);
    }
    if let Some(rest) = input.strip_prefix("insert") {
        return prepare_insert(rest);
    }
    Err(CommandError::UnrecognizedKeyword(input.to_string()))
}

fn prepare_insert(rest: &str) -> Result<Statement, CommandError> {
    let mut fields = rest.split_whitespace();
    let id_str = fields.next().ok_or(CommandError::SyntaxError)?;
    let username = fields.next().ok_or(CommandError::SyntaxError)?;
    let email = fields.next().ok_or(CommandError::SyntaxError)?;
    if fields.next().is_some() {
        return Err(CommandError::SyntaxError);
    }
    let id: i64 = id_str.parse().map_err(|_| CommandError::SyntaxError)?;
    let row = Row::new(id, username, email)?;
    Ok(Statement::Insert(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_insert() {
        let stmt = prepare_statement("insert 1 alice a@x").unwrap();
        assert!(matches!(stmt, Statement::Insert(_)));
    }

    #[test]
    fn parses_select() {
        assert!(matches!(prepare_statement("select").unwrap(), Statement::Select));
    }

    #[test]
    fn missing_field_is_a_syntax_error() {
        assert_eq!(
            prepare_statement("insert 1 alice").unwrap_err(),
            CommandError::SyntaxError
        );
    }

    #[test]
    fn negative_id_is_rejected() {
        assert_eq!(
            prepare_statement("insert -1 alice a@x").unwrap_err(),
            CommandError::NegativeId
        );
    }

    #[test]
    fn non_numeric_id_is_a_syntax_error() {
        assert_eq!(
            prepare_statement("insert abc alice a@x").unwrap_err(),
            CommandError::SyntaxError
        );
    }

    #[test]
    fn unrecognized_verb_is_reported_with_the_full_input() {
        assert_eq!(
            prepare_statement("delete 1").unwrap_err(),
            CommandError::UnrecognizedKeyword("delete 1".to_string())
        );
    }
}

//! The fixed-schema row stored in every leaf cell: `(id, username, email)`.
//!
//! Unlike a general-purpose column system, every field lives at a fixed
//! byte offset. `id` is the primary key; `username`/`email` are ASCII,
//! NUL-padded C-style strings so that a raw page dump stays readable.

use crate::errors::CommandError;

pub const USERNAME_MAX_LEN: usize = 32;
pub const EMAIL_MAX_LEN: usize = 255;

/// +1 on each string reserves room for a terminating NUL.
pub const USERNAME_SIZE: usize = USERNAME_MAX_LEN + 1;
pub const EMAIL_SIZE: usize = EMAIL_MAX_LEN + 1;

pub const ID_SIZE: usize = std::mem::size_of::<u32>();
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

const ID_OFFSET: usize = 0;
const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Validates field lengths and builds a `Row`. This is the row-field
    /// validator the design doc treats as a thin external collaborator:
    /// it knows nothing about pages or the tree, only about the schema.
    pub fn new(id: i64, username: &str, email: &str) -> Result<Self, CommandError> {
        if id < 0 {
            return Err(CommandError::NegativeId);
        }
        if username.len() > USERNAME_MAX_LEN || email.len() > EMAIL_MAX_LEN {
            return Err(CommandError::StringTooLong);
        }
        Ok(Row {
            id: id as u32,
            username: username.to_string(),
            email: email.to_string(),
        })
    }

    /// Serializes the row into the fixed 293-byte on-page layout.
    pub fn serialize(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());

        let username_slot = &mut buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE];
        username_slot.fill(0);
        username_slot[..self.username.len()].copy_from_slice(self.username.as_bytes());

        let email_slot = &mut buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE];
        email_slot.fill(0);
        email_slot[..self.email.len()].copy_from_slice(self.email.as_bytes());
    }

    /// Deserializes a row from its fixed on-page layout, trimming the NUL padding.
    pub fn deserialize(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        let id = u32::from_le_bytes(buf[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        let username = nul_terminated_string(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        let email = nul_terminated_string(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        Row { id, username, email }
    }
}

fn nul_terminated_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_fixed_layout() {
        let row = Row::new(7, "alice", "alice@example.com").unwrap();
        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        assert_eq!(Row::deserialize(&buf), row);
    }

    #[test]
    fn rejects_negative_id() {
        assert_eq!(Row::new(-1, "a", "a@x").unwrap_err(), CommandError::NegativeId);
    }

    #[test]
    fn rejects_oversized_username() {
        let long = "a".repeat(USERNAME_MAX_LEN + 1);
        assert_eq!(
            Row::new(1, &long, "a@x").unwrap_err(),
            CommandError::StringTooLong
        );
    }

    #[test]
    fn rejects_oversized_email() {
        let long = "a".repeat(EMAIL_MAX_LEN + 1);
        assert_eq!(
            Row::new(1, "alice", &long).unwrap_err(),
            CommandError::StringTooLong
        );
    }

    #[test]
    fn serialize_pads_with_nul_not_garbage() {
        let row = Row::new(1, "a", "b").unwrap();
        let mut buf = [0xFFu8; ROW_SIZE];
        row.serialize(&mut buf);
        assert_eq!(buf[USERNAME_OFFSET + 1], 0);
        assert_eq!(buf[EMAIL_OFFSET + 1], 0);
    }
}

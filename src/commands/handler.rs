//! Command Handler Module
//!
//! This module executes parsed commands against the storage engine and maps
//! every outcome onto a protocol [`Reply`].
//!
//! | Outcome                  | Reply                  |
//! |--------------------------|------------------------|
//! | PUT / DELETE succeeded   | `OK`                   |
//! | GET found a value        | the value              |
//! | key absent               | `NOT FOUND`            |
//! | reserved value on PUT    | `RESERVED KEYWORD <v>` |
//! | unparseable line         | `INVALID INPUT`        |
//!
//! Execution is deterministic given the store contents; no failure here ever
//! ends the connection.

use crate::protocol::{parse_command, Command, ParseResult, Reply};
use crate::storage::{StorageEngine, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// Executes commands against the shared storage engine.
///
/// Cloning a `CommandHandler` is cheap; every connection gets its own clone
/// pointing at the same store.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Returns the storage engine this handler executes against.
    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Parses and executes one request line.
    pub fn execute_line(&self, line: &Bytes) -> Reply {
        self.execute_parsed(parse_command(line))
    }

    /// Executes the result of parsing a line; parse failures become
    /// `INVALID INPUT`.
    pub fn execute_parsed(&self, parsed: ParseResult<Command>) -> Reply {
        match parsed {
            Ok(command) => self.execute(command),
            Err(e) => {
                debug!(error = %e, "Rejected request line");
                Reply::InvalidInput
            }
        }
    }

    /// Executes a command and returns the reply.
    pub fn execute(&self, command: Command) -> Reply {
        let name = command.name();
        let key = command.key().clone();

        let reply = match command {
            Command::Put { key, value } => self.cmd_put(key, value),
            Command::Get { key } => self.cmd_get(&key),
            Command::Delete { key } => self.cmd_delete(&key),
        };

        trace!(
            command = name,
            key = %String::from_utf8_lossy(&key),
            failed = reply.is_error(),
            "Executed command"
        );
        reply
    }

    /// PUT key value
    fn cmd_put(&self, key: Bytes, value: Bytes) -> Reply {
        match self.storage.put(key, value) {
            Ok(_) => Reply::Ok,
            Err(StorageError::ReservedValue(value)) => Reply::ReservedKeyword(value),
        }
    }

    /// GET key
    fn cmd_get(&self, key: &[u8]) -> Reply {
        match self.storage.get(key) {
            Some(value) => Reply::Value(value),
            None => Reply::NotFound,
        }
    }

    /// DELETE key
    fn cmd_delete(&self, key: &[u8]) -> Reply {
        if self.storage.delete(key) {
            Reply::Ok
        } else {
            Reply::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn run(handler: &CommandHandler, line: &str) -> Reply {
        handler.execute_line(&Bytes::from(line.to_string()))
    }

    #[test]
    fn test_put_get() {
        let handler = create_handler();

        assert_eq!(run(&handler, "PUT key1 value1"), Reply::Ok);
        assert_eq!(
            run(&handler, "GET key1"),
            Reply::Value(Bytes::from("value1"))
        );
    }

    #[test]
    fn test_put_get_multiple() {
        let handler = create_handler();

        assert_eq!(run(&handler, "PUT key1 value1"), Reply::Ok);
        assert_eq!(run(&handler, "PUT key1 value2"), Reply::Ok);
        assert_eq!(
            run(&handler, "GET key1"),
            Reply::Value(Bytes::from("value2"))
        );
    }

    #[test]
    fn test_get_nonexistent() {
        let handler = create_handler();
        assert_eq!(run(&handler, "GET random_234123652346"), Reply::NotFound);
    }

    #[test]
    fn test_invalid_command() {
        let handler = create_handler();

        assert_eq!(run(&handler, "FLUSH"), Reply::InvalidInput);
        assert_eq!(run(&handler, "MAY key1"), Reply::InvalidInput);
        assert_eq!(run(&handler, "GET hi here"), Reply::InvalidInput);
        assert_eq!(run(&handler, "PUT hi here how"), Reply::InvalidInput);
        assert_eq!(run(&handler, ""), Reply::InvalidInput);
    }

    #[test]
    fn test_attempt_writing_tombstone() {
        let handler = create_handler();

        let reply = run(&handler, "PUT key1 __TOMBSTONE__");
        assert_eq!(reply.serialize(), b"RESERVED KEYWORD __TOMBSTONE__\n");
        assert_eq!(run(&handler, "GET key1"), Reply::NotFound);
    }

    #[test]
    fn test_tombstone_keeps_previous_value() {
        let handler = create_handler();

        run(&handler, "PUT key1 value1");
        run(&handler, "PUT key1 __TOMBSTONE__");
        assert_eq!(
            run(&handler, "GET key1"),
            Reply::Value(Bytes::from("value1"))
        );
    }

    #[test]
    fn test_delete_nonexistent() {
        let handler = create_handler();
        assert_eq!(run(&handler, "DELETE random_1234123412"), Reply::NotFound);
    }

    #[test]
    fn test_delete_key() {
        let handler = create_handler();

        assert_eq!(run(&handler, "PUT key3 value3"), Reply::Ok);
        assert_eq!(run(&handler, "DELETE key3"), Reply::Ok);
        assert_eq!(run(&handler, "DELETE key3"), Reply::NotFound);
        assert_eq!(run(&handler, "GET key3"), Reply::NotFound);
    }

    #[test]
    fn test_handlers_share_storage() {
        let first = create_handler();
        let second = first.clone();

        run(&first, "PUT shared yes");
        assert_eq!(run(&second, "GET shared"), Reply::Value(Bytes::from("yes")));
        assert_eq!(first.storage().len(), 1);
    }

    #[test]
    fn test_invalid_input_does_not_touch_storage() {
        let handler = create_handler();

        run(&handler, "PUT a b c");
        run(&handler, "DELETE");
        assert!(handler.storage().is_empty());
        assert_eq!(handler.storage().stats().put_ops, 0);
    }

    #[test]
    fn test_failed_requests_are_flagged() {
        let handler = create_handler();

        assert!(!run(&handler, "PUT k v").is_error());
        assert!(!run(&handler, "GET k").is_error());
        assert!(run(&handler, "PUT k __TOMBSTONE__").is_error());
        assert!(run(&handler, "GET missing").is_error());
        assert!(run(&handler, "FLUSH").is_error());
    }
}

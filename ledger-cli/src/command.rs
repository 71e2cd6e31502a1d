//! Commands understood by the interactive session

use std::str::FromStr;

pub const INSTRUCTIONS: &str = "\
Valid commands:
  mine: discovers the nonce for a given transaction
  append: appends a new block onto the end of the chain
  remove: removes the last block from the end of the chain
  check: checks that the block chain is valid
  users: prints a list of users
  balance: finds a user's balance
  transactions: prints out the chain of transactions
  blocks: prints out the chain of blocks (for debugging only)
  help: prints this list of commands
  quit: quits the program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Mine,
    Append,
    Remove,
    Check,
    Users,
    Balance,
    Transactions,
    Blocks,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mine" => Ok(Command::Mine),
            "append" => Ok(Command::Append),
            "remove" => Ok(Command::Remove),
            "check" => Ok(Command::Check),
            "users" => Ok(Command::Users),
            "balance" => Ok(Command::Balance),
            "transactions" => Ok(Command::Transactions),
            "blocks" => Ok(Command::Blocks),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(s.trim().to_string()),
        }
    }
}

//! Line-oriented interactive session over a chain

use crate::command::{Command, INSTRUCTIONS};
use anyhow::Result;
use ledger_chain::{BlockChain, ChainError, ChainResult};
use ledger_core::{Amount, Block, Transaction};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Forward every Ctrl-C for the rest of the process into a channel
pub fn forward_interrupts() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Reads commands from `R` and writes replies to `W`.
///
/// Input ending at any prompt ends the session as if `quit` was entered.
/// An interrupt cancels a running search, and quits when waiting at a
/// prompt.
pub struct Session<R, W> {
    chain: BlockChain,
    lines: Lines<R>,
    out: W,
    interrupts: mpsc::UnboundedReceiver<()>,
}

impl<R, W> Session<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        chain: BlockChain,
        input: R,
        out: W,
        interrupts: mpsc::UnboundedReceiver<()>,
    ) -> Self {
        Self {
            chain,
            lines: input.lines(),
            out,
            interrupts,
        }
    }

    /// Run until `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        writeln!(self.out, "{}", INSTRUCTIONS)?;

        while let Some(line) = self.prompt("\nCommand: ").await? {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    debug!("Executing {:?}", command);
                    if !self.execute(command).await? {
                        break;
                    }
                }
                Err(unknown) => {
                    writeln!(self.out, "invalid command: '{}'. Try again.", unknown)?;
                }
            }
        }

        writeln!(self.out, "\nGoodbye")?;
        self.out.flush()?;
        Ok(())
    }

    /// Execute one command; `false` means input ended mid-command
    async fn execute(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Mine => {
                let Some(transaction) = self.read_transaction().await? else {
                    return Ok(false);
                };
                match self.mine(transaction).await {
                    Ok(block) => writeln!(self.out, "Nonce: {}", block.nonce())?,
                    Err(e) => self.report_mining(e)?,
                }
            }
            Command::Append => {
                let Some(transaction) = self.read_transaction().await? else {
                    return Ok(false);
                };
                match self.mine(transaction).await {
                    Ok(block) => {
                        let nonce = block.nonce();
                        let rendered = block.to_string();
                        match self.chain.append(block) {
                            Ok(()) => writeln!(self.out, "Nonce: {}\nAppended: {}", nonce, rendered)?,
                            Err(e) => writeln!(self.out, "Could not append: {}", e)?,
                        }
                    }
                    Err(e) => self.report_mining(e)?,
                }
            }
            Command::Remove => {
                if self.chain.remove_last() {
                    writeln!(self.out, "Removed last element")?;
                } else {
                    writeln!(self.out, "Failed to remove last element")?;
                }
            }
            Command::Check => match self.chain.check() {
                Ok(()) => writeln!(self.out, "The blockchain checks out.")?,
                Err(e) => writeln!(self.out, "The blockchain is invalid: {}", e)?,
            },
            Command::Users => {
                for account in self.chain.accounts() {
                    writeln!(self.out, "{}", account)?;
                }
            }
            Command::Balance => {
                let Some(user) = self.prompt("User: ").await? else {
                    return Ok(false);
                };
                let user = user.trim();
                writeln!(self.out, "{}'s balance is {}", user, self.chain.balance_of(user))?;
            }
            Command::Transactions => {
                for transaction in self.chain.transactions() {
                    writeln!(self.out, "{}", transaction)?;
                }
            }
            Command::Blocks => {
                for block in self.chain.blocks() {
                    writeln!(self.out, "{}", block)?;
                }
            }
            Command::Help => writeln!(self.out, "{}", INSTRUCTIONS)?,
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Mine on a worker; an interrupt cancels the search
    async fn mine(&mut self, transaction: Transaction) -> ChainResult<Block> {
        let token = CancellationToken::new();
        let mining = self.chain.mine_async(transaction, token.clone());
        tokio::pin!(mining);

        tokio::select! {
            result = &mut mining => result,
            Some(()) = self.interrupts.recv() => {
                info!("Interrupt received, cancelling mining");
                token.cancel();
                mining.await
            }
        }
    }

    fn report_mining(&mut self, error: ChainError) -> Result<()> {
        match error.cancel_reason() {
            Some(reason) => writeln!(self.out, "Mining stopped: {}", reason)?,
            None => writeln!(self.out, "Could not mine: {}", error)?,
        }
        Ok(())
    }

    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        write!(self.out, "{}", text)?;
        self.out.flush()?;

        tokio::select! {
            biased;
            Some(()) = self.interrupts.recv() => {
                info!("Interrupt received at prompt, quitting");
                writeln!(self.out)?;
                Ok(None)
            }
            line = self.lines.next_line() => Ok(line?),
        }
    }

    /// Prompt for source, target and amount; `None` at end of input
    async fn read_transaction(&mut self) -> Result<Option<Transaction>> {
        let Some(source) = self.prompt("Source (return for deposit): ").await? else {
            return Ok(None);
        };
        let Some(target) = self.prompt("Target: ").await? else {
            return Ok(None);
        };

        loop {
            let Some(amount) = self.prompt("Amount: ").await? else {
                return Ok(None);
            };
            match amount.trim().parse::<Amount>() {
                Ok(amount) => {
                    return Ok(Some(Transaction::new(source.trim(), target.trim(), amount)));
                }
                Err(_) => writeln!(self.out, "Please enter an integer.")?,
            }
        }
    }
}

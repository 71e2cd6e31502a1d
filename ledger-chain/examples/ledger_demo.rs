//! Example walking through the ledger chain

use ledger_chain::BlockChain;
use ledger_consensus::MiningConfig;
use ledger_core::Transaction;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🦀 Rust Ledger Chain Demo");
    println!("=========================");

    // Create a chain; mining the genesis block happens here
    println!("\n1. Creating a chain...");
    let chain = BlockChain::from_config(MiningConfig::new(2))?;
    println!("   Genesis block: {}", chain.tail());

    // Fund an account
    println!("\n2. Depositing 100 to bob...");
    let block = chain.mine(Transaction::deposit("bob", 100))?;
    println!("   Mined nonce: {}", block.nonce());
    chain.append(block)?;

    // Transfer between accounts
    println!("\n3. Transferring 30 from bob to carol...");
    let block = chain.mine(Transaction::new("bob", "carol", 30))?;
    chain.append(block)?;
    for account in chain.accounts() {
        println!("   {}: {}", account, chain.balance_of(&account));
    }

    // Overdraft is rejected
    println!("\n4. Attempting to overdraw bob...");
    let block = chain.mine(Transaction::new("bob", "carol", 1000))?;
    match chain.append(block) {
        Ok(()) => println!("   Unexpectedly accepted"),
        Err(e) => println!("   Rejected: {}", e),
    }

    // Undo the transfer
    println!("\n5. Removing the last block...");
    chain.remove_last();
    println!("   bob: {}, carol: {}", chain.balance_of("bob"), chain.balance_of("carol"));

    // Full re-verification
    println!("\n6. Verifying the chain...");
    chain.check()?;
    for block in chain.blocks() {
        println!("   {}", block);
    }

    println!("\n✅ Demo completed successfully!");
    Ok(())
}

//! # Encrypted Chat Demo
//!
//! This example walks through the full client flow:
//! 1. Alice and Bob register (each gets an RSA key pair wrapped under their password)
//! 2. Alice sends Bob the same message twice
//! 3. Bob fails one login with a wrong password, then logs in
//! 4. Bob reads the history and receives a live message
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=cipher_core=debug cargo run --example chat_demo
//! ```

use std::sync::Arc;

use cipher_core::storage::{MemoryMessageLog, MemorySecureStore, MemoryUserDirectory};
use cipher_core::{CoreConfig, Error, IdentityService, MessagingService};

#[tokio::main]
async fn main() -> cipher_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cipher_core=info".into()),
        )
        .init();

    println!("=================================================");
    println!("         CIPHER CHAT DEMO");
    println!("=================================================\n");

    // Shared server-side collaborators; one device store per client
    let users = Arc::new(MemoryUserDirectory::new());
    let log = Arc::new(MemoryMessageLog::new());
    let messaging = MessagingService::new(users.clone(), log.clone());

    let config = CoreConfig::default();
    let alice_device =
        IdentityService::new(&config, users.clone(), Arc::new(MemorySecureStore::new()))?;
    let bob_device =
        IdentityService::new(&config, users.clone(), Arc::new(MemorySecureStore::new()))?;

    // =========================================================================
    // STEP 1: Register
    // =========================================================================
    println!("1. Registering Alice and Bob...\n");

    let alice = alice_device.register("alice", "Alice", "correct-horse")?;
    let bob = bob_device.register("bob", "Bob", "battery-staple")?;
    bob_device.logout();

    println!("   Alice: {}", alice.id());
    println!("   Bob:   {}", bob.id());
    println!();

    // =========================================================================
    // STEP 2: Send
    // =========================================================================
    println!("2. Alice sends \"hello\" twice...\n");

    let first = messaging.send_text(&alice, bob.id(), "hello")?;
    let second = messaging.send_text(&alice, bob.id(), "hello")?;

    println!("   ciphertext #1: {}...", &first.ciphertext[..32]);
    println!("   ciphertext #2: {}...", &second.ciphertext[..32]);
    println!("   identical: {}", first.ciphertext == second.ciphertext);
    println!();

    // =========================================================================
    // STEP 3: Login
    // =========================================================================
    println!("3. Bob logs in...\n");

    match bob_device.login("bob", "wrong-password") {
        Err(Error::InvalidPassword) => println!("   wrong password rejected"),
        other => println!("   unexpected: {:?}", other.map(|s| s.id().to_string())),
    }
    let bob = bob_device.login("bob", "battery-staple")?;
    println!("   logged in as {}", bob.display_name());
    println!();

    // =========================================================================
    // STEP 4: Read
    // =========================================================================
    println!("4. Bob reads the conversation...\n");

    for message in messaging.conversation_concurrent(&bob, alice.id()).await? {
        println!("   [{}] {}", message.created_at, message.display_text());
    }

    let mut inbox = messaging.inbox(&bob, Some(alice.id().to_string()));
    messaging.send_text(&alice, bob.id(), "are you there?")?;
    if let Some(message) = inbox.recv().await {
        println!("   live: {}", message.display_text());
    }

    println!("\n   Alice's own view of the thread:");
    for message in messaging.conversation(&alice, bob.id())? {
        println!("   {}", message.display_text());
    }

    bob_device.logout();
    alice_device.logout();

    println!("\n=================================================");
    println!("         DEMO COMPLETE");
    println!("=================================================");
    Ok(())
}

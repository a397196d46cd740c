use color_eyre::Result;
use macaroons::{Format, Macaroon, Verifier};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Macaroon Basic Usage Example ===\n");

    // Step 1: Mint a new macaroon
    let root_key = b"this is our super secret key; only we should know it";
    let mut macaroon = Macaroon::new("http://mybank/", "we used our secret key", root_key);

    println!(
        "1. Minted macaroon with identifier: {:?}",
        String::from_utf8_lossy(macaroon.identifier())
    );
    println!("   Signature: {}", macaroon.signature_hex());

    // Step 2: Attenuate with first-party caveats
    macaroon.add_first_party_caveat("account = 3735928559");
    macaroon.add_first_party_caveat("action = deposit");

    println!("\n2. Added caveats:");
    for (i, caveat) in macaroon.caveats().iter().enumerate() {
        println!("   {}. {}", i + 1, caveat.display_id());
    }

    // Step 3: Serialize for transmission
    let token = macaroon.serialize(Format::Binary)?;
    let json = macaroon.serialize(Format::Json)?;

    println!("\n3. Serialized formats:");
    println!("   Binary (base64url): {token}");
    println!("   JSON: {json}");

    // Step 4: Deserialize and verify
    let received = Macaroon::deserialize(&token, Format::Binary)?;
    println!("\n4. Received macaroon:\n{received}");

    let verifier = Verifier::new()
        .satisfy_exact("account = 3735928559")
        .satisfy_general(|predicate: &[u8]| predicate.starts_with(b"action = "));

    match verifier.verify(&received, root_key, &[]) {
        Ok(()) => println!("   ✓ Verification successful!"),
        Err(e) => println!("   ✗ Verification failed: {e}"),
    }

    // Step 5: A verifier that doesn't know the account predicate
    println!("\n5. Verifying for a different account...");
    let wrong_verifier = Verifier::new()
        .satisfy_exact("account = 1234")
        .satisfy_exact("action = deposit");

    match wrong_verifier.verify(&received, root_key, &[]) {
        Ok(()) => println!("   ✗ Unexpectedly succeeded!"),
        Err(e) => println!("   ✓ Correctly failed: {e}"),
    }

    // Step 6: Wrong root key
    println!("\n6. Verifying with the wrong root key...");
    match verifier.verify(&received, b"not our key", &[]) {
        Ok(()) => println!("   ✗ Unexpectedly succeeded!"),
        Err(e) => println!("   ✓ Correctly failed: {e}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

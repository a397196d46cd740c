use color_eyre::Result;
use macaroons::{Format, HashSignaturesBinder, Macaroon, Verifier};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Third-Party Caveats and Discharge Macaroons ===\n");

    // Scenario: a bank grants access, but only once an auth service has
    // vouched for the user

    let root_key = b"this is a different super-secret key; never use the same secret twice";
    // Shared out of band between the bank and the auth service
    let caveat_key: [u8; 32] = rand::random();

    // Step 1: The bank mints a macaroon with a third-party caveat
    println!("1. Bank mints macaroon with a third-party caveat");
    let mut macaroon = Macaroon::new("http://mybank/", "we used our other secret key", root_key);
    macaroon.add_first_party_caveat("account = 3735928559");
    macaroon.add_third_party_caveat("http://auth.mybank/", &caveat_key, "user is authenticated")?;

    println!("   Macaroon has {} caveats:", macaroon.caveat_count());
    for caveat in macaroon.caveats() {
        match &caveat.location {
            Some(location) => println!("   - third-party: {} (at {location})", caveat.display_id()),
            None => println!("   - first-party: {}", caveat.display_id()),
        }
    }

    // Step 2: Verifying without a discharge fails
    println!("\n2. Attempting verification without a discharge macaroon...");
    let verifier = Verifier::new()
        .satisfy_exact("account = 3735928559")
        .satisfy_exact("time < 2030-01-01T00:00");

    match verifier.verify(&macaroon, root_key, &[]) {
        Ok(()) => println!("   ✗ Unexpectedly succeeded!"),
        Err(e) => println!("   ✓ Correctly failed: {e}"),
    }

    // Step 3: The auth service issues a discharge
    println!("\n3. Client asks the auth service for a discharge...");
    let mut discharge =
        Macaroon::create_discharge("http://auth.mybank/", "user is authenticated", &caveat_key);
    discharge.add_first_party_caveat("time < 2030-01-01T00:00");
    println!("   ✓ Discharge issued with caveat: time < 2030-01-01T00:00");

    // Step 4: The client binds the discharge to the macaroon
    println!("\n4. Client binds the discharge to the macaroon...");
    let bound = macaroon.prepare_for_request(&discharge);
    println!("   Unbound signature: {}", discharge.signature_hex());
    println!("   Bound signature:   {}", bound.signature_hex());

    // Step 5: Both travel to the bank and verify together
    println!("\n5. Bank verifies the macaroon with its discharge...");
    let token = macaroon.serialize(Format::Binary)?;
    let bound_token = bound.serialize(Format::Binary)?;
    let received = Macaroon::deserialize(&token, Format::Binary)?;
    let received_discharge = Macaroon::deserialize(&bound_token, Format::Binary)?;

    match verifier.verify(&received, root_key, &[received_discharge]) {
        Ok(()) => println!("   ✓ Verification successful! Access granted."),
        Err(e) => println!("   ✗ Verification failed: {e}"),
    }

    // Step 6: An unbound discharge is rejected
    println!("\n6. Presenting the discharge without binding it...");
    match verifier.verify(&macaroon, root_key, &[discharge.clone()]) {
        Ok(()) => println!("   ✗ Unexpectedly succeeded!"),
        Err(e) => println!("   ✓ Correctly failed: {e}"),
    }

    // Step 7: A discharge bound with a custom binder
    println!("\n7. Binding with the hash-signatures binder...");
    let custom = macaroon.prepare_for_request_with(&discharge, &HashSignaturesBinder);
    let custom_verifier = verifier.bind_location("http://auth.mybank/", HashSignaturesBinder);

    match custom_verifier.verify(&macaroon, root_key, &[custom]) {
        Ok(()) => println!("   ✓ Verification successful with custom binding!"),
        Err(e) => println!("   ✗ Verification failed: {e}"),
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

//! Signature commands: `verify`, `sign` and `keygen`.

use std::path::PathBuf;

use chainboot::config::ConfigFile;
use chainboot::trust::{
    decode_signing_key, encode_signing_key, encode_verifying_key, generate_signing_key, key_id,
    key_id_hex, sign_file, SignatureTrustGate,
};
use console::style;

use crate::error::CliError;

/// Arguments for the verify command.
pub struct VerifyArgs {
    pub files: Vec<PathBuf>,
    /// Extra trusted keys on top of `trust.keys`.
    pub keys: Vec<String>,
}

/// Check each file against the trusted keys.
pub fn verify(args: VerifyArgs, config: &ConfigFile) -> Result<(), CliError> {
    let keys: Vec<String> = config.trust.keys.iter().chain(&args.keys).cloned().collect();
    let gate = SignatureTrustGate::from_base64_keys(&keys)
        .map_err(|e| CliError::Config(format!("Invalid trusted key: {}", e)))?;
    if gate.key_count() == 0 {
        return Err(CliError::Config(
            "No trusted keys. Set trust.keys in config.ini or pass --key".to_string(),
        ));
    }

    let mut failed = 0usize;
    for file in &args.files {
        match gate.verify(file) {
            Ok(id) => println!(
                "{} {} (key {})",
                style("trusted").green(),
                file.display(),
                key_id_hex(&id)
            ),
            Err(e) => {
                failed += 1;
                println!("{} {}: {}", style("REJECTED").red().bold(), file.display(), e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::Untrusted { failed });
    }
    Ok(())
}

/// Arguments for the sign command.
pub struct SignArgs {
    pub key: String,
    pub files: Vec<PathBuf>,
}

/// Append a signature trailer to each file.
pub fn sign(args: SignArgs) -> Result<(), CliError> {
    let key = decode_signing_key(args.key.trim())
        .map_err(|e| CliError::Config(format!("Invalid signing key: {}", e)))?;

    for file in &args.files {
        let id = sign_file(file, &key).map_err(|e| CliError::Sign {
            path: file.clone(),
            reason: e.to_string(),
        })?;
        println!("Signed {} (key {})", file.display(), key_id_hex(&id));
    }
    Ok(())
}

/// Print a fresh key pair.
pub fn keygen() -> Result<(), CliError> {
    let signing = generate_signing_key();
    let verifying = signing.verifying_key();

    println!("Key id:      {}", key_id_hex(&key_id(&verifying)));
    println!("Public key:  {}", encode_verifying_key(&verifying));
    println!("Private key: {}", encode_signing_key(&signing));
    println!();
    println!(
        "Add the public key to trust.keys; keep the private key for 'chainboot sign --key'."
    );
    Ok(())
}
